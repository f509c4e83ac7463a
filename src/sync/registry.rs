//! Registry of remote entities and their interpolation state

use std::collections::HashMap;

use slotmap::{new_key_type, SlotMap};
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::util::time::{Clock, SystemClock};

use super::interpolation::{InterpolationConfig, Interpolator, SampleSource};
use super::math::{Pose, Vec3};
use super::snapshot::SnapshotBuffer;

/// Remote entities are identified by their user id
pub type EntityId = Uuid;

new_key_type! {
    /// Arena slot of a remote entity
    pub struct EntityKey;
}

/// One authoritative state update for a remote entity
#[derive(Debug, Clone, PartialEq)]
pub struct EntityUpdate {
    pub position: Vec3,
    pub rotation: f32,
    /// Per-entity sequence number, if the sender provides one
    pub seq: Option<u32>,
    /// Discrete animation label (e.g. "idle", "walk")
    pub animation: Option<String>,
}

impl EntityUpdate {
    pub fn new(position: Vec3, rotation: f32) -> Self {
        Self {
            position,
            rotation,
            seq: None,
            animation: None,
        }
    }

    pub fn with_seq(mut self, seq: u32) -> Self {
        self.seq = Some(seq);
        self
    }

    pub fn with_animation(mut self, animation: impl Into<String>) -> Self {
        self.animation = Some(animation.into());
        self
    }
}

/// What `on_entity_update` did with an update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Entity was unknown; created and first sample recorded
    Spawned,
    /// New sample recorded
    Appended,
    /// Same transform as the last received update; nothing recorded
    Unchanged,
    /// Sequence number not newer than the last accepted one; dropped
    OutOfOrder,
    /// Position or rotation was NaN or infinite; dropped
    NonFinite,
}

/// Interpolation state for one remote entity
#[derive(Debug, Clone)]
struct RemoteEntity {
    id: EntityId,
    buffer: SnapshotBuffer,
    /// Latest accepted transform, used when the buffer is empty
    last_known: Pose,
    /// Transform currently shown by the renderer
    displayed: Pose,
    last_seq: Option<u32>,
    animation: Option<String>,
}

impl RemoteEntity {
    fn new(id: EntityId, pose: Pose, capacity: usize) -> Self {
        Self {
            id,
            buffer: SnapshotBuffer::with_capacity(capacity),
            last_known: pose,
            displayed: pose,
            last_seq: None,
            animation: None,
        }
    }

    fn is_stale_seq(&self, seq: Option<u32>) -> bool {
        matches!((self.last_seq, seq), (Some(last), Some(seq)) if seq <= last)
    }
}

/// All remote entities in the session, stored in an arena indexed by id.
///
/// Inbound updates go through [`RemoteEntities::on_entity_update`]; the render
/// loop asks for [`RemoteEntities::render_pose`] once per entity per frame.
pub struct RemoteEntities<C: Clock = SystemClock> {
    entities: SlotMap<EntityKey, RemoteEntity>,
    index: HashMap<EntityId, EntityKey>,
    interpolator: Interpolator,
    clock: C,
}

impl RemoteEntities<SystemClock> {
    pub fn new(config: InterpolationConfig) -> Self {
        Self::with_clock(config, SystemClock::new())
    }
}

impl<C: Clock> RemoteEntities<C> {
    pub fn with_clock(config: InterpolationConfig, clock: C) -> Self {
        Self {
            entities: SlotMap::with_key(),
            index: HashMap::new(),
            interpolator: Interpolator::new(config),
            clock,
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Register an entity at a known pose. Returns false if it already exists.
    pub fn spawn(&mut self, id: EntityId, pose: Pose) -> bool {
        if self.index.contains_key(&id) {
            return false;
        }
        self.insert(id, pose);
        true
    }

    fn insert(&mut self, id: EntityId, pose: Pose) -> EntityKey {
        let capacity = self.interpolator.config().capacity;
        let key = self.entities.insert(RemoteEntity::new(id, pose, capacity));
        self.index.insert(id, key);
        debug!(entity_id = %id, "Remote entity spawned");
        key
    }

    /// Forget an entity and its history. Returns false if it was unknown.
    pub fn remove(&mut self, id: &EntityId) -> bool {
        match self.index.remove(id) {
            Some(key) => {
                self.entities.remove(key);
                debug!(entity_id = %id, "Remote entity removed");
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.index.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Drop every entity, e.g. when leaving a session
    pub fn clear(&mut self) {
        self.entities.clear();
        self.index.clear();
    }

    pub fn ids(&self) -> impl Iterator<Item = &EntityId> {
        self.index.keys()
    }

    /// Record an inbound update, stamped with the local clock now.
    pub fn on_entity_update(&mut self, id: EntityId, update: EntityUpdate) -> UpdateOutcome {
        let now = self.clock.now_ms();
        self.on_entity_update_at(id, update, now)
    }

    /// Record an inbound update received at `received_at` (ms, same clock as
    /// this registry's).
    ///
    /// Updates with non-finite coordinates or a sequence number not newer than
    /// the last accepted one are dropped. Updates repeating the last received
    /// transform refresh the animation label but are not buffered.
    pub fn on_entity_update_at(
        &mut self,
        id: EntityId,
        update: EntityUpdate,
        received_at: f64,
    ) -> UpdateOutcome {
        if !is_finite_update(&update) {
            warn!(entity_id = %id, "Dropping update with non-finite transform");
            return UpdateOutcome::NonFinite;
        }

        let now = received_at;
        let pose = Pose::new(update.position, update.rotation);

        let key = match self.index.get(&id).copied() {
            Some(key) => key,
            None => {
                let key = self.insert(id, pose);
                let entity = &mut self.entities[key];
                entity.buffer.append(update.position, update.rotation, now);
                entity.last_seq = update.seq;
                entity.animation = update.animation;
                return UpdateOutcome::Spawned;
            }
        };

        let entity = &mut self.entities[key];

        if entity.is_stale_seq(update.seq) {
            trace!(
                entity_id = %id,
                seq = ?update.seq,
                last_seq = ?entity.last_seq,
                "Dropping out-of-order update"
            );
            return UpdateOutcome::OutOfOrder;
        }

        if update.seq.is_some() {
            entity.last_seq = update.seq;
        }
        if update.animation.is_some() {
            entity.animation = update.animation;
        }

        // Compare against the last received transform, which may differ from the
        // newest buffered sample once the buffer has been purged.
        if entity.last_known == pose {
            return UpdateOutcome::Unchanged;
        }

        entity.last_known = pose;
        entity.buffer.append(update.position, update.rotation, now);
        UpdateOutcome::Appended
    }

    /// Smoothed pose to render this frame, or None for an unknown entity
    pub fn render_pose(&mut self, id: &EntityId, frame_delta_secs: f32) -> Option<Pose> {
        let key = *self.index.get(id)?;
        let now = self.clock.now_ms();
        Some(Self::advance(
            &self.interpolator,
            &mut self.entities[key],
            now,
            frame_delta_secs,
        ))
    }

    /// Smoothed poses for every entity this frame
    pub fn render_all(&mut self, frame_delta_secs: f32) -> Vec<(EntityId, Pose)> {
        let now = self.clock.now_ms();
        let interpolator = &self.interpolator;
        self.entities
            .values_mut()
            .map(|entity| {
                let pose = Self::advance(interpolator, entity, now, frame_delta_secs);
                (entity.id, pose)
            })
            .collect()
    }

    /// Latest animation label received for the entity
    pub fn animation_state(&self, id: &EntityId) -> Option<&str> {
        let key = self.index.get(id)?;
        self.entities[*key].animation.as_deref()
    }

    /// Number of buffered samples for the entity
    pub fn buffer_len(&self, id: &EntityId) -> Option<usize> {
        let key = self.index.get(id)?;
        Some(self.entities[*key].buffer.len())
    }

    fn advance(
        interpolator: &Interpolator,
        entity: &mut RemoteEntity,
        now: f64,
        frame_delta_secs: f32,
    ) -> Pose {
        let sample = interpolator.sample(&mut entity.buffer, now, entity.last_known);
        if sample.source == SampleSource::Fallback {
            trace!(entity_id = %entity.id, "No buffered samples, using last known pose");
        }
        interpolator.smooth(&mut entity.displayed, &sample.pose, frame_delta_secs);
        entity.displayed
    }
}

fn is_finite_update(update: &EntityUpdate) -> bool {
    update.rotation.is_finite() && update.position.iter().all(|c| c.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::time::ManualClock;
    use approx::assert_relative_eq;

    fn registry() -> (RemoteEntities<ManualClock>, ManualClock) {
        let clock = ManualClock::new(10_000.0);
        (
            RemoteEntities::with_clock(InterpolationConfig::default(), clock.clone()),
            clock,
        )
    }

    fn at_x(x: f32) -> EntityUpdate {
        EntityUpdate::new(Vec3::new(x, 0.0, 0.0), 0.0)
    }

    #[test]
    fn unknown_entity_is_spawned_on_first_update() {
        let (mut entities, _) = registry();
        let id = Uuid::new_v4();

        assert_eq!(entities.on_entity_update(id, at_x(3.0)), UpdateOutcome::Spawned);
        assert!(entities.contains(&id));
        assert_eq!(entities.buffer_len(&id), Some(1));
    }

    #[test]
    fn unchanged_updates_are_not_buffered() {
        let (mut entities, clock) = registry();
        let id = Uuid::new_v4();

        entities.on_entity_update(id, at_x(1.0));
        for _ in 0..10 {
            clock.advance(50.0);
            assert_eq!(entities.on_entity_update(id, at_x(1.0)), UpdateOutcome::Unchanged);
        }
        assert_eq!(entities.buffer_len(&id), Some(1));

        clock.advance(50.0);
        assert_eq!(entities.on_entity_update(id, at_x(2.0)), UpdateOutcome::Appended);
        assert_eq!(entities.buffer_len(&id), Some(2));
    }

    #[test]
    fn change_detection_uses_last_received_not_last_stored() {
        let (mut entities, clock) = registry();
        let id = Uuid::new_v4();

        entities.on_entity_update(id, at_x(1.0));
        // purge everything by rendering far in the future
        clock.advance(5_000.0);
        entities.render_pose(&id, 0.016);
        assert_eq!(entities.buffer_len(&id), Some(0));

        // still identical to the last received update
        assert_eq!(entities.on_entity_update(id, at_x(1.0)), UpdateOutcome::Unchanged);
    }

    #[test]
    fn stale_sequence_numbers_are_dropped() {
        let (mut entities, clock) = registry();
        let id = Uuid::new_v4();

        entities.on_entity_update(id, at_x(1.0).with_seq(5));
        clock.advance(50.0);
        assert_eq!(
            entities.on_entity_update(id, at_x(2.0).with_seq(4)),
            UpdateOutcome::OutOfOrder
        );
        assert_eq!(
            entities.on_entity_update(id, at_x(2.0).with_seq(5)),
            UpdateOutcome::OutOfOrder
        );
        assert_eq!(
            entities.on_entity_update(id, at_x(2.0).with_seq(6)),
            UpdateOutcome::Appended
        );
        assert_eq!(entities.buffer_len(&id), Some(2));
    }

    #[test]
    fn non_finite_updates_are_rejected() {
        let (mut entities, clock) = registry();
        let id = Uuid::new_v4();

        assert_eq!(
            entities.on_entity_update(id, at_x(f32::NAN)),
            UpdateOutcome::NonFinite
        );
        assert!(!entities.contains(&id));

        entities.on_entity_update(id, at_x(1.0));
        clock.advance(50.0);
        let bad_heading = EntityUpdate::new(Vec3::new(2.0, 0.0, 0.0), f32::INFINITY);
        assert_eq!(entities.on_entity_update(id, bad_heading), UpdateOutcome::NonFinite);
        assert_eq!(entities.buffer_len(&id), Some(1));

        // last known pose stays usable for change detection and rendering
        assert_eq!(entities.on_entity_update(id, at_x(1.0)), UpdateOutcome::Unchanged);
        let pose = entities.render_pose(&id, 1.0 / 60.0).expect("known entity");
        assert!(pose.position.x.is_finite() && pose.rotation.is_finite());
    }

    #[test]
    fn explicit_receipt_time_is_used_for_interpolation() {
        let (mut entities, clock) = registry();
        let id = Uuid::new_v4();

        // both delivered late, at the same local moment
        clock.set(10_100.0);
        entities.on_entity_update_at(id, at_x(0.0), 10_000.0);
        entities.on_entity_update_at(id, at_x(10.0), 10_050.0);

        // render time 10_025 sits halfway between the two receipts
        clock.set(10_125.0);
        let pose = entities.render_pose(&id, 10.0).expect("known entity");
        assert_relative_eq!(pose.position.x, 5.0, epsilon = 1e-3);
    }

    #[test]
    fn empty_buffer_renders_last_known_pose() {
        let (mut entities, _) = registry();
        let id = Uuid::new_v4();
        let spawn = Pose::new(Vec3::new(-3.0, 1.0, 8.0), 0.4);

        entities.spawn(id, spawn);
        let pose = entities.render_pose(&id, 1.0 / 60.0).expect("known entity");
        assert_eq!(pose, spawn);
    }

    #[test]
    fn render_pose_for_unknown_entity_is_none() {
        let (mut entities, _) = registry();
        assert!(entities.render_pose(&Uuid::new_v4(), 0.016).is_none());
    }

    #[test]
    fn animation_label_tracks_latest_update() {
        let (mut entities, clock) = registry();
        let id = Uuid::new_v4();

        entities.on_entity_update(id, at_x(0.0).with_animation("idle"));
        assert_eq!(entities.animation_state(&id), Some("idle"));

        clock.advance(50.0);
        // unchanged transform still refreshes the label
        entities.on_entity_update(id, at_x(0.0).with_animation("wave"));
        assert_eq!(entities.animation_state(&id), Some("wave"));

        // missing label keeps the previous one
        entities.on_entity_update(id, at_x(1.0));
        assert_eq!(entities.animation_state(&id), Some("wave"));
    }

    #[test]
    fn remove_and_clear_drop_state() {
        let (mut entities, _) = registry();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        entities.on_entity_update(a, at_x(1.0));
        entities.on_entity_update(b, at_x(2.0));
        assert_eq!(entities.len(), 2);

        assert!(entities.remove(&a));
        assert!(!entities.remove(&a));
        assert!(!entities.contains(&a));
        assert_eq!(entities.len(), 1);

        entities.clear();
        assert!(entities.is_empty());
        assert_eq!(entities.ids().count(), 0);
    }

    #[test]
    fn spawn_twice_keeps_original() {
        let (mut entities, _) = registry();
        let id = Uuid::new_v4();
        assert!(entities.spawn(id, Pose::default()));
        assert!(!entities.spawn(id, Pose::new(Vec3::new(9.0, 9.0, 9.0), 1.0)));
        assert_eq!(entities.render_pose(&id, 0.0), Some(Pose::default()));
    }

    #[test]
    fn entities_are_independent() {
        let (mut entities, clock) = registry();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        entities.on_entity_update(a, at_x(0.0));
        entities.on_entity_update(b, at_x(100.0));
        clock.advance(50.0);
        entities.on_entity_update(a, at_x(10.0));
        clock.advance(100.0);

        let poses: HashMap<_, _> = entities.render_all(0.0).into_iter().collect();
        assert_eq!(poses.len(), 2);
        assert_relative_eq!(poses[&b].position.x, 100.0);
    }
}

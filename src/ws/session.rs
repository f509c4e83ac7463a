//! Client session: applies server messages to the remote entity registry
//!
//! The network task owns a [`SessionSender`] and pushes decoded messages, each
//! stamped with its local receipt time; the render loop owns the
//! [`ClientSession`] and drains them once per frame, so the registry only ever
//! has one writer.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::sync::{EntityId, Pose, RemoteEntities, UpdateOutcome};
use crate::util::time::{Clock, SystemClock};

use super::protocol::{decode_server_msg, EntityState, ProtocolError, ServerMsg};

/// Default bound on undelivered messages between network and render side
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// A server message plus the local time it was received, in ms
#[derive(Debug, Clone)]
struct Inbound {
    msg: ServerMsg,
    received_at: f64,
}

/// Network-side handle for feeding a session
#[derive(Clone)]
pub struct SessionSender {
    tx: mpsc::Sender<Inbound>,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl SessionSender {
    /// Queue an already decoded message, stamped with the receipt time now.
    /// Fails only if the session was dropped.
    pub async fn send(&self, msg: ServerMsg) -> Result<(), SessionClosed> {
        let received_at = self.clock.now_ms();
        self.send_at(msg, received_at).await
    }

    /// Queue a message that was received at `received_at`
    pub async fn send_at(&self, msg: ServerMsg, received_at: f64) -> Result<(), SessionClosed> {
        self.tx
            .send(Inbound { msg, received_at })
            .await
            .map_err(|_| SessionClosed)
    }

    /// Decode a text frame and queue it. Malformed frames are logged and skipped.
    pub async fn send_text(&self, text: &str) -> Result<(), SessionClosed> {
        let received_at = self.clock.now_ms();
        match decode_server_msg(text) {
            Ok(msg) => self.send_at(msg, received_at).await,
            Err(e) => {
                warn!(error = %e, "Failed to parse server message");
                Ok(())
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// The render side has gone away
#[derive(Debug, thiserror::Error)]
#[error("Client session closed")]
pub struct SessionClosed;

/// Counters from one drain of the message queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessStats {
    pub messages: usize,
    pub appended: usize,
    pub unchanged: usize,
    pub out_of_order: usize,
    pub spawned: usize,
    pub removed: usize,
    pub rejected: usize,
}

impl ProcessStats {
    fn record(&mut self, outcome: UpdateOutcome) {
        match outcome {
            UpdateOutcome::Spawned => self.spawned += 1,
            UpdateOutcome::Appended => self.appended += 1,
            UpdateOutcome::Unchanged => self.unchanged += 1,
            UpdateOutcome::OutOfOrder => self.out_of_order += 1,
            UpdateOutcome::NonFinite => self.rejected += 1,
        }
    }
}

impl std::ops::AddAssign for ProcessStats {
    fn add_assign(&mut self, other: Self) {
        self.messages += other.messages;
        self.appended += other.appended;
        self.unchanged += other.unchanged;
        self.out_of_order += other.out_of_order;
        self.spawned += other.spawned;
        self.removed += other.removed;
        self.rejected += other.rejected;
    }
}

/// Render-side session state
pub struct ClientSession<C: Clock = SystemClock> {
    entities: RemoteEntities<C>,
    rx: mpsc::Receiver<Inbound>,
    /// Local player id, learned from the welcome message
    local_id: Option<Uuid>,
}

/// Create a connected sender/session pair. The sender stamps receipt times with
/// a clone of the registry's clock.
pub fn channel<C>(
    entities: RemoteEntities<C>,
    capacity: usize,
) -> (SessionSender, ClientSession<C>)
where
    C: Clock + Clone + Send + Sync + 'static,
{
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let clock = Arc::new(entities.clock().clone());
    (
        SessionSender { tx, clock },
        ClientSession {
            entities,
            rx,
            local_id: None,
        },
    )
}

impl<C: Clock> ClientSession<C> {
    pub fn entities(&self) -> &RemoteEntities<C> {
        &self.entities
    }

    pub fn entities_mut(&mut self) -> &mut RemoteEntities<C> {
        &mut self.entities
    }

    pub fn local_id(&self) -> Option<Uuid> {
        self.local_id
    }

    /// Drain every pending message without blocking
    pub fn process_messages(&mut self) -> ProcessStats {
        let mut stats = ProcessStats::default();
        while let Ok(inbound) = self.rx.try_recv() {
            stats.messages += 1;
            self.apply(inbound.msg, inbound.received_at, &mut stats);
        }
        stats
    }

    /// Apply pending messages, then produce this frame's poses
    pub fn frame(&mut self, frame_delta_secs: f32) -> Vec<(EntityId, Pose)> {
        self.process_messages();
        self.entities.render_all(frame_delta_secs)
    }

    /// Apply a single message directly, bypassing the channel. It counts as
    /// received now.
    pub fn apply_text(&mut self, text: &str) -> Result<ProcessStats, ProtocolError> {
        let received_at = self.entities.clock().now_ms();
        let msg = decode_server_msg(text)?;
        let mut stats = ProcessStats {
            messages: 1,
            ..Default::default()
        };
        self.apply(msg, received_at, &mut stats);
        Ok(stats)
    }

    fn apply(&mut self, msg: ServerMsg, received_at: f64, stats: &mut ProcessStats) {
        match msg {
            ServerMsg::Welcome { user_id, server_time } => {
                info!(user_id = %user_id, server_time, "Session established");
                self.local_id = Some(user_id);
                // our own avatar is not interpolated
                if self.entities.remove(&user_id) {
                    stats.removed += 1;
                }
            }
            ServerMsg::PlayerJoined { player } => {
                if self.is_local(&player.user_id) {
                    return;
                }
                let pose = Pose::new(player.position(), player.rotation);
                if self.entities.spawn(player.user_id, pose) {
                    stats.spawned += 1;
                    info!(
                        user_id = %player.user_id,
                        display_name = %player.display_name,
                        "Remote player joined"
                    );
                }
            }
            ServerMsg::PlayerLeft { user_id, reason } => {
                if self.entities.remove(&user_id) {
                    stats.removed += 1;
                    info!(user_id = %user_id, reason = %reason, "Remote player left");
                }
            }
            ServerMsg::EntityUpdate(state) => self.apply_state(state, received_at, stats),
            ServerMsg::Snapshot { tick, players } => {
                debug!(tick, players = players.len(), "Applying snapshot");
                for state in players {
                    self.apply_state(state, received_at, stats);
                }
            }
            ServerMsg::Pong { t } => {
                debug!(t, "Received pong");
            }
        }
    }

    fn apply_state(&mut self, state: EntityState, received_at: f64, stats: &mut ProcessStats) {
        if self.is_local(&state.user_id) {
            return;
        }
        let (id, update) = state.into_update();
        stats.record(self.entities.on_entity_update_at(id, update, received_at));
    }

    fn is_local(&self, id: &Uuid) -> bool {
        self.local_id.as_ref() == Some(id)
    }
}

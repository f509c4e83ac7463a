//! Per-entity history of received transforms

use std::collections::VecDeque;

use super::math::{Pose, Vec3};

/// Default number of samples kept per entity (about one second at 20 Hz)
pub const DEFAULT_CAPACITY: usize = 20;

/// A received transform, stamped with local receipt time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionSnapshot {
    pub position: Vec3,
    /// Yaw in radians
    pub rotation: f32,
    /// Local receipt time in milliseconds (not the server's send time)
    pub received_at: f64,
}

impl PositionSnapshot {
    pub fn pose(&self) -> Pose {
        Pose::new(self.position, self.rotation)
    }
}

/// Bounded, time-ordered queue of snapshots for one remote entity.
///
/// Appends go to the tail, trimming happens at the head, so `received_at`
/// is non-decreasing from front to back.
#[derive(Debug, Clone)]
pub struct SnapshotBuffer {
    entries: VecDeque<PositionSnapshot>,
    capacity: usize,
}

impl SnapshotBuffer {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// A capacity of zero is treated as one.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Record a sample. Drops the oldest entry once the cap is exceeded.
    ///
    /// A timestamp earlier than the current tail is clamped to the tail's, so the
    /// ordering invariant survives a misbehaving caller.
    pub fn append(&mut self, position: Vec3, rotation: f32, received_at: f64) {
        let received_at = match self.entries.back() {
            Some(last) if received_at < last.received_at || received_at.is_nan() => {
                last.received_at
            }
            None if received_at.is_nan() => 0.0,
            _ => received_at,
        };

        self.entries.push_back(PositionSnapshot {
            position,
            rotation,
            received_at,
        });

        if self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    /// Remove every leading entry with `received_at < cutoff`.
    /// Returns how many entries were removed.
    pub fn purge_older_than(&mut self, cutoff: f64) -> usize {
        let mut removed = 0;
        while let Some(front) = self.entries.front() {
            if front.received_at >= cutoff {
                break;
            }
            self.entries.pop_front();
            removed += 1;
        }
        removed
    }

    /// First adjacent pair with `p1.received_at <= time <= p2.received_at`
    pub fn bracket(&self, time: f64) -> Option<(&PositionSnapshot, &PositionSnapshot)> {
        self.entries
            .iter()
            .zip(self.entries.iter().skip(1))
            .find(|(p1, p2)| p1.received_at <= time && time <= p2.received_at)
    }

    pub fn latest(&self) -> Option<&PositionSnapshot> {
        self.entries.back()
    }

    pub fn earliest(&self) -> Option<&PositionSnapshot> {
        self.entries.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PositionSnapshot> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for SnapshotBuffer {
    fn default() -> Self {
        Self::new()
    }
}

//! Delayed snapshot interpolation and per-frame smoothing
//!
//! Remote entities are rendered `delay_ms` in the past so that two received
//! samples usually surround the render time. When they don't, the latest sample
//! is held (never extrapolated); with no samples at all the caller's last-known
//! pose is used. A second exponential smoothing pass hides the jumps between
//! those cases.

use super::math::{decay_factor, lerp_angle, lerp_vec3, wrap_angle, Pose};
use super::snapshot::{SnapshotBuffer, DEFAULT_CAPACITY};

pub const DEFAULT_INTERPOLATION_DELAY_MS: f64 = 100.0;
pub const DEFAULT_RETENTION_MS: f64 = 1000.0;
pub const DEFAULT_SMOOTHING_RATE: f32 = 12.0;

/// Tuning for interpolation and smoothing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterpolationConfig {
    /// How far behind receipt time entities are rendered
    pub delay_ms: f64,
    /// Samples older than this (relative to now) are purged before each query
    pub retention_ms: f64,
    /// Maximum samples kept per entity
    pub capacity: usize,
    /// Exponential smoothing rate, per second
    pub smoothing_rate: f32,
}

impl Default for InterpolationConfig {
    fn default() -> Self {
        Self {
            delay_ms: DEFAULT_INTERPOLATION_DELAY_MS,
            retention_ms: DEFAULT_RETENTION_MS,
            capacity: DEFAULT_CAPACITY,
            smoothing_rate: DEFAULT_SMOOTHING_RATE,
        }
    }
}

/// Which branch produced a sampled pose
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleSource {
    /// Blended between two surrounding snapshots at `fraction` in [0, 1]
    Interpolated { fraction: f32 },
    /// Render time outside the buffered range; latest snapshot held
    Held,
    /// Empty buffer; last-known pose used
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub pose: Pose,
    pub source: SampleSource,
}

/// Stateless interpolation engine; all per-entity state lives in the buffer and
/// the displayed pose passed in.
#[derive(Debug, Clone, Copy, Default)]
pub struct Interpolator {
    config: InterpolationConfig,
}

impl Interpolator {
    pub fn new(config: InterpolationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &InterpolationConfig {
        &self.config
    }

    /// Purge stale samples, then sample the buffer at `now - delay`
    pub fn sample(&self, buffer: &mut SnapshotBuffer, now_ms: f64, last_known: Pose) -> Sample {
        buffer.purge_older_than(now_ms - self.config.retention_ms);
        Self::sample_at(buffer, now_ms - self.config.delay_ms, last_known)
    }

    /// Sample the buffer at an explicit render time without purging
    pub fn sample_at(buffer: &SnapshotBuffer, render_time: f64, last_known: Pose) -> Sample {
        if let Some((p1, p2)) = buffer.bracket(render_time) {
            let span = p2.received_at - p1.received_at;
            let fraction = if span > 0.0 {
                ((render_time - p1.received_at) / span).clamp(0.0, 1.0) as f32
            } else {
                0.0
            };

            return Sample {
                pose: Pose::new(
                    lerp_vec3(&p1.position, &p2.position, fraction),
                    lerp_angle(p1.rotation, p2.rotation, fraction),
                ),
                source: SampleSource::Interpolated { fraction },
            };
        }

        match buffer.latest() {
            Some(latest) => Sample {
                pose: latest.pose(),
                source: SampleSource::Held,
            },
            None => Sample {
                pose: last_known,
                source: SampleSource::Fallback,
            },
        }
    }

    /// Move `displayed` toward `target` by exponential decay over `dt_secs`.
    /// Rotation follows the shorter arc and stays within (-PI, PI].
    pub fn smooth(&self, displayed: &mut Pose, target: &Pose, dt_secs: f32) {
        let alpha = decay_factor(self.config.smoothing_rate, dt_secs);
        if alpha == 0.0 {
            return;
        }

        displayed.position += (target.position - displayed.position) * alpha;
        let rotation =
            displayed.rotation + wrap_angle(target.rotation - displayed.rotation) * alpha;
        displayed.rotation = wrap_angle(rotation);
    }
}

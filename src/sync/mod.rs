//! Remote entity state synchronization: snapshot buffering, interpolation and
//! smoothing

pub mod interpolation;
pub mod math;
pub mod registry;
pub mod snapshot;

pub use interpolation::{InterpolationConfig, Interpolator, Sample, SampleSource};
pub use math::{Pose, Vec3};
pub use registry::{EntityId, EntityUpdate, RemoteEntities, UpdateOutcome};
pub use snapshot::{PositionSnapshot, SnapshotBuffer};

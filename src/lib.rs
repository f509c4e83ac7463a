//! Avatar Sync - smooth rendering of remote players from discrete network updates
//!
//! Each remote player gets a bounded buffer of received transforms. Every frame
//! the buffer is sampled a fixed delay in the past, blended between the two
//! surrounding samples, and eased toward the result with exponential smoothing.

pub mod config;
pub mod sim;
pub mod sync;
pub mod util;
pub mod ws;

pub use sync::{EntityId, EntityUpdate, InterpolationConfig, Pose, RemoteEntities, Vec3};

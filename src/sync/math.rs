//! Vector and angle helpers shared by interpolation and smoothing

use std::f32::consts::{PI, TAU};

/// World-space position type
pub type Vec3 = nalgebra::Vector3<f32>;

/// A position plus heading (yaw about the vertical axis, radians)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: f32,
}

impl Pose {
    pub fn new(position: Vec3, rotation: f32) -> Self {
        Self { position, rotation }
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: 0.0,
        }
    }
}

/// Wrap an angle difference into (-PI, PI]. Non-finite input maps to 0.
pub fn wrap_angle(delta: f32) -> f32 {
    if !delta.is_finite() {
        return 0.0;
    }
    let wrapped = delta.rem_euclid(TAU);
    if wrapped > PI {
        wrapped - TAU
    } else {
        wrapped
    }
}

/// Linear blend of two headings along the shorter arc
pub fn lerp_angle(from: f32, to: f32, t: f32) -> f32 {
    from + wrap_angle(to - from) * t
}

/// Component-wise linear blend
pub fn lerp_vec3(from: &Vec3, to: &Vec3, t: f32) -> Vec3 {
    from + (to - from) * t
}

/// Blend factor for exponential decay toward a target over `dt_secs`.
///
/// Frame-rate independent: two steps of `dt` equal one step of `2 * dt`.
/// Non-finite or negative `dt` yields 0 (no movement).
pub fn decay_factor(rate: f32, dt_secs: f32) -> f32 {
    if !dt_secs.is_finite() || dt_secs <= 0.0 || !rate.is_finite() || rate <= 0.0 {
        return 0.0;
    }
    1.0 - (-rate * dt_secs).exp()
}

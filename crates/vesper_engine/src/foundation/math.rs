//! Math utilities and types
//!
//! Thin aliases over `nalgebra` used by the scene containers.

pub use nalgebra::{Matrix4, Vector3};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// Direction from `from` towards `to`, or `None` when the two points coincide
///
/// Coincident or non-finite inputs have no meaningful direction, so callers
/// get to pick their own fallback instead of propagating NaNs.
pub fn direction_between(from: &Vec3, to: &Vec3) -> Option<Vec3> {
    let delta = to - from;
    let length = delta.norm();

    if length.is_finite() && length > f32::EPSILON {
        Some(delta / length)
    } else {
        None
    }
}

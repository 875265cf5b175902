use nalgebra as na;

mod aabb;
mod cframe;
mod motion;
mod rotation;
pub mod linear_system;

pub use aabb::Aabb;
pub use cframe::CFrame;
pub use motion::Motion;
pub use rotation::{orthogonal_basis, rotate_inertia, rotation_from_rotation_vec, skew};

/// A 3D vector of doubles, used for positions, directions, velocities and forces
pub type Vec3 = na::Vector3<f64>;

/// A 3x3 matrix of doubles, used for inertia tensors and rotations
pub type Mat3 = na::Matrix3<f64>;

/// An orthonormal rotation matrix
pub type Rotation = na::Rotation3<f64>;

/// A global position
pub type Position = Vec3;

/// Constant for a very small number, used for comparisons
pub const EPSILON: f64 = 1.0e-9;

/// Wraps an angle into the range (-PI, PI]
#[inline]
pub fn wrap_angle(angle: f64) -> f64 {
    use std::f64::consts::PI;
    let wrapped = (angle + PI).rem_euclid(2.0 * PI) - PI;
    if wrapped <= -PI {
        wrapped + 2.0 * PI
    } else {
        wrapped
    }
}

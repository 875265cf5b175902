use crate::math::Vec3;

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

/// The 6-DOF motion state of a body around its center of mass, carried to the second derivative
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Motion {
    /// Linear velocity of the center of mass
    pub velocity: Vec3,

    /// Angular velocity around the center of mass
    pub angular_velocity: Vec3,

    /// Linear acceleration during the last integration step
    pub acceleration: Vec3,

    /// Angular acceleration during the last integration step
    pub angular_acceleration: Vec3,
}

impl Motion {
    /// Creates a motion with the given velocities and no acceleration
    pub fn new(velocity: Vec3, angular_velocity: Vec3) -> Self {
        Self {
            velocity,
            angular_velocity,
            acceleration: Vec3::zeros(),
            angular_acceleration: Vec3::zeros(),
        }
    }

    /// Velocity of a point at `offset` from the center of mass
    #[inline]
    pub fn velocity_of_point(&self, offset: &Vec3) -> Vec3 {
        self.velocity + self.angular_velocity.cross(offset)
    }

    /// Adds a velocity change to the motion
    #[inline]
    pub fn add_velocity(&mut self, linear: &Vec3, angular: &Vec3) {
        self.velocity += linear;
        self.angular_velocity += angular;
    }
}

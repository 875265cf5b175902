use crate::bodies::MotorizedPhysical;
use crate::integration::Integrator;
use crate::math::rotation_from_rotation_vec;

/// Symplectic Euler integrator (semi-implicit Euler).
///
/// Velocities are updated from the accumulated forces first, then positions
/// and rotations move with the new velocities.
#[derive(Debug, Clone, Copy, Default)]
pub struct SymplecticEuler;

impl SymplecticEuler {
    /// Creates a new Symplectic Euler integrator
    pub fn new() -> Self {
        Self
    }
}

impl Integrator for SymplecticEuler {
    fn integrate(&self, physical: &mut MotorizedPhysical, dt: f64) {
        if physical.is_anchored() {
            physical.clear_forces();
            return;
        }

        let acceleration = physical.total_force() * physical.inverse_mass();
        let angular_acceleration = physical.inverse_inertia() * physical.total_moment();

        let motion = physical.motion_mut();
        motion.acceleration = acceleration;
        motion.angular_acceleration = angular_acceleration;
        motion.velocity += acceleration * dt;
        motion.angular_velocity += angular_acceleration * dt;

        let shift = motion.velocity * dt;
        let turn = motion.angular_velocity * dt;
        physical.translate(&shift);
        if turn.norm_squared() > 0.0 {
            physical.rotate_around_center_of_mass(&rotation_from_rotation_vec(turn));
        }
        physical.clear_forces();
    }

    fn name(&self) -> &str {
        "SymplecticEuler"
    }
}

use crate::core::World;
use crate::forces::ExternalForce;
use crate::math::Vec3;

/// Uniform gravity pulling every non-anchored physical in one direction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalGravity {
    /// The gravity acceleration vector
    gravity: Vec3,
}

impl DirectionalGravity {
    /// Creates a new gravity source with the given acceleration
    pub fn new(gravity: Vec3) -> Self {
        Self { gravity }
    }

    /// Creates Earth-like gravity (-9.81 along Y)
    pub fn earth() -> Self {
        Self::new(Vec3::new(0.0, -9.81, 0.0))
    }

    /// Gets the gravity acceleration
    pub fn gravity(&self) -> Vec3 {
        self.gravity
    }
}

impl ExternalForce for DirectionalGravity {
    fn name(&self) -> &str {
        "DirectionalGravity"
    }

    fn apply(&self, world: &mut World) {
        for (_, physical) in world.physicals_mut() {
            if !physical.is_anchored() {
                let force = self.gravity * physical.mass();
                physical.apply_force_at_center_of_mass(&force);
            }
        }
    }
}

use crate::bodies::MotorizedPhysical;
use std::fmt::Debug;

/// Trait for numerical integration algorithms
pub trait Integrator: Send + Sync + Debug {
    /// Advances a physical by one time step, consuming its accumulated forces
    fn integrate(&self, physical: &mut MotorizedPhysical, dt: f64);

    /// Returns the name of the integrator
    fn name(&self) -> &str;
}

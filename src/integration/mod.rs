mod integrator;
mod symplectic_euler;

pub use self::integrator::Integrator;
pub use self::symplectic_euler::SymplecticEuler;

use crate::core::World;
use std::fmt::Debug;

/// A source of forces invoked once per tick, before collision response
pub trait ExternalForce: Send + Sync + Debug {
    /// Returns the name of the force source
    fn name(&self) -> &str;

    /// Applies this tick's forces to the world
    fn apply(&self, world: &mut World);
}

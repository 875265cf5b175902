pub mod math;
pub mod core;
pub mod bodies;
pub mod shapes;
pub mod collision;
pub mod constraints;
pub mod forces;
pub mod integration;

/// Re-export common types for easier usage
pub use crate::core::{
    DebugChecks, PartId, PhysicalId, SimulationConfig, SynchronizedWorld, TickStats, TickerConfig, TickerThread,
    World,
};
pub use crate::bodies::{HardConnection, MotorizedPhysical, Part, PartProperties};
pub use crate::constraints::{Constraint, ConstraintGroup};
pub use crate::math::{CFrame, Vec3};
pub use crate::shapes::Shape;

/// Error types for the physics engine
pub mod error {
    use thiserror::Error;

    /// Failure of an exact intersection test on one pair of parts
    #[derive(Error, Debug, Clone, PartialEq)]
    #[error("{message}")]
    pub struct IntersectionError {
        message: String,
    }

    impl IntersectionError {
        pub fn new(message: impl Into<String>) -> Self {
            Self { message: message.into() }
        }

        pub fn message(&self) -> &str {
            &self.message
        }
    }

    #[derive(Error, Debug)]
    pub enum PhysicsError {
        #[error("Invalid parameter: {0}")]
        InvalidParameter(String),

        #[error("Resource not found: {0}")]
        ResourceNotFound(String),

        #[error("Layer mismatch: {0}")]
        LayerMismatch(String),

        #[error("Intersection test failed: {0}")]
        Intersection(#[from] IntersectionError),

        #[error("I/O error: {0}")]
        Io(#[from] std::io::Error),

        #[error("Invariant violated: {0}")]
        InvariantViolation(String),
    }
}

/// Result type for physics engine operations
pub type Result<T> = std::result::Result<T, error::PhysicsError>;

/// Engine version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

mod constraint;
mod ball;
mod hinge;
mod bar;
mod motor;
mod group;

pub use self::constraint::{Constraint, ConstraintMatrixPack, PhysicalInfo, Side};
pub use self::ball::BallConstraint;
pub use self::hinge::HingeConstraint;
pub use self::bar::BarConstraint;
pub use self::motor::{ConstantSpeedProfile, MotorConstraint, MotorProfile, SinusoidalProfile, TaylorExpansion};
pub use self::group::{ConstraintGroup, PhysicalConstraint, SolveReport};

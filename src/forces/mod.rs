mod external_force;
mod gravity;

pub use self::external_force::ExternalForce;
pub use self::gravity::DirectionalGravity;

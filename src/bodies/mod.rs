mod part;
mod rigid_body;
mod physical;

pub use self::part::{Part, PartProperties};
pub use self::rigid_body::{AttachedPart, RigidBody};
pub use self::physical::{ConnectedPhysical, HardConnection, MotorizedPhysical, Physical};

pub(crate) use self::physical::NodeRemoval;

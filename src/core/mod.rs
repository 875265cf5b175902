pub mod config;
pub mod storage;
pub mod stats;
pub mod thread_pool;
pub mod lock;
pub mod world;
pub mod driver;

pub use self::config::{DebugChecks, SimulationConfig, TickerConfig};
pub use self::storage::{Arena, Handle};
pub use self::stats::TickStats;
pub use self::thread_pool::ThreadPool;
pub use self::lock::{ExclusiveGuard, SharedGuard, UpgradeableGuard, UpgradeableLock};
pub use self::world::World;
pub use self::driver::{SynchronizedWorld, TickerThread};

use crate::bodies::{MotorizedPhysical, Part};

/// A handle to a part in the world
pub type PartId = Handle<Part>;

/// A handle to a motorized physical in the world
pub type PhysicalId = Handle<MotorizedPhysical>;

use bitflags::bitflags;
use std::path::PathBuf;
use std::time::Duration;

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

bitflags! {
    /// Consistency checks run at the end of every tick.
    ///
    /// A failing layer or physical check panics; the finite check makes the
    /// world refuse non-finite constraint solutions.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
    pub struct DebugChecks: u32 {
        /// Every part's layer back-reference matches the tree holding it
        const VALIDATE_LAYERS = 0x01;

        /// Every part's parent matches the physical holding it
        const VALIDATE_PHYSICALS = 0x02;

        /// Non-finite constraint solutions are dropped instead of applied
        const CHECK_FINITE = 0x04;
    }
}

impl Default for DebugChecks {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            DebugChecks::all()
        } else {
            DebugChecks::empty()
        }
    }
}

/// Configuration parameters for the physics simulation
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct SimulationConfig {
    /// The fixed time step for the simulation
    pub delta_t: f64,

    /// Contacts whose exit vector is shorter than this fraction of the smaller
    /// part's radius are skipped
    pub collision_epsilon_fraction: f64,

    /// Depth correction acceleration per meter of penetration
    pub depth_correction_stiffness: f64,

    /// Sliding speed at which dynamic friction reaches its full strength
    pub dynamic_friction_ramp_speed: f64,

    /// Number of narrow-phase worker threads besides the ticking thread;
    /// `None` uses the hardware concurrency minus one
    pub worker_count: Option<usize>,

    /// Checks run after every tick
    pub debug_checks: DebugChecks,

    /// Where failed intersection pairs are dumped
    pub diagnostic_dir: PathBuf,
}

impl SimulationConfig {
    /// Worker count after resolving the hardware default
    pub fn resolved_worker_count(&self) -> usize {
        self.worker_count.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get().saturating_sub(1))
                .unwrap_or(0)
        })
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            delta_t: 1.0 / 100.0,
            collision_epsilon_fraction: 1e-6,
            depth_correction_stiffness: 2000.0,
            dynamic_friction_ramp_speed: 0.2,
            worker_count: None,
            debug_checks: DebugChecks::default(),
            diagnostic_dir: std::env::temp_dir(),
        }
    }
}

/// Configuration of the ticker thread
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct TickerConfig {
    /// Ticks per second of simulated time
    pub target_tps: f64,

    /// How far behind schedule the ticker may fall before it skips ticks
    pub catch_up_timeout: Duration,

    /// Playback speed; 2.0 runs the simulation twice as fast as real time
    pub speed: f64,
}

impl Default for TickerConfig {
    fn default() -> Self {
        Self {
            target_tps: 100.0,
            catch_up_timeout: Duration::from_millis(250),
            speed: 1.0,
        }
    }
}

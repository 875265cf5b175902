//! Thread-safe world access and the background ticker.
//!
//! [`SynchronizedWorld`] wraps a [`World`] in an [`UpgradeableLock`]. A tick
//! detects collisions under the upgradeable read, so other threads may keep
//! reading, then upgrades for the mutating phases. Operations that could not
//! take the lock right away are queued and run by the ticking thread: writes
//! right after the upgrade, reads after the downgrade. Both queues are FIFO.

use crate::core::{TickerConfig, UpgradeableLock, World};
use crate::error::PhysicsError;
use crate::Result;
use log::{debug, error, warn};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::mem;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

type ReadOperation = Box<dyn FnOnce(&World) + Send>;
type WriteOperation = Box<dyn FnOnce(&mut World) + Send>;

/// A world shared between the physics thread and any number of other threads
pub struct SynchronizedWorld {
    lock: UpgradeableLock<World>,
    read_queue: Mutex<VecDeque<ReadOperation>>,
    write_queue: Mutex<VecDeque<WriteOperation>>,
}

impl std::fmt::Debug for SynchronizedWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SynchronizedWorld")
            .field("queued_reads", &self.read_queue.lock().len())
            .field("queued_writes", &self.write_queue.lock().len())
            .finish()
    }
}

impl SynchronizedWorld {
    /// Wraps a world
    pub fn new(world: World) -> Self {
        Self {
            lock: UpgradeableLock::new(world),
            read_queue: Mutex::new(VecDeque::new()),
            write_queue: Mutex::new(VecDeque::new()),
        }
    }

    /// Consumes the wrapper and returns the world; queued operations are dropped
    pub fn into_inner(self) -> World {
        self.lock.into_inner()
    }

    /// Runs `f` with shared access, blocking while a tick mutates the world
    pub fn read<R>(&self, f: impl FnOnce(&World) -> R) -> R {
        let guard = self.lock.read();
        f(&guard)
    }

    /// Runs `f` with exclusive access, blocking until every reader left
    pub fn modify<R>(&self, f: impl FnOnce(&mut World) -> R) -> R {
        let mut guard = self.lock.write();
        f(&mut guard)
    }

    /// Runs `f` now if the world is readable, otherwise queues it for the physics thread
    pub fn async_read(&self, f: impl FnOnce(&World) + Send + 'static) {
        if self.read_queue.lock().is_empty() {
            if let Some(guard) = self.lock.try_read() {
                f(&guard);
                return;
            }
        }
        self.read_queue.lock().push_back(Box::new(f));
    }

    /// Runs `f` now if the world is free, otherwise queues it for the physics thread
    pub fn async_modify(&self, f: impl FnOnce(&mut World) + Send + 'static) {
        if self.write_queue.lock().is_empty() {
            if let Some(mut guard) = self.lock.try_write() {
                f(&mut guard);
                return;
            }
        }
        self.write_queue.lock().push_back(Box::new(f));
    }

    /// Number of queued reads and writes
    pub fn queued_operations(&self) -> (usize, usize) {
        (self.read_queue.lock().len(), self.write_queue.lock().len())
    }

    /// Runs every queued operation outside of a tick: writes first, then reads
    pub fn process_queued_operations(&self) {
        let mut world = self.lock.write();
        self.drain_writes(&mut world);
        let world = world.final_downgrade();
        self.drain_reads(&world);
    }

    fn drain_writes(&self, world: &mut World) {
        let operations = mem::take(&mut *self.write_queue.lock());
        if !operations.is_empty() {
            debug!("Running {} queued write operations", operations.len());
        }
        for operation in operations {
            operation(world);
        }
    }

    fn drain_reads(&self, world: &World) {
        let operations = mem::take(&mut *self.read_queue.lock());
        for operation in operations {
            operation(world);
        }
    }

    /// One synchronized tick.
    ///
    /// Detection runs under the upgradeable read. Queued writes run right
    /// after the upgrade, before any mutating phase; queued reads run once the
    /// world is readable again.
    pub fn tick(&self) -> Result<()> {
        let guard = self.lock.upgradeable_read();
        let detected = guard.detect_colissions();

        let mut world = guard.upgrade();
        self.drain_writes(&mut world);
        let result = detected.and_then(|buffer| world.apply_tick(buffer));

        let world = world.downgrade();
        self.drain_reads(&world);
        result
    }
}

struct TickerControl {
    /// Whether the ticker should keep running; guarded for the sleep condition
    running: Mutex<bool>,
    wake: Condvar,
    config: Mutex<TickerConfig>,
    last_error: Mutex<Option<PhysicsError>>,
}

/// Ticks a [`SynchronizedWorld`] on its own thread at a target rate.
///
/// When the ticker falls behind by more than the catch-up timeout it drops
/// the missed ticks and restarts its schedule from now.
pub struct TickerThread {
    world: Arc<SynchronizedWorld>,
    control: Arc<TickerControl>,
    handle: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for TickerThread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TickerThread")
            .field("running", &self.is_running())
            .field("config", &*self.control.config.lock())
            .finish()
    }
}

fn validate_rate(value: f64, what: &str) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(PhysicsError::InvalidParameter(format!("{} must be positive, got {}", what, value)))
    }
}

impl TickerThread {
    /// Creates a stopped ticker for `world`
    pub fn new(world: Arc<SynchronizedWorld>, config: TickerConfig) -> Result<Self> {
        validate_rate(config.target_tps, "target_tps")?;
        validate_rate(config.speed, "speed")?;
        Ok(Self {
            world,
            control: Arc::new(TickerControl {
                running: Mutex::new(false),
                wake: Condvar::new(),
                config: Mutex::new(config),
                last_error: Mutex::new(None),
            }),
            handle: None,
        })
    }

    /// Returns the ticked world
    pub fn world(&self) -> &Arc<SynchronizedWorld> {
        &self.world
    }

    /// Returns the current ticker configuration
    pub fn config(&self) -> TickerConfig {
        *self.control.config.lock()
    }

    /// Whether the background thread is ticking
    pub fn is_running(&self) -> bool {
        *self.control.running.lock()
    }

    /// Starts ticking on a background thread; does nothing if already running
    pub fn start(&mut self) -> Result<()> {
        {
            let mut running = self.control.running.lock();
            if *running {
                return Ok(());
            }
            *running = true;
        }
        // A previous run may have stopped itself after an error
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }

        let world = Arc::clone(&self.world);
        let control = Arc::clone(&self.control);
        let spawned = thread::Builder::new()
            .name("rigid-tick-ticker".to_string())
            .spawn(move || ticker_loop(&world, &control));
        match spawned {
            Ok(handle) => {
                self.handle = Some(handle);
                Ok(())
            }
            Err(err) => {
                *self.control.running.lock() = false;
                Err(err.into())
            }
        }
    }

    /// Stops the background thread and waits for its current tick to finish
    pub fn stop(&mut self) {
        *self.control.running.lock() = false;
        self.control.wake.notify_all();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    /// Changes the target ticks per second of simulated time
    pub fn set_tps(&self, tps: f64) -> Result<()> {
        validate_rate(tps, "target_tps")?;
        self.control.config.lock().target_tps = tps;
        Ok(())
    }

    /// Changes the playback speed relative to real time
    pub fn set_speed(&self, speed: f64) -> Result<()> {
        validate_rate(speed, "speed")?;
        self.control.config.lock().speed = speed;
        Ok(())
    }

    /// Runs `count` ticks on the calling thread; the ticker must be stopped
    pub fn run_ticks(&self, count: usize) -> Result<()> {
        if self.is_running() {
            return Err(PhysicsError::InvalidParameter(
                "cannot run ticks manually while the ticker is running".to_string(),
            ));
        }
        for _ in 0..count {
            self.world.tick()?;
        }
        Ok(())
    }

    /// Takes the error that stopped the background thread, if any
    pub fn take_last_error(&self) -> Option<PhysicsError> {
        self.control.last_error.lock().take()
    }
}

impl Drop for TickerThread {
    fn drop(&mut self) {
        self.stop();
    }
}

fn tick_interval(config: &TickerConfig) -> Duration {
    Duration::from_secs_f64(1.0 / (config.target_tps * config.speed))
}

fn ticker_loop(world: &SynchronizedWorld, control: &TickerControl) {
    let mut next_tick = Instant::now();
    loop {
        if !*control.running.lock() {
            return;
        }

        if let Err(err) = world.tick() {
            error!("Ticker stopped after a failed tick: {}", err);
            *control.last_error.lock() = Some(err);
            *control.running.lock() = false;
            return;
        }

        let config = *control.config.lock();
        next_tick += tick_interval(&config);
        let now = Instant::now();
        if now > next_tick {
            let behind = now - next_tick;
            if behind > config.catch_up_timeout {
                warn!(
                    "Ticker is {:.1} ms behind schedule, skipping {} ticks",
                    behind.as_secs_f64() * 1000.0,
                    (behind.as_secs_f64() * config.target_tps * config.speed) as u64
                );
                next_tick = now;
            }
            continue;
        }

        let mut running = control.running.lock();
        while *running && Instant::now() < next_tick {
            control.wake.wait_until(&mut running, next_tick);
        }
    }
}

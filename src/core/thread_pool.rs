use crate::Result;
use log::debug;
use parking_lot::{Condvar, Mutex};
use std::any::Any;
use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

type Job = &'static (dyn Fn() + Sync);

struct PoolState {
    /// The job currently being run
    job: Option<Job>,

    /// Bumped for every dispatched job
    generation: u64,

    /// Workers that have not finished the current job
    pending: usize,

    /// First panic raised by a worker during the current job
    panic: Option<Box<dyn Any + Send>>,

    shutdown: bool,
}

struct Shared {
    state: Mutex<PoolState>,
    job_ready: Condvar,
    job_done: Condvar,
}

/// A fixed-size pool of persistent workers running one job at a time.
///
/// [`ThreadPool::run_on_all`] hands the same closure to every worker and to the
/// calling thread, then blocks until all of them returned.
pub struct ThreadPool {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,

    /// Serializes dispatchers
    dispatch: Mutex<()>,
}

impl std::fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadPool")
            .field("worker_count", &self.workers.len())
            .finish()
    }
}

impl ThreadPool {
    /// Creates a pool with `worker_count` workers besides the calling thread
    pub fn new(worker_count: usize) -> Result<Self> {
        let shared = Arc::new(Shared {
            state: Mutex::new(PoolState {
                job: None,
                generation: 0,
                pending: 0,
                panic: None,
                shutdown: false,
            }),
            job_ready: Condvar::new(),
            job_done: Condvar::new(),
        });

        let mut workers = Vec::with_capacity(worker_count);
        for index in 0..worker_count {
            let shared = Arc::clone(&shared);
            let handle = thread::Builder::new()
                .name(format!("rigid-tick-worker-{}", index))
                .spawn(move || worker_loop(&shared))?;
            workers.push(handle);
        }
        debug!("Started thread pool with {} workers", worker_count);

        Ok(Self {
            shared,
            workers,
            dispatch: Mutex::new(()),
        })
    }

    /// Creates a pool sized to the hardware concurrency minus one
    pub fn with_default_size() -> Result<Self> {
        let workers = thread::available_parallelism()
            .map(|n| n.get().saturating_sub(1))
            .unwrap_or(0);
        Self::new(workers)
    }

    /// Number of workers, not counting the calling thread
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Runs `job` on every worker and on the calling thread; returns once all are done.
    ///
    /// A panic in any copy of the job is re-raised on the calling thread after
    /// every worker finished.
    pub fn run_on_all(&self, job: &(dyn Fn() + Sync)) {
        let _dispatch = self.dispatch.lock();
        if self.workers.is_empty() {
            job();
            return;
        }

        // SAFETY: workers only touch the job between the dispatch below and the
        // moment `pending` reaches zero, and this function does not return
        // before that. The job is cleared before the borrow ends.
        let job: Job = unsafe { std::mem::transmute::<&(dyn Fn() + Sync), Job>(job) };

        {
            let mut state = self.shared.state.lock();
            state.job = Some(job);
            state.generation = state.generation.wrapping_add(1);
            state.pending = self.workers.len();
            state.panic = None;
        }
        self.shared.job_ready.notify_all();

        let own_result = catch_unwind(AssertUnwindSafe(job));

        let worker_panic = {
            let mut state = self.shared.state.lock();
            while state.pending > 0 {
                self.shared.job_done.wait(&mut state);
            }
            state.job = None;
            state.panic.take()
        };

        if let Err(payload) = own_result {
            resume_unwind(payload);
        }
        if let Some(payload) = worker_panic {
            resume_unwind(payload);
        }
    }
}

fn worker_loop(shared: &Shared) {
    let mut seen_generation = 0;
    loop {
        let job = {
            let mut state = shared.state.lock();
            loop {
                if state.shutdown {
                    return;
                }
                if state.generation != seen_generation {
                    seen_generation = state.generation;
                    break state.job;
                }
                shared.job_ready.wait(&mut state);
            }
        };

        let Some(job) = job else {
            continue;
        };
        let result = catch_unwind(AssertUnwindSafe(job));

        let mut state = shared.state.lock();
        if let Err(payload) = result {
            state.panic.get_or_insert(payload);
        }
        state.pending -= 1;
        if state.pending == 0 {
            shared.job_done.notify_all();
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shared.state.lock().shutdown = true;
        self.shared.job_ready.notify_all();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

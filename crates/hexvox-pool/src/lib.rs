//! Fixed-size worker pool with drain and abandon semantics.
//!
//! Workers pull from one shared pending queue. A worker is either *idle*
//! (registered in the idle set and parked on its wake channel) or *running*
//! (pulling and executing jobs until the queue is empty). The pool reports
//! `is_working() == false` only once every worker has re-registered as idle,
//! which happens strictly after the queue ran dry and the last job returned.
//!
//! ```no_run
//! use hexvox_pool::{FnJob, PoolConfig, WorkerPool};
//!
//! let pool = WorkerPool::new(PoolConfig::with_threads(4)).expect("spawn workers");
//! pool.submit_batch((0..8).map(|i| FnJob::boxed("demo", move || log::info!("job {i}"))));
//! pool.wait_until_drained();
//! ```
#![forbid(unsafe_code)]

mod job;

pub use job::{FnJob, Job};

use std::any::Any;
use std::collections::VecDeque;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};

/// How long an idle worker parks before re-checking its exit flag.
pub const WAKE_TIMEOUT: Duration = Duration::from_millis(10);

pub const DEFAULT_STACK_SIZE: usize = 1024 * 1024;

#[derive(Clone, Debug)]
pub struct PoolConfig {
    pub threads: usize,
    pub stack_size: usize,
    pub name_prefix: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        let threads = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(8);
        Self::with_threads(threads)
    }
}

impl PoolConfig {
    pub fn with_threads(threads: usize) -> Self {
        Self {
            threads: threads.max(1),
            stack_size: DEFAULT_STACK_SIZE,
            name_prefix: "hexvox-worker".to_string(),
        }
    }
}

struct PoolState {
    pending: VecDeque<Box<dyn Job>>,
    idle: Vec<usize>,
}

struct Shared {
    state: Mutex<PoolState>,
    drained: Condvar,
    shutting_down: AtomicBool,
    wakers: Vec<Sender<()>>,
    num_threads: usize,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, PoolState> {
        // Jobs never run under this lock, so a poisoned guard still holds
        // consistent queue state.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn return_to_pool_or_next(&self, worker_id: usize) -> Option<Box<dyn Job>> {
        let mut state = self.lock();
        if let Some(job) = state.pending.pop_front() {
            return Some(job);
        }
        state.idle.push(worker_id);
        if state.idle.len() == self.num_threads {
            self.drained.notify_all();
        }
        None
    }
}

struct Worker {
    time_to_die: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

pub struct WorkerPool {
    shared: Arc<Shared>,
    workers: Vec<Worker>,
}

impl WorkerPool {
    /// Spawns `config.threads` workers, all starting idle.
    pub fn new(config: PoolConfig) -> io::Result<Self> {
        let num_threads = config.threads.max(1);
        let (wakers, wake_rxs): (Vec<_>, Vec<_>) = (0..num_threads).map(|_| bounded(1)).unzip();

        let shared = Arc::new(Shared {
            state: Mutex::new(PoolState {
                pending: VecDeque::new(),
                idle: (0..num_threads).collect(),
            }),
            drained: Condvar::new(),
            shutting_down: AtomicBool::new(false),
            wakers,
            num_threads,
        });

        let mut pool = WorkerPool {
            shared,
            workers: Vec::with_capacity(num_threads),
        };

        for (worker_id, wake_rx) in wake_rxs.into_iter().enumerate() {
            let time_to_die = Arc::new(AtomicBool::new(false));
            let shared = Arc::clone(&pool.shared);
            let flag = Arc::clone(&time_to_die);
            let handle = thread::Builder::new()
                .name(format!("{}-{worker_id}", config.name_prefix))
                .stack_size(config.stack_size)
                .spawn(move || worker_loop(worker_id, &shared, &wake_rx, &flag))?;
            pool.workers.push(Worker {
                time_to_die,
                handle: Some(handle),
            });
        }

        log::debug!(
            "worker pool '{}' started with {} threads",
            config.name_prefix,
            num_threads
        );
        Ok(pool)
    }

    pub fn num_threads(&self) -> usize {
        self.shared.num_threads
    }

    pub fn is_shut_down(&self) -> bool {
        self.shared.shutting_down.load(Ordering::Acquire)
    }

    pub fn submit(&self, job: Box<dyn Job>) {
        self.submit_batch(std::iter::once(job));
    }

    /// Queues every job and wakes all idle workers. After
    /// [`abandon_all`](Self::abandon_all) the jobs are abandoned instead.
    pub fn submit_batch<I>(&self, jobs: I)
    where
        I: IntoIterator<Item = Box<dyn Job>>,
    {
        let jobs: Vec<Box<dyn Job>> = jobs.into_iter().collect();
        if jobs.is_empty() {
            return;
        }

        let rejected = {
            let mut state = self.shared.lock();
            if self.shared.shutting_down.load(Ordering::Acquire) {
                Some(jobs)
            } else {
                state.pending.extend(jobs);
                for worker_id in state.idle.drain(..) {
                    // A full channel already carries a pending wake-up.
                    let _ = self.shared.wakers[worker_id].try_send(());
                }
                None
            }
        };

        if let Some(jobs) = rejected {
            log::debug!("pool shutting down; abandoning {} submitted job(s)", jobs.len());
            jobs.into_iter().for_each(abandon_job);
        }
    }

    /// True while any worker is not idle.
    pub fn is_working(&self) -> bool {
        self.shared.lock().idle.len() != self.shared.num_threads
    }

    /// Blocks until every worker is idle again.
    pub fn wait_until_drained(&self) {
        let mut state = self.shared.lock();
        while state.idle.len() != self.shared.num_threads {
            state = self
                .shared
                .drained
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Stops accepting work, abandons every pending job and waits for running
    /// jobs to finish. Later calls only wait.
    pub fn abandon_all(&self) {
        let abandoned: Vec<Box<dyn Job>> = {
            let mut state = self.shared.lock();
            if self.shared.shutting_down.swap(true, Ordering::AcqRel) {
                Vec::new()
            } else {
                state.pending.drain(..).collect()
            }
        };
        if !abandoned.is_empty() {
            log::debug!("abandoning {} pending job(s)", abandoned.len());
        }
        abandoned.into_iter().for_each(abandon_job);
        self.wait_until_drained();
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.abandon_all();
        for (worker_id, worker) in self.workers.iter_mut().enumerate() {
            worker.time_to_die.store(true, Ordering::Release);
            let _ = self.shared.wakers[worker_id].try_send(());
            if let Some(handle) = worker.handle.take() {
                if handle.join().is_err() {
                    log::error!("worker {worker_id} exited with a panic");
                }
            }
        }
    }
}

fn worker_loop(
    worker_id: usize,
    shared: &Shared,
    wake_rx: &Receiver<()>,
    time_to_die: &AtomicBool,
) {
    while !time_to_die.load(Ordering::Acquire) {
        match wake_rx.recv_timeout(WAKE_TIMEOUT) {
            Ok(()) => {}
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
        if time_to_die.load(Ordering::Acquire) {
            break;
        }

        let mut next = shared.return_to_pool_or_next(worker_id);
        while let Some(job) = next {
            run_job(job);
            next = shared.return_to_pool_or_next(worker_id);
        }
    }
}

fn run_job(job: Box<dyn Job>) {
    let name = job.name();
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(move || job.run())) {
        log::error!("job '{name}' panicked: {}", panic_message(payload.as_ref()));
    }
}

fn abandon_job(job: Box<dyn Job>) {
    let name = job.name();
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(move || job.abandon())) {
        log::error!(
            "abandoning job '{name}' panicked: {}",
            panic_message(payload.as_ref())
        );
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, unbounded};
use hexvox_pool::{FnJob, Job, PoolConfig, WorkerPool};

#[derive(Default)]
struct Counters {
    ran: AtomicUsize,
    abandoned: AtomicUsize,
}

struct CountingJob {
    counters: Arc<Counters>,
}

impl Job for CountingJob {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn run(self: Box<Self>) {
        self.counters.ran.fetch_add(1, Ordering::SeqCst);
    }

    fn abandon(self: Box<Self>) {
        self.counters.abandoned.fetch_add(1, Ordering::SeqCst);
    }
}

/// Signals when it starts, then blocks until released.
struct BlockingJob {
    counters: Arc<Counters>,
    started: Sender<()>,
    release: Receiver<()>,
}

impl Job for BlockingJob {
    fn name(&self) -> &'static str {
        "blocking"
    }

    fn run(self: Box<Self>) {
        let _ = self.started.send(());
        let _ = self.release.recv();
        self.counters.ran.fetch_add(1, Ordering::SeqCst);
    }

    fn abandon(self: Box<Self>) {
        self.counters.abandoned.fetch_add(1, Ordering::SeqCst);
    }
}

fn counting_jobs(counters: &Arc<Counters>, n: usize) -> Vec<Box<dyn Job>> {
    (0..n)
        .map(|_| {
            Box::new(CountingJob {
                counters: Arc::clone(counters),
            }) as Box<dyn Job>
        })
        .collect()
}

#[test]
fn drain_observes_every_job_exactly_once() {
    let pool = WorkerPool::new(PoolConfig::with_threads(4)).unwrap();
    let counters = Arc::new(Counters::default());

    pool.submit_batch(counting_jobs(&counters, 1000));
    let deadline = Instant::now() + Duration::from_secs(30);
    while pool.is_working() {
        assert!(Instant::now() < deadline, "pool never drained");
        thread::yield_now();
    }

    assert_eq!(counters.ran.load(Ordering::SeqCst), 1000);
    assert_eq!(counters.abandoned.load(Ordering::SeqCst), 0);
}

#[test]
fn wait_until_drained_matches_polling() {
    let pool = WorkerPool::new(PoolConfig::with_threads(3)).unwrap();
    let counters = Arc::new(Counters::default());
    for round in 1..=5 {
        pool.submit_batch(counting_jobs(&counters, 64));
        pool.wait_until_drained();
        assert!(!pool.is_working());
        assert_eq!(counters.ran.load(Ordering::SeqCst), round * 64);
    }
}

#[test]
fn single_submissions_all_run() {
    let pool = WorkerPool::new(PoolConfig::with_threads(2)).unwrap();
    let counter = Arc::new(AtomicUsize::new(0));
    for _ in 0..50 {
        let counter = Arc::clone(&counter);
        pool.submit(FnJob::boxed("single", move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
    }
    pool.wait_until_drained();
    assert_eq!(counter.load(Ordering::SeqCst), 50);
}

#[test]
fn abandon_all_cancels_pending_and_finishes_running() {
    let pool = WorkerPool::new(PoolConfig::with_threads(2)).unwrap();
    let counters = Arc::new(Counters::default());
    let (started_tx, started_rx) = unbounded();
    let (release_tx, release_rx) = unbounded();

    let blockers: Vec<Box<dyn Job>> = (0..2)
        .map(|_| {
            Box::new(BlockingJob {
                counters: Arc::clone(&counters),
                started: started_tx.clone(),
                release: release_rx.clone(),
            }) as Box<dyn Job>
        })
        .collect();
    pool.submit_batch(blockers);

    // Both workers are now inside a blocking job.
    for _ in 0..2 {
        started_rx
            .recv_timeout(Duration::from_secs(10))
            .expect("blocking job did not start");
    }

    let queued = Arc::new(Counters::default());
    pool.submit_batch(counting_jobs(&queued, 5));

    // Release the running jobs only once the queued ones have been abandoned.
    let watched = Arc::clone(&queued);
    let releaser = thread::spawn(move || {
        let deadline = Instant::now() + Duration::from_secs(10);
        while watched.abandoned.load(Ordering::SeqCst) < 5 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        for _ in 0..2 {
            release_tx.send(()).unwrap();
        }
    });

    pool.abandon_all();

    // Returned only after the running jobs completed.
    assert_eq!(counters.ran.load(Ordering::SeqCst), 2);
    assert_eq!(counters.abandoned.load(Ordering::SeqCst), 0);
    assert_eq!(queued.abandoned.load(Ordering::SeqCst), 5);
    assert_eq!(queued.ran.load(Ordering::SeqCst), 0);
    assert!(!pool.is_working());
    assert!(pool.is_shut_down());
    releaser.join().unwrap();
}

#[test]
fn submissions_after_shutdown_are_abandoned() {
    let pool = WorkerPool::new(PoolConfig::with_threads(2)).unwrap();
    pool.abandon_all();
    // Idempotent
    pool.abandon_all();

    let counters = Arc::new(Counters::default());
    pool.submit_batch(counting_jobs(&counters, 3));
    pool.submit(Box::new(CountingJob {
        counters: Arc::clone(&counters),
    }));

    assert_eq!(counters.abandoned.load(Ordering::SeqCst), 4);
    assert_eq!(counters.ran.load(Ordering::SeqCst), 0);
    assert!(!pool.is_working());
}

#[test]
fn panicking_job_does_not_kill_worker() {
    let pool = WorkerPool::new(PoolConfig::with_threads(1)).unwrap();
    pool.submit(FnJob::boxed("explodes", || panic!("boom")));
    pool.wait_until_drained();

    let counters = Arc::new(Counters::default());
    pool.submit_batch(counting_jobs(&counters, 10));
    pool.wait_until_drained();
    assert_eq!(counters.ran.load(Ordering::SeqCst), 10);
}

#[test]
fn empty_batch_keeps_pool_idle() {
    let pool = WorkerPool::new(PoolConfig::with_threads(2)).unwrap();
    pool.submit_batch(Vec::new());
    assert!(!pool.is_working());
}

#[test]
fn drop_abandons_queue_and_joins_workers() {
    let counters = Arc::new(Counters::default());
    {
        let pool = WorkerPool::new(PoolConfig::with_threads(2)).unwrap();
        pool.submit_batch(counting_jobs(&counters, 200));
    }
    // Every job reached exactly one terminal state.
    let ran = counters.ran.load(Ordering::SeqCst);
    let abandoned = counters.abandoned.load(Ordering::SeqCst);
    assert_eq!(ran + abandoned, 200);
    // The pool's clones of the counters are gone once workers are joined.
    assert_eq!(Arc::strong_count(&counters), 1);
}

#[test]
fn workers_carry_configured_names() {
    let mut config = PoolConfig::with_threads(1);
    config.name_prefix = "slab".to_string();
    let pool = WorkerPool::new(config).unwrap();
    let (tx, rx) = unbounded();
    pool.submit(FnJob::boxed("name-check", move || {
        let _ = tx.send(thread::current().name().map(str::to_owned));
    }));
    pool.wait_until_drained();
    assert_eq!(rx.recv().unwrap().as_deref(), Some("slab-0"));
}

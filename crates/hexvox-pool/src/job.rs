//! Units of work executed by the [`WorkerPool`](crate::WorkerPool).
//!
//! A job is owned by exactly one party at a time: the submitter builds it,
//! the pool holds it while pending, and then either a worker consumes it via
//! [`Job::run`] or shutdown consumes it via [`Job::abandon`]. Exactly one of
//! the two is called, once.

/// One-shot, cancellable unit of work.
pub trait Job: Send + 'static {
    /// Short label used in logs.
    fn name(&self) -> &'static str;

    /// Executes the work on a worker thread. Failures must be recorded in the
    /// job's own output state; nothing is reported back through the pool.
    fn run(self: Box<Self>);

    /// Called instead of [`run`](Job::run) when the pool shuts down before
    /// the job started.
    fn abandon(self: Box<Self>) {}
}

/// Adapts a closure into a [`Job`] whose abandonment is a no-op.
pub struct FnJob<F> {
    name: &'static str,
    f: F,
}

impl<F> FnJob<F>
where
    F: FnOnce() + Send + 'static,
{
    pub fn new(name: &'static str, f: F) -> Self {
        Self { name, f }
    }

    pub fn boxed(name: &'static str, f: F) -> Box<dyn Job> {
        Box::new(Self::new(name, f))
    }
}

impl<F> Job for FnJob<F>
where
    F: FnOnce() + Send + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn run(self: Box<Self>) {
        let FnJob { f, .. } = *self;
        f();
    }
}

//! Persist pass: create the partitioned records in the target.
//!
//! Handlers transform records on the parse thread and hand the target I/O
//! to an executor, inline or backed by a bounded worker pool. Kinds whose
//! ids later records reference run in earlier sequenced traversals, so a
//! pass never reads a mapping another pass is still writing.
//!
//! # Submodules
//!
//! - [`handlers`] - Per-kind persister handlers
//! - [`transform`] - Old-id to new-id record rewriting

pub mod handlers;
pub mod transform;

use indexmap::IndexMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, SyncSender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use tracing::{error, info};

/// Append-only accounting for one import run.
///
/// Shared by every persister job. Once the abort flag rises (error budget
/// exhausted or an explicit abort), handlers stop creating records but the
/// accounting stays readable.
#[derive(Debug)]
pub struct ProjectImportResults {
    inner: Mutex<ResultsInner>,
    aborted: AtomicBool,
    error_threshold: usize,
}

#[derive(Debug, Default)]
struct ResultsInner {
    created: IndexMap<String, u64>,
    errors: Vec<String>,
}

impl ProjectImportResults {
    /// `error_threshold` of zero means errors never abort the run.
    #[must_use]
    pub fn new(error_threshold: usize) -> Self {
        Self {
            inner: Mutex::new(ResultsInner::default()),
            aborted: AtomicBool::new(false),
            error_threshold,
        }
    }

    fn inner(&self) -> MutexGuard<'_, ResultsInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn increment_created(&self, kind: &str) {
        *self.inner().created.entry(kind.to_string()).or_default() += 1;
    }

    #[must_use]
    pub fn created_count(&self, kind: &str) -> u64 {
        self.inner().created.get(kind).copied().unwrap_or(0)
    }

    /// Snapshot of every per-kind count, in first-created order.
    #[must_use]
    pub fn created_counts(&self) -> Vec<(String, u64)> {
        self.inner()
            .created
            .iter()
            .map(|(kind, count)| (kind.clone(), *count))
            .collect()
    }

    /// Record a per-record failure. Trips the abort flag when the error
    /// budget runs out.
    pub fn add_error(&self, message: impl Into<String>) {
        let message = message.into();
        error!(%message, "import record failed");
        let errors = {
            let mut inner = self.inner();
            inner.errors.push(message);
            inner.errors.len()
        };
        if self.error_threshold > 0 && errors >= self.error_threshold {
            self.abort();
        }
    }

    #[must_use]
    pub fn errors(&self) -> Vec<String> {
        self.inner().errors.clone()
    }

    pub fn abort(&self) {
        if !self.aborted.swap(true, Ordering::SeqCst) {
            info!("import aborted; no further records will be created");
        }
    }

    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }
}

pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Where persister jobs run.
pub trait Executor {
    fn execute(&self, job: Job);
}

/// Runs each job on the calling thread. The single-worker configuration
/// and the deterministic choice for tests.
#[derive(Debug, Default)]
pub struct InlineExecutor;

impl Executor for InlineExecutor {
    fn execute(&self, job: Job) {
        job();
    }
}

/// A fixed pool of workers fed through a bounded channel; submission
/// blocks when every worker is busy and the buffer is full, so the parse
/// thread can never race arbitrarily far ahead of the target.
pub struct BoundedExecutor {
    sender: Option<SyncSender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl BoundedExecutor {
    #[must_use]
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        let (sender, receiver) = std::sync::mpsc::sync_channel::<Job>(workers);
        let receiver = Arc::new(Mutex::new(receiver));
        let handles = (0..workers)
            .map(|_| {
                let receiver = Arc::clone(&receiver);
                std::thread::spawn(move || Self::worker_loop(&receiver))
            })
            .collect();
        Self {
            sender: Some(sender),
            workers: handles,
        }
    }

    fn worker_loop(receiver: &Mutex<Receiver<Job>>) {
        loop {
            let job = {
                let guard = receiver.lock().unwrap_or_else(PoisonError::into_inner);
                guard.recv()
            };
            match job {
                Ok(job) => job(),
                Err(_) => break,
            }
        }
    }

    /// Stop accepting work and wait for in-flight jobs to finish.
    pub fn shutdown_and_wait(mut self) {
        self.sender.take();
        for handle in self.workers.drain(..) {
            // A panicking job already reported through the results; the
            // pool itself shuts down cleanly regardless.
            let _ = handle.join();
        }
    }
}

impl Executor for BoundedExecutor {
    fn execute(&self, job: Job) {
        if let Some(sender) = &self.sender {
            // Can only fail when every worker is gone, which means
            // shutdown already began.
            let _ = sender.send(job);
        }
    }
}

impl Drop for BoundedExecutor {
    fn drop(&mut self) {
        self.sender.take();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

/// Executor selection for one run.
pub enum ImportExecutor {
    Inline(InlineExecutor),
    Bounded(BoundedExecutor),
}

impl ImportExecutor {
    /// One worker runs inline; more get a pool.
    #[must_use]
    pub fn with_workers(workers: usize) -> Self {
        if workers <= 1 {
            Self::Inline(InlineExecutor)
        } else {
            Self::Bounded(BoundedExecutor::new(workers))
        }
    }

    /// Wait for everything submitted so far to complete.
    pub fn drain(self) {
        if let Self::Bounded(pool) = self {
            pool.shutdown_and_wait();
        }
    }
}

impl Executor for ImportExecutor {
    fn execute(&self, job: Job) {
        match self {
            Self::Inline(inline) => inline.execute(job),
            Self::Bounded(pool) => pool.execute(job),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;

    #[test]
    fn error_threshold_trips_the_abort_flag() {
        let results = ProjectImportResults::new(3);
        results.add_error("one");
        results.add_error("two");
        assert!(!results.is_aborted());
        results.add_error("three");
        assert!(results.is_aborted());
        assert_eq!(results.errors().len(), 3);
    }

    #[test]
    fn zero_threshold_never_aborts() {
        let results = ProjectImportResults::new(0);
        for i in 0..100 {
            results.add_error(format!("error {i}"));
        }
        assert!(!results.is_aborted());
    }

    #[test]
    fn counts_accumulate_per_kind() {
        let results = ProjectImportResults::new(10);
        results.increment_created("comment");
        results.increment_created("comment");
        results.increment_created("worklog");
        assert_eq!(results.created_count("comment"), 2);
        assert_eq!(results.created_count("worklog"), 1);
        assert_eq!(results.created_count("issue"), 0);
    }

    #[test]
    fn bounded_executor_runs_every_job() {
        let counter = Arc::new(AtomicU64::new(0));
        let pool = BoundedExecutor::new(4);
        for _ in 0..100 {
            let counter = Arc::clone(&counter);
            pool.execute(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        }
        pool.shutdown_and_wait();
        assert_eq!(counter.load(Ordering::SeqCst), 100);
    }
}

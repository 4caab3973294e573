//! Execution-context capability used to deliver notifications
//!
//! The worker never runs subscriber callbacks itself. Each callback is
//! wrapped in a [`Job`] and handed to a [`Dispatcher`], which decides where
//! and when it runs (a UI thread, an executor thread, a runtime). The worker
//! hands jobs over in the order frames were classified; whether they run in
//! that order is up to the dispatcher.

use crossbeam_channel::{unbounded, Sender};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread::JoinHandle;
use tracing::{debug, error};

/// A unit of work scheduled on a dispatcher
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Schedules callbacks on a designated execution context
///
/// Implementations must not block the caller waiting for the job to run.
/// Any `Fn(Job)` closure is a dispatcher, so posting into an existing event
/// loop is usually a one-liner:
///
/// ```ignore
/// let (tx, rx) = crossbeam_channel::unbounded::<Job>();
/// let client = OcdClient::builder()
///     .dispatcher(move |job: Job| { let _ = tx.send(job); })
///     .build();
/// // UI loop: while let Ok(job) = rx.try_recv() { job() }
/// ```
pub trait Dispatcher: Send + Sync + 'static {
    /// Schedule `job` for execution
    fn dispatch(&self, job: Job);
}

impl<F> Dispatcher for F
where
    F: Fn(Job) + Send + Sync + 'static,
{
    fn dispatch(&self, job: Job) {
        self(job)
    }
}

/// Runs jobs immediately on the calling (worker) thread
///
/// Only suitable for callbacks that return quickly; a slow callback stalls
/// the connection.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineDispatcher;

impl Dispatcher for InlineDispatcher {
    fn dispatch(&self, job: Job) {
        job()
    }
}

/// Dedicated executor thread running jobs in FIFO order
///
/// A job that panics is logged and the thread keeps serving later jobs.
/// Dropping the dispatcher lets queued jobs finish, then joins the thread.
pub struct ThreadDispatcher {
    sender: Option<Sender<Job>>,
    handle: Option<JoinHandle<()>>,
}

impl ThreadDispatcher {
    /// Spawn the executor thread
    ///
    /// # Errors
    /// Returns the OS error if the thread cannot be spawned.
    pub fn new(name: impl Into<String>) -> std::io::Result<Self> {
        let name = name.into();
        let (sender, receiver) = unbounded::<Job>();

        let thread_name = name.clone();
        let handle = std::thread::Builder::new().name(name).spawn(move || {
            while let Ok(job) = receiver.recv() {
                if catch_unwind(AssertUnwindSafe(job)).is_err() {
                    error!("Callback panicked on dispatcher thread {}", thread_name);
                }
            }
            debug!("Dispatcher thread {} exiting", thread_name);
        })?;

        Ok(Self {
            sender: Some(sender),
            handle: Some(handle),
        })
    }
}

impl Dispatcher for ThreadDispatcher {
    fn dispatch(&self, job: Job) {
        if let Some(sender) = &self.sender {
            if sender.send(job).is_err() {
                debug!("Dispatcher thread gone, dropping job");
            }
        }
    }
}

impl Drop for ThreadDispatcher {
    fn drop(&mut self) {
        // Closing the channel ends the receive loop once the backlog drains
        self.sender.take();

        if let Some(handle) = self.handle.take() {
            // A job holding the last reference may drop us from inside the thread
            if handle.thread().id() != std::thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_inline_dispatcher_runs_immediately() {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        InlineDispatcher.dispatch(Box::new(move || {
            h.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_thread_dispatcher_preserves_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        {
            let dispatcher = ThreadDispatcher::new("test-dispatch").unwrap();
            for i in 0..100 {
                let seen = Arc::clone(&seen);
                dispatcher.dispatch(Box::new(move || seen.lock().push(i)));
            }
            // Drop joins after the backlog drains
        }
        assert_eq!(*seen.lock(), (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_thread_dispatcher_survives_panicking_job() {
        let hits = Arc::new(AtomicUsize::new(0));
        {
            let dispatcher = ThreadDispatcher::new("test-panic").unwrap();
            dispatcher.dispatch(Box::new(|| panic!("subscriber bug")));
            let h = Arc::clone(&hits);
            dispatcher.dispatch(Box::new(move || {
                h.fetch_add(1, Ordering::SeqCst);
            }));
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_closure_dispatcher() {
        let (tx, rx) = crossbeam_channel::unbounded::<Job>();
        let dispatcher = move |job: Job| {
            let _ = tx.send(job);
        };

        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        dispatcher.dispatch(Box::new(move || {
            h.fetch_add(1, Ordering::SeqCst);
        }));

        // Nothing runs until the owning loop drains the channel
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        while let Ok(job) = rx.try_recv() {
            job();
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}

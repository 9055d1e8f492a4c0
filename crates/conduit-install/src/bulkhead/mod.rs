//! Bounded concurrency gate.
//!
//! A [`Bulkhead`] lets at most `max_concurrent` tasks run at once. Callers
//! beyond the bound block until a slot frees and are admitted in arrival
//! order. Slots are held by an RAII permit, so a task that panics still
//! releases its slot.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use crate::error::InstallError;

const BULKHEAD_TARGET: &str = "conduit_install::bulkhead";

/// Result of a task started with [`Bulkhead::execute_async`].
pub type TaskResult = Result<(), InstallError>;

#[derive(Debug, Default)]
struct Slots {
    in_flight: usize,
    next_ticket: u64,
    now_serving: u64,
}

#[derive(Debug)]
struct Inner {
    max_concurrent: usize,
    slots: Mutex<Slots>,
    freed: Condvar,
    pending: Mutex<Vec<(String, JoinHandle<TaskResult>)>>,
}

impl Inner {
    fn slots(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn acquire(&self) -> Permit<'_> {
        let mut slots = self.slots();
        let ticket = slots.next_ticket;
        slots.next_ticket = slots.next_ticket.wrapping_add(1);
        while slots.now_serving != ticket || slots.in_flight >= self.max_concurrent {
            slots = self
                .freed
                .wait(slots)
                .unwrap_or_else(PoisonError::into_inner);
        }
        slots.now_serving = slots.now_serving.wrapping_add(1);
        slots.in_flight += 1;
        drop(slots);
        // The next ticket may also fit if more than one slot is free.
        self.freed.notify_all();
        Permit { inner: self }
    }

    fn release(&self) {
        let mut slots = self.slots();
        slots.in_flight = slots.in_flight.saturating_sub(1);
        drop(slots);
        self.freed.notify_all();
    }
}

/// Holds one slot until dropped.
struct Permit<'a> {
    inner: &'a Inner,
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        self.inner.release();
    }
}

/// Limits how many tasks run at once.
///
/// Clones share the same slots.
#[derive(Debug, Clone)]
pub struct Bulkhead {
    inner: Arc<Inner>,
}

impl Bulkhead {
    /// Creates a bulkhead admitting `max_concurrent` tasks. A bound of zero
    /// is raised to one.
    #[must_use]
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                max_concurrent: max_concurrent.max(1),
                slots: Mutex::new(Slots::default()),
                freed: Condvar::new(),
                pending: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Maximum number of concurrently admitted tasks.
    #[must_use]
    pub fn max_concurrent(&self) -> usize {
        self.inner.max_concurrent
    }

    /// Number of tasks currently holding a slot.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.inner.slots().in_flight
    }

    /// Runs `task` once a slot is free, blocking the caller until then.
    ///
    /// The slot is released when `task` returns or unwinds.
    pub fn execute<T>(&self, task: impl FnOnce() -> T) -> T {
        let _permit = self.inner.acquire();
        task()
    }

    /// Starts `task` on a new thread that waits for a slot.
    ///
    /// Results are collected by [`Bulkhead::wait`].
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::Io`] when the worker thread cannot be
    /// spawned.
    pub fn execute_async<F>(&self, name: &str, task: F) -> Result<(), InstallError>
    where
        F: FnOnce() -> TaskResult + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        let handle = thread::Builder::new()
            .name(format!("bulkhead-{name}"))
            .spawn(move || {
                let _permit = inner.acquire();
                task()
            })
            .map_err(|err| InstallError::io(name, err))?;
        debug!(target: BULKHEAD_TARGET, task = name, "queued background task");
        self.inner
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((name.to_owned(), handle));
        Ok(())
    }

    /// Blocks until every task started with [`Bulkhead::execute_async`]
    /// has finished and returns their results in submission order.
    ///
    /// A task that panicked is reported as
    /// [`InstallError::WorkerPanicked`].
    pub fn wait(&self) -> Vec<TaskResult> {
        let pending = std::mem::take(
            &mut *self
                .inner
                .pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        pending
            .into_iter()
            .map(|(name, handle)| {
                handle.join().unwrap_or_else(|_| {
                    warn!(target: BULKHEAD_TARGET, task = %name, "background task panicked");
                    Err(InstallError::WorkerPanicked { name })
                })
            })
            .collect()
    }
}

/// Runs `task`, converting an unwind into [`InstallError::WorkerPanicked`].
pub(crate) fn catch_worker_panic(name: &str, task: impl FnOnce() -> TaskResult) -> TaskResult {
    panic::catch_unwind(AssertUnwindSafe(task)).unwrap_or_else(|_| {
        warn!(target: BULKHEAD_TARGET, task = name, "worker panicked");
        Err(InstallError::WorkerPanicked {
            name: name.to_owned(),
        })
    })
}

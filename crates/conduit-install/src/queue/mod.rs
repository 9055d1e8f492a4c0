//! Parallel execution of a batch of downloads.
//!
//! A [`DownloadQueue`] runs a caller-supplied download function for every
//! queued item on its own worker thread, with a [`Bulkhead`] capping how
//! many transfers are in flight. The queue checks its
//! [`CancellationToken`] before dispatching an item and again once the item
//! holds a slot, so a cancellation stops new transfers while letting the
//! ones already running finish.
//!
//! Progress is reported once per item, while it holds its slot and just
//! before its transfer starts, and once more after every item has finished.
//! Observers are invoked one at a time.

use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;

use tracing::{debug, info, warn};

use crate::bulkhead::{Bulkhead, catch_worker_panic};
use crate::cancel::CancellationToken;
use crate::error::InstallError;

const QUEUE_TARGET: &str = "conduit_install::queue";

/// One unit of work for the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadItem {
    /// Plugin name, with or without the `plugin-` prefix.
    pub name: String,
    /// Exact version or `latest`.
    pub version: String,
    /// Directory that receives the installed plugin.
    pub destination: PathBuf,
}

impl DownloadItem {
    /// Builds an item.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        destination: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            destination: destination.into(),
        }
    }
}

/// Final state of one queued item.
#[derive(Debug)]
pub struct DownloadOutcome {
    /// Item name.
    pub name: String,
    /// Failure, if the item did not complete.
    pub error: Option<InstallError>,
}

impl DownloadOutcome {
    /// Reports whether the item completed without error.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Snapshot passed to the progress observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueProgress {
    /// Items whose transfer has begun.
    pub started: usize,
    /// Items whose transfer has returned, successfully or not.
    pub completed: usize,
    /// Items queued in total.
    pub total: usize,
    /// Item about to start, or `None` for the final report.
    pub current: Option<String>,
}

type ProgressObserver = Box<dyn Fn(&QueueProgress) + Send + Sync>;
type ErrorObserver = Box<dyn Fn(&str, &InstallError) + Send + Sync>;

#[derive(Default)]
struct Tally {
    started: usize,
    completed: usize,
    outcomes: Vec<(usize, DownloadOutcome)>,
}

/// Runs queued downloads with bounded parallelism.
pub struct DownloadQueue {
    items: Vec<DownloadItem>,
    bulkhead: Bulkhead,
    cancellation: CancellationToken,
    on_progress: Option<ProgressObserver>,
    on_error: Option<ErrorObserver>,
}

impl DownloadQueue {
    /// Creates an empty queue that runs at most `max_concurrent` items at
    /// once.
    #[must_use]
    pub fn new(max_concurrent: usize) -> Self {
        Self::with_bulkhead(Bulkhead::new(max_concurrent))
    }

    /// Creates an empty queue gated by an existing bulkhead.
    #[must_use]
    pub fn with_bulkhead(bulkhead: Bulkhead) -> Self {
        Self {
            items: Vec::new(),
            bulkhead,
            cancellation: CancellationToken::new(),
            on_progress: None,
            on_error: None,
        }
    }

    /// Uses `token` to stop the queue early.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Appends an item.
    pub fn add(&mut self, item: DownloadItem) {
        self.items.push(item);
    }

    /// Number of queued items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Reports whether nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Registers the progress observer, replacing any previous one.
    pub fn set_progress_callback(
        &mut self,
        observer: impl Fn(&QueueProgress) + Send + Sync + 'static,
    ) {
        self.on_progress = Some(Box::new(observer));
    }

    /// Registers the error observer, replacing any previous one. It is
    /// called with the item name for every failed or cancelled item.
    pub fn set_error_callback(
        &mut self,
        observer: impl Fn(&str, &InstallError) + Send + Sync + 'static,
    ) {
        self.on_error = Some(Box::new(observer));
    }

    /// Runs `download` for every queued item and returns one outcome per
    /// item, in queue order.
    ///
    /// Returns once every dispatched item has finished. Items not yet
    /// started when the cancellation token fires are reported as
    /// [`InstallError::Cancelled`]. A download that panics is reported as
    /// [`InstallError::WorkerPanicked`].
    pub fn execute<F>(&self, download: F) -> Vec<DownloadOutcome>
    where
        F: Fn(&DownloadItem) -> Result<(), InstallError> + Sync,
    {
        let total = self.items.len();
        let tally = Mutex::new(Tally::default());
        info!(
            target: QUEUE_TARGET,
            total,
            max_concurrent = self.bulkhead.max_concurrent(),
            "starting download queue"
        );

        thread::scope(|scope| {
            for (index, item) in self.items.iter().enumerate() {
                if self.cancellation.is_cancelled() {
                    self.finish(&tally, index, item, Err(cancelled(item)), false);
                    continue;
                }
                let (tally_ref, download_ref) = (&tally, &download);
                let spawned = thread::Builder::new()
                    .name(format!("download-{}", item.name))
                    .spawn_scoped(scope, move || {
                        self.run_item(tally_ref, index, item, total, download_ref);
                    });
                if let Err(err) = spawned {
                    let error = InstallError::io(&item.destination, err);
                    self.finish(&tally, index, item, Err(error), false);
                }
            }
        });

        let Tally {
            started,
            completed,
            mut outcomes,
        } = tally.into_inner().unwrap_or_else(PoisonError::into_inner);
        self.report(&QueueProgress {
            started,
            completed,
            total,
            current: None,
        });
        outcomes.sort_by_key(|(index, _)| *index);
        let failed = outcomes
            .iter()
            .filter(|(_, outcome)| !outcome.is_success())
            .count();
        info!(target: QUEUE_TARGET, total, failed, "download queue finished");
        outcomes.into_iter().map(|(_, outcome)| outcome).collect()
    }

    fn run_item<F>(
        &self,
        tally: &Mutex<Tally>,
        index: usize,
        item: &DownloadItem,
        total: usize,
        download: &F,
    ) where
        F: Fn(&DownloadItem) -> Result<(), InstallError> + Sync,
    {
        let (result, ran) = self.bulkhead.execute(|| {
            if self.cancellation.is_cancelled() {
                return (Err(cancelled(item)), false);
            }
            {
                let mut guard = lock(tally);
                guard.started += 1;
                self.report(&QueueProgress {
                    started: guard.started,
                    completed: guard.completed,
                    total,
                    current: Some(item.name.clone()),
                });
            }
            debug!(target: QUEUE_TARGET, item = %item.name, "download started");
            (catch_worker_panic(&item.name, || download(item)), true)
        });
        self.finish(tally, index, item, result, ran);
    }

    fn finish(
        &self,
        tally: &Mutex<Tally>,
        index: usize,
        item: &DownloadItem,
        result: Result<(), InstallError>,
        ran: bool,
    ) {
        let mut guard = lock(tally);
        if ran {
            guard.completed += 1;
        }
        let error = result.err();
        if let Some(err) = &error {
            warn!(target: QUEUE_TARGET, item = %item.name, error = %err, "download failed");
            if let Some(observer) = &self.on_error {
                observer(&item.name, err);
            }
        }
        guard.outcomes.push((
            index,
            DownloadOutcome {
                name: item.name.clone(),
                error,
            },
        ));
    }

    fn report(&self, progress: &QueueProgress) {
        if let Some(observer) = &self.on_progress {
            observer(progress);
        }
    }
}

impl std::fmt::Debug for DownloadQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadQueue")
            .field("items", &self.items)
            .field("bulkhead", &self.bulkhead)
            .field("cancelled", &self.cancellation.is_cancelled())
            .finish_non_exhaustive()
    }
}

fn cancelled(item: &DownloadItem) -> InstallError {
    InstallError::Cancelled {
        name: item.name.clone(),
    }
}

fn lock(tally: &Mutex<Tally>) -> MutexGuard<'_, Tally> {
    tally.lock().unwrap_or_else(PoisonError::into_inner)
}

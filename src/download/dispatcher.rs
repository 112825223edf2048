//! Bounded, deduplicating job dispatcher.
//!
//! The [`Dispatcher`] accepts [`Job`]s, fetches their targets on a bounded
//! pool of tokio tasks, and hands completed jobs back through a single
//! completion channel. It only records outcomes; retry policy belongs to
//! the caller.
//!
//! Each query owns its own dispatcher. The response cache is the only state
//! shared with other queries.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use parking_lot::Mutex;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use super::fetch::{FetchError, Fetcher};
use super::job::{Job, JobKey, Outcome, Response};
use crate::cache::Cache;

/// Hard cap on concurrent fetch workers, whatever the configuration asks for.
pub const MAX_WORKERS: usize = 10;

/// Default per-fetch timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Returned by [`Dispatcher::poll`] when nothing is pending or in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("no pending or in-flight jobs")]
pub struct Empty;

/// Why [`Dispatcher::submit`] did not schedule a job.
#[derive(Debug)]
pub enum Rejected {
    /// An identical job (same provider, same targets) is already in flight;
    /// its completion satisfies this submission too.
    Duplicate,
    /// The dispatcher has shut down. The job is handed back untouched.
    Closed(Job),
    /// The job has no targets to fetch. The job is handed back untouched.
    NoTargets(Job),
}

/// Counters describing where bodies came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Targets fetched over the network (including failed attempts).
    pub network_fetches: usize,
    /// Targets served from the response cache.
    pub cache_hits: usize,
}

struct Shared {
    fetcher: Arc<dyn Fetcher>,
    cache: Option<Arc<dyn Cache>>,
    permits: Semaphore,
    timeout: Duration,
    in_flight: Mutex<HashSet<JobKey>>,
    outstanding: AtomicUsize,
    closed: AtomicBool,
    network_fetches: AtomicUsize,
    cache_hits: AtomicUsize,
}

/// Concurrent fetch engine for a single query.
pub struct Dispatcher {
    shared: Arc<Shared>,
    workers: usize,
    completed_tx: mpsc::UnboundedSender<Job>,
    completed_rx: mpsc::UnboundedReceiver<Job>,
    tracker: TaskTracker,
    shutdown: CancellationToken,
}

impl Dispatcher {
    /// Create a dispatcher with `workers` concurrent fetch slots.
    ///
    /// `workers` is clamped to `1..=MAX_WORKERS`.
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        cache: Option<Arc<dyn Cache>>,
        workers: usize,
        timeout: Duration,
    ) -> Self {
        let workers = workers.clamp(1, MAX_WORKERS);
        let (completed_tx, completed_rx) = mpsc::unbounded_channel();

        Self {
            shared: Arc::new(Shared {
                fetcher,
                cache,
                permits: Semaphore::new(workers),
                timeout,
                in_flight: Mutex::new(HashSet::new()),
                outstanding: AtomicUsize::new(0),
                closed: AtomicBool::new(false),
                network_fetches: AtomicUsize::new(0),
                cache_hits: AtomicUsize::new(0),
            }),
            workers,
            completed_tx,
            completed_rx,
            tracker: TaskTracker::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Effective worker count after clamping.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Schedule `job` for fetching.
    ///
    /// Nothing is scheduled if the dispatcher is closed, the job has no
    /// targets, or a job with the same provider and target list is already
    /// in flight.
    pub fn submit(&self, job: Job) -> Result<(), Rejected> {
        if self.shared.closed.load(Ordering::SeqCst) {
            debug!(provider = job.provider().name(), "Dispatcher closed; job rejected");
            return Err(Rejected::Closed(job));
        }
        if job.targets().is_empty() {
            warn!(provider = job.provider().name(), "Job without targets rejected");
            return Err(Rejected::NoTargets(job));
        }

        let key = job.key();
        {
            let mut in_flight = self.shared.in_flight.lock();
            if !in_flight.insert(key.clone()) {
                debug!(
                    provider = key.provider(),
                    targets = ?key.targets(),
                    "Duplicate job already in flight"
                );
                return Err(Rejected::Duplicate);
            }
            self.shared.outstanding.fetch_add(1, Ordering::SeqCst);
        }

        self.tracker.spawn(run_job(
            Arc::clone(&self.shared),
            job,
            key,
            self.completed_tx.clone(),
            self.shutdown.clone(),
        ));
        Ok(())
    }

    /// Next completed job.
    ///
    /// Returns immediately when a completion is queued, fails with [`Empty`]
    /// when nothing is pending or in flight, and otherwise waits for the next
    /// job to finish.
    pub async fn poll(&mut self) -> Result<Job, Empty> {
        if let Ok(job) = self.completed_rx.try_recv() {
            self.shared.outstanding.fetch_sub(1, Ordering::SeqCst);
            return Ok(job);
        }

        if self.shared.outstanding.load(Ordering::SeqCst) == 0 {
            return Err(Empty);
        }

        // The dispatcher holds a sender, so the channel cannot close here.
        match self.completed_rx.recv().await {
            Some(job) => {
                self.shared.outstanding.fetch_sub(1, Ordering::SeqCst);
                Ok(job)
            }
            None => Err(Empty),
        }
    }

    /// Jobs accepted but not yet returned by [`poll`](Self::poll).
    pub fn pending_count(&self) -> usize {
        self.shared.outstanding.load(Ordering::SeqCst)
    }

    /// Stop accepting work and wait for in-flight fetches.
    ///
    /// Jobs still waiting for a worker complete with [`Outcome::Cancelled`]
    /// so they can still be polled. Calling this more than once is a no-op
    /// beyond the first call.
    pub async fn shutdown(&self) {
        let first = !self.shared.closed.swap(true, Ordering::SeqCst);

        self.shutdown.cancel();
        self.tracker.close();
        self.tracker.wait().await;

        if first {
            info!(
                pending = self.pending_count(),
                network_fetches = self.shared.network_fetches.load(Ordering::SeqCst),
                cache_hits = self.shared.cache_hits.load(Ordering::SeqCst),
                "Dispatcher shut down"
            );
        }
    }

    /// `true` once [`shutdown`](Self::shutdown) has been called.
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    /// Network and cache counters so far.
    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            network_fetches: self.shared.network_fetches.load(Ordering::SeqCst),
            cache_hits: self.shared.cache_hits.load(Ordering::SeqCst),
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn run_job(
    shared: Arc<Shared>,
    mut job: Job,
    key: JobKey,
    completed_tx: mpsc::UnboundedSender<Job>,
    shutdown: CancellationToken,
) {
    let backoff = job.backoff();

    // Only work that has not started yet is cancellable.
    let permit = tokio::select! {
        biased;
        _ = shutdown.cancelled() => None,
        permit = async {
            if !backoff.is_zero() {
                tokio::time::sleep(backoff).await;
            }
            shared.permits.acquire().await.ok()
        } => permit,
    };

    let responses = match permit {
        Some(permit) => {
            let responses = fetch_targets(&shared, job.targets()).await;
            drop(permit);
            responses
        }
        None => {
            debug!(provider = key.provider(), "Job cancelled before start");
            job.targets()
                .iter()
                .map(|url| Response::new(url.clone(), Outcome::Cancelled))
                .collect()
        }
    };

    job.set_responses(responses);
    shared.in_flight.lock().remove(&key);

    if completed_tx.send(job).is_err() {
        // Receiver gone: the dispatcher was dropped mid-flight.
        shared.outstanding.fetch_sub(1, Ordering::SeqCst);
    }
}

async fn fetch_targets(shared: &Shared, targets: &[String]) -> Vec<Response> {
    join_all(targets.iter().map(|url| async move {
        let outcome = fetch_target(shared, url).await;
        Response::new(url.clone(), outcome)
    }))
    .await
}

async fn fetch_target(shared: &Shared, url: &str) -> Outcome {
    if let Some(cache) = &shared.cache {
        if let Some(body) = cache.read(url) {
            shared.cache_hits.fetch_add(1, Ordering::SeqCst);
            debug!(url = %url, cached = true, "Fetched target");
            return Outcome::Cached(body);
        }
    }

    shared.network_fetches.fetch_add(1, Ordering::SeqCst);
    let result = match tokio::time::timeout(shared.timeout, shared.fetcher.fetch(url)).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::Timeout),
    };

    match result {
        Ok(body) => {
            debug!(url = %url, cached = false, bytes = body.len(), "Fetched target");
            Outcome::Fetched(body)
        }
        Err(FetchError::Rejected { status, body }) => {
            debug!(url = %url, status, "Fetch refused by server");
            Outcome::Rejected { status, body }
        }
        Err(FetchError::Timeout) => {
            warn!(url = %url, timeout_ms = shared.timeout.as_millis() as u64, "Fetch timed out");
            Outcome::Timeout
        }
        Err(e) => {
            warn!(url = %url, error = %e, "Fetch failed");
            Outcome::Failed(e.to_string())
        }
    }
}

//! The per-query control loop.
//!
//! The [`Orchestrator`] seeds one job per eligible provider, then polls the
//! dispatcher until nothing is pending. Each completed job is either
//! retried, expanded into follow-up jobs, or finalized into a
//! [`MetadataResult`]. Retry policy lives here; the dispatcher only fetches.

use std::sync::Arc;
use std::time::Duration;

use hugin_common::Query;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::Cache;
use crate::download::{Dispatcher, Job, Outcome, Rejected};
use crate::metadata::{MetadataProvider, MetadataResult, ParseOutcome, Record};

/// Longest delay a retried job waits before it is fetched again.
pub const MAX_BACKOFF: Duration = Duration::from_secs(10);

/// Delay before retry number `attempt` (1-based).
///
/// Doubles from `base` on each attempt, capped at [`MAX_BACKOFF`]. A zero
/// base disables backoff.
pub fn backoff_for(base: Duration, attempt: u32) -> Duration {
    if base.is_zero() || attempt == 0 {
        return Duration::ZERO;
    }
    let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
    base.checked_mul(factor)
        .map_or(MAX_BACKOFF, |delay| delay.min(MAX_BACKOFF))
}

#[derive(Debug, Default)]
struct LoopStats {
    dispatched: usize,
    merged: usize,
    retries: usize,
    follow_ups: usize,
    discarded: usize,
    written_back: usize,
}

/// Drives one query's jobs to completion over a dedicated dispatcher.
pub struct Orchestrator {
    dispatcher: Dispatcher,
    cache: Option<Arc<dyn Cache>>,
    retry_backoff: Duration,
    cancel: CancellationToken,
    finished: Vec<Job>,
    stats: LoopStats,
}

impl Orchestrator {
    /// `cache` is the write-back target; pass `None` when the query has
    /// caching disabled.
    pub fn new(
        dispatcher: Dispatcher,
        cache: Option<Arc<dyn Cache>>,
        retry_backoff: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            dispatcher,
            cache,
            retry_backoff,
            cancel,
            finished: Vec::new(),
            stats: LoopStats::default(),
        }
    }

    /// Run `query` against `providers` and return one result per finished
    /// job, in completion order.
    ///
    /// Cancellation is checked between completions. Once cancelled, queued
    /// work is dropped, in-flight fetches are allowed to finish, and every
    /// outstanding job is finalized without a record.
    pub async fn run(
        mut self,
        query: Arc<Query>,
        providers: &[Arc<dyn MetadataProvider>],
    ) -> Vec<MetadataResult> {
        for provider in providers {
            let targets = provider.build_targets(&query).unwrap_or_default();
            let job = Job::new(Arc::clone(provider), Arc::clone(&query), targets);
            if job.targets().is_empty() {
                debug!(provider = provider.name(), "Provider has no targets for query");
                self.finalize(job, None);
            } else {
                self.dispatch(job);
            }
        }

        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled(), if !self.dispatcher.is_closed() => None,
                polled = self.dispatcher.poll() => Some(polled),
            };

            match next {
                None => {
                    info!(
                        pending = self.dispatcher.pending_count(),
                        "Query cancelled; draining dispatcher"
                    );
                    self.dispatcher.shutdown().await;
                }
                Some(Ok(job)) => self.handle(job),
                Some(Err(_)) => break,
            }
        }

        self.dispatcher.shutdown().await;

        let fetch = self.dispatcher.stats();
        let results: Vec<MetadataResult> =
            self.finished.into_iter().map(Job::into_result).collect();
        info!(
            providers = providers.len(),
            dispatched = self.stats.dispatched,
            merged = self.stats.merged,
            follow_ups = self.stats.follow_ups,
            retries = self.stats.retries,
            discarded = self.stats.discarded,
            network_fetches = fetch.network_fetches,
            cache_hits = fetch.cache_hits,
            written_back = self.stats.written_back,
            results = results.len(),
            found = results.iter().filter(|r| r.record.is_some()).count(),
            "Query finished"
        );
        results
    }

    fn dispatch(&mut self, job: Job) {
        match self.dispatcher.submit(job) {
            Ok(()) => self.stats.dispatched += 1,
            Err(Rejected::Duplicate) => self.stats.merged += 1,
            Err(Rejected::Closed(job)) | Err(Rejected::NoTargets(job)) => {
                debug!(provider = job.provider().name(), "Job rejected; finalizing");
                self.finalize(job, None);
            }
        }
    }

    fn finalize(&mut self, mut job: Job, record: Option<Record>) {
        job.finish(record);
        self.finished.push(job);
    }

    fn handle(&mut self, job: Job) {
        if job
            .responses()
            .iter()
            .any(|r| r.outcome == Outcome::Cancelled)
        {
            debug!(provider = job.provider().name(), "Job cancelled before fetching");
            self.finalize(job, None);
            return;
        }

        let outcome = job
            .pages()
            .map(|pages| job.provider().parse(&pages, job.query()));
        let Some(outcome) = outcome else {
            self.retry(job);
            return;
        };

        if !matches!(outcome, ParseOutcome::Retry) {
            self.write_back(&job);
        }

        match outcome {
            ParseOutcome::Found(record) => self.finalize(job, Some(record)),
            ParseOutcome::NotFound => self.finalize(job, None),
            ParseOutcome::FollowUp(lists) => {
                let lists: Vec<Vec<String>> =
                    lists.into_iter().filter(|t| !t.is_empty()).collect();
                if lists.is_empty() {
                    self.finalize(job, None);
                    return;
                }
                for targets in lists {
                    self.stats.follow_ups += 1;
                    let child = job.follow_up(targets);
                    self.dispatch(child);
                }
            }
            ParseOutcome::Retry => self.retry(job),
            ParseOutcome::Failed(reason) => {
                warn!(
                    provider = job.provider().name(),
                    targets = ?job.targets(),
                    reason = %reason,
                    "Provider could not parse response"
                );
                self.finalize(job, None);
            }
        }
    }

    /// Spend one retry and resubmit, or finalize once the budget hits zero.
    fn retry(&mut self, mut job: Job) {
        if !job.consume_retry() {
            self.discard(job);
            return;
        }

        let attempt = job.retries_consumed();
        job.set_backoff(backoff_for(self.retry_backoff, attempt));
        job.reset_responses();
        self.stats.retries += 1;
        debug!(
            provider = job.provider().name(),
            attempt,
            backoff_ms = job.backoff().as_millis() as u64,
            "Retrying job"
        );
        self.dispatch(job);
    }

    fn discard(&mut self, job: Job) {
        self.stats.discarded += 1;
        warn!(
            provider = job.provider().name(),
            targets = ?job.targets(),
            retries = job.retries_consumed(),
            "Retry budget exhausted; discarding job"
        );
        self.finalize(job, None);
    }

    /// Store network-served bodies of a usable job.
    fn write_back(&mut self, job: &Job) {
        let Some(cache) = &self.cache else {
            return;
        };
        for response in job.responses() {
            if let Outcome::Fetched(body) = &response.outcome {
                cache.write(&response.url, body);
                self.stats.written_back += 1;
            }
        }
    }
}

//! Fetch jobs and their per-target outcomes.
//!
//! A [`Job`] binds one provider to an ordered list of targets. It is owned by
//! exactly one component at a time: the orchestrator while pending, the
//! dispatcher while in flight, and the orchestrator again once completed.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use hugin_common::Query;

use crate::metadata::{MetadataProvider, MetadataResult, Record};

/// Value-based identity used to merge duplicate in-flight jobs.
///
/// Two jobs are duplicates only when they share both the provider and the
/// exact, ordered target list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobKey {
    provider: &'static str,
    targets: Vec<String>,
}

impl JobKey {
    pub fn new(provider: &'static str, targets: Vec<String>) -> Self {
        Self { provider, targets }
    }

    pub fn provider(&self) -> &'static str {
        self.provider
    }

    pub fn targets(&self) -> &[String] {
        &self.targets
    }
}

/// What happened when a single target was fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Body downloaded from the network.
    Fetched(String),
    /// Body served from the response cache.
    Cached(String),
    /// The request exceeded the configured timeout.
    Timeout,
    /// The server refused the request but said why (4xx with a body).
    /// The body goes to the provider, which decides what the refusal means.
    Rejected { status: u16, body: String },
    /// Transport or HTTP-level failure.
    Failed(String),
    /// The dispatcher shut down before the fetch started.
    Cancelled,
}

impl Outcome {
    /// The response body, if this outcome carries one.
    pub fn body(&self) -> Option<&str> {
        match self {
            Self::Fetched(body) | Self::Cached(body) | Self::Rejected { body, .. } => Some(body),
            Self::Timeout | Self::Failed(_) | Self::Cancelled => None,
        }
    }

    pub fn is_cached(&self) -> bool {
        matches!(self, Self::Cached(_))
    }
}

/// The recorded outcome for one target of a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub url: String,
    pub outcome: Outcome,
}

impl Response {
    pub fn new(url: impl Into<String>, outcome: Outcome) -> Self {
        Self {
            url: url.into(),
            outcome,
        }
    }
}

/// A successfully fetched `(url, body)` pair handed to provider parsers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page<'a> {
    pub url: &'a str,
    pub body: &'a str,
}

/// One provider's unit of fetch work.
pub struct Job {
    provider: Arc<dyn MetadataProvider>,
    query: Arc<Query>,
    targets: Vec<String>,
    responses: Vec<Response>,
    record: Option<Record>,
    retries_remaining: u32,
    backoff: Duration,
    done: bool,
}

impl Job {
    /// Create a job with the full retry budget of `query`.
    pub fn new(
        provider: Arc<dyn MetadataProvider>,
        query: Arc<Query>,
        targets: Vec<String>,
    ) -> Self {
        let retries_remaining = query.retries();
        Self {
            provider,
            query,
            targets,
            responses: Vec::new(),
            record: None,
            retries_remaining,
            backoff: Duration::ZERO,
            done: false,
        }
    }

    /// Create a job for a multi-step lookup, inheriting the remaining budget.
    pub fn follow_up(&self, targets: Vec<String>) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
            query: Arc::clone(&self.query),
            targets,
            responses: Vec::new(),
            record: None,
            retries_remaining: self.retries_remaining,
            backoff: Duration::ZERO,
            done: false,
        }
    }

    pub fn key(&self) -> JobKey {
        JobKey::new(self.provider.name(), self.targets.clone())
    }

    pub fn provider(&self) -> &Arc<dyn MetadataProvider> {
        &self.provider
    }

    pub fn query(&self) -> &Arc<Query> {
        &self.query
    }

    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    pub fn responses(&self) -> &[Response] {
        &self.responses
    }

    pub(crate) fn set_responses(&mut self, responses: Vec<Response>) {
        self.responses = responses;
    }

    /// `true` when every target has a body, fetched, cached or rejected.
    pub fn is_usable(&self) -> bool {
        self.responses.len() == self.targets.len()
            && !self.responses.is_empty()
            && self.responses.iter().all(|r| r.outcome.body().is_some())
    }

    /// The fetched pages in target order, or `None` if any target failed.
    pub fn pages(&self) -> Option<Vec<Page<'_>>> {
        if !self.is_usable() {
            return None;
        }
        self.responses
            .iter()
            .map(|r| {
                r.outcome.body().map(|body| Page {
                    url: &r.url,
                    body,
                })
            })
            .collect()
    }

    pub fn retries_remaining(&self) -> u32 {
        self.retries_remaining
    }

    /// Retries spent relative to the query's budget.
    pub fn retries_consumed(&self) -> u32 {
        self.query.retries().saturating_sub(self.retries_remaining)
    }

    /// Spend one retry.
    ///
    /// Returns `true` if budget is left for another attempt. The counter
    /// never goes below zero.
    pub fn consume_retry(&mut self) -> bool {
        self.retries_remaining = self.retries_remaining.saturating_sub(1);
        self.retries_remaining > 0
    }

    /// Delay the dispatcher waits before fetching this job again.
    pub fn backoff(&self) -> Duration {
        self.backoff
    }

    pub(crate) fn set_backoff(&mut self, backoff: Duration) {
        self.backoff = backoff;
    }

    /// Clear the previous attempt's outcomes before resubmitting.
    pub(crate) fn reset_responses(&mut self) {
        self.responses.clear();
    }

    /// Mark the job finished with an optional record.
    pub fn finish(&mut self, record: Option<Record>) {
        debug_assert!(!self.done, "job finished twice");
        self.record = record;
        self.done = true;
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn record(&self) -> Option<&Record> {
        self.record.as_ref()
    }

    /// Fold a finished job into its immutable result.
    pub fn into_result(self) -> MetadataResult {
        MetadataResult {
            provider: self.provider.name().to_string(),
            priority: self.provider.priority(),
            retries: self.retries_consumed(),
            query: self.query,
            record: self.record,
        }
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("provider", &self.provider.name())
            .field("targets", &self.targets)
            .field("responses", &self.responses)
            .field("retries_remaining", &self.retries_remaining)
            .field("done", &self.done)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::testing::StaticProvider;
    use hugin_common::SubjectType;

    fn job(retries: u32) -> Job {
        let query = Query::builder(SubjectType::Movie)
            .title("Sin City")
            .retries(retries)
            .build()
            .unwrap();
        Job::new(
            Arc::new(StaticProvider::new("stub", 50)),
            Arc::new(query),
            vec!["http://a/1".into(), "http://a/2".into()],
        )
    }

    #[test]
    fn retries_never_go_negative() {
        let mut job = job(2);
        assert_eq!(job.retries_remaining(), 2);
        assert!(job.consume_retry());
        assert_eq!(job.retries_remaining(), 1);
        assert!(!job.consume_retry());
        assert_eq!(job.retries_remaining(), 0);
        assert!(!job.consume_retry());
        assert_eq!(job.retries_remaining(), 0);
        assert_eq!(job.retries_consumed(), 2);
    }

    #[test]
    fn follow_up_inherits_budget_and_provider() {
        let mut parent = job(5);
        parent.consume_retry();
        let child = parent.follow_up(vec!["http://a/detail".into()]);

        assert_eq!(child.retries_remaining(), 4);
        assert_eq!(child.provider().name(), "stub");
        assert_eq!(child.targets(), ["http://a/detail".to_string()]);
        assert!(!child.is_done());
    }

    #[test]
    fn usable_only_when_every_target_has_a_body() {
        let mut job = job(5);
        assert!(!job.is_usable());
        assert!(job.pages().is_none());

        job.set_responses(vec![
            Response::new("http://a/1", Outcome::Fetched("one".into())),
            Response::new("http://a/2", Outcome::Timeout),
        ]);
        assert!(!job.is_usable());

        job.set_responses(vec![
            Response::new("http://a/1", Outcome::Fetched("one".into())),
            Response::new("http://a/2", Outcome::Cached("two".into())),
        ]);
        let pages = job.pages().unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[1], Page { url: "http://a/2", body: "two" });

        job.set_responses(vec![
            Response::new("http://a/1", Outcome::Fetched("one".into())),
            Response::new(
                "http://a/2",
                Outcome::Rejected {
                    status: 404,
                    body: "gone".into(),
                },
            ),
        ]);
        assert!(job.is_usable());
        assert_eq!(job.pages().unwrap()[1].body, "gone");
    }

    #[test]
    fn key_includes_provider_and_order() {
        let a = job(5);
        let query = Arc::clone(a.query());
        let other_provider = Job::new(
            Arc::new(StaticProvider::new("other", 50)),
            Arc::clone(&query),
            a.targets().to_vec(),
        );
        let reversed = Job::new(
            Arc::clone(a.provider()),
            query,
            a.targets().iter().rev().cloned().collect(),
        );

        assert_eq!(a.key(), a.follow_up(a.targets().to_vec()).key());
        assert_ne!(a.key(), other_provider.key());
        assert_ne!(a.key(), reversed.key());
    }

    #[test]
    fn into_result_carries_retries_and_record() {
        let mut job = job(5);
        job.consume_retry();
        job.finish(Some(Record::titled("Sin City")));

        let result = job.into_result();
        assert_eq!(result.provider, "stub");
        assert_eq!(result.priority, 50);
        assert_eq!(result.retries, 1);
        assert_eq!(result.record.unwrap().title.as_deref(), Some("Sin City"));
    }
}

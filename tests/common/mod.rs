//! Shared test harness for integration tests.
//!
//! Provides [`ScriptedFetcher`] (canned bodies per URL, no network) and
//! [`ScriptedProvider`] (a provider whose targets and parser are supplied
//! by the test), plus [`session_with`] to wire them into a [`Session`].

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use hugin::cache::Cache;
use hugin::download::{FetchError, Fetcher, Page};
use hugin::metadata::{MetadataProvider, ParseOutcome, ProviderRegistry, Record};
use hugin::session::{Session, SessionSettings};
use hugin_common::{Query, SubjectType};

/// Serves canned bodies per URL and counts calls.
///
/// A URL's script is consumed in order and its last entry repeats. Unknown
/// URLs fail with a transport error.
#[derive(Default)]
pub struct ScriptedFetcher {
    scripts: Mutex<HashMap<String, Vec<Result<String, FetchError>>>>,
    calls: Mutex<HashMap<String, usize>>,
    delay: Duration,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn route(self, url: &str, body: &str) -> Self {
        self.script(url, vec![Ok(body.to_string())])
    }

    pub fn script(self, url: &str, script: Vec<Result<String, FetchError>>) -> Self {
        self.scripts.lock().insert(url.to_string(), script);
        self
    }

    pub fn calls(&self, url: &str) -> usize {
        self.calls.lock().get(url).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().values().sum()
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let call = {
            let mut calls = self.calls.lock();
            let count = calls.entry(url.to_string()).or_insert(0);
            *count += 1;
            *count
        };

        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        let scripts = self.scripts.lock();
        match scripts.get(url) {
            Some(script) if !script.is_empty() => script[(call - 1).min(script.len() - 1)].clone(),
            _ => Err(FetchError::Transport(format!("no route for {url}"))),
        }
    }
}

type Parser = Box<dyn Fn(&[Page<'_>], &Query) -> ParseOutcome + Send + Sync>;

/// Provider whose first-job targets and parser are set by the test.
pub struct ScriptedProvider {
    name: &'static str,
    priority: i32,
    subject: SubjectType,
    targets: Vec<String>,
    parser: Parser,
}

impl ScriptedProvider {
    pub fn new<F>(name: &'static str, priority: i32, targets: &[&str], parser: F) -> Self
    where
        F: Fn(&[Page<'_>], &Query) -> ParseOutcome + Send + Sync + 'static,
    {
        Self {
            name,
            priority,
            subject: SubjectType::Movie,
            targets: targets.iter().map(|t| t.to_string()).collect(),
            parser: Box::new(parser),
        }
    }

    /// Every page's body becomes the title of a found record.
    pub fn echo(name: &'static str, priority: i32, url: &str) -> Self {
        Self::new(name, priority, &[url], |pages, _| {
            ParseOutcome::Found(Record::titled(pages[0].body))
        })
    }
}

impl MetadataProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn subject(&self) -> SubjectType {
        self.subject
    }

    fn supported_fields(&self) -> &'static [&'static str] {
        &["title"]
    }

    fn build_targets(&self, _query: &Query) -> Option<Vec<String>> {
        Some(self.targets.clone())
    }

    fn parse(&self, pages: &[Page<'_>], query: &Query) -> ParseOutcome {
        (self.parser)(pages, query)
    }
}

/// Settings without backoff so retry tests run fast.
pub fn fast_settings(workers: usize) -> SessionSettings {
    SessionSettings {
        workers,
        timeout: Duration::from_secs(2),
        retry_backoff: Duration::ZERO,
    }
}

/// Session over the given fetcher, providers, and cache.
pub fn session_with(
    fetcher: Arc<ScriptedFetcher>,
    providers: Vec<ScriptedProvider>,
    cache: Option<Arc<dyn Cache>>,
    workers: usize,
) -> Session {
    let mut registry = ProviderRegistry::new();
    for provider in providers {
        registry.register(Arc::new(provider));
    }
    Session::new(registry, fetcher, cache, fast_settings(workers))
}

pub fn movie(title: &str) -> Query {
    Query::builder(SubjectType::Movie)
        .title(title)
        .build()
        .unwrap()
}

//! Scripted fetcher for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{FetchError, Fetcher};

/// Serves canned bodies per URL, counting calls and peak concurrency.
///
/// Each URL may carry a script of results consumed in order; the last entry
/// repeats once the script runs out. Unknown URLs fail with a transport
/// error.
#[derive(Default)]
pub(crate) struct StubFetcher {
    scripts: Mutex<HashMap<String, Vec<Result<String, FetchError>>>>,
    calls: Mutex<HashMap<String, usize>>,
    delay: Duration,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl StubFetcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn route(self, url: &str, body: &str) -> Self {
        self.script(url, vec![Ok(body.to_string())])
    }

    pub(crate) fn script(self, url: &str, script: Vec<Result<String, FetchError>>) -> Self {
        self.scripts.lock().insert(url.to_string(), script);
        self
    }

    pub(crate) fn calls(&self, url: &str) -> usize {
        self.calls.lock().get(url).copied().unwrap_or(0)
    }

    pub(crate) fn total_calls(&self) -> usize {
        self.calls.lock().values().sum()
    }

    pub(crate) fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for StubFetcher {
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
            Some(script) if !script.is_empty() => {
                let idx = (call - 1).min(script.len() - 1);
                script[idx].clone()
            }
            _ => Err(FetchError::Transport(format!("no route for {url}"))),
        }
    }
}

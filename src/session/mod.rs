//! Public entry point for running metadata queries.
//!
//! A [`Session`] owns the provider registry, the network fetcher, and the
//! optional response cache. Each submitted query gets its own
//! [`Dispatcher`] and [`Orchestrator`]; only the cache is shared between
//! queries.
//!
//! # Module layout
//!
//! - [`orchestrator`] -- The per-query fetch/parse/retry loop.
//! - [`select`] -- Ranking and reduction of finished results.

pub mod orchestrator;
pub mod select;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hugin_common::{Error, Query, Result};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cache::{Cache, FileCache};
use crate::config::Config;
use crate::download::{Dispatcher, Fetcher, HttpFetcher, DEFAULT_TIMEOUT};
use crate::metadata::providers::{OmdbMovieProvider, TmdbMovieProvider, TmdbPersonProvider};
use crate::metadata::{MetadataResult, ProviderRegistry};

pub use orchestrator::{backoff_for, Orchestrator, MAX_BACKOFF};
pub use select::{rank, select};

/// Tunables shared by every query of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    /// Concurrent fetches per query, capped at 10 by the dispatcher.
    pub workers: usize,
    /// Per-fetch timeout.
    pub timeout: Duration,
    /// Base delay for exponential retry backoff; zero disables it.
    pub retry_backoff: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            workers: 4,
            timeout: DEFAULT_TIMEOUT,
            retry_backoff: Duration::ZERO,
        }
    }
}

/// Long-lived handle that runs queries against the registered providers.
pub struct Session {
    registry: ProviderRegistry,
    fetcher: Arc<dyn Fetcher>,
    cache: Option<Arc<dyn Cache>>,
    settings: SessionSettings,
    cancel: CancellationToken,
    closed: AtomicBool,
    /// Held shared by running queries, exclusively by `clean_up`.
    active: RwLock<()>,
}

impl Session {
    pub fn new(
        registry: ProviderRegistry,
        fetcher: Arc<dyn Fetcher>,
        cache: Option<Arc<dyn Cache>>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            registry,
            fetcher,
            cache,
            settings,
            cancel: CancellationToken::new(),
            closed: AtomicBool::new(false),
            active: RwLock::new(()),
        }
    }

    /// Build a session with the bundled providers, an HTTP fetcher, and the
    /// configured cache.
    pub fn from_config(config: &Config) -> Result<Self> {
        let fetcher = HttpFetcher::new(
            Duration::from_secs(config.session.timeout_secs),
            &config.session.user_agent,
        )?;

        let cache: Option<Arc<dyn Cache>> = if config.cache.enabled {
            let path = PathBuf::from(shellexpand::tilde(&config.cache.path).as_ref());
            Some(Arc::new(FileCache::open(path)?))
        } else {
            None
        };

        let settings = SessionSettings {
            workers: config.session.workers,
            timeout: Duration::from_secs(config.session.timeout_secs),
            retry_backoff: Duration::from_millis(config.session.retry_backoff_ms),
        };

        Ok(Self::new(
            bundled_providers(config),
            Arc::new(fetcher),
            cache,
            settings,
        ))
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Names of every registered provider, in registration order.
    pub fn provider_names(&self) -> Vec<&'static str> {
        self.registry.all().iter().map(|p| p.name()).collect()
    }

    pub fn settings(&self) -> SessionSettings {
        self.settings
    }

    /// Run `query` and return the selected results.
    ///
    /// A query that finds nothing returns an empty list, not an error. If
    /// the session was cancelled before the query began, the session is
    /// cleaned up and [`Error::Cancelled`] is returned.
    pub async fn submit(&self, query: Query) -> Result<Vec<MetadataResult>> {
        let query = Arc::new(query);
        let results = self.collect(Arc::clone(&query)).await?;
        let selected = select(results, &query);
        debug!(selected = selected.len(), "Results selected");
        Ok(selected)
    }

    /// Run `query` and return one unranked result per finished job,
    /// including jobs that found nothing.
    pub async fn collect(&self, query: Arc<Query>) -> Result<Vec<MetadataResult>> {
        if self.cancel.is_cancelled() {
            info!("Session cancelled; cleaning up instead of querying");
            self.clean_up().await?;
            return Err(Error::Cancelled);
        }
        if self.is_closed() {
            return Err(Error::Closed);
        }

        let _running = self.active.read().await;
        // clean_up may have won the race for the lock.
        if self.is_closed() {
            return Err(Error::Closed);
        }

        let providers = self.registry.eligible(&query);
        info!(
            subject = %query.subject(),
            reference = query.reference_text().unwrap_or_default(),
            providers = providers.len(),
            strategy = %query.strategy(),
            "Running query"
        );

        let cache = if query.cache_enabled() {
            self.cache.clone()
        } else {
            None
        };
        let dispatcher = Dispatcher::new(
            Arc::clone(&self.fetcher),
            cache.clone(),
            self.settings.workers,
            self.settings.timeout,
        );
        let orchestrator = Orchestrator::new(
            dispatcher,
            cache,
            self.settings.retry_backoff,
            self.cancel.child_token(),
        );

        Ok(orchestrator.run(query, &providers).await)
    }

    /// Run [`submit`](Self::submit) on the tokio runtime.
    pub fn submit_async(self: &Arc<Self>, query: Query) -> JoinHandle<Result<Vec<MetadataResult>>> {
        let session = Arc::clone(self);
        tokio::spawn(async move { session.submit(query).await })
    }

    /// Ask running and future queries to stop.
    ///
    /// Running queries drop queued work, let in-flight fetches finish, and
    /// return what they have. Later submissions fail with
    /// [`Error::Cancelled`].
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Wait for running queries, then close the cache.
    ///
    /// Safe to call more than once; only the first call does any work.
    pub async fn clean_up(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let _exclusive = self.active.write().await;
        if let Some(cache) = &self.cache {
            cache.close()?;
        }
        info!("Session cleaned up");
        Ok(())
    }
}

/// Registry with every bundled provider the configuration enables.
///
/// Providers without an API key are still registered so they can be
/// listed, but report themselves unavailable.
pub fn bundled_providers(config: &Config) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    let tmdb = &config.providers.tmdb;
    if tmdb.enabled {
        registry.register(Arc::new(TmdbMovieProvider::new(
            tmdb.api_key.clone(),
            tmdb.language.clone(),
        )));
        registry.register(Arc::new(TmdbPersonProvider::new(
            tmdb.api_key.clone(),
            tmdb.language.clone(),
        )));
    }
    let omdb = &config.providers.omdb;
    if omdb.enabled {
        registry.register(Arc::new(OmdbMovieProvider::new(omdb.api_key.clone())));
    }
    registry
}

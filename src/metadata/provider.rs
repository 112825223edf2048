//! Trait definition and types for metadata providers.
//!
//! This module defines the [`MetadataProvider`] trait that every source
//! adapter (TMDB, OMDb, ...) implements, along with the record and result
//! types that flow out of a query.
//!
//! Providers never perform I/O themselves. They translate a [`Query`] into
//! fetch targets and translate fetched pages back into a [`ParseOutcome`];
//! the session drives the network in between.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use hugin_common::{Query, SubjectType};
use serde::{Deserialize, Serialize};

use crate::download::Page;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Provider-agnostic metadata for a movie or a person.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Localised movie title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Original-language title, if different from `title`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_title: Option<String>,
    /// Release year.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<u16>,
    /// IMDb id (`tt...` for movies, `nm...` for people).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imdb_id: Option<String>,
    /// Person name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Synopsis or biography.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overview: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub genres: Vec<String>,
    /// Community rating, typically 0.0 - 10.0.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_minutes: Option<u32>,
    /// External ids keyed by provider (`{"tmdb": "187"}`).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub provider_ids: HashMap<String, String>,
    /// Provider-specific fields without a dedicated slot.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Record {
    /// A movie record with only a title set.
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    /// A person record with only a name set.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// The text compared against the query when ranking.
    pub fn display_text(&self) -> Option<&str> {
        self.title.as_deref().or(self.name.as_deref())
    }
}

// ---------------------------------------------------------------------------
// Parse outcomes
// ---------------------------------------------------------------------------

/// What a provider made of a set of fetched pages.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    /// A final record.
    Found(Record),
    /// The source definitively has nothing for this query.
    NotFound,
    /// More pages are needed; each inner list becomes a new job.
    FollowUp(Vec<Vec<String>>),
    /// The response was not usable yet; retry the same targets.
    Retry,
    /// The response is unrecoverable; give up without retrying.
    Failed(String),
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// A finished job: which provider answered what, and at what cost.
#[derive(Debug, Clone, Serialize)]
pub struct MetadataResult {
    /// Name of the provider that produced this result.
    pub provider: String,
    /// Static priority of that provider.
    pub priority: i32,
    /// The query this result answers.
    #[serde(skip)]
    pub query: Arc<Query>,
    /// The decoded record, `None` when nothing was found.
    pub record: Option<Record>,
    /// Number of retries consumed before the job finished.
    pub retries: u32,
}

// ---------------------------------------------------------------------------
// Provider trait
// ---------------------------------------------------------------------------

/// Contract every metadata source adapter implements.
///
/// Providers are shared across queries and tasks behind an `Arc`, so they
/// must be `Send + Sync` and should keep no per-query state.
pub trait MetadataProvider: Send + Sync {
    /// Short, lowercase identifier (e.g. `"tmdb-movie"`).
    fn name(&self) -> &'static str;

    /// Static ordering signal; higher wins in deep selection.
    fn priority(&self) -> i32;

    /// The kind of entity this provider looks up.
    fn subject(&self) -> SubjectType;

    /// Query fields this provider can search by, for categorisation only.
    fn supported_fields(&self) -> &'static [&'static str];

    /// Returns `true` when the provider is configured and ready.
    fn is_available(&self) -> bool {
        true
    }

    /// Translate a query into the targets of its first job.
    ///
    /// `None` means the provider cannot serve this query (e.g. it cannot
    /// search by the given field), which is not an error.
    fn build_targets(&self, query: &Query) -> Option<Vec<String>>;

    /// Interpret the pages fetched for one job.
    fn parse(&self, pages: &[Page<'_>], query: &Query) -> ParseOutcome;
}

//! Validated metadata search requests.
//!
//! A [`Query`] is immutable once built. All field-combination checks happen
//! in [`QueryBuilder::build`], so an invalid request is rejected before any
//! provider is asked for targets.

use serde::{Deserialize, Serialize};

use crate::{Error, Result, Strategy, SubjectType};

/// Default retry budget for each job spawned by a query.
pub const DEFAULT_RETRIES: u32 = 5;

/// Default number of results returned by a query.
pub const DEFAULT_AMOUNT: usize = 3;

/// Default query language.
pub const DEFAULT_LANGUAGE: &str = "en";

/// An immutable search request for a movie or a person.
///
/// Deserialization goes through [`QueryBuilder::build`], so serialized
/// queries are held to the same rules as built ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "QueryBuilder")]
pub struct Query {
    subject: SubjectType,
    title: Option<String>,
    imdb_id: Option<String>,
    year: Option<u16>,
    name: Option<String>,
    language: String,
    retries: u32,
    amount: usize,
    providers: Option<Vec<String>>,
    strategy: Strategy,
    cache: bool,
}

impl Query {
    /// Start building a query for the given subject type.
    pub fn builder(subject: SubjectType) -> QueryBuilder {
        QueryBuilder::new(subject)
    }

    pub fn subject(&self) -> SubjectType {
        self.subject
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// IMDb-style external id (`tt0401792`).
    pub fn imdb_id(&self) -> Option<&str> {
        self.imdb_id.as_deref()
    }

    pub fn year(&self) -> Option<u16> {
        self.year
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// Retry budget copied into every job created for this query.
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Maximum number of results after selection.
    pub fn amount(&self) -> usize {
        self.amount
    }

    /// Provider allow-list, `None` meaning every provider.
    pub fn providers(&self) -> Option<&[String]> {
        self.providers.as_deref()
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Whether the response cache may be consulted and updated.
    pub fn cache_enabled(&self) -> bool {
        self.cache
    }

    /// Returns `true` if the provider name passes the allow-list.
    ///
    /// Matching is case-insensitive.
    pub fn allows_provider(&self, provider: &str) -> bool {
        match &self.providers {
            None => true,
            Some(list) => list.iter().any(|p| p.eq_ignore_ascii_case(provider)),
        }
    }

    /// The text results are compared against when ranking.
    ///
    /// Movies rank against the title, people against the name.
    pub fn reference_text(&self) -> Option<&str> {
        match self.subject {
            SubjectType::Movie => self.title(),
            SubjectType::Person => self.name(),
        }
    }
}

/// Builder for [`Query`].
#[derive(Debug, Clone, Deserialize)]
pub struct QueryBuilder {
    subject: SubjectType,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    imdb_id: Option<String>,
    #[serde(default)]
    year: Option<u16>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default = "default_language")]
    language: String,
    #[serde(default = "default_retries")]
    retries: u32,
    #[serde(default = "default_amount")]
    amount: usize,
    #[serde(default)]
    providers: Option<Vec<String>>,
    #[serde(default)]
    strategy: Strategy,
    #[serde(default = "default_cache")]
    cache: bool,
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}
fn default_retries() -> u32 {
    DEFAULT_RETRIES
}
fn default_amount() -> usize {
    DEFAULT_AMOUNT
}
fn default_cache() -> bool {
    true
}

impl TryFrom<QueryBuilder> for Query {
    type Error = Error;

    fn try_from(builder: QueryBuilder) -> Result<Self> {
        builder.build()
    }
}

impl QueryBuilder {
    fn new(subject: SubjectType) -> Self {
        Self {
            subject,
            title: None,
            imdb_id: None,
            year: None,
            name: None,
            language: default_language(),
            retries: default_retries(),
            amount: default_amount(),
            providers: None,
            strategy: Strategy::default(),
            cache: default_cache(),
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn imdb_id(mut self, imdb_id: impl Into<String>) -> Self {
        self.imdb_id = Some(imdb_id.into());
        self
    }

    pub fn year(mut self, year: u16) -> Self {
        self.year = Some(year);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn amount(mut self, amount: usize) -> Self {
        self.amount = amount;
        self
    }

    pub fn providers<I, S>(mut self, providers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.providers = Some(providers.into_iter().map(Into::into).collect());
        self
    }

    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn cache(mut self, enabled: bool) -> Self {
        self.cache = enabled;
        self
    }

    /// Validate the field combination and produce an immutable [`Query`].
    pub fn build(self) -> Result<Query> {
        let title = non_blank(self.title);
        let imdb_id = non_blank(self.imdb_id);
        let name = non_blank(self.name);

        let has_movie_fields = title.is_some() || imdb_id.is_some();
        match self.subject {
            SubjectType::Movie => {
                if name.is_some() {
                    return Err(Error::invalid_query(
                        "a movie query cannot carry a person name",
                    ));
                }
                if !has_movie_fields {
                    return Err(Error::invalid_query(
                        "a movie query needs a title or an imdb id",
                    ));
                }
            }
            SubjectType::Person => {
                if has_movie_fields {
                    return Err(Error::invalid_query(
                        "a person query cannot carry a title or an imdb id",
                    ));
                }
                if name.is_none() {
                    return Err(Error::invalid_query("a person query needs a name"));
                }
                if self.year.is_some() {
                    return Err(Error::invalid_query("a person query cannot carry a year"));
                }
            }
        }

        if let Some(ref id) = imdb_id {
            if !is_imdb_id(id) {
                return Err(Error::invalid_query(format!("'{id}' is not an imdb id")));
            }
        }

        if self.retries == 0 {
            return Err(Error::invalid_query("retries must be at least 1"));
        }
        if self.amount == 0 {
            return Err(Error::invalid_query("amount must be at least 1"));
        }
        if self.language.trim().is_empty() {
            return Err(Error::invalid_query("language cannot be empty"));
        }

        let providers = self.providers.map(|list| {
            list.into_iter()
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect::<Vec<_>>()
        });

        Ok(Query {
            subject: self.subject,
            title,
            imdb_id,
            year: self.year,
            name,
            language: self.language,
            retries: self.retries,
            amount: self.amount,
            providers,
            strategy: self.strategy,
            cache: self.cache,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// `tt` followed by at least seven digits.
fn is_imdb_id(id: &str) -> bool {
    id.strip_prefix("tt")
        .map(|digits| digits.len() >= 7 && digits.bytes().all(|b| b.is_ascii_digit()))
        .unwrap_or(false)
}

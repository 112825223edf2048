//! TMDB (The Movie Database) metadata providers.
//!
//! Two providers share one API client configuration:
//! - [`TmdbMovieProvider`]: `/search/movie` (or `/find/{imdb_id}`) followed
//!   by a detail job that fetches `/movie/{id}` and `/movie/{id}/credits`
//!   together.
//! - [`TmdbPersonProvider`]: `/search/person` followed by `/person/{id}`.
//!
//! Both report themselves unavailable without an API key.

use hugin_common::{Query, SubjectType};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{parse_year, url_path, with_params};
use crate::download::Page;
use crate::metadata::provider::{MetadataProvider, ParseOutcome, Record};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Public TMDB v3 endpoint.
pub const TMDB_BASE_URL: &str = "https://api.themoviedb.org/3";

const PRIORITY: i32 = 90;

/// Cast members kept in a movie record.
const MAX_CAST: usize = 10;

/// TMDB `status_code` for "request count over limit".
const STATUS_RATE_LIMITED: u32 = 25;
/// TMDB `status_code` for "the resource you requested could not be found".
const STATUS_NOT_FOUND: u32 = 34;

// ---------------------------------------------------------------------------
// TMDB API response types (private)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TmdbSearchResponse<T> {
    results: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct TmdbFindResponse {
    #[serde(default)]
    movie_results: Vec<TmdbSearchHit>,
}

#[derive(Debug, Deserialize)]
struct TmdbSearchHit {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct TmdbMovieDetail {
    id: u64,
    title: Option<String>,
    original_title: Option<String>,
    overview: Option<String>,
    release_date: Option<String>,
    vote_average: Option<f64>,
    runtime: Option<u32>,
    genres: Option<Vec<TmdbGenre>>,
    imdb_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TmdbGenre {
    name: String,
}

#[derive(Debug, Deserialize)]
struct TmdbCredits {
    #[serde(default)]
    cast: Vec<TmdbCastMember>,
    #[serde(default)]
    crew: Vec<TmdbCrewMember>,
}

#[derive(Debug, Deserialize)]
struct TmdbCastMember {
    name: String,
}

#[derive(Debug, Deserialize)]
struct TmdbCrewMember {
    name: String,
    job: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TmdbPersonDetail {
    id: u64,
    name: Option<String>,
    biography: Option<String>,
    birthday: Option<String>,
    place_of_birth: Option<String>,
    known_for_department: Option<String>,
    imdb_id: Option<String>,
}

/// Error object TMDB returns instead of the expected payload.
#[derive(Debug, Deserialize)]
struct TmdbStatus {
    status_code: u32,
    status_message: Option<String>,
}

// ---------------------------------------------------------------------------
// Shared API configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct TmdbApi {
    api_key: String,
    language: Option<String>,
    base_url: String,
}

impl TmdbApi {
    fn new(api_key: String, language: Option<String>) -> Self {
        Self {
            api_key,
            language,
            base_url: TMDB_BASE_URL.to_string(),
        }
    }

    /// Build a full API URL with the API key and language query parameters.
    ///
    /// A configured provider language wins over the query's language.
    fn url(&self, path: &str, query: &Query, extra_params: &[(&str, &str)]) -> String {
        let language = self.language.as_deref().unwrap_or(query.language());
        let url = format!("{}{path}?api_key={}", self.base_url, self.api_key);
        let mut params = vec![("language", language)];
        params.extend_from_slice(extra_params);
        with_params(url, &params)
    }
}

/// Turn a body that failed to decode into an outcome.
///
/// TMDB answers with a `{status_code, status_message}` object on errors;
/// rate limiting is worth a retry, a missing resource is a definitive miss,
/// anything else is unrecoverable.
fn error_outcome(body: &str, err: serde_json::Error) -> ParseOutcome {
    match serde_json::from_str::<TmdbStatus>(body) {
        Ok(status) if status.status_code == STATUS_RATE_LIMITED => ParseOutcome::Retry,
        Ok(status) if status.status_code == STATUS_NOT_FOUND => ParseOutcome::NotFound,
        Ok(status) => ParseOutcome::Failed(format!(
            "TMDB status {}: {}",
            status.status_code,
            status.status_message.unwrap_or_default()
        )),
        Err(_) => ParseOutcome::Failed(format!("malformed TMDB response: {err}")),
    }
}

fn decode<'de, T: Deserialize<'de>>(body: &'de str) -> Result<T, ParseOutcome> {
    serde_json::from_str(body).map_err(|err| error_outcome(body, err))
}

// ---------------------------------------------------------------------------
// Movie provider
// ---------------------------------------------------------------------------

/// TMDB movie lookup by title (and year) or by IMDb id.
///
/// # Examples
///
/// ```no_run
/// use hugin::metadata::providers::TmdbMovieProvider;
///
/// let provider = TmdbMovieProvider::new("your-api-key".into(), None);
/// ```
#[derive(Debug, Clone)]
pub struct TmdbMovieProvider {
    api: TmdbApi,
}

impl TmdbMovieProvider {
    /// Create a provider. `language` overrides the query language when set.
    pub fn new(api_key: String, language: Option<String>) -> Self {
        Self {
            api: TmdbApi::new(api_key, language),
        }
    }

    /// Point the provider at a different API root (mirrors, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.api.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn detail_targets(&self, id: u64, query: &Query) -> Vec<String> {
        vec![
            self.api.url(&format!("/movie/{id}"), query, &[]),
            self.api.url(&format!("/movie/{id}/credits"), query, &[]),
        ]
    }

    fn follow_up(&self, hits: Vec<TmdbSearchHit>, query: &Query) -> ParseOutcome {
        if hits.is_empty() {
            return ParseOutcome::NotFound;
        }
        let jobs = hits
            .into_iter()
            .take(query.amount())
            .map(|hit| self.detail_targets(hit.id, query))
            .collect();
        ParseOutcome::FollowUp(jobs)
    }

    fn parse_detail(&self, pages: &[Page<'_>]) -> Result<Record, ParseOutcome> {
        let detail: TmdbMovieDetail = decode(pages[0].body)?;
        let credits = match pages.get(1) {
            Some(page) => Some(decode::<TmdbCredits>(page.body)?),
            None => None,
        };

        let mut record = Record {
            title: detail.title,
            original_title: detail.original_title,
            year: parse_year(detail.release_date.as_deref()),
            imdb_id: detail.imdb_id.filter(|id| !id.is_empty()),
            overview: detail.overview.filter(|o| !o.is_empty()),
            genres: detail
                .genres
                .unwrap_or_default()
                .into_iter()
                .map(|g| g.name)
                .collect(),
            rating: detail.vote_average,
            runtime_minutes: detail.runtime.filter(|&r| r > 0),
            ..Record::default()
        };
        record
            .provider_ids
            .insert("tmdb".to_string(), detail.id.to_string());

        if let Some(credits) = credits {
            let directors: Vec<String> = credits
                .crew
                .into_iter()
                .filter(|c| c.job.as_deref() == Some("Director"))
                .map(|c| c.name)
                .collect();
            let cast: Vec<String> = credits
                .cast
                .into_iter()
                .take(MAX_CAST)
                .map(|c| c.name)
                .collect();
            if !directors.is_empty() {
                record.extra.insert("directors".into(), json!(directors));
            }
            if !cast.is_empty() {
                record.extra.insert("cast".into(), json!(cast));
            }
        }

        Ok(record)
    }
}

impl MetadataProvider for TmdbMovieProvider {
    fn name(&self) -> &'static str {
        "tmdb-movie"
    }

    fn priority(&self) -> i32 {
        PRIORITY
    }

    fn subject(&self) -> SubjectType {
        SubjectType::Movie
    }

    fn supported_fields(&self) -> &'static [&'static str] {
        &["title", "year", "imdb_id"]
    }

    fn is_available(&self) -> bool {
        !self.api.api_key.is_empty()
    }

    fn build_targets(&self, query: &Query) -> Option<Vec<String>> {
        if let Some(imdb_id) = query.imdb_id() {
            let path = format!("/find/{imdb_id}");
            return Some(vec![self.api.url(
                &path,
                query,
                &[("external_source", "imdb_id")],
            )]);
        }

        let title = query.title()?;
        let year = query.year().map(|y| y.to_string());
        let mut params = vec![("query", title)];
        if let Some(ref y) = year {
            params.push(("year", y.as_str()));
        }
        Some(vec![self.api.url("/search/movie", query, &params)])
    }

    fn parse(&self, pages: &[Page<'_>], query: &Query) -> ParseOutcome {
        let Some(first) = pages.first() else {
            return ParseOutcome::Failed("no pages to parse".into());
        };
        let path = url_path(first.url);
        debug!(provider = self.name(), path = %path, pages = pages.len(), "Parsing TMDB pages");

        let outcome = if path.ends_with("/search/movie") {
            decode::<TmdbSearchResponse<TmdbSearchHit>>(first.body)
                .map(|resp| self.follow_up(resp.results, query))
        } else if path.contains("/find/") {
            decode::<TmdbFindResponse>(first.body)
                .map(|resp| self.follow_up(resp.movie_results, query))
        } else if path.contains("/movie/") {
            self.parse_detail(pages).map(ParseOutcome::Found)
        } else {
            Err(ParseOutcome::Failed(format!("unexpected TMDB page {path}")))
        };

        outcome.unwrap_or_else(|failure| failure)
    }
}

// ---------------------------------------------------------------------------
// Person provider
// ---------------------------------------------------------------------------

/// TMDB person lookup by name.
#[derive(Debug, Clone)]
pub struct TmdbPersonProvider {
    api: TmdbApi,
}

impl TmdbPersonProvider {
    pub fn new(api_key: String, language: Option<String>) -> Self {
        Self {
            api: TmdbApi::new(api_key, language),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.api.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn parse_person(body: &str) -> Result<Record, ParseOutcome> {
        let detail: TmdbPersonDetail = decode(body)?;

        let mut record = Record {
            name: detail.name,
            overview: detail.biography.filter(|b| !b.is_empty()),
            imdb_id: detail.imdb_id.filter(|id| !id.is_empty()),
            ..Record::default()
        };
        record
            .provider_ids
            .insert("tmdb".to_string(), detail.id.to_string());

        let extras = [
            ("birthday", detail.birthday),
            ("place_of_birth", detail.place_of_birth),
            ("known_for_department", detail.known_for_department),
        ];
        for (key, value) in extras {
            if let Some(value) = value.filter(|v| !v.is_empty()) {
                record.extra.insert(key.to_string(), json!(value));
            }
        }

        Ok(record)
    }
}

impl MetadataProvider for TmdbPersonProvider {
    fn name(&self) -> &'static str {
        "tmdb-person"
    }

    fn priority(&self) -> i32 {
        PRIORITY
    }

    fn subject(&self) -> SubjectType {
        SubjectType::Person
    }

    fn supported_fields(&self) -> &'static [&'static str] {
        &["name"]
    }

    fn is_available(&self) -> bool {
        !self.api.api_key.is_empty()
    }

    fn build_targets(&self, query: &Query) -> Option<Vec<String>> {
        let name = query.name()?;
        Some(vec![self.api.url("/search/person", query, &[("query", name)])])
    }

    fn parse(&self, pages: &[Page<'_>], query: &Query) -> ParseOutcome {
        let Some(first) = pages.first() else {
            return ParseOutcome::Failed("no pages to parse".into());
        };
        let path = url_path(first.url);

        let outcome = if path.ends_with("/search/person") {
            decode::<TmdbSearchResponse<TmdbSearchHit>>(first.body).map(|resp| {
                if resp.results.is_empty() {
                    return ParseOutcome::NotFound;
                }
                let jobs = resp
                    .results
                    .into_iter()
                    .take(query.amount())
                    .map(|hit| vec![self.api.url(&format!("/person/{}", hit.id), query, &[])])
                    .collect();
                ParseOutcome::FollowUp(jobs)
            })
        } else if path.contains("/person/") {
            Self::parse_person(first.body).map(ParseOutcome::Found)
        } else {
            Err(ParseOutcome::Failed(format!("unexpected TMDB page {path}")))
        };

        outcome.unwrap_or_else(|failure| failure)
    }
}

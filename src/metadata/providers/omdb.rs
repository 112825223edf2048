//! OMDb (Open Movie Database) metadata provider.
//!
//! IMDb ids resolve in a single `i=` lookup. Title queries run an `s=`
//! search first and follow up with one `i=` lookup per hit.

use hugin_common::{Query, SubjectType};
use serde::Deserialize;
use serde_json::json;

use super::{parse_year, query_param, with_params};
use crate::download::Page;
use crate::metadata::provider::{MetadataProvider, ParseOutcome, Record};

/// Public OMDb endpoint.
pub const OMDB_BASE_URL: &str = "https://www.omdbapi.com";

const PRIORITY: i32 = 80;

/// Placeholder OMDb uses for missing fields.
const NOT_AVAILABLE: &str = "N/A";

// ---------------------------------------------------------------------------
// OMDb API response types (private)
// ---------------------------------------------------------------------------

/// Every OMDb response carries `Response: "True" | "False"`.
#[derive(Debug, Deserialize)]
struct OmdbEnvelope {
    #[serde(rename = "Response")]
    response: String,
    #[serde(rename = "Error")]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OmdbSearch {
    #[serde(rename = "Search", default)]
    search: Vec<OmdbSearchHit>,
}

#[derive(Debug, Deserialize)]
struct OmdbSearchHit {
    #[serde(rename = "imdbID")]
    imdb_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OmdbMovie {
    title: Option<String>,
    year: Option<String>,
    runtime: Option<String>,
    genre: Option<String>,
    director: Option<String>,
    actors: Option<String>,
    plot: Option<String>,
    #[serde(rename = "imdbRating")]
    imdb_rating: Option<String>,
    #[serde(rename = "imdbID")]
    imdb_id: Option<String>,
}

/// `Some(value)` unless the field is empty or `"N/A"`.
fn available(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty() && v != NOT_AVAILABLE)
}

fn split_list(value: Option<String>) -> Vec<String> {
    available(value)
        .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Provider implementation
// ---------------------------------------------------------------------------

/// OMDb movie lookup by title (and year) or by IMDb id.
#[derive(Debug, Clone)]
pub struct OmdbMovieProvider {
    api_key: String,
    base_url: String,
}

impl OmdbMovieProvider {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            base_url: OMDB_BASE_URL.to_string(),
        }
    }

    /// Point the provider at a different API root (mirrors, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn url(&self, params: &[(&str, &str)]) -> String {
        with_params(format!("{}/?apikey={}", self.base_url, self.api_key), params)
    }

    fn lookup_url(&self, imdb_id: &str) -> String {
        self.url(&[("i", imdb_id), ("plot", "full")])
    }

    /// Check the `Response` envelope before decoding the payload.
    fn check_envelope(body: &str) -> Result<(), ParseOutcome> {
        let envelope: OmdbEnvelope = serde_json::from_str(body)
            .map_err(|e| ParseOutcome::Failed(format!("malformed OMDb response: {e}")))?;

        if envelope.response.eq_ignore_ascii_case("true") {
            return Ok(());
        }

        let error = envelope.error.unwrap_or_default();
        let lowered = error.to_ascii_lowercase();
        Err(if lowered.contains("not found") {
            ParseOutcome::NotFound
        } else if lowered.contains("limit") {
            ParseOutcome::Retry
        } else {
            ParseOutcome::Failed(format!("OMDb error: {error}"))
        })
    }

    fn parse_search(&self, body: &str, query: &Query) -> Result<ParseOutcome, ParseOutcome> {
        let search: OmdbSearch = serde_json::from_str(body)
            .map_err(|e| ParseOutcome::Failed(format!("malformed OMDb search: {e}")))?;

        let jobs: Vec<Vec<String>> = search
            .search
            .into_iter()
            .take(query.amount())
            .map(|hit| vec![self.lookup_url(&hit.imdb_id)])
            .collect();

        Ok(if jobs.is_empty() {
            ParseOutcome::NotFound
        } else {
            ParseOutcome::FollowUp(jobs)
        })
    }

    fn parse_movie(body: &str) -> Result<Record, ParseOutcome> {
        let movie: OmdbMovie = serde_json::from_str(body)
            .map_err(|e| ParseOutcome::Failed(format!("malformed OMDb movie: {e}")))?;

        let imdb_id = available(movie.imdb_id);
        let mut record = Record {
            title: available(movie.title),
            year: parse_year(movie.year.as_deref()),
            overview: available(movie.plot),
            genres: split_list(movie.genre),
            rating: available(movie.imdb_rating).and_then(|r| r.parse().ok()),
            runtime_minutes: available(movie.runtime)
                .and_then(|r| r.split_whitespace().next().and_then(|m| m.parse().ok())),
            imdb_id: imdb_id.clone(),
            ..Record::default()
        };
        if let Some(id) = imdb_id {
            record.provider_ids.insert("imdb".to_string(), id);
        }

        let directors = split_list(movie.director);
        if !directors.is_empty() {
            record.extra.insert("directors".into(), json!(directors));
        }
        let cast = split_list(movie.actors);
        if !cast.is_empty() {
            record.extra.insert("cast".into(), json!(cast));
        }

        Ok(record)
    }
}

impl MetadataProvider for OmdbMovieProvider {
    fn name(&self) -> &'static str {
        "omdb-movie"
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
        !self.api_key.is_empty()
    }

    fn build_targets(&self, query: &Query) -> Option<Vec<String>> {
        if let Some(imdb_id) = query.imdb_id() {
            return Some(vec![self.lookup_url(imdb_id)]);
        }

        let title = query.title()?;
        let year = query.year().map(|y| y.to_string());
        let mut params = vec![("s", title), ("type", "movie")];
        if let Some(ref y) = year {
            params.push(("y", y.as_str()));
        }
        Some(vec![self.url(&params)])
    }

    fn parse(&self, pages: &[Page<'_>], query: &Query) -> ParseOutcome {
        let Some(first) = pages.first() else {
            return ParseOutcome::Failed("no pages to parse".into());
        };
        if let Err(outcome) = Self::check_envelope(first.body) {
            return outcome;
        }

        let outcome = if query_param(first.url, "s").is_some() {
            self.parse_search(first.body, query)
        } else {
            Self::parse_movie(first.body).map(ParseOutcome::Found)
        };

        outcome.unwrap_or_else(|failure| failure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "http://omdb.test";

    fn provider() -> OmdbMovieProvider {
        OmdbMovieProvider::new("key".into()).with_base_url(BASE)
    }

    fn title_query() -> Query {
        Query::builder(SubjectType::Movie)
            .title("Sin City")
            .build()
            .unwrap()
    }

    #[test]
    fn unavailable_without_key() {
        assert!(provider().is_available());
        assert!(!OmdbMovieProvider::new(String::new()).is_available());
    }

    #[test]
    fn targets_for_title_and_imdb_queries() {
        let p = provider();
        assert_eq!(
            p.build_targets(&title_query()).unwrap(),
            vec![format!("{BASE}/?apikey=key&s=Sin+City&type=movie")]
        );

        let by_id = Query::builder(SubjectType::Movie)
            .imdb_id("tt0401792")
            .build()
            .unwrap();
        assert_eq!(
            p.build_targets(&by_id).unwrap(),
            vec![format!("{BASE}/?apikey=key&i=tt0401792&plot=full")]
        );
    }

    #[test]
    fn search_follows_up_with_lookups() {
        let p = provider();
        let query = title_query();
        let url = p.build_targets(&query).unwrap().remove(0);
        let body = r#"{"Search":[
            {"Title":"Sin City","Year":"2005","imdbID":"tt0401792","Type":"movie"},
            {"Title":"Sin City: A Dame to Kill For","Year":"2014","imdbID":"tt0458481","Type":"movie"}
        ],"totalResults":"2","Response":"True"}"#;

        let outcome = p.parse(&[Page { url: &url, body }], &query);
        assert_eq!(
            outcome,
            ParseOutcome::FollowUp(vec![
                vec![format!("{BASE}/?apikey=key&i=tt0401792&plot=full")],
                vec![format!("{BASE}/?apikey=key&i=tt0458481&plot=full")],
            ])
        );
    }

    #[test]
    fn lookup_becomes_record() {
        let p = provider();
        let query = title_query();
        let url = p.lookup_url("tt0401792");
        let body = r#"{"Title":"Sin City","Year":"2005","Runtime":"124 min","Genre":"Crime, Thriller",
            "Director":"Frank Miller, Robert Rodriguez","Actors":"Mickey Rourke, Clive Owen",
            "Plot":"Welcome to Sin City.","imdbRating":"8.0","imdbID":"tt0401792","Response":"True"}"#;

        let ParseOutcome::Found(record) = p.parse(&[Page { url: &url, body }], &query) else {
            panic!("expected a record");
        };
        assert_eq!(record.title.as_deref(), Some("Sin City"));
        assert_eq!(record.year, Some(2005));
        assert_eq!(record.runtime_minutes, Some(124));
        assert_eq!(record.rating, Some(8.0));
        assert_eq!(record.genres, vec!["Crime", "Thriller"]);
        assert_eq!(record.extra["directors"], json!(["Frank Miller", "Robert Rodriguez"]));
    }

    #[test]
    fn missing_fields_are_dropped() {
        let p = provider();
        let url = p.lookup_url("tt0000001");
        let body = r#"{"Title":"Obscure","Year":"N/A","Runtime":"N/A","Genre":"N/A","Plot":"N/A","imdbRating":"N/A","imdbID":"tt0000001","Response":"True"}"#;

        let ParseOutcome::Found(record) = p.parse(&[Page { url: &url, body }], &title_query())
        else {
            panic!("expected a record");
        };
        assert_eq!(record.year, None);
        assert_eq!(record.runtime_minutes, None);
        assert!(record.genres.is_empty());
        assert_eq!(record.overview, None);
    }

    #[test]
    fn error_envelopes_are_classified() {
        let p = provider();
        let query = title_query();
        let url = p.build_targets(&query).unwrap().remove(0);
        let parse = |body: &str| p.parse(&[Page { url: &url, body }], &query);

        assert_eq!(
            parse(r#"{"Response":"False","Error":"Movie not found!"}"#),
            ParseOutcome::NotFound
        );
        assert_eq!(
            parse(r#"{"Response":"False","Error":"Request limit reached!"}"#),
            ParseOutcome::Retry
        );
        assert!(matches!(
            parse(r#"{"Response":"False","Error":"Invalid API key!"}"#),
            ParseOutcome::Failed(_)
        ));
        assert!(matches!(parse("not json"), ParseOutcome::Failed(_)));
    }
}

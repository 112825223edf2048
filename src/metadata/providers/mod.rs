//! Concrete metadata provider implementations.
//!
//! Each submodule wraps a single external API and implements the
//! [`MetadataProvider`](super::MetadataProvider) trait. Providers only build
//! URLs and decode JSON; the dispatcher does the fetching.

pub mod omdb;
pub mod tmdb;

pub use omdb::OmdbMovieProvider;
pub use tmdb::{TmdbMovieProvider, TmdbPersonProvider};

/// Minimal percent-encoding for query parameter values.
pub(crate) fn urlencoded(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char);
            }
            b' ' => out.push('+'),
            _ => {
                out.push('%');
                out.push(char::from(HEX[(b >> 4) as usize]));
                out.push(char::from(HEX[(b & 0x0f) as usize]));
            }
        }
    }
    out
}

const HEX: [u8; 16] = *b"0123456789ABCDEF";

/// Append `key=value` pairs to a URL that already has a query string.
pub(crate) fn with_params(mut url: String, params: &[(&str, &str)]) -> String {
    for (key, value) in params {
        url.push('&');
        url.push_str(key);
        url.push('=');
        url.push_str(&urlencoded(value));
    }
    url
}

/// Value of query parameter `key` in `url`, if present.
pub(crate) fn query_param(url: &str, key: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url).ok()?;
    parsed
        .query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

/// Path component of `url`, or an empty string if it does not parse.
pub(crate) fn url_path(url: &str) -> String {
    reqwest::Url::parse(url)
        .map(|u| u.path().to_string())
        .unwrap_or_default()
}

/// Extract a four-digit year from a date string like `"2023-04-15"`.
pub(crate) fn parse_year(date: Option<&str>) -> Option<u16> {
    date.and_then(|d| d.get(..4))
        .and_then(|y| y.parse::<u16>().ok())
}

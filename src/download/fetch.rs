//! Network access for the dispatcher.
//!
//! The dispatcher only talks to the [`Fetcher`] trait, so tests can swap the
//! network for canned bodies. [`HttpFetcher`] is the production
//! implementation on top of `reqwest`.

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use encoding_rs::Encoding;
use hugin_common::{Error, Result};
use regex::Regex;
use tracing::debug;

/// Default user agent sent with every request.
pub const DEFAULT_USER_AGENT: &str = concat!("hugin/", env!("CARGO_PKG_VERSION"));

/// Why a single target could not be fetched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP status {0}")]
    Status(u16),

    /// A 4xx reply whose body explains the refusal. Providers get to read
    /// it, so these are not retried at the transport level.
    #[error("HTTP status {status} with an error body")]
    Rejected { status: u16, body: String },
}

/// Retrieves the body behind a target URL.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> std::result::Result<String, FetchError>;
}

/// `reqwest`-backed fetcher with a per-request timeout.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| Error::internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }
}

/// Client errors other than rate limiting and request timeouts are final
/// answers from the server; everything else may go away on a retry.
fn is_definitive(status: reqwest::StatusCode) -> bool {
    status.is_client_error()
        && status != reqwest::StatusCode::TOO_MANY_REQUESTS
        && status != reqwest::StatusCode::REQUEST_TIMEOUT
}

fn classify(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Transport(err.to_string())
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> std::result::Result<String, FetchError> {
        let resp = self.client.get(url).send().await.map_err(classify)?;

        let status = resp.status();
        if !status.is_success() && !is_definitive(status) {
            return Err(FetchError::Status(status.as_u16()));
        }

        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        let bytes = resp.bytes().await.map_err(classify)?;
        let body = decode_body(&bytes, content_type.as_deref());
        if status.is_success() {
            Ok(body)
        } else {
            Err(FetchError::Rejected {
                status: status.as_u16(),
                body,
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Body decoding
// ---------------------------------------------------------------------------

/// Decode a response body to text.
///
/// Valid UTF-8 is taken as-is. Otherwise the charset is sniffed from the
/// `Content-Type` header or an HTML `<meta>` tag and decoded with
/// `encoding_rs`, which knows every WHATWG label. Decoding never fails:
/// missing or unknown charsets fall back to ISO-8859-1, which maps every
/// byte.
pub fn decode_body(bytes: &[u8], content_type: Option<&str>) -> String {
    if let Ok(text) = std::str::from_utf8(bytes) {
        return text.to_string();
    }

    let charset = content_type
        .and_then(charset_from_content_type)
        .or_else(|| sniff_meta_charset(bytes));

    match charset.and_then(|label| Encoding::for_label(label.as_bytes())) {
        Some(encoding) => {
            let (text, _, had_errors) = encoding.decode(bytes);
            if had_errors {
                debug!(charset = encoding.name(), "Body contained undecodable bytes");
            }
            text.into_owned()
        }
        None => decode_latin1(bytes),
    }
}

fn charset_from_content_type(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches('"').to_ascii_lowercase())
    })
}

fn sniff_meta_charset(bytes: &[u8]) -> Option<String> {
    static META: OnceLock<Regex> = OnceLock::new();
    let re = META.get_or_init(|| {
        Regex::new(r#"(?i)<meta[^>]+charset\s*=\s*["']?([a-z0-9_\-:.]+)"#)
            .expect("meta charset pattern is valid")
    });

    let head = &bytes[..bytes.len().min(2048)];
    let head = decode_latin1(head);
    re.captures(&head)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_ascii_lowercase())
}

fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

//! Job dispatch: the unit of fetch work, the network seam, and the bounded
//! concurrent engine that drives jobs to completion.
//!
//! - [`job`] -- [`Job`], per-target outcomes, and the dedup key.
//! - [`fetch`] -- The [`Fetcher`] trait and the `reqwest` implementation.
//! - [`dispatcher`] -- Bounded worker pool with in-flight deduplication.

pub mod dispatcher;
pub mod fetch;
pub mod job;

#[cfg(test)]
pub(crate) mod testing;

pub use dispatcher::{DispatchStats, Dispatcher, Empty, Rejected, DEFAULT_TIMEOUT, MAX_WORKERS};
pub use fetch::{decode_body, FetchError, Fetcher, HttpFetcher, DEFAULT_USER_AGENT};
pub use job::{Job, JobKey, Outcome, Page, Response};

//! Read-through response cache shared by every query of a session.
//!
//! Bodies are keyed by fetch target (the URL). The cache is the only state
//! shared between concurrent queries, so every implementation must be
//! internally synchronized.
//!
//! - [`MemoryCache`] -- process-local map, lost on exit.
//! - [`FileCache`] -- the same map persisted as a bincode snapshot.

mod file;
mod memory;

pub use file::FileCache;
pub use memory::MemoryCache;

use hugin_common::Result;

/// Key/value store for raw provider responses.
///
/// Writes overwrite earlier values for the same key. There is no expiry.
pub trait Cache: Send + Sync {
    /// Look up a previously stored body.
    fn read(&self, key: &str) -> Option<String>;

    /// Store `body` under `key`.
    fn write(&self, key: &str, body: &str);

    /// Flush pending state and release resources.
    ///
    /// Calling `close` more than once is allowed.
    fn close(&self) -> Result<()>;
}

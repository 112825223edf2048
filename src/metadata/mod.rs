//! Metadata provider system.
//!
//! This module defines the [`MetadataProvider`] contract that source adapters
//! implement, the records they produce, and the registry the session uses to
//! pick providers for a query.
//!
//! # Module layout
//!
//! - [`provider`] -- Trait definition and shared data types.
//! - [`providers`] -- Bundled provider implementations (TMDB, OMDb).
//! - [`registry`] -- Provider registry for multi-source lookups.
//! - [`similarity`] -- Title similarity scoring used for ranking.

pub mod provider;
pub mod providers;
pub mod registry;
pub mod similarity;

#[cfg(test)]
pub(crate) mod testing;

pub use provider::{MetadataProvider, MetadataResult, ParseOutcome, Record};
pub use registry::ProviderRegistry;

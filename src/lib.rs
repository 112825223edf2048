//! Hugin - multi-provider movie and person metadata lookup
//!
//! This library crate exposes the core functionality for integration testing.

pub mod cache;
pub mod config;
pub mod download;
pub mod metadata;
pub mod session;

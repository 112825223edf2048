//! Hugin-Common: Shared query types and errors.
//!
//! This crate provides the types every hugin component agrees on:
//!
//! - **Query**: An immutable, validated metadata search request
//! - **Core Types**: Subject types and result-selection strategies
//! - **Error Handling**: Common error types and result aliases
//!
//! # Examples
//!
//! ```
//! use hugin_common::{Query, Strategy, SubjectType};
//!
//! let query = Query::builder(SubjectType::Movie)
//!     .title("Sin City")
//!     .amount(5)
//!     .strategy(Strategy::Deep)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(query.title(), Some("Sin City"));
//! assert_eq!(query.retries(), 5);
//!
//! // Contradictory fields are rejected before anything is dispatched.
//! assert!(Query::builder(SubjectType::Movie)
//!     .title("Sin City")
//!     .name("Frank Miller")
//!     .build()
//!     .is_err());
//! ```

pub mod error;
pub mod query;
pub mod types;

pub use error::{Error, Result};
pub use query::{Query, QueryBuilder};
pub use types::*;

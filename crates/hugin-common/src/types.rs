//! Core enums shared between queries, providers, and the CLI.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// What kind of entity a query looks up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectType {
    Movie,
    Person,
}

impl fmt::Display for SubjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Movie => write!(f, "movie"),
            Self::Person => write!(f, "person"),
        }
    }
}

impl FromStr for SubjectType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "movie" => Ok(Self::Movie),
            "person" => Ok(Self::Person),
            other => Err(Error::invalid_query(format!("unknown subject type '{other}'"))),
        }
    }
}

/// How finished results are reduced to the requested amount.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Round-robin across providers so no single source dominates.
    #[default]
    Flat,
    /// Trust providers in priority order before falling back to others.
    Deep,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flat => write!(f, "flat"),
            Self::Deep => write!(f, "deep"),
        }
    }
}

impl FromStr for Strategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "flat" => Ok(Self::Flat),
            "deep" => Ok(Self::Deep),
            other => Err(Error::invalid_query(format!(
                "unknown strategy '{other}' (expected 'flat' or 'deep')"
            ))),
        }
    }
}

//! Error types for the collaborator seams.
//!
//! Resolution and suggestion fan-out never fail past their boundary (a miss is
//! `None`, a broken response is an empty list). Only the HTTP transport and
//! configuration loading report errors, and the fan-out swallows the former.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failure of a single outbound suggestion request.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Invalid suggestion URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Suggestion endpoint answered with status {0}")]
    Status(u16),

    #[error("No response within {0:?}")]
    Timeout(Duration),
}

/// Failure while loading or validating the TOML configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid TOML in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Search engine '{name}' has an empty search_url")]
    EmptyTemplate { name: String },

    #[error("Keyword '{keyword}' has an empty url")]
    EmptyKeywordUrl { keyword: String },
}

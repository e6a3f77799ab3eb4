//! Error types for the content source and for the fetch pipeline.
//!
//! [`SourceError`] describes what went wrong talking to a page; [`FetchError`]
//! describes why a run for one identifier had to stop. Detail-fetch failures
//! never become a [`FetchError`]; they are kept on the item's
//! [`DetailStatus`](crate::detail::DetailStatus) instead.

use thiserror::Error;

/// Failures of the content source capability.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("no such page: {url}")]
    NotFound { url: String },
    #[error("timed out loading {url}")]
    Timeout { url: String },
    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("no element matches `{selector}`")]
    ElementNotFound { selector: String },
    #[error("embedded `{variable}` block not found")]
    MissingPayload { variable: String },
    #[error("embedded `{variable}` block is malformed: {source}")]
    MalformedPayload {
        variable: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid selector `{0}`")]
    InvalidSelector(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl SourceError {
    /// Whether trying the same navigation again could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            SourceError::Timeout { .. } | SourceError::Http(_) => true,
            SourceError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Fatal failures of a fetch run.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("listing for `{identifier}` does not exist")]
    PageNotFound { identifier: String },
    #[error("listing page {page} has no items")]
    EmptyPage { page: u32 },
    #[error("listing for `{identifier}` has no pages")]
    EmptySource { identifier: String },
    #[error("could not parse {what} on listing page {page}: {source}")]
    Parse {
        page: u32,
        what: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("failed to load listing page {page}: {source}")]
    Listing {
        page: u32,
        #[source]
        source: SourceError,
    },
}

impl FetchError {
    /// Listing page the failure is attributed to, if any.
    pub fn page(&self) -> Option<u32> {
        match self {
            FetchError::EmptyPage { page } | FetchError::Parse { page, .. } | FetchError::Listing { page, .. } => {
                Some(*page)
            }
            FetchError::PageNotFound { .. } | FetchError::EmptySource { .. } => None,
        }
    }
}

/// Failures loading or validating the YAML configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

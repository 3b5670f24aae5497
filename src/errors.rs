//! Error types you might see while configuring or running a resolver

use http::StatusCode;
use std::{path::PathBuf, time::Duration};
use thiserror::Error;

/// Errors while resolving a single identifier
///
/// The [std::fmt::Display] text is the detailed diagnostic meant for
/// operational logs, and it may contain filesystem paths or URLs. Use
/// [ResolverError::public_message()] for anything shown to a caller.
#[derive(Error, Debug)]
pub enum ResolverError {
    /// identifier could not be percent-decoded
    #[error("malformed identifier {identifier:?}: {reason}")]
    MalformedIdentifier {
        identifier: String,
        reason: &'static str,
    },

    /// identifier would resolve outside of its configured root
    #[error("identifier {identifier:?} escapes root {root:?}")]
    InvalidIdentifier { identifier: String, root: PathBuf },

    /// identifier has no extension and this backend declares no default format
    #[error("no format could be inferred for identifier {0:?}")]
    UnknownFormat(String),

    /// source image not found
    #[error("source image not found at {location} for identifier: {identifier}")]
    NotFound {
        identifier: String,
        location: String,
    },

    /// retrieving the source image failed
    #[error("fetching {location} for identifier {identifier} failed: {source}")]
    Fetch {
        identifier: String,
        location: String,
        #[source]
        source: FetchError,
    },

    /// retrieving the source image took longer than allowed
    #[error("fetching {location} for identifier {identifier} timed out after {timeout:?}")]
    FetchTimeout {
        identifier: String,
        location: String,
        timeout: Duration,
    },

    /// cache storage io error
    #[error("cache storage io error at {path:?}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// blocking resolver task failed
    #[error("blocking resolver task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

impl ResolverError {
    /// HTTP-style status code a boundary layer should answer with
    pub fn status_code(&self) -> StatusCode {
        match self {
            ResolverError::MalformedIdentifier { .. }
            | ResolverError::InvalidIdentifier { .. }
            | ResolverError::UnknownFormat(_) => StatusCode::BAD_REQUEST,
            ResolverError::NotFound { .. } => StatusCode::NOT_FOUND,
            ResolverError::Fetch { .. } => StatusCode::BAD_GATEWAY,
            ResolverError::FetchTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            ResolverError::Storage { .. } | ResolverError::TaskJoin(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message which is safe to hand back to whoever supplied the identifier
    ///
    /// This never includes configured roots, origin paths, URLs, or
    /// underlying error text.
    pub fn public_message(&self) -> String {
        match self {
            ResolverError::MalformedIdentifier { identifier, .. } => {
                format!("Malformed identifier: {}.", identifier)
            }
            ResolverError::InvalidIdentifier { identifier, .. } => {
                format!("Invalid identifier: {}.", identifier)
            }
            ResolverError::UnknownFormat(identifier) => {
                format!("Could not determine the format of identifier: {}.", identifier)
            }
            ResolverError::NotFound { identifier, .. } => {
                format!("Source image not found for identifier: {}.", identifier)
            }
            ResolverError::Fetch { identifier, .. } => {
                format!("Source image could not be retrieved for identifier: {}.", identifier)
            }
            ResolverError::FetchTimeout { identifier, .. } => {
                format!("Timed out retrieving source image for identifier: {}.", identifier)
            }
            ResolverError::Storage { .. } | ResolverError::TaskJoin(_) => {
                "Internal error while resolving the source image.".to_owned()
            }
        }
    }

    /// True for environmental failures a caller may simply try again
    pub fn is_retryable(&self) -> bool {
        match self {
            ResolverError::Fetch { .. } | ResolverError::FetchTimeout { .. } => true,
            _ => false,
        }
    }
}

/// Errors reported by a [crate::source::Fetcher]
#[derive(Error, Debug)]
pub enum FetchError {
    /// nothing exists at the origin
    #[error("origin not found")]
    NotFound,

    /// deadline exceeded
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// io error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// network request error
    #[error("network request error: {0}")]
    Network(#[from] reqwest::Error),

    /// origin server answered with an unexpected status
    #[error("origin server responded with {0}")]
    Status(StatusCode),

    /// this fetcher can't retrieve that kind of origin
    #[error("no fetcher available for origin {0}")]
    UnsupportedOrigin(String),
}

/// Errors in resolver configuration, reported once at startup
#[derive(Error, Debug)]
pub enum ConfigError {
    /// a required configuration key is missing
    #[error("missing required configuration key {0:?}")]
    MissingKey(&'static str),

    /// a configured root directory is not an absolute path
    #[error("configuration key {key:?} must be an absolute path, found {value:?}")]
    NotAbsolute { key: &'static str, value: String },

    /// unrecognized configuration key
    #[error("unknown configuration key {0:?}")]
    UnknownKey(String),

    /// unrecognized resolver kind
    #[error("unknown resolver kind {0:?}")]
    UnknownResolver(String),

    /// source template is not usable
    #[error("invalid source template {template:?}: {reason}")]
    InvalidTemplate {
        template: String,
        reason: &'static str,
    },

    /// colon substitute would make identifier canonicalization unstable
    #[error("invalid colon substitute {0:?}")]
    InvalidSubstitute(String),

    /// a configuration value could not be parsed
    #[error("invalid value {value:?} for configuration key {key:?}")]
    InvalidValue { key: &'static str, value: String },

    /// io error while reading configuration
    #[error("io error reading configuration: {0}")]
    Io(#[from] std::io::Error),

    /// json error
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// network client could not be constructed
    #[error("network client error: {0}")]
    HttpClient(#[from] reqwest::Error),
}

//! Error types for venue access, configuration and the binary surface.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::market_data::types::{SnapshotError, VenueId};

/// Whether a failed attempt is worth repeating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    Retryable,
    Terminal,
}

/// Failure of one venue call (listing or depth fetch).
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FetchError {
    #[error("venue unavailable: {reason}")]
    VenueUnavailable { reason: String },

    #[error("venue rate limited: {reason}")]
    VenueRateLimited { reason: String },

    #[error("malformed venue response: {reason}")]
    VenueMalformedResponse { reason: String },

    #[error("request rejected with HTTP {status}: {reason}")]
    VenueRejected { status: u16, reason: String },

    #[error("venue error code {code}: {reason}")]
    VenueApiError { code: String, reason: String },

    #[error("no rate-limit permit for {venue} within {waited:?}")]
    RateLimitTimeout { venue: VenueId, waited: Duration },

    #[error("deadline elapsed before an outcome was produced")]
    Timeout,
}

impl FetchError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        FetchError::VenueUnavailable { reason: reason.into() }
    }

    pub fn rate_limited(reason: impl Into<String>) -> Self {
        FetchError::VenueRateLimited { reason: reason.into() }
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        FetchError::VenueMalformedResponse { reason: reason.into() }
    }

    pub fn api(code: impl ToString, reason: impl Into<String>) -> Self {
        FetchError::VenueApiError { code: code.to_string(), reason: reason.into() }
    }

    /// Default classifier: transport trouble and throttling are transient,
    /// anything the venue answered definitively is not.
    pub fn disposition(&self) -> Disposition {
        match self {
            FetchError::VenueUnavailable { .. }
            | FetchError::VenueRateLimited { .. }
            | FetchError::RateLimitTimeout { .. }
            | FetchError::Timeout => Disposition::Retryable,
            FetchError::VenueMalformedResponse { .. }
            | FetchError::VenueRejected { .. }
            | FetchError::VenueApiError { .. } => Disposition::Terminal,
        }
    }

    /// Short label used in metrics and reports.
    pub fn label(&self) -> &'static str {
        match self {
            FetchError::VenueUnavailable { .. } => "venue_unavailable",
            FetchError::VenueRateLimited { .. } => "venue_rate_limited",
            FetchError::VenueMalformedResponse { .. } => "venue_malformed_response",
            FetchError::VenueRejected { .. } => "venue_rejected",
            FetchError::VenueApiError { .. } => "venue_api_error",
            FetchError::RateLimitTimeout { .. } => "rate_limit_timeout",
            FetchError::Timeout => "timeout",
        }
    }
}

impl From<SnapshotError> for FetchError {
    fn from(e: SnapshotError) -> Self {
        FetchError::malformed(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level error for building and running the engine.
#[derive(Debug, Error)]
pub enum DepthxError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to build HTTP client for {venue}: {source}")]
    HttpClient {
        venue: VenueId,
        #[source]
        source: reqwest::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DepthxError>;

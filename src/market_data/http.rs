//! REST transport shared by the venue adapters.
//!
//! Maps transport and HTTP-status failures onto [`FetchError`] so adapters only
//! deal with venue payload semantics.

use std::time::Duration;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::{debug, trace};

use crate::error::{DepthxError, FetchError};
use crate::market_data::types::VenueId;

const USER_AGENT: &str = concat!("depthx/", env!("CARGO_PKG_VERSION"));
const BODY_EXCERPT: usize = 200;

/// One client per adapter instance; adapters share no connection state.
#[derive(Debug, Clone)]
pub struct HttpClient {
    venue: VenueId,
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new(venue: VenueId, timeout: Duration) -> Result<Self, DepthxError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .gzip(true)
            .build()
            .map_err(|source| DepthxError::HttpClient { venue: venue.clone(), source })?;
        Ok(Self { venue, client })
    }

    /// GET `url` with `query` and decode the body as JSON.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, FetchError> {
        trace!(venue = %self.venue, url, ?query, "GET");
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;
        if let Some(err) = status_error(status, &body) {
            debug!(venue = %self.venue, url, status = status.as_u16(), "request failed");
            return Err(err);
        }
        decode(&body)
    }
}

/// Decodes a JSON body; any mismatch with the expected shape is a schema
/// violation.
pub fn decode<T: DeserializeOwned>(body: &str) -> Result<T, FetchError> {
    serde_json::from_str(body)
        .map_err(|e| FetchError::malformed(format!("{e}; body: {}", excerpt(body))))
}

/// Classifies a non-success status. 429 is throttling, 5xx is the venue
/// being unavailable, other 4xx are definitive rejections.
pub fn status_error(status: StatusCode, body: &str) -> Option<FetchError> {
    if status.is_success() {
        return None;
    }
    let reason = format!("HTTP {}: {}", status.as_u16(), excerpt(body));
    Some(if status == StatusCode::TOO_MANY_REQUESTS {
        FetchError::rate_limited(reason)
    } else if status.is_server_error() {
        FetchError::unavailable(reason)
    } else if status.is_client_error() {
        FetchError::VenueRejected { status: status.as_u16(), reason: excerpt(body) }
    } else {
        FetchError::unavailable(reason)
    })
}

fn transport_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::unavailable(format!("request timed out: {e}"))
    } else if e.is_decode() {
        FetchError::malformed(e.to_string())
    } else {
        FetchError::unavailable(e.to_string())
    }
}

fn excerpt(body: &str) -> String {
    body.chars().take(BODY_EXCERPT).collect()
}

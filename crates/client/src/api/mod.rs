//! Remote store client.
//!
//! # Architecture
//!
//! - [`RemoteStoreClient`] speaks plain JSON over HTTP (GET, POST, PATCH,
//!   DELETE) and normalizes failures into [`ApiError`]
//! - [`StoreApi`] knows the cart, wishlist, account and order endpoints and
//!   maps their payloads onto the core types
//!
//! Successful responses pass their JSON payload through untouched. An empty
//! body (HTTP 204) or a body that is not valid JSON yields `None` rather than
//! an error.

mod rows;
mod store;

pub use store::{NewAccount, REGISTRATION_FAILED_MESSAGE, StoreApi};

use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

use crate::config::ClientConfig;

/// Message used when a failed response carries no usable message.
pub const GENERIC_FAILURE_MESSAGE: &str = "Request failed";

/// Errors that can occur when talking to the remote store.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced a response (connection, timeout, TLS).
    #[error("HTTP error: {0}")]
    Network(#[from] reqwest::Error),

    /// The server answered with a non-2xx status.
    #[error("API error: {status} - {message}")]
    Status {
        status: u16,
        message: String,
        /// Raw response payload, for callers that need structured detail.
        payload: Option<Value>,
    },

    /// An endpoint path could not be resolved against the base URL.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// A 2xx payload did not have the expected shape.
    #[error("Unexpected payload: {0}")]
    Malformed(String),
}

impl ApiError {
    /// HTTP status code, if the server responded.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Raw response payload attached to a status failure.
    #[must_use]
    pub const fn payload(&self) -> Option<&Value> {
        match self {
            Self::Status { payload, .. } => payload.as_ref(),
            _ => None,
        }
    }

    /// Whether the server reported the resource as missing.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }

    /// Whether the failure is a client error (4xx) the server deliberately
    /// rejected, as opposed to an outage.
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        matches!(self, Self::Status { status: 400..=499, .. })
    }

    /// Human-readable message suitable for a notice.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Status { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

/// JSON-over-HTTP client for the store backend.
#[derive(Clone)]
pub struct RemoteStoreClient {
    client: reqwest::Client,
    base_url: Url,
}

impl RemoteStoreClient {
    /// Create a new client for the configured base URL.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_base_url.clone(),
        })
    }

    /// Base URL all paths are resolved against.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `GET` a path with query parameters.
    ///
    /// # Errors
    ///
    /// Returns error on network failure or a non-2xx status.
    pub async fn get_json(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Option<Value>, ApiError> {
        self.send::<()>(Method::GET, path, query, None).await
    }

    /// `POST` a JSON body.
    ///
    /// # Errors
    ///
    /// Returns error on network failure or a non-2xx status.
    pub async fn post_json<B: Serialize + Sync + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Option<Value>, ApiError> {
        self.send(Method::POST, path, &[], Some(body)).await
    }

    /// `PATCH` a JSON body.
    ///
    /// # Errors
    ///
    /// Returns error on network failure or a non-2xx status.
    pub async fn patch_json<B: Serialize + Sync + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Option<Value>, ApiError> {
        self.send(Method::PATCH, path, &[], Some(body)).await
    }

    /// `DELETE` a path.
    ///
    /// # Errors
    ///
    /// Returns error on network failure or a non-2xx status.
    pub async fn delete_json(&self, path: &str) -> Result<Option<Value>, ApiError> {
        self.send::<()>(Method::DELETE, path, &[], None).await
    }

    /// Resolve `path` against the base URL and append query parameters.
    fn url_for(&self, path: &str, query: &[(&str, String)]) -> Result<Url, ApiError> {
        let mut url = self.base_url.join(path.trim_start_matches('/'))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    #[instrument(skip_all, fields(method = %method, path = %path))]
    async fn send<B: Serialize + Sync + ?Sized>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> Result<Option<Value>, ApiError> {
        let url = self.url_for(path, query)?;

        let mut request = self.client.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        let payload = parse_payload(&bytes);

        if !status.is_success() {
            let message = failure_message(payload.as_ref());
            debug!(
                status = %status,
                message = %message,
                "Remote store returned non-success status"
            );
            return Err(ApiError::Status {
                status: status.as_u16(),
                message,
                payload,
            });
        }

        if payload.is_none() && status != StatusCode::NO_CONTENT && !bytes.is_empty() {
            debug!(
                status = %status,
                body = %String::from_utf8_lossy(&bytes).chars().take(200).collect::<String>(),
                "Ignoring non-JSON success body"
            );
        }

        Ok(payload)
    }
}

/// Parse a response body, treating empty or malformed JSON as no payload.
fn parse_payload(bytes: &[u8]) -> Option<Value> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    serde_json::from_slice(bytes).ok()
}

/// Pick the server-provided message out of an error payload.
///
/// Prefers `error`, then `message`, falling back to a generic message.
fn failure_message(payload: Option<&Value>) -> String {
    payload
        .and_then(|p| {
            ["error", "message"]
                .into_iter()
                .find_map(|key| p.get(key).and_then(Value::as_str))
        })
        .filter(|m| !m.trim().is_empty())
        .map_or_else(|| GENERIC_FAILURE_MESSAGE.to_string(), str::to_string)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_failure_message_prefers_error() {
        let payload = json!({"error": "user_id is required", "message": "ignored"});
        assert_eq!(failure_message(Some(&payload)), "user_id is required");
    }

    #[test]
    fn test_failure_message_falls_back_to_message() {
        let payload = json!({"message": "Invalid item"});
        assert_eq!(failure_message(Some(&payload)), "Invalid item");
    }

    #[test]
    fn test_failure_message_generic() {
        assert_eq!(failure_message(None), GENERIC_FAILURE_MESSAGE);
        assert_eq!(
            failure_message(Some(&json!({"error": 42}))),
            GENERIC_FAILURE_MESSAGE
        );
        assert_eq!(
            failure_message(Some(&json!(["not", "an", "object"]))),
            GENERIC_FAILURE_MESSAGE
        );
    }

    #[test]
    fn test_parse_payload() {
        assert_eq!(parse_payload(b""), None);
        assert_eq!(parse_payload(b"  \n"), None);
        assert_eq!(parse_payload(b"<html>oops</html>"), None);
        assert_eq!(parse_payload(b"null"), Some(Value::Null));
        assert_eq!(parse_payload(br#"{"ok":true}"#), Some(json!({"ok": true})));
    }

    #[test]
    fn test_url_for_joins_under_base() {
        let config = ClientConfig::for_base_url("http://localhost:8000/EcoMall", ".cache").unwrap();
        let client = RemoteStoreClient::new(&config).unwrap();

        let url = client
            .url_for("/cart/", &[("user_id", "3".to_string())])
            .unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/EcoMall/cart/?user_id=3");

        let url = client.url_for("wishlist/12/", &[]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/EcoMall/wishlist/12/");
    }

    #[test]
    fn test_api_error_classification() {
        let not_found = ApiError::Status {
            status: 404,
            message: "Not found".to_string(),
            payload: Some(json!({"error": "Not found"})),
        };
        assert!(not_found.is_not_found());
        assert!(not_found.is_rejection());
        assert_eq!(not_found.status(), Some(404));
        assert_eq!(not_found.payload().unwrap()["error"], "Not found");
        assert_eq!(not_found.message(), "Not found");

        let outage = ApiError::Status {
            status: 503,
            message: "Database unavailable".to_string(),
            payload: None,
        };
        assert!(!outage.is_rejection());
        assert_eq!(outage.to_string(), "API error: 503 - Database unavailable");
    }
}

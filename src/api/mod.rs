// HTTP gateway for the msg-app REST backend.
// This file holds the client core and the uniform error/auth handling;
// the endpoint wrappers live in the submodules, split by concern.

use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

pub mod auth;
pub mod friends;
pub mod messages;
pub mod statuses;

pub use auth::{LoginOutcome, RegisterOutcome};
pub use friends::RequestOutcome;

/// Errors surfaced to callers. Authentication failures (401/403) are
/// deliberately absent: those are handled globally and never reach the
/// caller as an error.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Out-of-band notifications from the gateway. There is exactly one
/// today; the channel exists so the session-expiry side effect has a
/// single global handler instead of per-call-site checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiEvent {
    SessionExpired,
}

pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    event_tx: mpsc::Sender<ApiEvent>,
}

impl ApiClient {
    /// Build a client for the given server. The cookie store carries the
    /// session cookie the backend issues at login. Returns the receiver
    /// for gateway events alongside the client.
    pub fn new(base_url: &str) -> Result<(Self, mpsc::Receiver<ApiEvent>), ApiError> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .build()?;
        let (event_tx, event_rx) = mpsc::channel(16);

        Ok((
            Self {
                http,
                base_url: base_url.trim_end_matches('/').to_string(),
                event_tx,
            },
            event_rx,
        ))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Apply the uniform status policy to a response.
    ///
    /// 401/403 emit `ApiEvent::SessionExpired` and resolve to `Ok(None)`
    /// so callers short-circuit without an error path of their own.
    /// Other non-success statuses become `ApiError::Status` carrying the
    /// body text. Success hands the response back for decoding.
    async fn screen(
        &self,
        method: &str,
        path: &str,
        response: reqwest::Response,
    ) -> Result<Option<reqwest::Response>, ApiError> {
        let status = response.status();
        debug!("{} {} -> {}", method, path, status);

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            warn!("{} {} rejected with {}: session expired", method, path, status);
            if self.event_tx.try_send(ApiEvent::SessionExpired).is_err() {
                debug!("No listener for session-expiry event");
            }
            return Ok(None);
        }

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                message,
            });
        }

        Ok(Some(response))
    }

    /// Decode a screened response. JSON bodies parse into the target
    /// type; an empty or non-JSON body decodes to `Value::Null` when the
    /// caller only wants an acknowledgement.
    async fn decode<T: DeserializeOwned>(
        response: Option<reqwest::Response>,
    ) -> Result<Option<T>, ApiError> {
        match response {
            Some(resp) => Ok(Some(resp.json::<T>().await?)),
            None => Ok(None),
        }
    }

    pub(crate) async fn get_value(&self, path: &str) -> Result<Option<Value>, ApiError> {
        let response = self.http.get(self.url(path)).send().await?;
        Self::decode(self.screen("GET", path, response).await?).await
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<Option<T>, ApiError> {
        let response = self.http.get(self.url(path)).send().await?;
        Self::decode(self.screen("GET", path, response).await?).await
    }

    pub(crate) async fn post_form(
        &self,
        path: &str,
        form: &[(&str, String)],
    ) -> Result<Option<Value>, ApiError> {
        let response = self.http.post(self.url(path)).form(form).send().await?;
        Self::decode(self.screen("POST", path, response).await?).await
    }

    pub(crate) async fn post_empty(&self, path: &str) -> Result<Option<Value>, ApiError> {
        let response = self.http.post(self.url(path)).send().await?;
        let screened = self.screen("POST", path, response).await?;
        // Acknowledgement endpoints sometimes reply with an empty body
        match screened {
            Some(resp) => Ok(Some(resp.json::<Value>().await.unwrap_or(Value::Null))),
            None => Ok(None),
        }
    }

    pub(crate) async fn post_json(
        &self,
        path: &str,
        body: &Value,
    ) -> Result<Option<Value>, ApiError> {
        let response = self.http.post(self.url(path)).json(body).send().await?;
        Self::decode(self.screen("POST", path, response).await?).await
    }

    pub(crate) async fn put_json(
        &self,
        path: &str,
        body: &Value,
    ) -> Result<Option<Value>, ApiError> {
        let response = self.http.put(self.url(path)).json(body).send().await?;
        let screened = self.screen("PUT", path, response).await?;
        match screened {
            Some(resp) => Ok(Some(resp.json::<Value>().await.unwrap_or(Value::Null))),
            None => Ok(None),
        }
    }

    /// Raw POST for the login form, where the interesting outcome is the
    /// redirect target rather than a JSON body.
    pub(crate) async fn post_form_raw(
        &self,
        path: &str,
        form: &[(&str, String)],
    ) -> Result<reqwest::Response, ApiError> {
        let response = self.http.post(self.url(path)).form(form).send().await?;
        debug!("POST {} -> {} (final url {})", path, response.status(), response.url());
        Ok(response)
    }
}

// Shape-normalization helpers shared by the endpoint wrappers. The
// backend answers some list endpoints with a wrapped object and others
// with a bare array, and ids/names move between key spellings, so every
// decode goes through these instead of strict serde structs.

/// Extract a list from either a bare array or a wrapped object whose
/// `key` field holds the array. Any other shape is an empty list.
pub(crate) fn unwrap_list(value: &Value, key: &str) -> Vec<Value> {
    match value {
        Value::Array(items) => items.clone(),
        Value::Object(map) => match map.get(key) {
            Some(Value::Array(items)) => items.clone(),
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

/// Read an integer field trying several key spellings in order.
pub(crate) fn int_field(value: &Value, keys: &[&str]) -> Option<i64> {
    for key in keys {
        if let Some(found) = value.get(key).and_then(Value::as_i64) {
            return Some(found);
        }
    }
    None
}

/// Read a string field trying several key spellings in order.
pub(crate) fn str_field(value: &Value, keys: &[&str]) -> Option<String> {
    for key in keys {
        if let Some(found) = value.get(key).and_then(Value::as_str) {
            return Some(found.to_string());
        }
    }
    None
}

/// A status field may be a plain string or an object carrying the name
/// under `status` or `name`.
pub(crate) fn status_name(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Object(_) => str_field(value, &["status", "name"]),
        _ => None,
    }
}

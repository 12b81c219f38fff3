// Presence status endpoints under /api/users.
// Single-user lookups feed the per-contact reconciliation batch; the
// bulk snapshot pre-seeds a cycle so individual failures have a value
// to fall back on before defaulting to offline.

use std::collections::HashMap;

use log::debug;
use serde_json::{json, Value};

use crate::api::{int_field, status_name, ApiClient, ApiError};
use crate::models::PresenceStatus;

impl ApiClient {
    /// Fetch one user's presence status.
    pub async fn user_status(&self, user_id: i64) -> Result<Option<PresenceStatus>, ApiError> {
        let path = format!("/api/users/{}/status", user_id);
        match self.get_value(&path).await? {
            Some(value) => {
                let status = value
                    .get("status")
                    .and_then(status_name)
                    .map(|name| PresenceStatus::parse(&name))
                    .unwrap_or(PresenceStatus::Offline);
                Ok(Some(status))
            }
            None => Ok(None),
        }
    }

    /// Fetch the status snapshot for all users, keyed by user id.
    pub async fn all_statuses(
        &self,
    ) -> Result<Option<HashMap<i64, PresenceStatus>>, ApiError> {
        match self.get_value("/api/users/statuses").await? {
            Some(value) => {
                let snapshot = normalize_status_list(&value);
                debug!("Fetched status snapshot for {} users", snapshot.len());
                Ok(Some(snapshot))
            }
            None => Ok(None),
        }
    }

    /// Push the session user's own presence status.
    pub async fn set_status(
        &self,
        user_id: i64,
        status: PresenceStatus,
    ) -> Result<Option<()>, ApiError> {
        let path = format!("/api/users/{}/status", user_id);
        let body = json!({ "status": status.as_str() });
        match self.put_json(&path, &body).await? {
            Some(_) => Ok(Some(())),
            None => Ok(None),
        }
    }
}

/// Normalize the bulk snapshot: an array of `{userId, status}` entries.
/// Entries without a user id are skipped; unknown status strings fall
/// back to offline inside `PresenceStatus::parse`.
pub fn normalize_status_list(value: &Value) -> HashMap<i64, PresenceStatus> {
    let entries = match value {
        Value::Array(items) => items.as_slice(),
        _ => return HashMap::new(),
    };

    entries
        .iter()
        .filter_map(|entry| {
            let id = int_field(entry, &["userId", "id"])?;
            let status = entry
                .get("status")
                .and_then(status_name)
                .map(|name| PresenceStatus::parse(&name))
                .unwrap_or(PresenceStatus::Offline);
            Some((id, status))
        })
        .collect()
}

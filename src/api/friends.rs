// Friend list and friend-request operations against /api/friends.
// The list endpoints answer with either `{success, friends|requests}`
// or a bare array depending on the code path server-side; everything is
// normalized to canonical model types before it leaves this module.

use log::{debug, info};
use serde_json::Value;

use crate::api::{int_field, status_name, str_field, unwrap_list, ApiClient, ApiError};
use crate::models::{Contact, FoundUser, FriendRequest, RequestStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    Sent,
    Failed(String),
}

impl ApiClient {
    /// Fetch the full friends list. `Ok(None)` means the session expired
    /// and the global handler has already been notified.
    pub async fn friends_list(&self) -> Result<Option<Vec<Contact>>, ApiError> {
        match self.get_value("/api/friends/list").await? {
            Some(value) => {
                let contacts = normalize_friend_list(&value);
                debug!("Fetched {} friends", contacts.len());
                Ok(Some(contacts))
            }
            None => Ok(None),
        }
    }

    /// Fetch pending friend requests addressed to the session user.
    pub async fn friend_requests(&self) -> Result<Option<Vec<FriendRequest>>, ApiError> {
        match self.get_value("/api/friends/requests").await? {
            Some(value) => {
                let requests = normalize_request_list(&value);
                debug!("Fetched {} friend requests", requests.len());
                Ok(Some(requests))
            }
            None => Ok(None),
        }
    }

    pub async fn accept_request(&self, request_id: i64) -> Result<Option<()>, ApiError> {
        let path = format!("/api/friends/request/{}/accept", request_id);
        match self.post_empty(&path).await? {
            Some(_) => {
                info!("Accepted friend request {}", request_id);
                Ok(Some(()))
            }
            None => Ok(None),
        }
    }

    pub async fn reject_request(&self, request_id: i64) -> Result<Option<()>, ApiError> {
        let path = format!("/api/friends/request/{}/reject", request_id);
        match self.post_empty(&path).await? {
            Some(_) => {
                info!("Rejected friend request {}", request_id);
                Ok(Some(()))
            }
            None => Ok(None),
        }
    }

    /// Look up a user by username or email. `Ok(None)` covers both "no
    /// such user" (the server answers 404) and an expired session.
    pub async fn find_user(&self, query: &str) -> Result<Option<FoundUser>, ApiError> {
        let path = format!("/api/friends/find?query={}", urlencode(query));
        match self.get_value(&path).await {
            Ok(Some(value)) => Ok(value.get("user").and_then(parse_found_user)),
            Ok(None) => Ok(None),
            Err(ApiError::Status { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Send a friend request from one user to another.
    pub async fn send_request(
        &self,
        from_user_id: i64,
        to_user_id: i64,
    ) -> Result<Option<RequestOutcome>, ApiError> {
        let form = [
            ("fromUserId", from_user_id.to_string()),
            ("toUserId", to_user_id.to_string()),
        ];
        match self.post_form("/api/friends/request", &form).await {
            Ok(Some(value)) => {
                if value.get("success").and_then(Value::as_bool) == Some(true) {
                    Ok(Some(RequestOutcome::Sent))
                } else {
                    let reason = str_field(&value, &["error", "message"])
                        .unwrap_or_else(|| "Request was not accepted".to_string());
                    Ok(Some(RequestOutcome::Failed(reason)))
                }
            }
            Ok(None) => Ok(None),
            Err(ApiError::Status { status: 400, message }) => {
                let reason = serde_json::from_str::<Value>(&message)
                    .ok()
                    .and_then(|v| str_field(&v, &["error", "message"]))
                    .unwrap_or(message);
                Ok(Some(RequestOutcome::Failed(reason)))
            }
            Err(e) => Err(e),
        }
    }
}

/// Normalize a friends-list payload. Entries missing an id are dropped;
/// entries missing a name fall back to "user-<id>" so the list still
/// renders.
pub fn normalize_friend_list(value: &Value) -> Vec<Contact> {
    unwrap_list(value, "friends")
        .iter()
        .filter_map(|entry| {
            let id = int_field(entry, &["userId", "id"])?;
            let username = str_field(entry, &["username", "displayName", "name"])
                .unwrap_or_else(|| format!("user-{}", id));
            Some(Contact { id, username })
        })
        .collect()
}

/// Normalize a friend-request payload. The sender is a nested user
/// object; the status may be a bare string or an object with a name.
pub fn normalize_request_list(value: &Value) -> Vec<FriendRequest> {
    unwrap_list(value, "requests")
        .iter()
        .filter_map(|entry| {
            let request_id = int_field(entry, &["requestId", "id"])?;
            let sender_name = entry
                .get("sender")
                .and_then(|s| str_field(s, &["username", "displayName"]))
                .or_else(|| str_field(entry, &["senderName"]))
                .unwrap_or_else(|| "Unknown".to_string());
            let status = entry
                .get("status")
                .and_then(status_name)
                .map(|name| RequestStatus::parse(&name))
                .unwrap_or(RequestStatus::Other);
            Some(FriendRequest {
                request_id,
                sender_name,
                status,
            })
        })
        .collect()
}

fn parse_found_user(value: &Value) -> Option<FoundUser> {
    let id = int_field(value, &["userId", "id"])?;
    let username =
        str_field(value, &["username", "displayName"]).unwrap_or_else(|| format!("user-{}", id));
    Some(FoundUser { id, username })
}

/// Minimal percent-encoding for the find query parameter.
fn urlencode(raw: &str) -> String {
    let mut encoded = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char)
            }
            other => encoded.push_str(&format!("%{:02X}", other)),
        }
    }
    encoded
}

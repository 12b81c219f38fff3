// Conversation history and message sending against /api/messages.
// History arrives oldest-first and is never reordered client-side; a
// conversation only ever changes by being re-fetched.

use log::debug;
use serde_json::Value;

use crate::api::{int_field, str_field, unwrap_list, ApiClient, ApiError};
use crate::models::ChatMessage;

impl ApiClient {
    /// Fetch the ordered conversation between the session user and
    /// another user.
    pub async fn message_history(
        &self,
        self_id: i64,
        other_id: i64,
    ) -> Result<Option<Vec<ChatMessage>>, ApiError> {
        let path = format!("/api/messages/{}/{}", self_id, other_id);
        match self.get_value(&path).await? {
            Some(value) => {
                let messages = normalize_history(&value);
                debug!(
                    "Fetched {} messages for conversation {}/{}",
                    messages.len(),
                    self_id,
                    other_id
                );
                Ok(Some(messages))
            }
            None => Ok(None),
        }
    }

    /// Send a message. The caller follows up with an immediate history
    /// re-fetch; this endpoint only acknowledges.
    pub async fn send_message(
        &self,
        from_user_id: i64,
        to_user_id: i64,
        content: &str,
    ) -> Result<Option<()>, ApiError> {
        let form = [
            ("fromUserId", from_user_id.to_string()),
            ("toUserId", to_user_id.to_string()),
            ("content", content.to_string()),
        ];
        match self.post_form("/api/messages/send", &form).await? {
            Some(_) => Ok(Some(())),
            None => Ok(None),
        }
    }
}

/// Normalize a history payload. Senders appear either nested
/// (`sender: {userId, username}`) or flat (`senderId`/`senderName`);
/// message text moves between `messageText`, `text`, and `content`.
/// Entries without any text are dropped, nothing else is.
pub fn normalize_history(value: &Value) -> Vec<ChatMessage> {
    unwrap_list(value, "messages")
        .iter()
        .filter_map(|entry| {
            let text = str_field(entry, &["messageText", "text", "content"])?;
            let sender = entry.get("sender");
            let sender_id = sender
                .and_then(|s| int_field(s, &["userId", "id"]))
                .or_else(|| int_field(entry, &["senderId"]));
            let sender_name = sender
                .and_then(|s| str_field(s, &["username", "displayName"]))
                .or_else(|| str_field(entry, &["senderName"]));
            let timestamp = str_field(entry, &["createdAt", "timestamp"]);
            Some(ChatMessage {
                sender_id,
                sender_name,
                text,
                timestamp,
            })
        })
        .collect()
}

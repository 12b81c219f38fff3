use serde::{Deserialize, Serialize};

/// The logged-in user, established once from /api/auth/me at startup.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionUser {
    #[serde(alias = "userId")]
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub email: String,
}

/// A friend of the session user. The whole set is replaced on every
/// reconciliation cycle; there are no partial updates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    pub id: i64,
    pub username: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceStatus {
    Online,
    Away,
    Offline,
}

impl PresenceStatus {
    /// Parse a status string from the backend. The server serializes
    /// lowercase but other casings show up; anything unrecognized is
    /// treated as offline rather than an error.
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "online" => PresenceStatus::Online,
            "away" => PresenceStatus::Away,
            "offline" => PresenceStatus::Offline,
            other => {
                log::debug!("Unknown presence status '{}', treating as offline", other);
                PresenceStatus::Offline
            }
        }
    }

    /// Wire form expected by PUT /api/users/{id}/status.
    pub fn as_str(&self) -> &'static str {
        match self {
            PresenceStatus::Online => "online",
            PresenceStatus::Away => "away",
            PresenceStatus::Offline => "offline",
        }
    }

    /// One-character badge shown next to a contact in the list.
    pub fn indicator(&self) -> &'static str {
        match self {
            PresenceStatus::Online => "●",
            PresenceStatus::Away => "◐",
            PresenceStatus::Offline => "○",
        }
    }

    /// Cycle through statuses in the order the status toggle uses.
    pub fn next(&self) -> Self {
        match self {
            PresenceStatus::Online => PresenceStatus::Away,
            PresenceStatus::Away => PresenceStatus::Offline,
            PresenceStatus::Offline => PresenceStatus::Online,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    Pending,
    Accepted,
    Rejected,
    Other,
}

impl RequestStatus {
    /// Normalize a status that may arrive as a plain string or as an
    /// object carrying a name. Comparison is case-insensitive.
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_uppercase().as_str() {
            "PENDING" => RequestStatus::Pending,
            "ACCEPTED" => RequestStatus::Accepted,
            "REJECTED" => RequestStatus::Rejected,
            _ => RequestStatus::Other,
        }
    }

    /// Only pending requests get accept/reject actions in the UI.
    pub fn is_actionable(&self) -> bool {
        matches!(self, RequestStatus::Pending)
    }
}

/// A friend request addressed to the session user.
#[derive(Debug, Clone)]
pub struct FriendRequest {
    pub request_id: i64,
    pub sender_name: String,
    pub status: RequestStatus,
}

/// One message of a conversation, as fetched from the history endpoint.
/// The timestamp stays in whatever form the server sent it; formatting
/// for display happens at render time and falls back to the raw value.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub sender_id: Option<i64>,
    pub sender_name: Option<String>,
    pub text: String,
    pub timestamp: Option<String>,
}

impl ChatMessage {
    /// Display attribution: the session user's own messages render as
    /// "You", everything else as the sender's name, "Unknown" if absent.
    pub fn attribution(&self, self_id: i64) -> String {
        if self.sender_id == Some(self_id) {
            "You".to_string()
        } else {
            self.sender_name
                .clone()
                .unwrap_or_else(|| "Unknown".to_string())
        }
    }
}

/// A user returned by the find endpoint when searching for someone to
/// send a friend request to.
#[derive(Debug, Clone)]
pub struct FoundUser {
    pub id: i64,
    pub username: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presence_status_parsing() {
        assert_eq!(PresenceStatus::parse("online"), PresenceStatus::Online);
        assert_eq!(PresenceStatus::parse("ONLINE"), PresenceStatus::Online);
        assert_eq!(PresenceStatus::parse("Away"), PresenceStatus::Away);
        assert_eq!(PresenceStatus::parse("offline"), PresenceStatus::Offline);
        // Anything the backend invents must not break rendering
        assert_eq!(PresenceStatus::parse("busy"), PresenceStatus::Offline);
        assert_eq!(PresenceStatus::parse(""), PresenceStatus::Offline);
    }

    #[test]
    fn test_presence_status_round_trip() {
        for status in [
            PresenceStatus::Online,
            PresenceStatus::Away,
            PresenceStatus::Offline,
        ] {
            assert_eq!(PresenceStatus::parse(status.as_str()), status);
        }
    }

    #[test]
    fn test_status_cycle_covers_all() {
        let start = PresenceStatus::Online;
        let mut seen = vec![start];
        let mut current = start.next();
        while current != start {
            seen.push(current);
            current = current.next();
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn test_request_status_normalization() {
        assert_eq!(RequestStatus::parse("PENDING"), RequestStatus::Pending);
        assert_eq!(RequestStatus::parse("pending"), RequestStatus::Pending);
        assert_eq!(RequestStatus::parse("Accepted"), RequestStatus::Accepted);
        assert_eq!(RequestStatus::parse("REJECTED"), RequestStatus::Rejected);
        assert_eq!(RequestStatus::parse("withdrawn"), RequestStatus::Other);
        assert!(RequestStatus::Pending.is_actionable());
        assert!(!RequestStatus::Accepted.is_actionable());
        assert!(!RequestStatus::Other.is_actionable());
    }

    #[test]
    fn test_message_attribution() {
        let from_other = ChatMessage {
            sender_id: Some(2),
            sender_name: Some("bob".to_string()),
            text: "hi".to_string(),
            timestamp: Some("2024-01-01T00:00:00Z".to_string()),
        };
        assert_eq!(from_other.attribution(1), "bob");

        let from_self = ChatMessage {
            sender_id: Some(1),
            sender_name: Some("alice".to_string()),
            text: "hello".to_string(),
            timestamp: None,
        };
        assert_eq!(from_self.attribution(1), "You");

        let anonymous = ChatMessage {
            sender_id: None,
            sender_name: None,
            text: "???".to_string(),
            timestamp: None,
        };
        assert_eq!(anonymous.attribution(1), "Unknown");
    }
}

// Re-export needed modules for testing
pub mod api;
pub mod dashboard;
pub mod models;

// Re-export main types for convenience
pub use api::ApiClient;
pub use models::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contact_construction() {
        let contact = Contact {
            id: 1,
            username: "alice".to_string(),
        };
        assert_eq!(contact.id, 1);
        assert_eq!(contact.username, "alice");
    }

    #[test]
    fn test_presence_indicators_are_distinct() {
        let indicators = [
            PresenceStatus::Online.indicator(),
            PresenceStatus::Away.indicator(),
            PresenceStatus::Offline.indicator(),
        ];
        assert_ne!(indicators[0], indicators[1]);
        assert_ne!(indicators[1], indicators[2]);
        assert_ne!(indicators[0], indicators[2]);
    }

    #[test]
    fn test_session_user_decodes_server_shape() {
        // /api/auth/me nests the user with a userId key
        let user: SessionUser = serde_json::from_str(
            r#"{"userId": 3, "username": "carol", "email": "carol@example.com"}"#,
        )
        .unwrap();
        assert_eq!(user.id, 3);
        assert_eq!(user.username, "carol");
        assert_eq!(user.email, "carol@example.com");
    }
}

// Session management against /api/auth.
// Login goes through the browser-era direct-login endpoint, which
// answers with a redirect: /dashboard on success, /login?error=... on
// failure. The error query parameter is surfaced verbatim (decoded).

use log::{debug, info};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::api::{ApiClient, ApiError};
use crate::models::SessionUser;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    Success,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterOutcome {
    Accepted(String),
    Rejected(Vec<String>),
}

/// The backend never sees a plaintext password; both login and register
/// send a SHA-256 hex digest under `passwordHash`.
pub fn hash_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

impl ApiClient {
    /// Authenticate and establish the session cookie.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginOutcome, ApiError> {
        self.login_with_hash(username, &hash_password(password)).await
    }

    /// Login with an already-hashed password, as restored from the
    /// saved credentials file.
    pub async fn login_with_hash(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<LoginOutcome, ApiError> {
        let form = [
            ("username", username.to_string()),
            ("passwordHash", password_hash.to_string()),
        ];
        let response = self.post_form_raw("/api/auth/direct-login", &form).await?;

        // The redirect target tells the outcome: an error query parameter
        // means the login page, anything else means we are in.
        let error_param = response
            .url()
            .query_pairs()
            .find(|(key, _)| key == "error")
            .map(|(_, value)| value.into_owned());

        if let Some(raw) = error_param {
            let message = if raw == "true" || raw.is_empty() {
                "Invalid username or password".to_string()
            } else {
                raw
            };
            info!("Login failed for {}: {}", username, message);
            return Ok(LoginOutcome::Failed(message));
        }

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(ApiError::Status { status, message });
        }

        info!("Logged in as {}", username);
        Ok(LoginOutcome::Success)
    }

    /// Fetch the session user. `Ok(None)` means no session is
    /// established; the backend reports that as a 200 with
    /// `success: false` rather than a 401.
    pub async fn current_user(&self) -> Result<Option<SessionUser>, ApiError> {
        let value: Option<Value> = self.get_value("/api/auth/me").await?;
        let value = match value {
            Some(v) => v,
            None => return Ok(None),
        };

        if value.get("success").and_then(Value::as_bool) == Some(false) {
            debug!("No authenticated session on /api/auth/me");
            return Ok(None);
        }

        match value.get("user") {
            Some(user) => Ok(serde_json::from_value::<SessionUser>(user.clone()).ok()),
            None => Ok(None),
        }
    }

    /// Create an account. Validation failures come back as a 400 whose
    /// body carries either a single message or per-field errors; both
    /// are flattened into display lines.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<RegisterOutcome, ApiError> {
        let body = json!({
            "username": username,
            "email": email,
            "passwordHash": hash_password(password),
        });

        match self.post_json("/api/auth/register", &body).await {
            Ok(Some(value)) => {
                let message = value
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("Registered")
                    .to_string();
                Ok(RegisterOutcome::Accepted(message))
            }
            Ok(None) => Ok(RegisterOutcome::Rejected(vec![
                "Session expired".to_string()
            ])),
            Err(ApiError::Status { status: 400, message }) => {
                Ok(RegisterOutcome::Rejected(parse_register_errors(&message)))
            }
            Err(e) => Err(e),
        }
    }

    /// Drop the server-side session. Best-effort: callers log failures
    /// and move on.
    pub async fn logout(&self) -> Result<(), ApiError> {
        self.post_empty("/api/auth/logout").await?;
        info!("Logged out");
        Ok(())
    }
}

/// Flatten a register error body into displayable lines. The body may be
/// `{message}` or `{errors: {field: msg}}`; anything unparsable is shown
/// as-is.
fn parse_register_errors(body: &str) -> Vec<String> {
    let value: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(_) => return vec![body.to_string()],
    };

    if let Some(errors) = value.get("errors").and_then(Value::as_object) {
        let mut lines: Vec<String> = errors
            .iter()
            .map(|(field, msg)| format!("{}: {}", field, msg.as_str().unwrap_or("invalid")))
            .collect();
        lines.sort();
        return lines;
    }

    if let Some(message) = value.get("message").and_then(Value::as_str) {
        return vec![message.to_string()];
    }

    vec![body.to_string()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_password_is_sha256_hex() {
        // SHA-256 of the empty string, a fixed point worth pinning
        assert_eq!(
            hash_password(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(hash_password("secret").len(), 64);
        assert_ne!(hash_password("secret"), hash_password("Secret"));
    }

    #[test]
    fn test_parse_register_errors_field_map() {
        let body = r#"{"success": false, "errors": {"email": "already taken", "username": "too short"}}"#;
        let lines = parse_register_errors(body);
        assert_eq!(lines, vec!["email: already taken", "username: too short"]);
    }

    #[test]
    fn test_parse_register_errors_single_message() {
        let body = r#"{"success": false, "message": "Username already exists"}"#;
        assert_eq!(parse_register_errors(body), vec!["Username already exists"]);
    }

    #[test]
    fn test_parse_register_errors_unparsable_body() {
        assert_eq!(parse_register_errors("boom"), vec!["boom"]);
    }
}

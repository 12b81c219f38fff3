// Shared helpers for integration tests.
// Lifecycle tests run against an address nothing listens on, so every
// fetch fails fast with a transport error; the interesting behavior is
// which events the controllers emit and when, not the payloads.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;

use courier::api::{ApiClient, ApiEvent};
use courier::dashboard::DashboardEvent;
use courier::models::SessionUser;

/// Discard port; connections are refused immediately.
pub const DEAD_SERVER: &str = "http://127.0.0.1:9";

pub fn dead_api() -> (Arc<ApiClient>, mpsc::Receiver<ApiEvent>) {
    let (api, api_rx) = ApiClient::new(DEAD_SERVER).expect("client should build");
    (Arc::new(api), api_rx)
}

pub fn test_user() -> SessionUser {
    SessionUser {
        id: 1,
        username: "alice".to_string(),
        email: "alice@example.com".to_string(),
    }
}

/// Await the next dashboard event with a generous deadline.
pub async fn next_event(
    events: &mut mpsc::Receiver<DashboardEvent>,
    deadline: Duration,
) -> Option<DashboardEvent> {
    timeout(deadline, events.recv()).await.ok().flatten()
}

// Friend-request workflow: list, accept, reject, and the search-then-
// send composition behind the add-friend dialog. All operations run as
// background tasks reporting over the dashboard event channel; the
// controller reacts to mutation events by re-listing (and, for accept,
// re-reconciling the contact list, since acceptance creates a contact).

use std::sync::Arc;

use log::{error, info};
use tokio::sync::mpsc;

use crate::api::{ApiClient, RequestOutcome};
use crate::dashboard::DashboardEvent;

#[derive(Clone)]
pub struct RequestsWorkflow {
    api: Arc<ApiClient>,
    events: mpsc::Sender<DashboardEvent>,
}

impl RequestsWorkflow {
    pub fn new(api: Arc<ApiClient>, events: mpsc::Sender<DashboardEvent>) -> Self {
        Self { api, events }
    }

    /// Fetch the pending-request list. The server is the sole source of
    /// truth; nothing is cached between renders.
    pub fn spawn_list(&self) {
        let api = self.api.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            match api.friend_requests().await {
                Ok(Some(requests)) => {
                    let _ = events.send(DashboardEvent::RequestsLoaded(requests)).await;
                }
                Ok(None) => {}
                Err(e) => {
                    error!("Failed to fetch friend requests: {}", e);
                    let _ = events
                        .send(DashboardEvent::RequestsError(e.to_string()))
                        .await;
                }
            }
        });
    }

    pub fn spawn_accept(&self, request_id: i64) {
        self.spawn_action(request_id, true)
    }

    pub fn spawn_reject(&self, request_id: i64) {
        self.spawn_action(request_id, false)
    }

    fn spawn_action(&self, request_id: i64, accept: bool) {
        let api = self.api.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = if accept {
                api.accept_request(request_id).await
            } else {
                api.reject_request(request_id).await
            };
            match result {
                Ok(Some(())) => {
                    let _ = events
                        .send(DashboardEvent::RequestActioned {
                            request_id,
                            accepted: accept,
                        })
                        .await;
                }
                Ok(None) => {}
                Err(e) => {
                    error!("Friend request {} action failed: {}", request_id, e);
                    let _ = events
                        .send(DashboardEvent::RequestActionError {
                            request_id,
                            message: e.to_string(),
                        })
                        .await;
                }
            }
        });
    }

    /// Search for a user and, when found, send them a friend request.
    /// "Not found" and search errors short-circuit with a user-facing
    /// message; the send's own success or failure is reported
    /// separately.
    pub fn spawn_search_and_send(&self, self_id: i64, query: String) {
        let api = self.api.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let found = match api.find_user(&query).await {
                Ok(Some(user)) => user,
                Ok(None) => {
                    let _ = events
                        .send(DashboardEvent::RequestSendFailed {
                            message: format!("No user found for '{}'", query),
                        })
                        .await;
                    return;
                }
                Err(e) => {
                    let _ = events
                        .send(DashboardEvent::RequestSendFailed {
                            message: format!("Search failed: {}", e),
                        })
                        .await;
                    return;
                }
            };

            match api.send_request(self_id, found.id).await {
                Ok(Some(RequestOutcome::Sent)) => {
                    info!("Friend request sent to {}", found.username);
                    let _ = events
                        .send(DashboardEvent::RequestSent {
                            username: found.username,
                        })
                        .await;
                }
                Ok(Some(RequestOutcome::Failed(reason))) => {
                    let _ = events
                        .send(DashboardEvent::RequestSendFailed { message: reason })
                        .await;
                }
                Ok(None) => {}
                Err(e) => {
                    let _ = events
                        .send(DashboardEvent::RequestSendFailed {
                            message: e.to_string(),
                        })
                        .await;
                }
            }
        });
    }
}

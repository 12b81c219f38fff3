// Conversation polling: the lifecycle of the single "fetch this
// conversation on a timer" task. The controller is the only owner of
// the task handle, so at most one poll timer is ever live, and every
// exit path (contact switch, tab switch, teardown, drop) goes through
// the same cancellation.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::api::ApiClient;
use crate::dashboard::DashboardEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Idle,
    Polling(i64),
}

pub struct ConversationPoller {
    api: Arc<ApiClient>,
    events: mpsc::Sender<DashboardEvent>,
    self_id: i64,
    period: Duration,
    state: PollerState,
    task: Option<JoinHandle<()>>,
}

impl ConversationPoller {
    pub fn new(
        api: Arc<ApiClient>,
        events: mpsc::Sender<DashboardEvent>,
        self_id: i64,
        period: Duration,
    ) -> Self {
        Self {
            api,
            events,
            self_id,
            period,
            state: PollerState::Idle,
            task: None,
        }
    }

    pub fn state(&self) -> PollerState {
        self.state
    }

    pub fn polling_contact(&self) -> Option<i64> {
        match self.state {
            PollerState::Polling(id) => Some(id),
            PollerState::Idle => None,
        }
    }

    /// Switch to polling the given contact. Any existing timer is
    /// cancelled before the new one is armed; the new task fetches
    /// immediately, then on every period tick.
    pub fn select(&mut self, contact_id: i64) {
        self.cancel_task();
        self.state = PollerState::Polling(contact_id);

        let api = self.api.clone();
        let events = self.events.clone();
        let self_id = self.self_id;
        let period = self.period;

        info!("Polling conversation with contact {}", contact_id);
        self.task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                // The first tick completes immediately, giving the
                // fetch-on-select behavior for free.
                ticker.tick().await;
                fetch_and_report(&api, &events, self_id, contact_id).await;
            }
        }));
    }

    /// Stop polling and return to the prompt state. Idempotent.
    pub fn deselect(&mut self) {
        if self.state != PollerState::Idle {
            debug!("Conversation polling stopped");
        }
        self.cancel_task();
        self.state = PollerState::Idle;
    }

    pub fn teardown(&mut self) {
        self.deselect();
    }

    /// Send a message to the contact being polled, then re-fetch the
    /// conversation immediately so the sent message appears without
    /// waiting for the next tick. The timer's own schedule is untouched.
    /// A no-op while idle.
    pub fn send_message(&self, text: String) {
        let contact_id = match self.state {
            PollerState::Polling(id) => id,
            PollerState::Idle => return,
        };
        let api = self.api.clone();
        let events = self.events.clone();
        let self_id = self.self_id;
        tokio::spawn(async move {
            match api.send_message(self_id, contact_id, &text).await {
                Ok(Some(())) => fetch_and_report(&api, &events, self_id, contact_id).await,
                Ok(None) => {} // session expired, handled globally
                Err(e) => {
                    let _ = events
                        .send(DashboardEvent::ConversationError {
                            contact_id,
                            message: format!("Send failed: {}", e),
                        })
                        .await;
                }
            }
        });
    }

    pub fn has_live_task(&self) -> bool {
        self.task.as_ref().map_or(false, |t| !t.is_finished())
    }

    fn cancel_task(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for ConversationPoller {
    fn drop(&mut self) {
        self.cancel_task();
    }
}

async fn fetch_and_report(
    api: &ApiClient,
    events: &mpsc::Sender<DashboardEvent>,
    self_id: i64,
    contact_id: i64,
) {
    // Every event carries the contact it was fetched for; the consumer
    // drops results that no longer match the current selection, which
    // covers slow fetches completing after a switch.
    match api.message_history(self_id, contact_id).await {
        Ok(Some(messages)) => {
            let _ = events
                .send(DashboardEvent::ConversationFetched {
                    contact_id,
                    messages,
                })
                .await;
        }
        Ok(None) => {} // session expired, handled globally
        Err(e) => {
            debug!("Message poll for contact {} failed: {}", contact_id, e);
            let _ = events
                .send(DashboardEvent::ConversationError {
                    contact_id,
                    message: e.to_string(),
                })
                .await;
        }
    }
}

// Dashboard controller: owns the client-side view of friends, their
// presence, the active conversation, and the two polling timers. All
// background work reports through one event channel consumed by the UI
// loop; the controller is the only place timers are armed and disarmed,
// which is what keeps orphaned timers from surviving a view change.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub mod poller;
pub mod reconciler;
pub mod requests;
pub mod status_cache;

pub use poller::{ConversationPoller, PollerState};
pub use reconciler::{merge_contacts, ContactEntry, ContactListView, Reconciler};
pub use requests::RequestsWorkflow;
pub use status_cache::StatusCache;

use crate::api::ApiClient;
use crate::models::{ChatMessage, FriendRequest, PresenceStatus, SessionUser};

/// How often the contact list is reconciled while the chat view is
/// active.
pub const CONTACT_REFRESH_PERIOD: Duration = Duration::from_secs(10);
/// How often the active conversation is re-fetched while a contact is
/// selected.
pub const MESSAGE_POLL_PERIOD: Duration = Duration::from_secs(3);

/// Everything background tasks report back to the UI loop.
#[derive(Debug)]
pub enum DashboardEvent {
    /// A reconciliation cycle settled; entries are complete (every
    /// contact has a resolved status).
    ContactsReconciled { entries: Vec<ContactEntry> },
    /// The friends-list fetch failed; the previous view stays untouched
    /// and the list widget shows this error.
    ContactsError(String),
    ConversationFetched {
        contact_id: i64,
        messages: Vec<ChatMessage>,
    },
    ConversationError {
        contact_id: i64,
        message: String,
    },
    RequestsLoaded(Vec<FriendRequest>),
    RequestsError(String),
    RequestActioned {
        request_id: i64,
        accepted: bool,
    },
    RequestActionError {
        request_id: i64,
        message: String,
    },
    RequestSent {
        username: String,
    },
    RequestSendFailed {
        message: String,
    },
}

pub struct Dashboard {
    api: Arc<ApiClient>,
    user: SessionUser,
    cache: StatusCache,
    reconciler: Reconciler,
    poller: ConversationPoller,
    requests: RequestsWorkflow,
    events_rx: mpsc::Receiver<DashboardEvent>,
    refresh_task: Option<JoinHandle<()>>,
    selection: Option<i64>,
    self_status: PresenceStatus,
}

impl Dashboard {
    pub fn new(api: Arc<ApiClient>, user: SessionUser, self_status: PresenceStatus) -> Self {
        let (events_tx, events_rx) = mpsc::channel(64);
        let reconciler = Reconciler::new(api.clone(), events_tx.clone());
        let poller = ConversationPoller::new(
            api.clone(),
            events_tx.clone(),
            user.id,
            MESSAGE_POLL_PERIOD,
        );
        let requests = RequestsWorkflow::new(api.clone(), events_tx);

        Self {
            api,
            user,
            cache: StatusCache::new(),
            reconciler,
            poller,
            requests,
            events_rx,
            refresh_task: None,
            selection: None,
            self_status,
        }
    }

    pub fn user(&self) -> &SessionUser {
        &self.user
    }

    pub fn self_status(&self) -> PresenceStatus {
        self.self_status
    }

    pub fn selection(&self) -> Option<i64> {
        self.selection
    }

    pub fn cached_status(&self, contact_id: i64) -> Option<PresenceStatus> {
        self.cache.get(contact_id)
    }

    /// Non-blocking drain point for the UI loop.
    pub fn try_event(&mut self) -> Option<DashboardEvent> {
        self.events_rx.try_recv().ok()
    }

    // --- contact list -----------------------------------------------------

    /// Arm the periodic contact refresh. Active only while the chat view
    /// is visible; arming twice is a no-op.
    pub fn arm_contact_refresh(&mut self) {
        if self.contact_refresh_armed() {
            return;
        }
        debug!("Arming contact refresh timer");
        let reconciler = self.reconciler.clone();
        self.refresh_task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(CONTACT_REFRESH_PERIOD);
            // Skip the immediate first tick; tab activation already
            // triggers an explicit refresh.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                reconciler.spawn_cycle();
            }
        }));
    }

    pub fn disarm_contact_refresh(&mut self) {
        if let Some(task) = self.refresh_task.take() {
            debug!("Disarming contact refresh timer");
            task.abort();
        }
    }

    pub fn contact_refresh_armed(&self) -> bool {
        self.refresh_task.as_ref().map_or(false, |t| !t.is_finished())
    }

    /// Manual refresh: tab activation and post-mutation invalidation use
    /// the same cycle as the timer.
    pub fn refresh_contacts(&self) {
        self.reconciler.spawn_cycle();
    }

    /// Fold a settled cycle into local state and produce the view to
    /// render. The selection re-applied here is the current one, so a
    /// selection change made while the cycle was in flight wins.
    pub fn apply_contacts(&mut self, entries: Vec<ContactEntry>) -> ContactListView {
        let mut statuses = HashMap::new();
        for entry in &entries {
            self.cache.set(entry.contact.id, entry.status);
            statuses.insert(entry.contact.id, entry.status);
        }
        let contacts = entries.into_iter().map(|e| e.contact).collect();
        merge_contacts(self.selection, contacts, &statuses)
    }

    // --- conversation -----------------------------------------------------

    /// Select a contact and start polling their conversation. Replaces
    /// any previous selection; at most one poll timer is live.
    pub fn select_contact(&mut self, contact_id: i64) {
        if self.selection == Some(contact_id) {
            return;
        }
        info!("Selected contact {}", contact_id);
        self.selection = Some(contact_id);
        self.poller.select(contact_id);
    }

    /// Clear the selection and stop polling. Used when the user switches
    /// tabs away from chat, never by a background refresh.
    pub fn deselect_contact(&mut self) {
        self.selection = None;
        self.poller.deselect();
    }

    pub fn poller_state(&self) -> PollerState {
        self.poller.state()
    }

    /// True when an incoming conversation event still matches the
    /// current selection; stale results are dropped by the caller.
    pub fn is_current_conversation(&self, contact_id: i64) -> bool {
        self.selection == Some(contact_id)
    }

    /// Send a message to the selected contact. The poller performs the
    /// send and the immediate re-fetch, so the sent message shows up
    /// without waiting for the next poll tick.
    pub fn send_message(&self, text: String) {
        if self.selection.is_none() {
            warn!("Ignoring send with no contact selected");
            return;
        }
        self.poller.send_message(text);
    }

    // --- friend requests --------------------------------------------------

    pub fn refresh_requests(&self) {
        self.requests.spawn_list();
    }

    pub fn accept_request(&self, request_id: i64) {
        self.requests.spawn_accept(request_id);
    }

    pub fn reject_request(&self, request_id: i64) {
        self.requests.spawn_reject(request_id);
    }

    pub fn send_friend_request(&self, query: String) {
        self.requests.spawn_search_and_send(self.user.id, query);
    }

    // --- self status ------------------------------------------------------

    /// Cycle the session user's own status and push it to the server.
    /// Returns the new status so the caller can persist it locally.
    pub fn cycle_self_status(&mut self) -> PresenceStatus {
        self.self_status = self.self_status.next();
        self.push_self_status();
        self.self_status
    }

    /// Push the current self status to the server (also used at startup
    /// to restore the persisted status).
    pub fn push_self_status(&self) {
        let api = self.api.clone();
        let user_id = self.user.id;
        let status = self.self_status;
        tokio::spawn(async move {
            if let Err(e) = api.set_status(user_id, status).await {
                warn!("Failed to push self status: {}", e);
            }
        });
    }

    /// Disarm everything. Called on every exit path.
    pub fn teardown(&mut self) {
        self.disarm_contact_refresh();
        self.poller.teardown();
        info!("Dashboard torn down");
    }
}

impl Drop for Dashboard {
    fn drop(&mut self) {
        self.disarm_contact_refresh();
    }
}

// Contact-list reconciliation: one full fetch-and-render pass over the
// friends list and its presence statuses. A cycle fetches the bulk
// status snapshot, the friends list, then one status per contact as
// independent futures, and only after every one of them has settled
// does it emit a complete view for rendering. Failed per-contact
// fetches degrade to the snapshot value, then to offline.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use log::{debug, error, info};
use tokio::sync::mpsc;

use crate::api::ApiClient;
use crate::dashboard::DashboardEvent;
use crate::models::{Contact, PresenceStatus};

/// One rendered contact-list entry: a contact plus its resolved status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactEntry {
    pub contact: Contact,
    pub status: PresenceStatus,
}

/// The atomic output of a reconciliation cycle, applied to the UI in a
/// single pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactListView {
    pub entries: Vec<ContactEntry>,
    /// The previously selected contact, re-applied only if it survived
    /// into the new list.
    pub selected: Option<i64>,
    pub online_count: usize,
}

impl ContactListView {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Merge a freshly fetched contact set with resolved statuses and the
/// user's selection. Contacts missing from the status map render as
/// offline; a selection pointing at a vanished contact is dropped from
/// the view without any further side effect.
pub fn merge_contacts(
    previous_selection: Option<i64>,
    contacts: Vec<Contact>,
    statuses: &HashMap<i64, PresenceStatus>,
) -> ContactListView {
    let entries: Vec<ContactEntry> = contacts
        .into_iter()
        .map(|contact| {
            let status = statuses
                .get(&contact.id)
                .copied()
                .unwrap_or(PresenceStatus::Offline);
            ContactEntry { contact, status }
        })
        .collect();

    let online_count = entries
        .iter()
        .filter(|e| e.status == PresenceStatus::Online)
        .count();

    let selected = previous_selection
        .filter(|id| entries.iter().any(|e| e.contact.id == *id));

    ContactListView {
        entries,
        selected,
        online_count,
    }
}

/// Drives reconciliation cycles. Cheap to clone; every clone shares the
/// single-flight guard, so overlapping cycles cannot happen no matter
/// which timer or user action asks for one.
#[derive(Clone)]
pub struct Reconciler {
    api: Arc<ApiClient>,
    events: mpsc::Sender<DashboardEvent>,
    in_flight: Arc<AtomicBool>,
}

impl Reconciler {
    pub fn new(api: Arc<ApiClient>, events: mpsc::Sender<DashboardEvent>) -> Self {
        Self {
            api,
            events,
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start a cycle unless one is already running. Both refresh
    /// triggers (the periodic timer and manual refreshes) funnel through
    /// here; a skipped cycle is retried naturally by the next tick.
    pub fn spawn_cycle(&self) {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            debug!("Reconciliation cycle already in flight, skipping");
            return;
        }

        let api = self.api.clone();
        let events = self.events.clone();
        let in_flight = self.in_flight.clone();
        tokio::spawn(async move {
            run_cycle(api, events).await;
            in_flight.store(false, Ordering::SeqCst);
        });
    }

    #[cfg(test)]
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }
}

async fn run_cycle(api: Arc<ApiClient>, events: mpsc::Sender<DashboardEvent>) {
    // Bulk snapshot first; its failure is non-fatal, it only loses the
    // fallback values for contacts whose individual fetch also fails.
    let snapshot: HashMap<i64, PresenceStatus> = match api.all_statuses().await {
        Ok(Some(snapshot)) => snapshot,
        Ok(None) => return, // session expired, handled globally
        Err(e) => {
            debug!("Bulk status snapshot unavailable: {}", e);
            HashMap::new()
        }
    };

    let contacts = match api.friends_list().await {
        Ok(Some(contacts)) => contacts,
        Ok(None) => return,
        Err(e) => {
            // Abort the cycle: the last good view stays untouched and
            // the UI shows a list-scoped error placeholder.
            error!("Failed to fetch friends list: {}", e);
            let _ = events
                .send(DashboardEvent::ContactsError(e.to_string()))
                .await;
            return;
        }
    };

    // One status fetch per contact, all independent, each individually
    // falling back. join_all makes the "render only after the whole
    // batch settles" invariant structural.
    let lookups = contacts.into_iter().map(|contact| {
        let api = api.clone();
        let fallback = snapshot
            .get(&contact.id)
            .copied()
            .unwrap_or(PresenceStatus::Offline);
        async move {
            let status = match api.user_status(contact.id).await {
                Ok(Some(status)) => status,
                Ok(None) => fallback,
                Err(e) => {
                    debug!(
                        "Status fetch for contact {} failed ({}), using {:?}",
                        contact.id, e, fallback
                    );
                    fallback
                }
            };
            ContactEntry { contact, status }
        }
    });

    let entries = join_all(lookups).await;
    info!("Reconciliation cycle settled with {} contacts", entries.len());

    let _ = events
        .send(DashboardEvent::ContactsReconciled { entries })
        .await;
}

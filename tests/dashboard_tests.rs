// Lifecycle tests for the dashboard controllers: the conversation
// poller's single-timer state machine, the reconciler's error path, and
// the dashboard's selection bookkeeping. All of them run against a dead
// server, so fetches fail with transport errors and the tests observe
// the resulting events rather than payloads.

mod common;
use common::{dead_api, next_event, test_user};

use std::time::Duration;

use tokio::sync::mpsc;

use courier::dashboard::{
    ContactEntry, ConversationPoller, Dashboard, DashboardEvent, PollerState, Reconciler,
};
use courier::models::{Contact, PresenceStatus};

const EVENT_DEADLINE: Duration = Duration::from_secs(5);

fn entry(id: i64, name: &str, status: PresenceStatus) -> ContactEntry {
    ContactEntry {
        contact: Contact {
            id,
            username: name.to_string(),
        },
        status,
    }
}

#[tokio::test]
async fn test_poller_select_fetches_immediately_and_reports_errors() {
    let (api, _api_rx) = dead_api();
    let (tx, mut rx) = mpsc::channel(16);
    let mut poller = ConversationPoller::new(api, tx, 1, Duration::from_secs(60));

    assert_eq!(poller.state(), PollerState::Idle);
    assert!(!poller.has_live_task());

    poller.select(42);
    assert_eq!(poller.state(), PollerState::Polling(42));
    assert!(poller.has_live_task());

    // The first fetch happens on select, not on the first period tick;
    // against a dead server it surfaces as a conversation error tagged
    // with the polled contact.
    match next_event(&mut rx, EVENT_DEADLINE).await {
        Some(DashboardEvent::ConversationError { contact_id, .. }) => {
            assert_eq!(contact_id, 42);
        }
        other => panic!("expected a conversation error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_poller_switching_contacts_replaces_the_timer() {
    let (api, _api_rx) = dead_api();
    let (tx, mut rx) = mpsc::channel(16);
    let mut poller = ConversationPoller::new(api, tx, 1, Duration::from_millis(50));

    poller.select(1);
    poller.select(2);
    assert_eq!(poller.state(), PollerState::Polling(2));
    assert_eq!(poller.polling_contact(), Some(2));

    // Events for contact 1 may still be queued from before the switch;
    // that is the stale-result case the consumer filters. What must not
    // happen is contact 1 events arriving after contact 2 ones start.
    let mut seen_contact_2 = false;
    for _ in 0..6 {
        match next_event(&mut rx, EVENT_DEADLINE).await {
            Some(DashboardEvent::ConversationError { contact_id, .. }) => {
                if seen_contact_2 {
                    assert_eq!(contact_id, 2, "old timer kept running after switch");
                } else if contact_id == 2 {
                    seen_contact_2 = true;
                }
            }
            Some(other) => panic!("unexpected event {:?}", other),
            None => break,
        }
    }
    assert!(seen_contact_2, "never saw a fetch for the new contact");
}

#[tokio::test]
async fn test_poller_deselect_is_idempotent_and_stops_the_task() {
    let (api, _api_rx) = dead_api();
    let (tx, mut rx) = mpsc::channel(16);
    let mut poller = ConversationPoller::new(api, tx, 1, Duration::from_millis(50));

    // Deselecting while idle is a no-op
    poller.deselect();
    assert_eq!(poller.state(), PollerState::Idle);

    poller.select(3);
    poller.deselect();
    poller.deselect();
    assert_eq!(poller.state(), PollerState::Idle);
    assert!(!poller.has_live_task());

    // Drain anything the aborted task managed to emit, then confirm the
    // stream goes quiet.
    while next_event(&mut rx, Duration::from_millis(300)).await.is_some() {}
    assert!(next_event(&mut rx, Duration::from_millis(300)).await.is_none());
}

#[tokio::test]
async fn test_poller_send_is_a_noop_while_idle() {
    let (api, _api_rx) = dead_api();
    let (tx, mut rx) = mpsc::channel(16);
    let poller = ConversationPoller::new(api, tx, 1, Duration::from_secs(60));

    poller.send_message("hello".to_string());
    assert!(next_event(&mut rx, Duration::from_millis(300)).await.is_none());
}

#[tokio::test]
async fn test_poller_send_reports_failure_for_the_polled_contact() {
    let (api, _api_rx) = dead_api();
    let (tx, mut rx) = mpsc::channel(16);
    let mut poller = ConversationPoller::new(api, tx, 1, Duration::from_secs(60));

    poller.select(7);
    poller.send_message("hello".to_string());

    // Both the select fetch and the send fail against the dead server;
    // the send failure is distinguishable by its message prefix and must
    // carry the contact it targeted.
    let mut saw_send_failure = false;
    for _ in 0..4 {
        match next_event(&mut rx, EVENT_DEADLINE).await {
            Some(DashboardEvent::ConversationError { contact_id, message }) => {
                assert_eq!(contact_id, 7);
                if message.starts_with("Send failed") {
                    saw_send_failure = true;
                    break;
                }
            }
            Some(other) => panic!("unexpected event {:?}", other),
            None => break,
        }
    }
    assert!(saw_send_failure, "send failure was never reported");
}

#[tokio::test]
async fn test_reconciler_reports_list_failure_without_a_view() {
    let (api, _api_rx) = dead_api();
    let (tx, mut rx) = mpsc::channel(16);
    let reconciler = Reconciler::new(api, tx);

    reconciler.spawn_cycle();

    // The friends-list fetch fails, so the cycle aborts with an error
    // event and never emits a reconciled view.
    match next_event(&mut rx, EVENT_DEADLINE).await {
        Some(DashboardEvent::ContactsError(_)) => {}
        other => panic!("expected a contacts error, got {:?}", other),
    }
    assert!(next_event(&mut rx, Duration::from_millis(300)).await.is_none());
}

#[tokio::test]
async fn test_dashboard_selection_drives_the_poller() {
    let (api, _api_rx) = dead_api();
    let mut dashboard = Dashboard::new(api, test_user(), PresenceStatus::Online);

    assert_eq!(dashboard.selection(), None);
    assert_eq!(dashboard.poller_state(), PollerState::Idle);

    dashboard.select_contact(5);
    assert_eq!(dashboard.selection(), Some(5));
    assert_eq!(dashboard.poller_state(), PollerState::Polling(5));
    assert!(dashboard.is_current_conversation(5));
    assert!(!dashboard.is_current_conversation(6));

    // Re-selecting the same contact must not restart the timer
    dashboard.select_contact(5);
    assert_eq!(dashboard.poller_state(), PollerState::Polling(5));

    dashboard.deselect_contact();
    assert_eq!(dashboard.selection(), None);
    assert_eq!(dashboard.poller_state(), PollerState::Idle);
}

#[tokio::test]
async fn test_dashboard_apply_contacts_feeds_cache_and_keeps_selection() {
    let (api, _api_rx) = dead_api();
    let mut dashboard = Dashboard::new(api, test_user(), PresenceStatus::Online);

    dashboard.select_contact(2);
    let view = dashboard.apply_contacts(vec![
        entry(2, "bob", PresenceStatus::Online),
        entry(3, "carol", PresenceStatus::Away),
    ]);

    assert_eq!(view.selected, Some(2));
    assert_eq!(view.online_count, 1);
    assert_eq!(dashboard.cached_status(3), Some(PresenceStatus::Away));

    // The selected contact vanishing drops it from the rendered view,
    // but the dashboard keeps the selection: the refresh alone neither
    // deselects nor stops the conversation poll.
    let view = dashboard.apply_contacts(vec![entry(3, "carol", PresenceStatus::Offline)]);
    assert_eq!(view.selected, None);
    assert_eq!(view.online_count, 0);
    assert_eq!(dashboard.selection(), Some(2));
    assert_eq!(dashboard.poller_state(), PollerState::Polling(2));
}

#[tokio::test]
async fn test_dashboard_refresh_timer_arm_disarm() {
    let (api, _api_rx) = dead_api();
    let mut dashboard = Dashboard::new(api, test_user(), PresenceStatus::Online);

    assert!(!dashboard.contact_refresh_armed());
    dashboard.arm_contact_refresh();
    assert!(dashboard.contact_refresh_armed());

    // Arming again must not stack a second timer
    dashboard.arm_contact_refresh();
    assert!(dashboard.contact_refresh_armed());

    dashboard.disarm_contact_refresh();
    assert!(!dashboard.contact_refresh_armed());

    dashboard.teardown();
    assert_eq!(dashboard.poller_state(), PollerState::Idle);
}

#[tokio::test]
async fn test_dashboard_cycle_status_walks_the_cycle() {
    let (api, _api_rx) = dead_api();
    let mut dashboard = Dashboard::new(api, test_user(), PresenceStatus::Online);

    assert_eq!(dashboard.cycle_self_status(), PresenceStatus::Away);
    assert_eq!(dashboard.cycle_self_status(), PresenceStatus::Offline);
    assert_eq!(dashboard.cycle_self_status(), PresenceStatus::Online);
}

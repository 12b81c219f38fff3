use anyhow::{anyhow, Result};
use clap::Parser;
use log::{debug, error, info, LevelFilter};
use once_cell::sync::Lazy;
use regex::Regex;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

mod credentials;
mod ui;
mod utils;

use crate::credentials::{load_credentials, load_preferences, save_credentials, Credentials};
use crate::ui::{ChatUI, Tab, UiAction};
use courier::api::auth::hash_password;
use courier::api::{ApiEvent, LoginOutcome, RegisterOutcome};
use courier::dashboard::{Dashboard, DashboardEvent};
use courier::models::PresenceStatus;
use courier::ApiClient;

/// Command line arguments for Courier
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Courier: a terminal chat client for the msg-app server.",
    long_about = "Courier is a terminal chat client: friends with live presence, \
    conversations, and friend-request management against a msg-app server.\n\n\
    Credentials come from COURIER_USERNAME/COURIER_PASSWORD, the saved \
    credentials file, or an interactive prompt, in that order."
)]
struct Args {
    /// Server base URL
    #[arg(long, value_name = "URL")]
    server: Option<String>,

    /// Log file path
    #[arg(long, value_name = "PATH", default_value = "courier.log")]
    log_file: PathBuf,
}

static USERNAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_]{3,20}$").unwrap()
});
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap()
});

const DEFAULT_SERVER: &str = "http://localhost:8080";

/// Resolve the server base URL: flag, then environment, then the saved
/// credentials file, then the default.
fn resolve_server(args: &Args) -> String {
    if let Some(server) = &args.server {
        return server.clone();
    }
    if let Ok(server) = env::var("COURIER_SERVER") {
        return server;
    }
    if let Ok(Some(creds)) = load_credentials() {
        return creds.server;
    }
    DEFAULT_SERVER.to_string()
}

/// Establish a login session: environment variables first, then the
/// saved credentials file, then an interactive prompt (which can branch
/// into registration). Interactive logins are saved for next time;
/// environment-variable logins are not.
async fn establish_session(api: &ApiClient, server: &str) -> Result<()> {
    if let (Ok(username), Ok(password)) = (
        env::var("COURIER_USERNAME"),
        env::var("COURIER_PASSWORD"),
    ) {
        info!("Using credentials from environment for {}", username);
        return match api.login(&username, &password).await? {
            LoginOutcome::Success => Ok(()),
            LoginOutcome::Failed(message) => {
                Err(anyhow!("Login failed for {}: {}", username, message))
            }
        };
    }

    if let Some(creds) = load_credentials()? {
        if let Some(hash) = creds.get_password_hash().filter(|h| !h.is_empty()) {
            info!("Using saved credentials for {}", creds.username);
            match api.login_with_hash(&creds.username, &hash).await? {
                LoginOutcome::Success => return Ok(()),
                LoginOutcome::Failed(message) => {
                    eprintln!("Saved login for {} rejected: {}", creds.username, message);
                }
            }
        }
    }

    loop {
        eprintln!("Login to {} (or type 'register' to create an account)", server);
        eprintln!("Username:");
        let username = utils::read_line()?;
        if username.is_empty() {
            continue;
        }
        if username.eq_ignore_ascii_case("register") {
            register_interactive(api).await?;
            continue;
        }

        eprintln!("Password:");
        let password = utils::read_line()?;

        match api.login(&username, &password).await? {
            LoginOutcome::Success => {
                let creds = Credentials::new(server, &username, &hash_password(&password));
                if let Err(e) = save_credentials(&creds) {
                    eprintln!("Warning: failed to save credentials: {}", e);
                }
                return Ok(());
            }
            LoginOutcome::Failed(message) => eprintln!("{}", message),
        }
    }
}

/// Walk through account creation on stdin. Local format checks catch
/// the obvious mistakes before the round trip; the server still has the
/// final say and its rejections are shown line by line.
async fn register_interactive(api: &ApiClient) -> Result<()> {
    let username = loop {
        eprintln!("New username (3-20 letters, digits, underscores):");
        let candidate = utils::read_line()?;
        if USERNAME_RE.is_match(&candidate) {
            break candidate;
        }
        eprintln!("That doesn't look like a valid username.");
    };

    let email = loop {
        eprintln!("Email address:");
        let candidate = utils::read_line()?;
        if EMAIL_RE.is_match(&candidate) {
            break candidate;
        }
        eprintln!("That doesn't look like an email address.");
    };

    let password = loop {
        eprintln!("Password (at least 6 characters):");
        let candidate = utils::read_line()?;
        if candidate.len() >= 6 {
            break candidate;
        }
        eprintln!("Too short.");
    };

    match api.register(&username, &email, &password).await? {
        RegisterOutcome::Accepted(message) => {
            eprintln!("{}", message);
            eprintln!("You can log in now.");
        }
        RegisterOutcome::Rejected(lines) => {
            eprintln!("Registration rejected:");
            for line in lines {
                eprintln!("  {}", line);
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    utils::setup_logging(args.log_file.to_str(), LevelFilter::Debug)?;
    info!("Courier starting up");
    info!("Logging to file: {}", args.log_file.display());

    // A session that expired last run left a note behind; show it before
    // the login prompt so the user knows why they are back here.
    if let Some(notice) = credentials::take_session_notice() {
        eprintln!("{}", notice);
    }

    let server = resolve_server(&args);
    eprintln!("Connecting to {}...", server);

    let (api, mut api_rx) = ApiClient::new(&server)?;
    let api = Arc::new(api);

    establish_session(&api, &server).await?;

    let user = api
        .current_user()
        .await?
        .ok_or_else(|| anyhow!("Login succeeded but no session user was returned"))?;
    info!("Session established for {} (id {})", user.username, user.id);

    let preferences = load_preferences();
    let self_status = preferences.status();

    let mut dashboard = Dashboard::new(api.clone(), user.clone(), self_status);
    dashboard.push_self_status();
    dashboard.refresh_contacts();
    dashboard.arm_contact_refresh();

    let mut terminal = ui::setup_terminal()?;
    let mut chat_ui = ChatUI::new(user.id, &user.username, self_status);

    let session_expired = run_main_loop(&mut chat_ui, &mut terminal, &mut dashboard, &mut api_rx)
        .await;

    dashboard.teardown();

    // Leave cleanly unless the session already died server-side
    match session_expired {
        Ok(false) => {
            if let Err(e) = api.set_status(user.id, PresenceStatus::Offline).await {
                debug!("Could not set offline status on exit: {}", e);
            }
            if let Err(e) = api.logout().await {
                debug!("Logout on exit failed: {}", e);
            }
        }
        Ok(true) => {
            credentials::remember_session_notice(
                "Your session expired. Please log in again.",
            );
        }
        Err(ref e) => error!("Main loop failed: {}", e),
    }

    ui::restore_terminal(terminal)?;
    session_expired?;

    println!("Chat session ended.");
    Ok(())
}

/// Run the UI event loop. Returns `Ok(true)` when the loop ended because
/// the server session expired, `Ok(false)` on a normal quit.
async fn run_main_loop(
    chat_ui: &mut ChatUI,
    terminal: &mut ui::Terminal<ui::CrosstermBackend<std::io::Stdout>>,
    dashboard: &mut Dashboard,
    api_rx: &mut tokio::sync::mpsc::Receiver<ApiEvent>,
) -> Result<bool> {
    loop {
        terminal.draw(|f| chat_ui.draw(f))?;

        // The gateway's out-of-band channel overrides everything else
        if let Ok(ApiEvent::SessionExpired) = api_rx.try_recv() {
            info!("Session expired, leaving the main loop");
            return Ok(true);
        }

        match chat_ui.handle_input()? {
            Some(UiAction::Quit) => return Ok(false),
            Some(UiAction::SwitchedTab(Tab::Requests)) => {
                // Leaving the chat view stops both timers; the requests
                // tab has no background refresh of its own.
                dashboard.deselect_contact();
                dashboard.disarm_contact_refresh();
                chat_ui.clear_conversation();
                dashboard.refresh_requests();
            }
            Some(UiAction::SwitchedTab(Tab::Chat)) => {
                dashboard.arm_contact_refresh();
                dashboard.refresh_contacts();
            }
            Some(UiAction::SelectContact(contact_id)) => {
                dashboard.select_contact(contact_id);
            }
            Some(UiAction::SendMessage(text)) => {
                dashboard.send_message(text);
            }
            Some(UiAction::RefreshContacts) => dashboard.refresh_contacts(),
            Some(UiAction::RefreshRequests) => dashboard.refresh_requests(),
            Some(UiAction::AcceptRequest(request_id)) => dashboard.accept_request(request_id),
            Some(UiAction::RejectRequest(request_id)) => dashboard.reject_request(request_id),
            Some(UiAction::SendFriendRequest(query)) => dashboard.send_friend_request(query),
            Some(UiAction::CycleStatus) => {
                let status = dashboard.cycle_self_status();
                credentials::remember_self_status(status);
                chat_ui.set_self_status(status);
            }
            None => {}
        }

        // Drain everything the background tasks reported since last pass
        while let Some(event) = dashboard.try_event() {
            match event {
                DashboardEvent::ContactsReconciled { entries } => {
                    let view = dashboard.apply_contacts(entries);
                    chat_ui.set_contacts(view);
                }
                DashboardEvent::ContactsError(message) => {
                    chat_ui.set_contacts_error(message);
                }
                DashboardEvent::ConversationFetched { contact_id, messages } => {
                    if dashboard.is_current_conversation(contact_id) {
                        chat_ui.set_messages(messages);
                    } else {
                        debug!("Dropping stale conversation result for {}", contact_id);
                    }
                }
                DashboardEvent::ConversationError { contact_id, message } => {
                    if dashboard.is_current_conversation(contact_id) {
                        chat_ui.set_conversation_error(message);
                    }
                }
                DashboardEvent::RequestsLoaded(requests) => {
                    chat_ui.set_requests(requests);
                }
                DashboardEvent::RequestsError(message) => {
                    chat_ui.set_requests_error(message);
                }
                DashboardEvent::RequestActioned { request_id, accepted } => {
                    info!(
                        "Request {} {}",
                        request_id,
                        if accepted { "accepted" } else { "rejected" }
                    );
                    dashboard.refresh_requests();
                    if accepted {
                        // A new friend exists; make them show up without
                        // waiting for the next timer tick
                        dashboard.refresh_contacts();
                        chat_ui.set_notice("Friend request accepted".to_string());
                    } else {
                        chat_ui.set_notice("Friend request rejected".to_string());
                    }
                }
                DashboardEvent::RequestActionError { request_id, message } => {
                    error!("Request {} action failed: {}", request_id, message);
                    chat_ui.set_notice(format!("Request failed: {}", message));
                    dashboard.refresh_requests();
                }
                DashboardEvent::RequestSent { username } => {
                    chat_ui.set_notice(format!("Friend request sent to {}", username));
                }
                DashboardEvent::RequestSendFailed { message } => {
                    chat_ui.set_notice(message);
                }
            }
        }
    }
}

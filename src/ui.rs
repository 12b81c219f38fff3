use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph},
    Frame,
};
use std::{io, time::Duration};
use textwrap::wrap;
use tui_input::{backend::crossterm::EventHandler, Input};

use courier::dashboard::{ContactEntry, ContactListView};
use courier::models::{ChatMessage, FriendRequest, PresenceStatus};

use crate::utils::format_timestamp;

// Export types needed by main module
pub use ratatui::backend::CrosstermBackend;
pub use ratatui::Terminal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Chat,
    Requests,
}

/// What a key press asks the controller to do. The UI mutates only its
/// own display state; everything with a side effect goes through here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiAction {
    Quit,
    SwitchedTab(Tab),
    SelectContact(i64),
    SendMessage(String),
    RefreshContacts,
    RefreshRequests,
    AcceptRequest(i64),
    RejectRequest(i64),
    SendFriendRequest(String),
    CycleStatus,
}

struct AddFriendDialog {
    input: Input,
}

pub struct ChatUI {
    // Contact list pane
    contacts: Vec<ContactEntry>,
    online_count: usize,
    selected_contact: Option<i64>,
    contacts_error: Option<String>,
    contacts_loaded: bool,
    contact_cursor: usize,
    // Conversation pane
    messages: Vec<ChatMessage>,
    conversation_error: Option<String>,
    // Requests tab
    requests: Vec<FriendRequest>,
    requests_error: Option<String>,
    requests_loaded: bool,
    request_cursor: usize,
    // Chrome
    input: Input,
    active_tab: Tab,
    add_friend_dialog: Option<AddFriendDialog>,
    notice: Option<String>,
    self_id: i64,
    self_username: String,
    self_status: PresenceStatus,
}

impl ChatUI {
    pub fn new(self_id: i64, self_username: &str, self_status: PresenceStatus) -> Self {
        ChatUI {
            contacts: Vec::new(),
            online_count: 0,
            selected_contact: None,
            contacts_error: None,
            contacts_loaded: false,
            contact_cursor: 0,
            messages: Vec::new(),
            conversation_error: None,
            requests: Vec::new(),
            requests_error: None,
            requests_loaded: false,
            request_cursor: 0,
            input: Input::default(),
            active_tab: Tab::Chat,
            add_friend_dialog: None,
            notice: None,
            self_id,
            self_username: self_username.to_string(),
            self_status,
        }
    }

    /// Apply a settled reconciliation cycle in one pass: entries and
    /// online count come from the same view. The selection mirror is
    /// untouched; the dashboard owns it, and a selected contact absent
    /// from the new list simply renders without an active marker.
    pub fn set_contacts(&mut self, view: ContactListView) {
        self.online_count = view.online_count;
        self.contacts = view.entries;
        self.contacts_error = None;
        self.contacts_loaded = true;
        if self.contact_cursor >= self.contacts.len() {
            self.contact_cursor = self.contacts.len().saturating_sub(1);
        }
    }

    /// The last good list stays on screen; only the error line changes.
    pub fn set_contacts_error(&mut self, message: String) {
        self.contacts_error = Some(message);
        self.contacts_loaded = true;
    }

    pub fn set_messages(&mut self, messages: Vec<ChatMessage>) {
        self.messages = messages;
        self.conversation_error = None;
    }

    pub fn set_conversation_error(&mut self, message: String) {
        self.conversation_error = Some(message);
    }

    /// Back to the "pick someone" prompt, used when the selection is
    /// cleared on a tab switch.
    pub fn clear_conversation(&mut self) {
        self.messages.clear();
        self.conversation_error = None;
        self.selected_contact = None;
    }

    pub fn set_requests(&mut self, requests: Vec<FriendRequest>) {
        self.requests = requests;
        self.requests_error = None;
        self.requests_loaded = true;
        if self.request_cursor >= self.requests.len() {
            self.request_cursor = self.requests.len().saturating_sub(1);
        }
    }

    pub fn set_requests_error(&mut self, message: String) {
        self.requests_error = Some(message);
        self.requests_loaded = true;
    }

    pub fn set_notice(&mut self, notice: String) {
        self.notice = Some(notice);
    }

    pub fn set_self_status(&mut self, status: PresenceStatus) {
        self.self_status = status;
    }

    /// Poll for one key press and translate it into an action. Returns
    /// `Ok(None)` when nothing actionable happened within the poll
    /// window.
    pub fn handle_input(&mut self) -> Result<Option<UiAction>> {
        if !event::poll(Duration::from_millis(10))? {
            return Ok(None);
        }
        let key = match event::read()? {
            Event::Key(key) if key.kind == KeyEventKind::Press => key,
            _ => return Ok(None),
        };

        // A fresh key press retires any transient notice
        self.notice = None;

        // The add-friend dialog captures everything while open
        if let Some(dialog) = &mut self.add_friend_dialog {
            match key.code {
                KeyCode::Esc => {
                    self.add_friend_dialog = None;
                    return Ok(None);
                }
                KeyCode::Enter => {
                    let query = dialog.input.value().trim().to_string();
                    self.add_friend_dialog = None;
                    if query.is_empty() {
                        return Ok(None);
                    }
                    return Ok(Some(UiAction::SendFriendRequest(query)));
                }
                _ => {
                    dialog.input.handle_event(&Event::Key(key));
                    return Ok(None);
                }
            }
        }

        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('r') => {
                    return Ok(Some(match self.active_tab {
                        Tab::Chat => UiAction::RefreshContacts,
                        Tab::Requests => UiAction::RefreshRequests,
                    }))
                }
                KeyCode::Char('a') => {
                    self.add_friend_dialog = Some(AddFriendDialog {
                        input: Input::default(),
                    });
                    return Ok(None);
                }
                KeyCode::Char('s') => return Ok(Some(UiAction::CycleStatus)),
                _ => return Ok(None),
            }
        }

        match key.code {
            KeyCode::Esc => return Ok(Some(UiAction::Quit)),
            KeyCode::Tab => {
                self.active_tab = match self.active_tab {
                    Tab::Chat => Tab::Requests,
                    Tab::Requests => Tab::Chat,
                };
                return Ok(Some(UiAction::SwitchedTab(self.active_tab)));
            }
            _ => {}
        }

        match self.active_tab {
            Tab::Chat => self.handle_chat_key(key),
            Tab::Requests => Ok(self.handle_requests_key(key)),
        }
    }

    fn handle_chat_key(&mut self, key: crossterm::event::KeyEvent) -> Result<Option<UiAction>> {
        match key.code {
            KeyCode::Up => {
                self.contact_cursor = self.contact_cursor.saturating_sub(1);
                Ok(None)
            }
            KeyCode::Down => {
                if !self.contacts.is_empty() && self.contact_cursor + 1 < self.contacts.len() {
                    self.contact_cursor += 1;
                }
                Ok(None)
            }
            KeyCode::Enter => {
                if !self.input.value().trim().is_empty() {
                    if self.selected_contact.is_none() {
                        self.set_notice("Select a contact first (Up/Down, then Enter)".into());
                        return Ok(None);
                    }
                    let text = self.input.value().trim().to_string();
                    self.input = Input::default();
                    return Ok(Some(UiAction::SendMessage(text)));
                }
                // Empty input: Enter selects the highlighted contact
                if let Some(entry) = self.contacts.get(self.contact_cursor) {
                    let id = entry.contact.id;
                    self.selected_contact = Some(id);
                    return Ok(Some(UiAction::SelectContact(id)));
                }
                Ok(None)
            }
            _ => {
                self.input.handle_event(&Event::Key(key));
                Ok(None)
            }
        }
    }

    fn handle_requests_key(&mut self, key: crossterm::event::KeyEvent) -> Option<UiAction> {
        match key.code {
            KeyCode::Up => {
                self.request_cursor = self.request_cursor.saturating_sub(1);
                None
            }
            KeyCode::Down => {
                if !self.requests.is_empty() && self.request_cursor + 1 < self.requests.len() {
                    self.request_cursor += 1;
                }
                None
            }
            KeyCode::Char('a') => self
                .requests
                .get(self.request_cursor)
                .filter(|r| r.status.is_actionable())
                .map(|r| UiAction::AcceptRequest(r.request_id)),
            KeyCode::Char('r') => self
                .requests
                .get(self.request_cursor)
                .filter(|r| r.status.is_actionable())
                .map(|r| UiAction::RejectRequest(r.request_id)),
            _ => None,
        }
    }

    pub fn draw<B: Backend>(&self, frame: &mut Frame<B>) {
        let size = frame.size();

        match self.active_tab {
            Tab::Chat => self.draw_chat_tab(frame, size),
            Tab::Requests => self.draw_requests_tab(frame, size),
        }

        if let Some(dialog) = &self.add_friend_dialog {
            draw_add_friend_dialog(frame, dialog, size);
        }
    }

    fn draw_chat_tab<B: Backend>(&self, frame: &mut Frame<B>, size: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage(25), // Contacts panel
                Constraint::Percentage(75), // Chat panel
            ])
            .split(size);

        let chat_chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(5),    // Messages area
                Constraint::Length(3), // Input box
                Constraint::Length(1), // Help / notice line
            ])
            .split(chunks[1]);

        // Contacts list with presence badges. Placeholders take the
        // place of entries so the panel never renders as a bare box.
        let items: Vec<ListItem> = if let Some(error) = &self.contacts_error {
            vec![ListItem::new(format!("! {}", error))
                .style(Style::default().fg(Color::Red))]
        } else if !self.contacts_loaded {
            vec![ListItem::new("Loading contacts...")]
        } else if self.contacts.is_empty() {
            vec![ListItem::new("No contacts yet")]
        } else {
            self.contacts
                .iter()
                .enumerate()
                .map(|(i, entry)| {
                    let cursor = if i == self.contact_cursor { ">" } else { " " };
                    let line = format!(
                        "{} {} {}",
                        cursor,
                        entry.status.indicator(),
                        entry.contact.username
                    );
                    let mut item = ListItem::new(line);
                    if Some(entry.contact.id) == self.selected_contact {
                        item = item.style(Style::default().add_modifier(Modifier::BOLD));
                    }
                    item
                })
                .collect()
        };

        let contacts_list = List::new(items).block(
            Block::default()
                .title(format!("Friends ({} online)", self.online_count))
                .borders(Borders::ALL),
        );
        frame.render_widget(contacts_list, chunks[0]);

        self.draw_messages(frame, chat_chunks[0]);

        let input_widget = Paragraph::new(self.input.value()).block(
            Block::default()
                .title("Message")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Yellow)),
        );
        frame.render_widget(input_widget, chat_chunks[1]);

        self.draw_help_line(frame, chat_chunks[2]);

        frame.set_cursor(
            chat_chunks[1].x + self.input.cursor() as u16 + 1,
            chat_chunks[1].y + 1,
        );
    }

    fn draw_messages<B: Backend>(&self, frame: &mut Frame<B>, area: Rect) {
        let title = match self
            .selected_contact
            .and_then(|id| self.contacts.iter().find(|e| e.contact.id == id))
        {
            Some(entry) => format!(
                "Chat with {} {}",
                entry.status.indicator(),
                entry.contact.username
            ),
            None => "Chat".to_string(),
        };

        let lines: Vec<Line> = if let Some(error) = &self.conversation_error {
            vec![Line::styled(
                format!("Could not load messages: {}", error),
                Style::default().fg(Color::Red),
            )]
        } else if self.selected_contact.is_none() && self.messages.is_empty() {
            // A refresh that dropped the selected contact keeps the last
            // conversation on screen; only an explicit deselect clears it
            vec![Line::from("Select a contact to start chatting")]
        } else if self.messages.is_empty() {
            vec![Line::from("No messages yet. Say hi!")]
        } else {
            let width = area.width.saturating_sub(2).max(10) as usize;
            let mut rendered = Vec::new();
            for message in &self.messages {
                let who = message.attribution(self.self_id);
                let stamp = message
                    .timestamp
                    .as_deref()
                    .map(|raw| format!("[{}] ", format_timestamp(raw)))
                    .unwrap_or_default();
                let style = if who == "You" {
                    Style::default().fg(Color::Cyan)
                } else {
                    Style::default().fg(Color::Green)
                };
                let body_width = width.saturating_sub(stamp.len() + who.len() + 2).max(8);
                for (i, piece) in wrap(&message.text, body_width).iter().enumerate() {
                    let text = if i == 0 {
                        format!("{}{}: {}", stamp, who, piece)
                    } else {
                        format!("    {}", piece)
                    };
                    rendered.push(Line::styled(text, style));
                }
            }
            // Keep the tail that fits the pane
            let height = area.height.saturating_sub(2) as usize;
            if rendered.len() > height {
                rendered.split_off(rendered.len() - height)
            } else {
                rendered
            }
        };

        let pane = Paragraph::new(lines)
            .block(Block::default().title(title).borders(Borders::ALL));
        frame.render_widget(pane, area);
    }

    fn draw_requests_tab<B: Backend>(&self, frame: &mut Frame<B>, size: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(3),    // Request list
                Constraint::Length(1), // Help / notice line
            ])
            .split(size);

        let items: Vec<ListItem> = if let Some(error) = &self.requests_error {
            vec![ListItem::new(format!("! {}", error))
                .style(Style::default().fg(Color::Red))]
        } else if !self.requests_loaded {
            vec![ListItem::new("Loading friend requests...")]
        } else if self.requests.is_empty() {
            vec![ListItem::new("No pending friend requests")]
        } else {
            self.requests
                .iter()
                .enumerate()
                .map(|(i, request)| {
                    let cursor = if i == self.request_cursor { ">" } else { " " };
                    let line = if request.status.is_actionable() {
                        format!(
                            "{} {} wants to be your friend   [a]ccept / [r]eject",
                            cursor, request.sender_name
                        )
                    } else {
                        format!("{} {} ({:?})", cursor, request.sender_name, request.status)
                    };
                    ListItem::new(line)
                })
                .collect()
        };

        let list = List::new(items).block(
            Block::default()
                .title("Friend requests")
                .borders(Borders::ALL),
        );
        frame.render_widget(list, chunks[0]);

        self.draw_help_line(frame, chunks[1]);
    }

    fn draw_help_line<B: Backend>(&self, frame: &mut Frame<B>, area: Rect) {
        let line = if let Some(notice) = &self.notice {
            Line::styled(notice.clone(), Style::default().fg(Color::Yellow))
        } else {
            Line::styled(
                format!(
                    "{} {} {} | ESC quit | TAB requests/chat | Ctrl+R refresh | Ctrl+A add friend | Ctrl+S status",
                    self.self_status.indicator(),
                    self.self_username,
                    self.self_status.as_str(),
                ),
                Style::default().fg(Color::Gray),
            )
        };
        frame.render_widget(Paragraph::new(line), area);
    }
}

fn draw_add_friend_dialog<B: Backend>(frame: &mut Frame<B>, dialog: &AddFriendDialog, area: Rect) {
    let popup = centered_rect(50, 3, area);
    frame.render_widget(Clear, popup);
    let widget = Paragraph::new(dialog.input.value()).block(
        Block::default()
            .title("Add friend: username or email (Enter to send, Esc to cancel)")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow)),
    );
    frame.render_widget(widget, popup);
    frame.set_cursor(popup.x + dialog.input.cursor() as u16 + 1, popup.y + 1);
}

/// A fixed-height popup horizontally centered with the given width
/// percentage.
fn centered_rect(percent_x: u16, height: u16, r: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(height),
            Constraint::Min(0),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}

pub fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    Ok(Terminal::new(backend)?)
}

pub fn restore_terminal(mut terminal: Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier::models::Contact;

    fn view_of(
        entries: Vec<(i64, &str, PresenceStatus)>,
        selected: Option<i64>,
    ) -> ContactListView {
        let entries: Vec<ContactEntry> = entries
            .into_iter()
            .map(|(id, name, status)| ContactEntry {
                contact: Contact {
                    id,
                    username: name.to_string(),
                },
                status,
            })
            .collect();
        let online_count = entries
            .iter()
            .filter(|e| e.status == PresenceStatus::Online)
            .count();
        ContactListView {
            entries,
            selected,
            online_count,
        }
    }

    #[test]
    fn test_refresh_keeps_selection_when_contact_vanishes() {
        let mut ui = ChatUI::new(1, "alice", PresenceStatus::Online);
        ui.selected_contact = Some(2);

        // The refreshed list no longer contains contact 2; the mirror
        // stays so sending still targets the dashboard's selection, and
        // only the active marker disappears from the render.
        ui.set_contacts(view_of(vec![(3, "carol", PresenceStatus::Online)], None));
        assert_eq!(ui.selected_contact, Some(2));
        assert_eq!(ui.online_count, 1);
    }

    #[test]
    fn test_clear_conversation_resets_selection_and_messages() {
        let mut ui = ChatUI::new(1, "alice", PresenceStatus::Online);
        ui.selected_contact = Some(2);
        ui.messages.push(ChatMessage {
            sender_id: Some(2),
            sender_name: Some("bob".to_string()),
            text: "hi".to_string(),
            timestamp: None,
        });

        ui.clear_conversation();
        assert_eq!(ui.selected_contact, None);
        assert!(ui.messages.is_empty());
    }

    #[test]
    fn test_set_contacts_clamps_cursor_to_shrunk_list() {
        let mut ui = ChatUI::new(1, "alice", PresenceStatus::Online);
        ui.set_contacts(view_of(
            vec![
                (1, "a", PresenceStatus::Offline),
                (2, "b", PresenceStatus::Offline),
                (3, "c", PresenceStatus::Offline),
            ],
            None,
        ));
        ui.contact_cursor = 2;

        ui.set_contacts(view_of(vec![(1, "a", PresenceStatus::Offline)], None));
        assert_eq!(ui.contact_cursor, 0);
    }
}

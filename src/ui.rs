use crate::app::App;
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph},
};
use tui_textarea::TextArea;

#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum FocusedPanel {
    Accounts,
    #[default]
    Messages,
    Details,
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum PromptKind {
    /// Optional address regex for loading a random saved account.
    Filter,
    Address,
    Password { address: String },
}

impl PromptKind {
    fn title(&self) -> &'static str {
        match self {
            PromptKind::Filter => " Address filter (regex, empty for any) ",
            PromptKind::Address => " Address ",
            PromptKind::Password { .. } => " Password ",
        }
    }
}

pub struct PromptState<'a> {
    pub kind: PromptKind,
    pub input: TextArea<'a>,
}

impl<'a> PromptState<'a> {
    pub fn new(kind: PromptKind) -> Self {
        let mut input = TextArea::default();
        input.set_cursor_line_style(Style::default());
        if matches!(kind, PromptKind::Password { .. }) {
            input.set_mask_char('•');
        }
        Self { kind, input }
    }

    pub fn value(&self) -> String {
        self.input.lines().join("")
    }
}

pub enum UIMode<'a> {
    Browsing,
    Prompt(PromptState<'a>),
}

pub struct UIState<'a> {
    pub selected_account_index: usize,
    pub selected_message_index: usize,
    pub accounts_list_state: ListState,
    pub messages_list_state: ListState,
    pub detail_scroll: u16,
    pub focused_panel: FocusedPanel,
    pub mode: UIMode<'a>,
    pub status_message: Option<String>,
}

impl<'a> Default for UIState<'a> {
    fn default() -> Self {
        Self {
            selected_account_index: 0,
            selected_message_index: 0,
            accounts_list_state: ListState::default(),
            messages_list_state: ListState::default(),
            detail_scroll: 0,
            focused_panel: FocusedPanel::Messages,
            mode: UIMode::Browsing,
            status_message: None,
        }
    }
}

impl<'a> UIState<'a> {
    /// Keeps selections inside the lists after they were reloaded.
    pub fn clamp(&mut self, app: &App) {
        self.selected_account_index = self
            .selected_account_index
            .min(app.saved_accounts.len().saturating_sub(1));
        self.selected_message_index = self
            .selected_message_index
            .min(app.messages.len().saturating_sub(1));
    }

    pub fn set_status(&mut self, status: String) {
        self.status_message = Some(status);
    }
}

fn border_style(focused: bool) -> Style {
    if focused {
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Gray)
    }
}

pub fn render(f: &mut Frame, app: &App, state: &mut UIState<'_>) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(3)])
        .split(f.area());

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(25), // Saved accounts
            Constraint::Percentage(35), // Inbox
            Constraint::Percentage(40), // Account and message details
        ])
        .split(rows[0]);

    // Panel 1: Saved accounts
    let active_address = app.session.as_ref().map(|s| s.address());
    let account_items: Vec<ListItem> = app
        .saved_accounts
        .iter()
        .map(|a| {
            let marker = if Some(a.address.as_str()) == active_address {
                "● "
            } else {
                "  "
            };
            ListItem::new(format!("{}{}", marker, a.address))
        })
        .collect();

    let accounts_block = Block::default()
        .borders(Borders::ALL)
        .title("Saved Accounts")
        .border_style(border_style(state.focused_panel == FocusedPanel::Accounts));

    if app.saved_accounts.is_empty() {
        let empty = Paragraph::new("No saved accounts")
            .block(accounts_block)
            .style(Style::default().fg(Color::DarkGray));
        f.render_widget(empty, chunks[0]);
    } else {
        let accounts_list = List::new(account_items)
            .block(accounts_block)
            .highlight_style(Style::default().fg(Color::Yellow));
        state
            .accounts_list_state
            .select(Some(state.selected_account_index));
        f.render_stateful_widget(accounts_list, chunks[0], &mut state.accounts_list_state);
    }

    // Panel 2: Inbox
    let list_width = chunks[1].width.saturating_sub(4) as usize;
    let msg_items: Vec<ListItem> = app
        .messages
        .iter()
        .enumerate()
        .map(|(i, m)| {
            let mut style = if i == state.selected_message_index {
                Style::default().fg(Color::Yellow)
            } else {
                Style::default()
            };
            if !m.seen {
                style = style.add_modifier(Modifier::BOLD);
            }

            let indicator = if i == state.selected_message_index {
                "█"
            } else {
                " "
            };
            let line1 = truncate(&format!(" From: {}", m.from.address), list_width);
            let line2 = truncate(&format!(" Subj: {}", m.subject), list_width);
            ListItem::new(format!("{}{}\n{}{}", indicator, line1, indicator, line2)).style(style)
        })
        .collect();

    let inbox_title = match &app.session {
        Some(session) => format!("Inbox - {}", session.address()),
        None => "Inbox".to_string(),
    };
    let inbox_block = Block::default()
        .borders(Borders::ALL)
        .title(inbox_title)
        .border_style(border_style(state.focused_panel == FocusedPanel::Messages));

    if app.messages.is_empty() {
        let text = if app.session.is_some() {
            "No messages"
        } else {
            "No active account"
        };
        let empty = Paragraph::new(text)
            .block(inbox_block)
            .style(Style::default().fg(Color::DarkGray));
        f.render_widget(empty, chunks[1]);
    } else {
        let list_widget = List::new(msg_items).block(inbox_block);
        state
            .messages_list_state
            .select(Some(state.selected_message_index));
        f.render_stateful_widget(list_widget, chunks[1], &mut state.messages_list_state);
    }

    // Panel 3: Details
    let details_block = Block::default()
        .borders(Borders::ALL)
        .title("Details")
        .border_style(border_style(state.focused_panel == FocusedPanel::Details));

    let detail_paragraph = Paragraph::new(detail_text(app, state.selected_message_index))
        .block(details_block)
        .wrap(ratatui::widgets::Wrap { trim: true })
        .scroll((state.detail_scroll, 0));
    f.render_widget(detail_paragraph, chunks[2]);

    // Status bar
    let status = state
        .status_message
        .clone()
        .unwrap_or_else(|| "n new · c login · r load · f refresh · d/D download · q quit".to_string());
    let status_bar = Paragraph::new(status)
        .block(Block::default().borders(Borders::ALL).title("Status"))
        .wrap(ratatui::widgets::Wrap { trim: true });
    f.render_widget(status_bar, rows[1]);

    if let UIMode::Prompt(prompt) = &mut state.mode {
        render_prompt(f, prompt);
    }
}

fn render_prompt(f: &mut Frame, prompt: &mut PromptState<'_>) {
    let area = centered_rect(60, 20, f.area());
    f.render_widget(Clear, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)])
        .split(area);

    prompt.input.set_block(
        Block::default()
            .borders(Borders::ALL)
            .title(prompt.kind.title())
            .border_style(
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
    );
    f.render_widget(&prompt.input, chunks[0]);

    let hint = match &prompt.kind {
        PromptKind::Password { address } => format!("Logging in as {} [Enter to submit, Esc to cancel]", address),
        _ => "[Enter to submit, Esc to cancel]".to_string(),
    };
    f.render_widget(
        Paragraph::new(hint).style(Style::default().fg(Color::Gray)),
        chunks[1],
    );

    let (row, col) = prompt.input.cursor();
    f.set_cursor_position((chunks[0].x + 1 + col as u16, chunks[0].y + 1 + row as u16));
}

fn detail_text(app: &App, selected_message: usize) -> String {
    let mut content = String::new();

    match &app.session {
        None => content.push_str("No active account\n"),
        Some(session) => {
            let account = session.account();
            content.push_str(&format!("Address:  {}\n", account.address));
            content.push_str(&format!("Password: {}\n", account.password));
            content.push_str(&format!("State:    {}\n", session.state().label()));
            if let Some(created) = account.created_at {
                content.push_str(&format!("Saved:    {}\n", created.format("%Y-%m-%d %H:%M")));
            }
            content.push_str(&format!("Folder:   {}\n", session.folder(&app.download_dir()).display()));
        }
    }

    if let Some(m) = app.messages.get(selected_message) {
        content.push_str("\n------------------------------------------------------------\n\n");
        let sender = match &m.from.name {
            Some(name) if !name.is_empty() => format!("{} <{}>", name, m.from.address),
            _ => m.from.address.clone(),
        };
        content.push_str(&format!("From:    {}\n", sender));
        content.push_str(&format!("Subject: {}\n", m.subject));
        content.push_str(&format!("Size:    {}\n", format_size(m.size)));
        content.push_str(&format!("Id:      {}\n\n", m.id));
        content.push_str(&clean_body(&m.intro));
    }

    content
}

fn truncate(s: &str, len: usize) -> String {
    let char_count = s.chars().count();
    if char_count > len {
        let truncated: String = s.chars().take(len.saturating_sub(3)).collect();
        format!("{}...", truncated)
    } else {
        s.to_string()
    }
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

/// Collapses runs of blank lines in a preview to a single blank line.
fn clean_body(body: &str) -> String {
    let normalized = body.replace("\r\n", "\n").replace('\r', "\n");
    let mut result = String::with_capacity(normalized.len());
    let mut blank_run = 0;
    let mut first_content = true;

    for line in normalized.split('\n') {
        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            blank_run += 1;
            continue;
        }
        if !first_content {
            for _ in 0..std::cmp::min(blank_run + 1, 2) {
                result.push('\n');
            }
        }
        result.push_str(trimmed);
        blank_run = 0;
        first_content = false;
    }

    result
}

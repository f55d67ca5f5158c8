mod app;
mod config;
mod db;
mod error;
mod mailtm;
mod models;
mod session;
mod ui;

use crate::app::App;
use crate::config::{Config, matches_key};
use crate::mailtm::{MailProvider, MailTmClient};
use crate::ui::{FocusedPanel, PromptKind, PromptState, UIMode, UIState};
use crossterm::{
    event::{self, Event, KeyCode},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode},
};
use ratatui::Terminal;
use ratatui::backend::{Backend, CrosstermBackend};
use std::io;
use std::sync::Arc;
use tracing::{info, warn};

const DEBUG_LOG: &str = "tempmail_debug.log";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load();
    if std::env::args().any(|arg| arg == "--debug") {
        init_debug_log()?;
    }

    let db = db::Database::new(&config.database.url)?;
    let mut ui_state = UIState::default();
    if let Err(e) = db.ensure_schema().await {
        // Sessions still work without persistence.
        warn!("Schema setup failed: {}", e);
        ui_state.set_status(format!("Database setup error: {}", e));
    }

    let provider: Arc<dyn MailProvider> = Arc::new(MailTmClient::new(&config.provider.base_url));
    let mut app = App::new(provider, db, config.clone());
    app.refresh_saved_accounts().await;
    info!("Loaded {} saved accounts", app.saved_accounts.len());

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, crossterm::terminal::EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run(&mut terminal, &mut app, &mut ui_state, &config).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        crossterm::terminal::LeaveAlternateScreen
    )?;
    terminal.show_cursor()?;

    result
}

fn init_debug_log() -> anyhow::Result<()> {
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(DEBUG_LOG)?;
    tracing_subscriber::fmt()
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .init();
    Ok(())
}

/// Shows `status` before a provider round trip blocks the loop.
fn show_busy<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &App,
    ui_state: &mut UIState<'_>,
    status: &str,
) -> io::Result<()> {
    ui_state.set_status(status.to_string());
    terminal.draw(|f| ui::render(f, app, ui_state))?;
    Ok(())
}

async fn run<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    ui_state: &mut UIState<'_>,
    config: &Config,
) -> anyhow::Result<()> {
    let keys = &config.keybindings;

    loop {
        ui_state.clamp(app);
        terminal.draw(|f| ui::render(f, app, ui_state))?;

        if !event::poll(std::time::Duration::from_millis(100))? {
            continue;
        }

        let Event::Key(key) = event::read()? else {
            continue;
        };

        if let UIMode::Prompt(prompt) = &mut ui_state.mode {
            match key.code {
                KeyCode::Esc => ui_state.mode = UIMode::Browsing,
                KeyCode::Enter => {
                    let kind = prompt.kind.clone();
                    let value = prompt.value();
                    ui_state.mode = UIMode::Browsing;
                    match kind {
                        PromptKind::Filter => {
                            show_busy(terminal, app, ui_state, "Loading saved account...")?;
                            let pattern = value.trim().to_string();
                            let status = app.load_random(Some(&pattern)).await;
                            ui_state.selected_message_index = 0;
                            ui_state.set_status(status);
                        }
                        PromptKind::Address => {
                            ui_state.mode = UIMode::Prompt(PromptState::new(PromptKind::Password {
                                address: value.trim().to_string(),
                            }));
                        }
                        PromptKind::Password { address } => {
                            show_busy(terminal, app, ui_state, &format!("Logging in as {}...", address))?;
                            let status = app.authenticate(&address, &value).await;
                            ui_state.selected_message_index = 0;
                            ui_state.set_status(status);
                        }
                    }
                }
                _ => {
                    prompt.input.input(key);
                }
            }
            continue;
        }

        if matches_key(key, &keys.quit) {
            break;
        }

        // Panel switching
        if matches_key(key, &keys.prev_panel) {
            ui_state.focused_panel = match ui_state.focused_panel {
                FocusedPanel::Details => FocusedPanel::Messages,
                FocusedPanel::Messages | FocusedPanel::Accounts => FocusedPanel::Accounts,
            };
        } else if matches_key(key, &keys.next_panel) {
            ui_state.focused_panel = match ui_state.focused_panel {
                FocusedPanel::Accounts => FocusedPanel::Messages,
                FocusedPanel::Messages | FocusedPanel::Details => FocusedPanel::Details,
            };
        }
        // Navigation within panels
        else if matches_key(key, &keys.move_down) {
            match ui_state.focused_panel {
                FocusedPanel::Accounts => {
                    if ui_state.selected_account_index < app.saved_accounts.len().saturating_sub(1) {
                        ui_state.selected_account_index += 1;
                    }
                }
                FocusedPanel::Messages => {
                    if ui_state.selected_message_index < app.messages.len().saturating_sub(1) {
                        ui_state.selected_message_index += 1;
                        ui_state.detail_scroll = 0;
                    }
                }
                FocusedPanel::Details => {
                    ui_state.detail_scroll = ui_state.detail_scroll.saturating_add(1);
                }
            }
        } else if matches_key(key, &keys.move_up) {
            match ui_state.focused_panel {
                FocusedPanel::Accounts => {
                    ui_state.selected_account_index = ui_state.selected_account_index.saturating_sub(1);
                }
                FocusedPanel::Messages => {
                    if ui_state.selected_message_index > 0 {
                        ui_state.selected_message_index -= 1;
                        ui_state.detail_scroll = 0;
                    }
                }
                FocusedPanel::Details => {
                    ui_state.detail_scroll = ui_state.detail_scroll.saturating_sub(1);
                }
            }
        }
        // Account actions
        else if matches_key(key, &keys.select) && ui_state.focused_panel == FocusedPanel::Accounts {
            show_busy(terminal, app, ui_state, "Loading account...")?;
            let status = app.load_saved(ui_state.selected_account_index).await;
            ui_state.selected_message_index = 0;
            ui_state.focused_panel = FocusedPanel::Messages;
            ui_state.set_status(status);
        } else if matches_key(key, &keys.new_account) {
            show_busy(terminal, app, ui_state, "Creating account...")?;
            let status = app.create_account().await;
            ui_state.selected_message_index = 0;
            ui_state.selected_account_index = 0;
            ui_state.set_status(status);
        } else if matches_key(key, &keys.login) {
            ui_state.mode = UIMode::Prompt(PromptState::new(PromptKind::Address));
        } else if matches_key(key, &keys.load_random) {
            ui_state.mode = UIMode::Prompt(PromptState::new(PromptKind::Filter));
        }
        // Message actions
        else if matches_key(key, &keys.refresh) {
            show_busy(terminal, app, ui_state, "Checking inbox...")?;
            let status = app.refresh_messages().await;
            app.refresh_saved_accounts().await;
            ui_state.set_status(status);
        } else if matches_key(key, &keys.download_all) {
            show_busy(terminal, app, ui_state, "Downloading all messages...")?;
            let status = app.download_all().await;
            ui_state.set_status(status);
        } else if matches_key(key, &keys.download) {
            show_busy(terminal, app, ui_state, "Downloading message...")?;
            let status = app.download_message(ui_state.selected_message_index).await;
            ui_state.set_status(status);
        } else if matches_key(key, &keys.open_folder) {
            let status = app.open_folder();
            ui_state.set_status(status);
        }
    }

    Ok(())
}

//! User-facing actions. Every action returns a status line for the UI; errors
//! are rendered into that line and never propagate out of here.

use crate::config::Config;
use crate::db::Database;
use crate::mailtm::MailProvider;
use crate::models::{Account, MessageSummary};
use crate::session::AccountSession;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

const NO_ACTIVE_ACCOUNT: &str = "No active account. Create one (n), log in (c) or load one (r).";

pub struct App {
    provider: Arc<dyn MailProvider>,
    db: Database,
    config: Config,
    pub session: Option<AccountSession>,
    pub messages: Vec<MessageSummary>,
    pub saved_accounts: Vec<Account>,
}

impl App {
    pub fn new(provider: Arc<dyn MailProvider>, db: Database, config: Config) -> Self {
        Self {
            provider,
            db,
            config,
            session: None,
            messages: Vec::new(),
            saved_accounts: Vec::new(),
        }
    }

    pub fn download_dir(&self) -> PathBuf {
        PathBuf::from(&self.config.download_dir)
    }

    fn activate(&mut self, session: AccountSession) {
        info!("Active account: {}", session.address());
        self.session = Some(session);
        self.messages.clear();
    }

    /// Generates credentials, registers them and mints the first token.
    pub async fn create_account(&mut self) -> String {
        let mut session = match AccountSession::generate(
            self.provider.clone(),
            self.db.clone(),
            &self.config.generator,
        )
        .await
        {
            Ok(session) => session,
            Err(e) => return format!("Could not generate an address: {}", e),
        };

        if let Err(e) = session.register().await {
            warn!("Registration of {} failed: {}", session.address(), e);
            return format!(
                "Could not register {}: {}. Press n to try another address.",
                session.address(),
                e
            );
        }

        let status = match session.ensure_token().await {
            Ok(_) => format!(
                "Created {} (password: {})",
                session.address(),
                session.account().password
            ),
            Err(e) => format!("Created {} but could not log in: {}", session.address(), e),
        };

        self.activate(session);
        self.refresh_saved_accounts().await;
        status
    }

    /// Logs into an account that already exists at the provider.
    pub async fn authenticate(&mut self, address: &str, password: &str) -> String {
        let address = address.trim();
        if address.is_empty() || password.is_empty() {
            return "Address and password are both required".to_string();
        }

        let mut session =
            AccountSession::existing(self.provider.clone(), self.db.clone(), address, password, None)
                .await;
        if let Err(e) = session.ensure_token().await {
            return format!("Login failed for {}: {}", address, e);
        }

        self.activate(session);
        self.refresh_saved_accounts().await;
        let listing = self.refresh_messages().await;
        format!("Logged in as {}. {}", address, listing)
    }

    /// Resumes a random saved account, optionally filtered by an address regex.
    pub async fn load_random(&mut self, pattern: Option<&str>) -> String {
        match self.db.find_random(pattern).await {
            Ok(Some(account)) => self.resume(account).await,
            Ok(None) => match pattern {
                Some(p) if !p.trim().is_empty() => format!("No saved account matches '{}'", p),
                _ => "No saved accounts yet".to_string(),
            },
            Err(e) => format!("Could not load an account: {}", e),
        }
    }

    /// Resumes the saved account at `index` in `saved_accounts`.
    pub async fn load_saved(&mut self, index: usize) -> String {
        let Some(account) = self.saved_accounts.get(index).cloned() else {
            return "No saved account selected".to_string();
        };
        self.resume(account).await
    }

    async fn resume(&mut self, account: Account) -> String {
        let address = account.address.clone();
        let session = AccountSession::from_stored(self.provider.clone(), self.db.clone(), account);
        self.activate(session);
        let listing = self.refresh_messages().await;
        format!("Loaded {}. {}", address, listing)
    }

    pub async fn refresh_messages(&mut self) -> String {
        let Some(session) = self.session.as_mut() else {
            return NO_ACTIVE_ACCOUNT.to_string();
        };

        match session.list_message_summaries().await {
            Ok(messages) => {
                self.messages = messages;
                match self.messages.len() {
                    0 => "Inbox is empty".to_string(),
                    1 => "1 message".to_string(),
                    n => format!("{} messages", n),
                }
            }
            Err(e) => format!("Could not list messages: {}", e),
        }
    }

    pub async fn download_message(&mut self, index: usize) -> String {
        let base_dir = self.download_dir();
        let Some(session) = self.session.as_mut() else {
            return NO_ACTIVE_ACCOUNT.to_string();
        };
        let Some(message) = self.messages.get(index) else {
            return "No message selected".to_string();
        };

        match session.download_one(&message.id, &base_dir).await {
            Ok(path) => format!("Saved {}", path.display()),
            Err(e) => format!("Failed to download message {}: {}", message.id, e),
        }
    }

    pub async fn download_all(&mut self) -> String {
        let base_dir = self.download_dir();
        let Some(session) = self.session.as_mut() else {
            return NO_ACTIVE_ACCOUNT.to_string();
        };

        match session.download_all(&base_dir).await {
            Ok(report) => report.to_string(),
            Err(e) => format!("Download failed: {}", e),
        }
    }

    pub async fn refresh_saved_accounts(&mut self) -> String {
        match self.db.list_accounts().await {
            Ok(accounts) => {
                self.saved_accounts = accounts;
                format!("{} saved accounts", self.saved_accounts.len())
            }
            Err(e) => {
                warn!("Listing saved accounts failed: {}", e);
                format!("Could not list saved accounts: {}", e)
            }
        }
    }

    /// Opens the active account's download folder in the system file browser.
    pub fn open_folder(&self) -> String {
        let Some(session) = &self.session else {
            return NO_ACTIVE_ACCOUNT.to_string();
        };
        let folder = session.folder(&self.download_dir());
        if !folder.is_dir() {
            return format!("Nothing downloaded yet for {}", session.address());
        }
        match open::that(&folder) {
            Ok(()) => format!("Opened {}", folder.display()),
            Err(e) => format!("Could not open {}: {}", folder.display(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionState;
    use crate::session::tests::{FakeProvider, store};

    async fn app_with(provider: FakeProvider, download_dir: &std::path::Path) -> App {
        let config = Config {
            download_dir: download_dir.display().to_string(),
            ..Config::default()
        };
        App::new(Arc::new(provider), store().await, config)
    }

    #[tokio::test]
    async fn test_actions_without_account() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app_with(FakeProvider::with_token("T1"), dir.path()).await;

        assert_eq!(app.refresh_messages().await, NO_ACTIVE_ACCOUNT);
        assert_eq!(app.download_all().await, NO_ACTIVE_ACCOUNT);
        assert_eq!(app.download_message(0).await, NO_ACTIVE_ACCOUNT);
        assert_eq!(app.open_folder(), NO_ACTIVE_ACCOUNT);
        assert_eq!(app.load_random(None).await, "No saved accounts yet");
    }

    #[tokio::test]
    async fn test_create_account_saves_and_lists() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app_with(FakeProvider::with_token("T1"), dir.path()).await;

        let status = app.create_account().await;
        assert!(status.starts_with("Created "), "{}", status);

        let session = app.session.as_ref().unwrap();
        assert_eq!(session.state(), SessionState::Persisted);
        assert_eq!(app.saved_accounts.len(), 1);
        assert_eq!(app.saved_accounts[0].address, session.address());
    }

    #[tokio::test]
    async fn test_unreachable_store_keeps_app_usable() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new("sqlite:/nonexistent_tempmail_dir/accounts.db?mode=rwc").unwrap();
        let config = Config {
            download_dir: dir.path().display().to_string(),
            ..Config::default()
        };
        let mut app = App::new(Arc::new(FakeProvider::with_token("T1")), db, config);

        let status = app.refresh_saved_accounts().await;
        assert!(status.starts_with("Could not list saved accounts"), "{}", status);

        let status = app.create_account().await;
        assert!(status.starts_with("Created "), "{}", status);
        let session = app.session.as_ref().unwrap();
        assert_eq!(session.state(), SessionState::Authenticated);
    }

    #[tokio::test]
    async fn test_create_account_reports_taken_address() {
        let dir = tempfile::tempdir().unwrap();
        let provider = FakeProvider {
            taken: ('a'..='z').map(|c| format!("{}@mail.example", c)).collect(),
            ..FakeProvider::with_token("T1")
        };
        let mut app = app_with(provider, dir.path()).await;
        app.config.generator.local_part_length = 1;

        let status = app.create_account().await;
        assert!(status.starts_with("Could not register "), "{}", status);
        assert!(status.contains("HTTP 422"));
        assert!(app.session.is_none());
        assert!(app.saved_accounts.is_empty());
    }

    #[tokio::test]
    async fn test_create_account_without_domains() {
        let dir = tempfile::tempdir().unwrap();
        let provider = FakeProvider {
            domains: Vec::new(),
            ..FakeProvider::with_token("T1")
        };
        let mut app = app_with(provider, dir.path()).await;

        let status = app.create_account().await;
        assert!(status.starts_with("Could not generate an address"));
        assert!(app.session.is_none());
    }

    #[tokio::test]
    async fn test_failed_login_keeps_previous_state() {
        let dir = tempfile::tempdir().unwrap();
        let provider = FakeProvider {
            token: None,
            ..FakeProvider::default()
        };
        let mut app = app_with(provider, dir.path()).await;

        let status = app.authenticate("who@x.example", "wrong").await;
        assert!(status.starts_with("Login failed for who@x.example"));
        assert!(app.session.is_none());
        assert!(app.saved_accounts.is_empty());

        assert_eq!(
            app.authenticate("  ", "pw").await,
            "Address and password are both required"
        );
    }

    #[tokio::test]
    async fn test_login_lists_messages() {
        let dir = tempfile::tempdir().unwrap();
        let provider = FakeProvider::with_token("T1").with_messages(&["m1", "m2"]);
        let mut app = app_with(provider, dir.path()).await;

        let status = app.authenticate("abcd@mail.example", "abcdefgh").await;
        assert_eq!(status, "Logged in as abcd@mail.example. 2 messages");
        assert_eq!(app.messages.len(), 2);
        assert_eq!(app.saved_accounts.len(), 1);
    }

    #[tokio::test]
    async fn test_load_random_and_download() {
        let dir = tempfile::tempdir().unwrap();
        let provider = FakeProvider::with_token("T1")
            .with_messages(&["m1", "m2", "m3"])
            .failing_on("m3");
        let mut app = app_with(provider, dir.path()).await;
        app.authenticate("abcd@mail.example", "abcdefgh").await;
        app.session = None;

        assert_eq!(
            app.load_random(Some("^nobody@")).await,
            "No saved account matches '^nobody@'"
        );
        let status = app.load_random(Some("^abcd@")).await;
        assert_eq!(status, "Loaded abcd@mail.example. 3 messages");

        let status = app.download_message(0).await;
        assert!(status.starts_with("Saved "), "{}", status);
        assert!(app.download_message(7).await.starts_with("No message selected"));

        let status = app.download_all().await;
        assert!(status.starts_with("Downloaded 2 of 3 messages"), "{}", status);
        assert!(status.contains("m3"));
    }

    #[tokio::test]
    async fn test_load_saved_by_index() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app_with(FakeProvider::with_token("T1"), dir.path()).await;
        app.authenticate("abcd@mail.example", "abcdefgh").await;

        assert_eq!(app.load_saved(0).await, "Loaded abcd@mail.example. Inbox is empty");
        assert_eq!(app.load_saved(5).await, "No saved account selected");
        assert_eq!(app.download_all().await, "No messages found to download");
        assert!(app.open_folder().starts_with("Nothing downloaded yet"));
    }
}

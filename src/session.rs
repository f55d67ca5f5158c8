use crate::config::GeneratorConfig;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::mailtm::MailProvider;
use crate::models::{Account, Domain, MessageSummary, RegisteredAccount};
use chrono::Local;
use rand::Rng;
use rand::distributions::Alphanumeric;
use rand::seq::SliceRandom;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Lifecycle of one account inside a session. A session only moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionState {
    /// Address and password chosen, nothing sent to the provider yet.
    New,
    /// The provider knows the account.
    Registered,
    /// A token is held in memory.
    Authenticated,
    /// The token has been written to the credential store.
    Persisted,
}

impl SessionState {
    pub fn label(&self) -> &'static str {
        match self {
            SessionState::New => "new",
            SessionState::Registered => "registered",
            SessionState::Authenticated => "authenticated",
            SessionState::Persisted => "saved",
        }
    }
}

/// Binds one account to the provider client and the credential store.
pub struct AccountSession {
    account: Account,
    state: SessionState,
    provider: Arc<dyn MailProvider>,
    db: Database,
}

impl AccountSession {
    pub fn new(
        provider: Arc<dyn MailProvider>,
        db: Database,
        address: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            account: Account::new(address, password),
            state: SessionState::New,
            provider,
            db,
        }
    }

    /// Draws a domain from the provider and synthesizes fresh credentials.
    pub async fn generate(
        provider: Arc<dyn MailProvider>,
        db: Database,
        config: &GeneratorConfig,
    ) -> Result<Self> {
        let domains = provider.list_domains().await?;
        let (address, password) = generate_credentials(&domains, config)?;
        debug!("Generated address {}", address);
        Ok(Self::new(provider, db, address, password))
    }

    /// Wraps an account that already exists at the provider. A token supplied
    /// up front is saved right away.
    pub async fn existing(
        provider: Arc<dyn MailProvider>,
        db: Database,
        address: impl Into<String>,
        password: impl Into<String>,
        token: Option<String>,
    ) -> Self {
        let mut session = Self::new(provider, db, address, password);
        session.state = SessionState::Registered;
        if let Some(token) = token {
            session.account.token = Some(token);
            session.transition(SessionState::Authenticated);
            session.persist().await;
        }
        session
    }

    /// Resumes a row loaded from the credential store.
    pub fn from_stored(provider: Arc<dyn MailProvider>, db: Database, account: Account) -> Self {
        let state = if account.token.is_some() {
            SessionState::Persisted
        } else {
            SessionState::Registered
        };
        Self {
            account,
            state,
            provider,
            db,
        }
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    pub fn address(&self) -> &str {
        &self.account.address
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Per-account download folder under `base_dir`.
    pub fn folder(&self, base_dir: &Path) -> PathBuf {
        base_dir.join(self.account.folder_name())
    }

    fn transition(&mut self, next: SessionState) {
        if next > self.state {
            debug!(
                "{}: {} -> {}",
                self.account.address,
                self.state.label(),
                next.label()
            );
            self.state = next;
        }
    }

    /// A failed save is only logged: the account stays usable in memory.
    async fn persist(&mut self) {
        match self.db.upsert_account(&self.account).await {
            Ok(true) => self.transition(SessionState::Persisted),
            Ok(false) => {}
            Err(e) => warn!("Database save failed for {}: {}", self.account.address, e),
        }
    }

    pub async fn register(&mut self) -> Result<RegisteredAccount> {
        let registered = self
            .provider
            .register_account(&self.account.address, &self.account.password)
            .await?;
        info!("Registered {}", self.account.address);
        self.transition(SessionState::Registered);
        Ok(registered)
    }

    /// Returns the held token, minting and saving one first if needed.
    pub async fn ensure_token(&mut self) -> Result<String> {
        if let Some(token) = &self.account.token {
            return Ok(token.clone());
        }

        let token = self
            .provider
            .mint_token(&self.account.address, &self.account.password)
            .await?;
        self.account.token = Some(token.clone());
        self.transition(SessionState::Authenticated);
        self.persist().await;
        Ok(token)
    }

    pub async fn list_message_summaries(&mut self) -> Result<Vec<MessageSummary>> {
        let token = self.ensure_token().await?;
        self.provider.list_messages(&token).await
    }

    /// Fetches one raw message into the account folder and returns the file path.
    pub async fn download_one(&mut self, message_id: &str, base_dir: &Path) -> Result<PathBuf> {
        let token = self.ensure_token().await?;

        let folder = self.folder(base_dir);
        tokio::fs::create_dir_all(&folder).await?;

        let bytes = self.provider.download_message(&token, message_id).await?;
        let path = folder.join(message_filename(message_id));
        tokio::fs::write(&path, &bytes).await?;
        debug!("Wrote {}", path.display());
        Ok(path)
    }

    /// Downloads every listed message, one at a time. A failing message is
    /// recorded in the report and the remaining ones are still attempted.
    pub async fn download_all(&mut self, base_dir: &Path) -> Result<DownloadReport> {
        let messages = self.list_message_summaries().await?;
        if messages.is_empty() {
            return Ok(DownloadReport::NoMessages);
        }

        let folder = self.folder(base_dir);
        let mut saved = Vec::new();
        let mut failures = Vec::new();

        for message in messages.iter().filter(|m| !m.id.is_empty()) {
            match self.download_one(&message.id, base_dir).await {
                Ok(path) => saved.push(path),
                Err(e) => {
                    warn!("Download of {} failed: {}", message.id, e);
                    failures.push(format!("Failed to download message {}: {}", message.id, e));
                }
            }
        }

        Ok(DownloadReport::Completed {
            folder,
            total: messages.len(),
            saved,
            failures,
        })
    }
}

/// Random lowercase local part on a random active domain, plus an
/// alphanumeric password `password_extra` characters longer.
pub fn generate_credentials(
    domains: &[Domain],
    config: &GeneratorConfig,
) -> Result<(String, String)> {
    let active: Vec<&Domain> = domains.iter().filter(|d| d.is_active).collect();
    let candidates: Vec<&Domain> = if active.is_empty() {
        domains.iter().collect()
    } else {
        active
    };

    let mut rng = rand::thread_rng();
    let domain = candidates.choose(&mut rng).ok_or(Error::NoDomains)?;

    let local: String = (0..config.local_part_len())
        .map(|_| char::from(rng.gen_range(b'a'..=b'z')))
        .collect();
    let password: String = (0..config.password_len())
        .map(|_| char::from(rng.sample(Alphanumeric)))
        .collect();

    Ok((format!("{}@{}", local, domain.domain), password))
}

fn message_filename(message_id: &str) -> String {
    format!(
        "email_{}_{}.eml",
        Local::now().format("%Y%m%d_%H%M%S"),
        message_id
    )
}

#[derive(Debug)]
pub enum DownloadReport {
    /// The mailbox is empty; nothing was written.
    NoMessages,
    Completed {
        folder: PathBuf,
        total: usize,
        saved: Vec<PathBuf>,
        failures: Vec<String>,
    },
}

impl DownloadReport {
    pub fn success_count(&self) -> usize {
        match self {
            DownloadReport::NoMessages => 0,
            DownloadReport::Completed { saved, .. } => saved.len(),
        }
    }

    pub fn failure_count(&self) -> usize {
        match self {
            DownloadReport::NoMessages => 0,
            DownloadReport::Completed { failures, .. } => failures.len(),
        }
    }
}

impl fmt::Display for DownloadReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DownloadReport::NoMessages => write!(f, "No messages found to download"),
            DownloadReport::Completed {
                folder,
                saved,
                failures,
                ..
            } if failures.is_empty() => write!(
                f,
                "Successfully downloaded {} messages to {}",
                saved.len(),
                folder.display()
            ),
            DownloadReport::Completed {
                folder,
                total,
                saved,
                failures,
            } => write!(
                f,
                "Downloaded {} of {} messages to {}. Errors: {}",
                saved.len(),
                total,
                folder.display(),
                failures.join("; ")
            ),
        }
    }
}

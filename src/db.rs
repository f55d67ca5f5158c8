use crate::error::Result;
use crate::models::Account;
use rand::seq::SliceRandom;
use regex::Regex;
use sqlx::sqlite::SqlitePool;
use tracing::{debug, info};

const SELECT_ACCOUNTS: &str = "SELECT address, password, token, created_at FROM accounts";

/// Credential store: the only writer of the `accounts` table.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub fn new(database_url: &str) -> Result<Self> {
        use sqlx::sqlite::SqliteConnectOptions;
        use std::str::FromStr;

        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

        // Connection failures surface on first use, so the UI can still start.
        let pool = SqlitePool::connect_lazy_with(options);
        Ok(Self { pool })
    }

    #[cfg(test)]
    pub async fn in_memory() -> Result<Self> {
        use sqlx::sqlite::SqlitePoolOptions;

        // A second connection would see a different in-memory database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Ok(Self { pool })
    }

    /// Creates the `accounts` table if it is missing. Safe to call repeatedly.
    pub async fn ensure_schema(&self) -> Result<()> {
        let schema = include_str!("../schema.sql");
        sqlx::query(schema).execute(&self.pool).await?;
        Ok(())
    }

    /// Replaces the stored row for `account.address` inside one transaction.
    ///
    /// Accounts without a token are never persisted; `Ok(false)` reports the skip.
    /// The first `created_at` of an address survives later upserts.
    pub async fn upsert_account(&self, account: &Account) -> Result<bool> {
        let Some(token) = account.token.as_deref() else {
            debug!("Skipping save of {}: no token yet", account.address);
            return Ok(false);
        };

        let mut tx = self.pool.begin().await?;

        // Writing first takes the write lock up front; a concurrent upsert of
        // the same address then waits on the busy timeout instead of failing.
        let created_at: Option<String> =
            sqlx::query_scalar("DELETE FROM accounts WHERE address = ? RETURNING created_at")
                .bind(&account.address)
                .fetch_optional(&mut *tx)
                .await?;

        sqlx::query(
            "INSERT INTO accounts (address, password, token, created_at)
             VALUES (?, ?, ?, COALESCE(?, strftime('%Y-%m-%d %H:%M:%f', 'now')))",
        )
        .bind(&account.address)
        .bind(&account.password)
        .bind(token)
        .bind(created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        info!("Saved account: {}", account.address);
        Ok(true)
    }

    pub async fn find_account(&self, address: &str) -> Result<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(&format!("{SELECT_ACCOUNTS} WHERE address = ?"))
            .bind(address)
            .fetch_optional(&self.pool)
            .await?;
        Ok(account)
    }

    /// Picks one stored account uniformly at random, optionally restricted to
    /// addresses matching `pattern` (unanchored regex search).
    pub async fn find_random(&self, pattern: Option<&str>) -> Result<Option<Account>> {
        let filter = pattern
            .filter(|p| !p.trim().is_empty())
            .map(Regex::new)
            .transpose()?;

        let Some(filter) = filter else {
            let account =
                sqlx::query_as::<_, Account>(&format!("{SELECT_ACCOUNTS} ORDER BY RANDOM() LIMIT 1"))
                    .fetch_optional(&self.pool)
                    .await?;
            return Ok(account);
        };

        let accounts = sqlx::query_as::<_, Account>(SELECT_ACCOUNTS)
            .fetch_all(&self.pool)
            .await?;

        let candidates: Vec<Account> = accounts
            .into_iter()
            .filter(|a| filter.is_match(&a.address))
            .collect();

        Ok(candidates.choose(&mut rand::thread_rng()).cloned())
    }

    /// All stored accounts, newest first.
    pub async fn list_accounts(&self) -> Result<Vec<Account>> {
        let accounts = sqlx::query_as::<_, Account>(&format!(
            "{SELECT_ACCOUNTS} ORDER BY created_at DESC, rowid DESC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(accounts)
    }
}

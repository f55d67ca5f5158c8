use regex::Regex;
use serde::Deserialize;
use sqlx::Row;
use sqlx::sqlite::SqlitePoolOptions;
use std::env;

const DEFAULT_DATABASE_URL: &str = "sqlite:tempmail.db";

/// The slice of `settings.toml` this tool reads.
#[derive(Debug, Default, Deserialize)]
struct Settings {
    #[serde(default)]
    database: DatabaseSettings,
}

#[derive(Debug, Default, Deserialize)]
struct DatabaseSettings {
    url: Option<String>,
}

/// `TEMPMAIL_DATABASE_URL`, then `[database] url`, then the local default file.
fn resolve_database_url(settings: Option<&str>, env_url: Option<String>) -> String {
    if let Some(url) = env_url.filter(|u| !u.trim().is_empty()) {
        return url;
    }
    settings
        .and_then(|raw| toml::from_str::<Settings>(raw).ok())
        .and_then(|s| s.database.url)
        .filter(|u| !u.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.iter().any(|a| a == "-h" || a == "--help") {
        eprintln!("Usage: {} [address_regex]", args[0]);
        eprintln!("Lists saved accounts, newest first. The regex filters by address.");
        std::process::exit(1);
    }

    let filter = args.get(1).map(|p| Regex::new(p)).transpose()?;

    let settings = std::fs::read_to_string("settings.toml").ok();
    let database_url =
        resolve_database_url(settings.as_deref(), env::var("TEMPMAIL_DATABASE_URL").ok());
    let pool = SqlitePoolOptions::new()
        .connect(&database_url)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to database: {}", e))?;

    let rows = sqlx::query(
        "SELECT address, password, token, created_at
         FROM accounts
         ORDER BY created_at DESC",
    )
    .fetch_all(&pool)
    .await?;

    let mut shown = 0;
    for row in rows {
        let address: String = row.get("address");
        if filter.as_ref().is_some_and(|re| !re.is_match(&address)) {
            continue;
        }
        let password: String = row.get("password");
        let token: String = row.get("token");
        let created_at: String = row.get("created_at");

        println!("Address:  {}", address);
        println!("Password: {}", password);
        println!("Token:    {}...", token.chars().take(16).collect::<String>());
        println!("Saved:    {}", created_at);
        println!(
            "--------------------------------------------------------------------------------"
        );
        shown += 1;
    }

    if shown == 0 {
        match args.get(1) {
            Some(pattern) => println!("No saved accounts matching '{}'", pattern),
            None => println!("No saved accounts"),
        }
    }

    Ok(())
}

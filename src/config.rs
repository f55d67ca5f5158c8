use crate::mailtm::DEFAULT_BASE_URL;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use serde::{Deserialize, Serialize};

pub const DATABASE_URL_ENV: &str = "TEMPMAIL_DATABASE_URL";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default = "default_download_dir")]
    pub download_dir: String,
    #[serde(default)]
    pub keybindings: Keybindings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub base_url: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:tempmail.db?mode=rwc".to_string(),
        }
    }
}

/// Shape of generated credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    pub local_part_length: usize,
    /// How many characters longer than the local part the password is.
    pub password_extra: usize,
}

impl GeneratorConfig {
    /// Configured local-part length, never less than one character.
    pub fn local_part_len(&self) -> usize {
        self.local_part_length.max(1)
    }

    pub fn password_len(&self) -> usize {
        self.local_part_len() + self.password_extra
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            local_part_length: 4,
            password_extra: 4,
        }
    }
}

fn default_download_dir() -> String {
    "downloads".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Keybindings {
    pub next_panel: Vec<String>,
    pub prev_panel: Vec<String>,
    pub move_up: Vec<String>,
    pub move_down: Vec<String>,
    pub select: Vec<String>,
    pub new_account: Vec<String>,
    pub login: Vec<String>,
    pub load_random: Vec<String>,
    pub refresh: Vec<String>,
    pub download: Vec<String>,
    pub download_all: Vec<String>,
    pub open_folder: Vec<String>,
    pub quit: Vec<String>,
}

impl Default for Keybindings {
    fn default() -> Self {
        Self {
            next_panel: vec!["l".to_string(), "Right".to_string(), "Tab".to_string()],
            prev_panel: vec!["h".to_string(), "Left".to_string(), "BackTab".to_string()],
            move_up: vec!["k".to_string(), "Up".to_string()],
            move_down: vec!["j".to_string(), "Down".to_string()],
            select: vec!["Enter".to_string()],
            new_account: vec!["n".to_string()],
            login: vec!["c".to_string()],
            load_random: vec!["r".to_string()],
            refresh: vec!["f".to_string(), "F5".to_string()],
            download: vec!["d".to_string()],
            download_all: vec!["D".to_string()],
            open_folder: vec!["o".to_string()],
            quit: vec!["q".to_string()],
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            database: DatabaseConfig::default(),
            generator: GeneratorConfig::default(),
            download_dir: default_download_dir(),
            keybindings: Keybindings::default(),
        }
    }
}

pub fn parse_key_string(key_str: &str) -> (KeyCode, KeyModifiers) {
    // "-" on its own is a key, not a separator
    if key_str == "-" {
        return (KeyCode::Char('-'), KeyModifiers::empty());
    }

    let mut parts: Vec<&str> = key_str.split('-').collect();
    let mut modifiers = KeyModifiers::empty();

    let base_key_str = parts.pop().unwrap_or("");

    for part in parts {
        match part.to_lowercase().as_str() {
            "ctrl" => modifiers.insert(KeyModifiers::CONTROL),
            "alt" => modifiers.insert(KeyModifiers::ALT),
            "shift" => modifiers.insert(KeyModifiers::SHIFT),
            _ => {}
        }
    }

    let mut chars = base_key_str.chars();
    let code = match (base_key_str, chars.next(), chars.next()) {
        ("Backspace", ..) => KeyCode::Backspace,
        ("Enter", ..) => KeyCode::Enter,
        ("Left", ..) => KeyCode::Left,
        ("Right", ..) => KeyCode::Right,
        ("Up", ..) => KeyCode::Up,
        ("Down", ..) => KeyCode::Down,
        ("Tab", ..) => KeyCode::Tab,
        ("BackTab", ..) => KeyCode::BackTab,
        ("Esc", ..) => KeyCode::Esc,
        ("F5", ..) => KeyCode::F(5),
        (_, Some(c), None) => KeyCode::Char(c),
        _ => KeyCode::Null,
    };

    (code, modifiers)
}

pub fn matches_key(event: KeyEvent, bindings: &[String]) -> bool {
    bindings.iter().any(|b| {
        let (code, modifiers) = parse_key_string(b);
        event.code == code && event.modifiers.contains(modifiers)
    })
}

impl Config {
    pub fn load() -> Self {
        use std::fs;
        let mut config: Config = fs::read_to_string("settings.toml")
            .ok()
            .and_then(|content| toml::from_str(&content).ok())
            .unwrap_or_default();
        config.apply_env(std::env::var(DATABASE_URL_ENV).ok());
        config
    }

    /// The database location may carry credentials, so the environment wins
    /// over the settings file.
    fn apply_env(&mut self, database_url: Option<String>) {
        if let Some(url) = database_url.filter(|u| !u.trim().is_empty()) {
            self.database.url = url;
        }
    }
}

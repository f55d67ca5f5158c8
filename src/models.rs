use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Account {
    pub address: String,
    pub password: String,
    pub token: Option<String>,
    #[sqlx(default)]
    pub created_at: Option<NaiveDateTime>,
}

impl Account {
    pub fn new(address: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            password: password.into(),
            token: None,
            created_at: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Folder name for downloads: `@` and `.` are not safe on every filesystem.
    pub fn folder_name(&self) -> String {
        self.address.replace('@', "_at_").replace('.', "_dot_")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Domain {
    #[serde(default)]
    pub id: String,
    pub domain: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_private: bool,
}

fn default_true() -> bool {
    true
}

/// Body returned by `POST /accounts`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisteredAccount {
    #[serde(default)]
    pub id: String,
    pub address: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sender {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSummary {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub from: Sender,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub intro: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub seen: bool,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Provider collections come either as JSON-LD (`hydra:member`) or as a bare
/// array, depending on the `Accept` header the server honours.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Collection<T> {
    Hydra {
        #[serde(rename = "hydra:member", alias = "member")]
        member: Vec<T>,
    },
    Plain(Vec<T>),
}

impl<T> Collection<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Collection::Hydra { member } => member,
            Collection::Plain(items) => items,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub token: Option<String>,
}

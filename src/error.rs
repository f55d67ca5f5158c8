use thiserror::Error;

/// Failures surfaced by the provider client, the credential store and the
/// account session.
#[derive(Debug, Error)]
pub enum Error {
    /// Domain listing returned a non-2xx status.
    #[error("Provider unavailable (HTTP {status})")]
    ProviderUnavailable { status: u16 },

    /// Registration was refused. The provider does not tell a taken address
    /// apart from other rejections, so the raw status is kept.
    #[error("Address is already taken (HTTP {status})")]
    AddressTaken { status: u16 },

    #[error("Unrecognized address and password (HTTP {status})")]
    InvalidCredentials { status: u16 },

    #[error("Unrecognized token (HTTP {status})")]
    InvalidToken { status: u16 },

    #[error("Message {id} not found")]
    NotFound { id: String },

    #[error("Provider returned no usable domains")]
    NoDomains,

    #[error("Credential store unavailable: {0}")]
    StoreUnavailable(#[from] sqlx::Error),

    #[error("Invalid address pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

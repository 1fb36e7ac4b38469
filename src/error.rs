use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Brutal24Error {
    #[error("IO error: {0}")]
    Io(String),

    #[error("JSON error: {0}")]
    Json(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Backend error ({status}): {message}")]
    Backend { status: u16, message: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Realtime error: {0}")]
    Realtime(String),

    #[error("{0}")]
    Validation(String),

    #[error("Anyhow error: {0}")]
    Anyhow(String),
}

pub type Result<T, E = Brutal24Error> = std::result::Result<T, E>;

impl From<serde_json::Error> for Brutal24Error {
    fn from(err: serde_json::Error) -> Self {
        Brutal24Error::Json(err.to_string())
    }
}

impl From<io::Error> for Brutal24Error {
    fn from(err: io::Error) -> Self {
        Brutal24Error::Io(err.to_string())
    }
}

impl From<reqwest::Error> for Brutal24Error {
    fn from(err: reqwest::Error) -> Self {
        Brutal24Error::Network(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for Brutal24Error {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Brutal24Error::Realtime(err.to_string())
    }
}

impl From<url::ParseError> for Brutal24Error {
    fn from(err: url::ParseError) -> Self {
        Brutal24Error::Config(err.to_string())
    }
}

impl From<anyhow::Error> for Brutal24Error {
    fn from(err: anyhow::Error) -> Self {
        Brutal24Error::Anyhow(err.to_string())
    }
}

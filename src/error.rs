//! Error types for cardspot.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpotError {
    #[error("unknown item set '{0}'")]
    UnknownItemSet(String),

    #[error("item set '{name}' must have exactly {expected} items, found {found}")]
    ItemSetSize {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid game state: level {level}, sub-level {sub_level}, step {step}")]
    InvalidState { level: u8, sub_level: u8, step: u8 },

    #[error("history error: {0}")]
    History(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SpotError>;

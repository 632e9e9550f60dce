//! Error type shared by the sequence model, persistence, playback and hotkeys.

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("index {index} is out of range for a sequence of {len} events")]
    Index { index: usize, len: usize },

    #[error("invalid value: {0}")]
    Validation(String),

    #[error("malformed config: {0}")]
    Format(String),

    #[error("config '{0}' not found")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("hotkey registration failed: {0}")]
    Registration(String),

    #[error("the event list is empty")]
    EmptySequence,

    #[error("input injection failed: {0}")]
    Injection(String),

    #[error("input capture failed: {0}")]
    Capture(String),

    #[error("settings error: {0}")]
    Settings(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Format(err.to_string())
    }
}

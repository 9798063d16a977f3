use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    Navigation(String),

    #[error("Could not find queue: {0}")]
    QueueNotFound(String),

    #[error("Page error: {0}")]
    Page(String),

    #[error("Timed out after {ms}ms waiting for {what}")]
    Timeout { ms: u64, what: String },
}

pub type Result<T> = std::result::Result<T, Error>;

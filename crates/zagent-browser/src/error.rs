use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Discovery request failed, returned non-2xx, or had no control-channel address.
    #[error("CDP connection error: {0}")]
    Connection(String),

    /// No usable, owned or launchable endpoint.
    #[error("{message}")]
    Session {
        message: String,
        pid: Option<String>,
        actual_profile_dir: Option<String>,
        expected_profile_dir: Option<String>,
    },

    /// No agent tab to bind and nothing to navigate to.
    #[error("{0}")]
    Bind(String),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("CDP error: {0}")]
    Cdp(String),

    #[error(transparent)]
    Core(#[from] zagent_core::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn session(message: impl Into<String>) -> Self {
        Error::Session {
            message: message.into(),
            pid: None,
            actual_profile_dir: None,
            expected_profile_dir: None,
        }
    }
}

impl From<chromiumoxide::error::CdpError> for Error {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        Error::Cdp(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

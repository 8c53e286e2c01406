use thiserror::Error;
use tokio::sync::AcquireError;

/// Every failure the relay can report.
#[derive(Debug, Error)]
pub enum Error {
    /// The remote answered with its login page; the caller must authenticate again.
    #[error("session expired")]
    SessionExpired,

    /// The caller lacks permission to read the board.
    #[error("access denied")]
    AccessDenied,

    /// A caller-supplied range, or the page span derived from it, is unusable.
    #[error("invalid range ({start}, {end})")]
    InvalidRange {
        /// First index asked for.
        start: i64,
        /// Last index asked for.
        end: i64,
    },

    /// The remote returned nothing usable for the request.
    #[error("not found: {0}")]
    NotFound(String),

    /// The remote answered with an empty or malformed document.
    #[error("remote server is down: {0}")]
    ServerDown(String),

    /// The live board no longer serves the thread; it has moved to the archive.
    #[error("thread {0} is archived")]
    Archived(String),

    /// Network level failure.
    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    /// A cached document or a batch payload failed to (de)serialize.
    #[error("{0}")]
    Json(#[from] serde_json::Error),

    /// The configuration file is not valid TOML for [`Config`](crate::config::Config).
    #[error("{0}")]
    Config(#[from] toml::de::Error),

    /// Filesystem failure in the file-backed store or config loader.
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// The request throttle was shut down while a fetch waited on it.
    #[error("request limiter closed: {0}")]
    Limiter(#[from] AcquireError),
}

impl Error {
    /// Errors that mean the remote refused the caller rather than failed.
    pub fn is_auth(&self) -> bool {
        matches!(self, Error::SessionExpired | Error::AccessDenied)
    }
}

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    /// A find or thumbnail call against the remote service failed.
    /// Transient: the caller may retry with a fresh refresh.
    #[error("Remote operation failed: {0}")]
    Remote(String),

    /// A cache file failed its magic/version/structure checks.
    /// Never fatal: callers fall back to a cold load.
    #[error("Cache corruption: {0}")]
    CacheCorruption(String),

    /// Writing a cache file failed (disk full, permissions).
    /// Logged and swallowed by callers; the in-memory model keeps working.
    #[error("Cache write failed: {0}")]
    CacheWrite(String),

    /// Downloaded thumbnail bytes are not a decodable image.
    #[error("Invalid thumbnail data: {0}")]
    InvalidThumbnail(String),

    #[error("Invalid request id: {0}")]
    InvalidRequestId(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Bridge(#[from] bridge_traits::error::BridgeError),
}

pub type Result<T> = std::result::Result<T, SyncError>;

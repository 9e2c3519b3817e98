//! Error types for the flaregate-session crate.
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("session manager is closed")]
    Closed,

    #[error("maximum number of sessions reached")]
    MaxSessionsReached,

    #[error("session '{0}' already exists")]
    SessionExists(String),

    #[error("session '{0}' not found")]
    SessionNotFound(String),

    #[error("session '{0}' is in use")]
    SessionInUse(String),

    #[error("acquire was cancelled")]
    Cancelled,

    #[error("driver error: {0}")]
    Driver(#[from] flaregate_core::Error),

    #[error("persistence error: {0}")]
    Db(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, SessionError>;

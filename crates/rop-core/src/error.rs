//! Error types for rop.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("aborted: {0}")]
    Aborted(String),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("cluster error: {0}")]
    Cluster(String),

    #[error("cannot plan run command: {0}")]
    Planner(String),

    #[error("transfer to {path} failed: {message}")]
    Transfer { path: String, message: String },

    #[error("remote command exited with code {code}: {message}")]
    Execution { code: i32, message: String },

    #[error("cleanup failed: {0}")]
    Cleanup(String),

    #[error("cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Exit code of the remote process, when the failure came from one.
    pub fn remote_exit_code(&self) -> Option<i32> {
        match self {
            Error::Execution { code, .. } => Some(*code),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

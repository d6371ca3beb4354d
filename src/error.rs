//! Error types for showerpool.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("empty command line for task {0}")]
    EmptyCommand(String),

    #[error("task {0} is already running")]
    DuplicateKey(String),

    #[error("no running task with key {0}")]
    NotRunning(String),

    #[error("failed to spawn task {key}: {source}")]
    Spawn {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{path}:{line}: {message}")]
    Parse {
        path: String,
        line: usize,
        message: String,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;

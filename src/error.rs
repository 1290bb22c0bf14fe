use crate::session::SessionState;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PanelError {
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("System error: {0}")]
    System(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Cannot {operation} while session is {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },

    #[error("Engine prepare failed: {reason}")]
    PrepareFailed { reason: String },

    #[error("Failed to spawn miner worker: {error}")]
    WorkerSpawnFailed { error: String },
}

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Failed to read settings file: {path}, error: {error}")]
    Read {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },

    #[error("Corrupt settings file: {path}, error: {error}")]
    Corrupt {
        path: PathBuf,
        #[source]
        error: serde_json::Error,
    },

    #[error("Failed to write settings file: {path}, error: {error}")]
    Write {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },

    #[error("Failed to serialize settings: {error}")]
    Serialize {
        #[source]
        error: serde_json::Error,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Engine prepare failed: {reason}")]
    PrepareFailed { reason: String },

    #[error("Miner program not found: {path}")]
    ProgramNotFound { path: PathBuf },

    #[error("Failed to spawn miner program: {error}")]
    Spawn { error: String },

    #[error("Invalid engine argument: {reason}")]
    InvalidArgument { reason: String },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("Parse error: {error}")]
    ParseError { error: String },

    #[error("Validation error: {field}, reason: {reason}")]
    ValidationError { field: String, reason: String },
}

//! Error types shared across the engine

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the persistent JSON store
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to read store file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write store file {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed store file {path}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode store payload for {key}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors raised while loading the entries file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read entries file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed entries file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid entries file: {0}")]
    Invalid(String),
}

/// Errors raised by the host collaborator
#[derive(Debug, Error)]
pub enum HostError {
    #[error("service {domain}.{service} failed: {reason}")]
    ServiceFailed {
        domain: String,
        service: String,
        reason: String,
    },

    #[error("entity {0} is not known to the host")]
    UnknownEntity(String),
}

/// Errors surfaced to service callers
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("No alarm config card sensor found for entry_id: {0}")]
    UnknownEntry(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Host(#[from] HostError),
}

pub type EngineResult<T> = Result<T, EngineError>;

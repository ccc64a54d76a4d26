//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Graph snapshot not found: {path}")]
    SnapshotNotFound { path: String },

    #[error("Invalid graph snapshot: {message}")]
    InvalidSnapshot { message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid Kubernetes version '{input}': {message}")]
    InvalidVersion { input: String, message: String },

    #[error("Invalid field path '{path}': {message}")]
    InvalidPath { path: String, message: String },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Archive error: {message}")]
    Archive { message: String },

    #[error("Invalid MANIFEST: {message}")]
    InvalidManifest { message: String },
}

pub type Result<T> = std::result::Result<T, CoreError>;

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrellisError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Parse error in {file}: {message}")]
    Parse { file: String, message: String },

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Path {path} escapes project root {root}")]
    PathEscape { path: PathBuf, root: PathBuf },

    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Anonymous siblings collide under {parent} in {file}")]
    AnonymousCollision { file: String, parent: String },

    #[error("Parse job timed out after {0} seconds")]
    Timeout(u64),

    #[error("Parse job failed: {0}")]
    JobFailed(String),
}

pub type Result<T> = std::result::Result<T, TrellisError>;

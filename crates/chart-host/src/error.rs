// File: crates/chart-host/src/error.rs
// Summary: Error type shared by the lifecycle layer and its collaborator contracts.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HostError {
    /// Transport-level failure (connection, status, timeout reported by the client).
    #[error("transport error: {0}")]
    Transport(String),
    /// Response body did not match the expected shape.
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),
    /// The rendering engine rejected an operation.
    #[error("engine error: {0}")]
    Engine(String),
    /// Optional engine capability is not implemented by this engine handle.
    #[error("engine capability not supported: {0}")]
    Unsupported(&'static str),
    /// The owning host was dropped or disposed while work was pending.
    #[error("chart host disposed")]
    Disposed,
}

pub type Result<T> = std::result::Result<T, HostError>;

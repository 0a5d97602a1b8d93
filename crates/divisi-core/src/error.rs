//! Error types for divisi-core.

use thiserror::Error;

/// Error type for divisi-core operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("{queue} queue is full ({capacity} messages)")]
    QueueFull {
        queue: &'static str,
        capacity: usize,
    },

    #[error("Protocol version mismatch: expected {expected}, got {found}")]
    VersionMismatch { expected: u16, found: u16 },
}

/// Result type alias.
pub type Result<T> = core::result::Result<T, Error>;

//! Error types for binkv

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // === I/O & transport ===
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Host unreachable: {0}")]
    HostUnreachable(String),

    #[error("No available node")]
    NoAvailableNode,

    #[error("Operation timeout: {0}")]
    Timeout(String),

    // === Record access ===
    #[error("Record not found")]
    RecordNotFound,

    #[error("Bin not found: {0}")]
    BinNotFound(String),

    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    // === Server ===
    #[error("Server error: code {0}")]
    ServerError(u8),

    // === Handle & parameters ===
    #[error("Invalid handle: cluster is shut down")]
    InvalidHandle,

    #[error("Invalid parameter: {0}")]
    InvalidParam(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // === Wire ===
    #[error("Corrupted data: {0}")]
    Corrupted(String),

    #[error("Checksum mismatch: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch { expected: u32, actual: u32 },
}

impl Error {
    /// Is this a retryable error?
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Io(_) | Error::HostUnreachable(_) | Error::NoAvailableNode | Error::Timeout(_)
        )
    }
}

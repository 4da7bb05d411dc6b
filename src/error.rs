//! Error types for cellstore.

use thiserror::Error;

/// Error type for cellstore operations.
///
/// A lookup that finds nothing is not an error: readers return `None` or an
/// empty list for that case.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error (short file, truncated read, closed handle)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// File too small to hold the header or the metadata table
    #[error("invalid header size: expected {expected}, got {actual}")]
    InvalidHeaderSize { expected: u64, actual: u64 },

    /// Negative block count in the header
    #[error("invalid block count: {0}")]
    InvalidBlockCount(i32),

    /// Block index outside the header's block count
    #[error("block {block} out of range (block count {count})")]
    BlockOutOfRange { block: u32, count: u32 },

    /// Key or value does not match the store schema
    #[error("malformed key: {0}")]
    MalformedKey(String),

    /// Decoded block data contradicts its own metadata
    #[error("corrupt block {block}: {reason}")]
    Corruption { block: u32, reason: String },

    /// Two records with the same full key were added to a writer
    #[error("duplicate key")]
    DuplicateKey,

    /// Input text could not be parsed
    #[error("parse error on line {line}: {reason}")]
    Parse { line: usize, reason: String },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for cellstore operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether this error came from the underlying storage rather than from
    /// the caller's input.
    pub fn is_storage_fault(&self) -> bool {
        matches!(
            self,
            Error::Io(_)
                | Error::InvalidHeaderSize { .. }
                | Error::InvalidBlockCount(_)
                | Error::Corruption { .. }
        )
    }
}

//! Error types for container reading, building, and rebuilding.
//!
//! Every failure mode is a typed variant; nothing in the crate truncates,
//! guesses, or emits a partial container on error.
use thiserror::Error;

/// Main error type for cfbforge operations.
#[derive(Error, Debug)]
pub enum CfbError {
    /// IO error while reading an input container
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Input buffer is not a well-formed compound file
    #[error("malformed container: {0}")]
    MalformedContainer(String),

    /// The modified workbook container carries no `Workbook` stream
    #[error("modified workbook has no Workbook stream")]
    MissingWorkbookStream,

    /// A storage or stream name exceeds 31 UTF-16 code units
    #[error("name {name:?} is {units} UTF-16 units, the limit is 31")]
    NameTooLong { name: String, units: usize },

    /// A path names both a stream and a storage
    #[error("path {0:?} is used as both a stream and a storage")]
    ConflictingPath(String),

    /// The sector-count fixed point failed to settle within its round budget
    #[error("sector layout did not converge after {0} rounds")]
    LayoutDidNotConverge(u32),

    /// Stream lookup by path failed
    #[error("stream not found: {0}")]
    StreamNotFound(String),
}

/// Result type for cfbforge operations.
pub type Result<T> = std::result::Result<T, CfbError>;

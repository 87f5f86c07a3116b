//! Error type for sampling, camera and format operations.

/// Errors raised by the bake formats and the geometry built on them.
///
/// Every error is fatal to the current run; nothing here is retried.
#[derive(Debug, thiserror::Error)]
pub enum BakeError {
    /// Bad parameter to a sampler, camera or writer (e.g. octahedron resolution < 2)
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A text point file line that is not exactly three finite numbers
    #[error("invalid input at line {line}: {message}")]
    InvalidInput { line: usize, message: String },

    /// Point-buffer header that cannot describe a readable buffer
    #[error("malformed point buffer header: {0}")]
    MalformedHeader(String),

    /// Data whose shape does not match its container (frame length, stream size)
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// Stream ended in the middle of a record
    #[error("truncated stream: {0}")]
    TruncatedStream(String),

    /// File could not be opened, read or written
    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = BakeError> = std::result::Result<T, E>;

//! Error types for buffer operations

use thiserror::Error;

/// Result type for buffer operations
pub type Result<T> = std::result::Result<T, SbufError>;

/// Errors raised while reading a serialized buffer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SbufError {
    /// Fewer bytes remain than the read needs
    #[error("buffer truncated: need {needed} bytes at offset {offset}, {remaining} remain")]
    Truncated {
        offset: usize,
        needed: usize,
        remaining: usize,
    },

    /// A string payload lacks its terminating NUL
    #[error("string at offset {0} is not NUL-terminated")]
    Unterminated(usize),

    /// A string payload is not valid UTF-8
    #[error("string at offset {0} is not valid UTF-8")]
    InvalidUtf8(usize),

    /// A null string was read where text was required
    #[error("null string at offset {0}")]
    NullString(usize),

    /// A remote service handle was the null handle
    #[error("null remote service at offset {0}")]
    NullRemote(usize),

    /// A write would exceed the buffer's capacity limit
    #[error("buffer overflow: writing {needed} bytes would exceed capacity {capacity}")]
    Overflow { needed: usize, capacity: usize },

    /// A file descriptor slot held an invalid descriptor
    #[error("invalid file descriptor {fd} at offset {offset}")]
    BadFd { offset: usize, fd: i32 },
}

impl SbufError {
    /// Status code a generated stub reports for this failure
    pub fn status(&self) -> crate::status::HdfStatus {
        crate::status::HDF_ERR_INVALID_PARAM
    }
}

//! HDF status codes
//!
//! Every generated stub function and dispatch entry point returns one of
//! these values. The numeric values are part of the wire contract with
//! the client proxy and must not change.

use crate::error::SbufError;

/// Status returned across the dispatch boundary
#[repr(transparent)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct HdfStatus(pub i32);

impl HdfStatus {
    /// Create a status from a raw code
    pub const fn new(code: i32) -> Self {
        HdfStatus(code)
    }

    /// Check if this represents success
    pub const fn is_success(&self) -> bool {
        self.0 == HDF_SUCCESS.0
    }

    /// Get the raw status value
    pub const fn as_raw(&self) -> i32 {
        self.0
    }

    /// Symbolic name of the status, as spelled in `hdf_base.h`
    pub fn name(&self) -> &'static str {
        match self.0 {
            0 => "HDF_SUCCESS",
            -1 => "HDF_FAILURE",
            -2 => "HDF_ERR_NOT_SUPPORT",
            -3 => "HDF_ERR_INVALID_PARAM",
            -4 => "HDF_ERR_INVALID_OBJECT",
            -6 => "HDF_ERR_MALLOC_FAIL",
            -7 => "HDF_ERR_TIMEOUT",
            -17 => "HDF_ERR_IO",
            _ => "HDF_UNKNOWN_STATUS",
        }
    }

    /// Convert to a `Result`, keeping the failing status as the error
    pub fn to_result(self) -> std::result::Result<(), HdfStatus> {
        if self.is_success() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl std::fmt::Display for HdfStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name(), self.0)
    }
}

impl From<i32> for HdfStatus {
    fn from(value: i32) -> Self {
        HdfStatus(value)
    }
}

impl From<HdfStatus> for i32 {
    fn from(status: HdfStatus) -> Self {
        status.0
    }
}

impl From<SbufError> for HdfStatus {
    fn from(err: SbufError) -> Self {
        err.status()
    }
}

/// Operation completed successfully
pub const HDF_SUCCESS: HdfStatus = HdfStatus(0);

/// Generic failure
pub const HDF_FAILURE: HdfStatus = HdfStatus(-1);

/// Command or operation not supported
pub const HDF_ERR_NOT_SUPPORT: HdfStatus = HdfStatus(-2);

/// Malformed argument or request buffer
pub const HDF_ERR_INVALID_PARAM: HdfStatus = HdfStatus(-3);

/// Null or invalid object handle
pub const HDF_ERR_INVALID_OBJECT: HdfStatus = HdfStatus(-4);

/// Allocation failed
pub const HDF_ERR_MALLOC_FAIL: HdfStatus = HdfStatus(-6);

/// Operation timed out
pub const HDF_ERR_TIMEOUT: HdfStatus = HdfStatus(-7);

/// Device I/O failure
pub const HDF_ERR_IO: HdfStatus = HdfStatus(-17);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_success() {
        assert!(HDF_SUCCESS.is_success());
        assert!(HDF_SUCCESS.to_result().is_ok());
        assert!(!HDF_FAILURE.is_success());
        assert_eq!(HDF_ERR_NOT_SUPPORT.to_result(), Err(HDF_ERR_NOT_SUPPORT));
    }

    #[test]
    fn test_status_names() {
        assert_eq!(HDF_ERR_INVALID_PARAM.name(), "HDF_ERR_INVALID_PARAM");
        assert_eq!(HdfStatus::new(-42).name(), "HDF_UNKNOWN_STATUS");
        assert_eq!(HDF_ERR_MALLOC_FAIL.to_string(), "HDF_ERR_MALLOC_FAIL (-6)");
    }

    #[test]
    fn test_buffer_errors_map_to_invalid_param() {
        let err = SbufError::Truncated {
            offset: 4,
            needed: 4,
            remaining: 0,
        };
        assert_eq!(HdfStatus::from(err), HDF_ERR_INVALID_PARAM);
    }
}

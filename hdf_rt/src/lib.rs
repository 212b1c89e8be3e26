//! Runtime model for code generated by hdi-gen
//!
//! Generated C stubs link against the HDF serialization buffer and device
//! object abstractions. This crate models both in Rust so that the stub
//! contract can be exercised without a device:
//!
//! - [`sbuf`]: the typed request/reply buffer (`struct HdfSBuf`)
//! - [`status`]: HDF status codes returned across the dispatch boundary
//! - [`service`]: device objects, installable I/O services and driver entries
//!
//! # Example
//!
//! ```
//! use hdf_rt::sbuf::HdfSbuf;
//!
//! let mut data = HdfSbuf::new();
//! data.write_u16(3).unwrap();
//! assert_eq!(data.read_u16().unwrap(), 3);
//! ```

pub mod error;
pub mod sbuf;
pub mod service;
pub mod status;

pub use error::{Result, SbufError};
pub use sbuf::HdfSbuf;
pub use service::{DeviceObject, DriverEntry, IoService};
pub use status::{
    HdfStatus, HDF_ERR_INVALID_OBJECT, HDF_ERR_INVALID_PARAM, HDF_ERR_MALLOC_FAIL,
    HDF_ERR_NOT_SUPPORT, HDF_FAILURE, HDF_SUCCESS,
};

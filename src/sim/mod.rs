//! Executable model of generated stubs
//!
//! The simulator runs the same per-method plans the C emitter renders,
//! against the `hdf_rt` buffer model, with a paired client codec. It is
//! how the wire contract and the cleanup ordering are tested without a
//! C toolchain or a device.
//!
//! Strings are narrower here than in C: the simulator holds them as Rust
//! `String`, so a payload that is not UTF-8 fails to decode with
//! [`SbufError::InvalidUtf8`](hdf_rt::SbufError::InvalidUtf8). Generated C
//! stubs accept any NUL-terminated bytes.

pub mod client;
pub mod codec;
pub mod stub;
pub mod value;

pub use client::Client;
pub use codec::{AllocBudget, Fault};
pub use stub::{CallFrame, ServiceImpl, ServiceStub, Trace, TraceEvent};
pub use value::{CallbackHandle, Value};

//! Logging for changegate binaries and tests
//!
//! Processes call [`init`] once with the profile from their config. The
//! engine dispatchers emit the `start`/`end`/`end_error` boundary events
//! through the `log_op_*` macros; workflow steps inside a command use plain
//! `tracing` calls. Tests install [`init_test_capture`] instead and assert on
//! what was emitted.
//!
//! ```rust
//! use changegate_core::logging_facility::{init, Profile};
//!
//! init(Profile::Development);
//! ```

pub mod init;
pub mod macros;
pub mod test_capture;

pub use init::{init, Profile};
pub use test_capture::{init_test_capture, CapturedEvent, TestCapture};

//! Structured logging facility for conftree
//!
//! - Single initialization point via `init(profile)`
//! - Structured logging macros (`log_op_start!`, `log_op_end!`, `log_op_error!`)
//! - Test capture mode for deterministic assertions
//!
//! Engine entry points own the start/end boundary of an operation. The
//! tree, path and store layers only emit `tracing::debug!` details.
//!
//! # Usage
//!
//! ```rust
//! use conftree_core::logging_facility::{init, Profile};
//!
//! init(Profile::Development);
//! ```

pub mod init;
pub mod macros;
pub mod test_capture;

pub use init::{init, Profile};
pub use test_capture::{init_test_capture, CapturedEvent, TestCapture};

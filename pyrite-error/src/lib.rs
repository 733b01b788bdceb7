//! # pyrite-error
//!
//! Unified error handling for pyrite - following OpenDAL's error handling practices.
//!
//! ## Design Philosophy
//!
//! - **ErrorKind**: Know what error occurred (e.g., TransportFailed, RateLimited)
//! - **ErrorStatus**: Decide how to handle it (Permanent, Temporary, Persistent)
//! - **Error Context**: Assist in locating the cause with rich context
//! - **Error Source**: Wrap underlying errors without leaking raw types
//!
//! ## Usage
//!
//! ```rust
//! use pyrite_error::{Error, ErrorKind};
//!
//! fn example() -> Result<(), Error> {
//!     Err(Error::new(ErrorKind::TransportFailed, "completion endpoint returned 503")
//!         .with_operation("transport::complete")
//!         .with_context("model", "gpt-4o")
//!         .with_context("status", "503"))
//! }
//! ```
//!
//! ## Principles
//!
//! - All fallible functions return `Result<T, pyrite_error::Error>`
//! - External errors are wrapped with `set_source(err)`
//! - Same error handled once, subsequent ops only append context
//! - Don't abuse `From<OtherError>` to prevent raw error leakage
//!
//! Note: response-parsing failures are *not* errors in this workspace. The
//! parser absorbs them into its returned value; only transport, log-sink, and
//! configuration failures travel through this type.

mod error;
mod kind;
mod status;

pub use error::Error;
pub use kind::ErrorKind;
pub use status::ErrorStatus;

/// Result type alias using pyrite Error
pub type Result<T> = std::result::Result<T, Error>;

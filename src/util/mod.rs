//! Utility types for XUR.
//!
//! - [`Error`] / [`Result`] - Error handling
//! - [`ErrorKind`] - Failure classes for batch callers

mod error;

pub use error::*;

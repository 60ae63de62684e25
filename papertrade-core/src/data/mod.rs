//! Market data collaborators.
//!
//! The engine never performs network I/O itself; history arrives through
//! an [`OhlcvSource`] so callers can plug in an exchange client or a mock.

pub mod source;

pub use source::{FetchError, OhlcvSource};

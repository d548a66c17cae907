//! Common utilities for usbip-attach-loop
//!
//! Shared error type and logging setup used by the attach loop crate.

pub mod error;
pub mod logging;

pub use error::{Error, Result};
pub use logging::setup_logging;

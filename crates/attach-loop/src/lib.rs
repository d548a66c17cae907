//! usbip attach/detach loop
//!
//! Repeatedly attaches a remote USB device through an external usbip client,
//! waits a random number of seconds and detaches it again. Used to soak-test
//! USB/IP redirection.

pub mod config;
pub mod delay;
pub mod driver;
pub mod termination;
pub mod usbip;

pub use config::{LoopConfig, Overrides, RunConfig};
pub use delay::DelayPolicy;
pub use driver::{LoopDriver, LoopSummary, Sleeper, TokioSleeper};
pub use termination::{Termination, classify};
pub use usbip::{Usbip, UsbipCommand};

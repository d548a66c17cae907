//! Common error types

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Operator cancelled the run (Ctrl+C)
    #[error("Interrupted")]
    Interrupted,

    /// The usbip executable could not be started or waited on
    #[error("Failed to run {action} with {}", .program.display())]
    Launch {
        program: PathBuf,
        action: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for operator cancellation, which is never reported
    pub fn is_interrupt(&self) -> bool {
        matches!(self, Error::Interrupted)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

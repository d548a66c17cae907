//! Top-level failure classification
//!
//! Everything that stops a run ends up here once: an operator interrupt
//! exits silently, anything else is printed once. Both exit with status 0.

use common::Error;
use std::process::ExitCode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// Operator interrupt, nothing is printed
    Cancelled,
    /// Any other failure, with the message to print
    Failed(String),
}

impl Termination {
    /// No distinct exit codes: a caught failure is reported, not propagated
    pub fn exit_code(&self) -> ExitCode {
        ExitCode::SUCCESS
    }
}

/// Classify an error that reached `main`
pub fn classify(err: &anyhow::Error) -> Termination {
    let interrupted = err
        .chain()
        .filter_map(|cause| cause.downcast_ref::<Error>())
        .any(Error::is_interrupt);

    if interrupted {
        Termination::Cancelled
    } else {
        Termination::Failed(format!("{:#}", err))
    }
}

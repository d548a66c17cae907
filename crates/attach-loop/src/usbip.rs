//! usbip client invocation
//!
//! The usbip executable is an opaque collaborator: the loop only needs it to
//! run `attach --remote HOST --bus-id ID` and `detach --all`. Exit codes and
//! output are passed through and never interpreted.

use common::{Error, Result};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use tokio::process::Command;
use tracing::debug;

/// The two operations the loop drives
#[allow(async_fn_in_trait)]
pub trait Usbip {
    /// Bind the remote device to this host
    async fn attach(&mut self, remote: &str, bus_id: &str) -> Result<()>;

    /// Release every attached device
    async fn detach_all(&mut self) -> Result<()>;
}

/// Arguments for `attach`
pub fn attach_args<'a>(remote: &'a str, bus_id: &'a str) -> [&'a str; 5] {
    ["attach", "--remote", remote, "--bus-id", bus_id]
}

/// Arguments for `detach`
pub const DETACH_ALL_ARGS: [&str; 2] = ["detach", "--all"];

/// Runs the real usbip executable as a child process
///
/// The child inherits stdin and stdout; its stderr is pointed at our stdout
/// so both streams interleave in one place.
#[derive(Debug, Clone)]
pub struct UsbipCommand {
    program: PathBuf,
}

impl UsbipCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn run(&self, action: &'static str, args: &[&str]) -> Result<ExitStatus> {
        let launch_error = |source: io::Error| Error::Launch {
            program: self.program.clone(),
            action,
            source,
        };

        // Keep our own progress lines ahead of the child's output
        io::stdout().flush()?;

        let mut child = Command::new(&self.program)
            .args(args)
            .stdout(Stdio::inherit())
            .stderr(stderr_to_stdout().map_err(launch_error)?)
            .kill_on_drop(true)
            .spawn()
            .map_err(launch_error)?;

        let status = child.wait().await.map_err(launch_error)?;
        debug!("usbip {} exited with {}", action, status);
        Ok(status)
    }
}

impl Usbip for UsbipCommand {
    async fn attach(&mut self, remote: &str, bus_id: &str) -> Result<()> {
        self.run("attach", &attach_args(remote, bus_id)).await?;
        Ok(())
    }

    async fn detach_all(&mut self) -> Result<()> {
        self.run("detach", &DETACH_ALL_ARGS).await?;
        Ok(())
    }
}

/// A handle to our stdout usable as a child's stderr
#[cfg(unix)]
fn stderr_to_stdout() -> io::Result<Stdio> {
    use std::os::fd::AsFd;
    let fd = io::stdout().as_fd().try_clone_to_owned()?;
    Ok(Stdio::from(fd))
}

#[cfg(windows)]
fn stderr_to_stdout() -> io::Result<Stdio> {
    use std::os::windows::io::AsHandle;
    let handle = io::stdout().as_handle().try_clone_to_owned()?;
    Ok(Stdio::from(handle))
}

#[cfg(not(any(unix, windows)))]
fn stderr_to_stdout() -> io::Result<Stdio> {
    Ok(Stdio::inherit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attach_args() {
        assert_eq!(
            attach_args("10.0.0.5", "1-1.2"),
            ["attach", "--remote", "10.0.0.5", "--bus-id", "1-1.2"]
        );
    }

    #[tokio::test]
    async fn test_missing_program_is_launch_error() {
        let mut usbip = UsbipCommand::new("/nonexistent/dir/usbip");
        let err = usbip.attach("host", "1-1").await.unwrap_err();
        match err {
            Error::Launch {
                program, action, ..
            } => {
                assert_eq!(program, PathBuf::from("/nonexistent/dir/usbip"));
                assert_eq!(action, "attach");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exit_code_is_not_interpreted() {
        // `false` ignores its arguments and exits 1
        let mut usbip = UsbipCommand::new("false");
        assert!(usbip.attach("host", "1-1").await.is_ok());
        assert!(usbip.detach_all().await.is_ok());
    }
}

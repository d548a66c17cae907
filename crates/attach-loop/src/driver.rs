//! The attach/detach loop
//!
//! Each iteration prints a 1-based counter, attaches the remote device,
//! optionally waits a random number of seconds and then detaches everything.
//! Strictly sequential: one child process at a time, nothing overlaps.

use crate::config::RunConfig;
use crate::delay::DelayPolicy;
use crate::usbip::Usbip;
use common::{Error, Result};
use rand::Rng;
use std::future::Future;
use std::io::Write;
use std::time::Duration;
use tracing::{debug, info};

/// Waits out the delay between attach and detach
#[allow(async_fn_in_trait)]
pub trait Sleeper {
    async fn sleep(&mut self, duration: Duration);
}

/// [`Sleeper`] backed by the tokio timer
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    async fn sleep(&mut self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// What a completed run did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoopSummary {
    pub iterations: u64,
    pub sleeps: u64,
}

pub struct LoopDriver<U, S, R, W> {
    config: RunConfig,
    delay: DelayPolicy,
    usbip: U,
    sleeper: S,
    rng: R,
    progress: W,
}

impl<U, S, R, W> LoopDriver<U, S, R, W>
where
    U: Usbip,
    S: Sleeper,
    R: Rng,
    W: Write,
{
    pub fn new(config: RunConfig, usbip: U, sleeper: S, rng: R, progress: W) -> Self {
        let delay = DelayPolicy::new(config.max_delay);
        Self {
            config,
            delay,
            usbip,
            sleeper,
            rng,
            progress,
        }
    }

    /// Consume the driver, returning the progress sink
    pub fn into_progress(self) -> W {
        self.progress
    }

    /// Run all iterations
    ///
    /// A launch failure stops the loop at the failing step.
    pub async fn run(&mut self) -> Result<LoopSummary> {
        info!(
            "Cycling {} on {} via {} ({} iterations, max delay {}s)",
            self.config.bus_id,
            self.config.remote,
            self.config.program.display(),
            self.config.count,
            self.delay.max_delay()
        );

        let mut summary = LoopSummary::default();
        for iteration in 1..=self.config.count {
            writeln!(self.progress, "#{}", iteration)?;
            self.progress.flush()?;

            self.usbip
                .attach(&self.config.remote, &self.config.bus_id)
                .await?;

            if let Some(delay) = self.delay.sample(&mut self.rng) {
                debug!(iteration, delay_secs = delay.as_secs(), "Waiting before detach");
                self.sleeper.sleep(delay).await;
                summary.sleeps += 1;
            } else {
                debug!(iteration, "Detaching without delay");
            }

            self.usbip.detach_all().await?;
            summary.iterations = iteration;
        }

        info!(
            "Completed {} iterations ({} with a delay)",
            summary.iterations, summary.sleeps
        );
        Ok(summary)
    }

    /// Run until done or until `shutdown` resolves
    ///
    /// Shutdown wins immediately: the in-flight step is dropped (a running
    /// child is killed), no final detach is issued and
    /// [`Error::Interrupted`] is returned.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<LoopSummary>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            result = self.run() => result,
            _ = shutdown => {
                debug!("Shutdown requested, leaving loop");
                Err(Error::Interrupted)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::path::PathBuf;

    #[derive(Default)]
    struct Recorder {
        calls: Vec<&'static str>,
    }

    impl Usbip for Recorder {
        async fn attach(&mut self, _remote: &str, _bus_id: &str) -> Result<()> {
            self.calls.push("attach");
            Ok(())
        }

        async fn detach_all(&mut self) -> Result<()> {
            self.calls.push("detach");
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingSleeper(u64);

    impl Sleeper for CountingSleeper {
        async fn sleep(&mut self, _duration: Duration) {
            self.0 += 1;
        }
    }

    fn run_config(count: u64, max_delay: u64) -> RunConfig {
        RunConfig {
            remote: "192.168.1.10".to_string(),
            bus_id: "1-1".to_string(),
            max_delay,
            program: PathBuf::from("usbip"),
            count,
        }
    }

    #[tokio::test]
    async fn test_zero_count_does_nothing() {
        let mut driver = LoopDriver::new(
            run_config(0, 3),
            Recorder::default(),
            CountingSleeper::default(),
            StdRng::seed_from_u64(0),
            Vec::new(),
        );
        let summary = driver.run().await.unwrap();
        assert_eq!(summary, LoopSummary::default());
        assert!(driver.usbip.calls.is_empty());
        assert!(driver.into_progress().is_empty());
    }

    #[tokio::test]
    async fn test_sleeps_match_summary() {
        let mut driver = LoopDriver::new(
            run_config(50, 4),
            Recorder::default(),
            CountingSleeper::default(),
            StdRng::seed_from_u64(99),
            Vec::new(),
        );
        let summary = driver.run().await.unwrap();
        assert_eq!(summary.iterations, 50);
        assert_eq!(summary.sleeps, driver.sleeper.0);
        assert!(summary.sleeps > 0 && summary.sleeps < 50);
    }
}

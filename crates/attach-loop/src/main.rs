//! usbip-attach-loop
//!
//! Attaches and detaches a remote USB device in a loop through the usbip
//! client, with a random delay before each detach.

use anyhow::{Context, Result};
use attach_loop::config::{LoopConfig, Overrides, RunConfig};
use attach_loop::termination::{Termination, classify};
use attach_loop::{LoopDriver, TokioSleeper, UsbipCommand};
use clap::Parser;
use clap::builder::NonEmptyStringValueParser;
use common::setup_logging;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::signal;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "usbip-attach-loop")]
#[command(author, version, about = "usbip attach/detach loop")]
#[command(long_about = "
Repeatedly attaches a remote USB device with the usbip client, waits a random
number of seconds and detaches all devices again.

EXAMPLES:
    # 100 cycles against bus-id 1-1 on 192.168.1.10
    usbip-attach-loop -r 192.168.1.10 -b 1-1 100

    # No delay, custom usbip location
    usbip-attach-loop -r pi5 -b 3-2 -d 0 -p ~/bin/usbip

CONFIGURATION:
    Defaults for --program, --max-delay and N are read from the first of:
    1. Path specified with --config
    2. ~/.config/usbip-attach-loop/config.toml
    3. /etc/usbip-attach-loop/config.toml
    4. Built-in defaults (max delay 3, N 65535, platform usbip path)
")]
struct Args {
    /// usbip server address
    #[arg(short, long, value_name = "HOST", value_parser = NonEmptyStringValueParser::new())]
    remote: String,

    /// bus-id of USB device
    #[arg(short, long, value_name = "ID", value_parser = NonEmptyStringValueParser::new())]
    bus_id: String,

    /// Max delay before detach, seconds [default: 3]
    #[arg(short = 'd', long, value_name = "SEC")]
    max_delay: Option<u64>,

    /// Path to the usbip executable [default: platform install location]
    #[arg(short, long, value_name = "PATH")]
    program: Option<PathBuf>,

    /// Number of loops [default: 65535]
    #[arg(value_name = "N")]
    count: Option<u64>,

    /// Path to configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Save default configuration to default location and exit
    #[arg(long)]
    save_config: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,
}

impl Args {
    /// Values given on the command line, layered over the config file
    fn overrides(&self) -> Overrides {
        Overrides {
            max_delay: self.max_delay,
            program: self.program.clone(),
            count: self.count,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let termination = classify(&e);
            if let Termination::Failed(message) = &termination {
                println!("{}", message);
            }
            termination.exit_code()
        }
    }
}

async fn run(args: Args) -> Result<()> {
    if args.save_config {
        let path = LoopConfig::default_path();
        LoopConfig::default()
            .save(&path)
            .context("Failed to save configuration")?;
        println!("Configuration saved to: {}", path.display());
        return Ok(());
    }

    let file = if let Some(ref path) = args.config {
        LoopConfig::load(Some(path.clone())).context("Failed to load configuration")?
    } else {
        LoopConfig::load_or_default()
    };

    let log_level = args.log_level.as_deref().unwrap_or(&file.general.log_level);
    setup_logging(log_level).context("Failed to setup logging")?;

    info!("usbip-attach-loop v{}", env!("CARGO_PKG_VERSION"));

    let overrides = args.overrides();
    let run_config = RunConfig::resolve(args.remote, args.bus_id, overrides, &file)?;

    let usbip = UsbipCommand::new(run_config.program.clone());
    let mut driver = LoopDriver::new(run_config, usbip, TokioSleeper, rand::rng(), io::stdout());

    driver.run_until(interrupted()).await?;
    Ok(())
}

/// Resolves on Ctrl+C
///
/// If the handler cannot be installed this never resolves and the loop runs
/// to completion.
async fn interrupted() {
    if let Err(e) = signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}

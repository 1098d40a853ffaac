//! LCD Applet Daemon
//!
//! Connects to the display manager, opens the monochrome and color panels as
//! they arrive, renders to them on a timer and reacts to soft buttons.

mod applet;
mod buttons;
mod config;
mod console;
mod producers;
mod relay;
mod render;
mod session;
mod snapshot;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use lcd_applet_hw::{Driver, Emulator};
use tokio::signal::unix::{signal, SignalKind};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use applet::{Applet, Flow};
use config::Config;
use relay::{Notification, NotificationQueue, QUEUE_CAPACITY};

/// Dual-mode LCD applet daemon.
#[derive(Parser, Debug)]
#[command(name = "lcdappletd", version, about)]
struct Args {
    /// Configuration file
    #[arg(short, long, default_value = "config/default.toml")]
    config: PathBuf,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,

    /// Read emulator commands from stdin
    #[arg(long)]
    console: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging
    let level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();

    // Load configuration
    let config = Config::load(&args.config).context("Failed to load configuration")?;
    info!("Loaded configuration from: {}", args.config.display());

    // Bring up the emulated display manager
    let mut emulator = Emulator::with_devices(config.emulator.attach.iter().copied());
    let control = emulator.control();
    control.set_service_available(config.emulator.service);
    emulator
        .init()
        .context("Failed to initialize display manager driver")?;

    if args.console || config.emulator.console {
        console::spawn(control.clone(), config.emulator.snapshot_dir.clone())
            .context("Failed to start emulator console")?;
    }

    let (relay, mut queue) = relay::channel(QUEUE_CAPACITY);
    let mut applet =
        Applet::from_config(emulator, &config, relay).context("Invalid render configuration")?;

    let mut ticker = tokio::time::interval(Duration::from_millis(config.render.interval));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    // Setup Unix signal handlers
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    info!("Applet '{}' running", config.applet.name);
    loop {
        tokio::select! {
            Some(notification) = queue.recv() => {
                if dispatch(&mut applet, notification, &mut queue) == Flow::Exit {
                    break;
                }
            }
            _ = ticker.tick() => {
                let report = applet.tick(Instant::now());
                if !report.skipped {
                    debug!("Tick: submitted {:?}, failed {:?}", report.submitted, report.failed);
                }
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
                break;
            }
            _ = sigint.recv() => {
                info!("Received SIGINT, shutting down");
                break;
            }
        }
    }

    // Devices and connection first, then the library
    let mut driver = applet.into_driver();
    driver.deinit();
    info!("Shutdown complete");

    Ok(())
}

/// Handles a notification and everything queued behind it, stopping at the
/// first exit request.
fn dispatch<D: Driver>(
    applet: &mut Applet<D>,
    first: Notification,
    queue: &mut NotificationQueue,
) -> Flow {
    if applet.handle(first) == Flow::Exit {
        return Flow::Exit;
    }
    while let Some(notification) = queue.try_recv() {
        if applet.handle(notification) == Flow::Exit {
            return Flow::Exit;
        }
    }
    Flow::Continue
}

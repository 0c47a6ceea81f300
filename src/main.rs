use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use hidtabletd::config;
use hidtabletd::event_dispatcher::FeatureToggles;
use hidtabletd::event_dispatcher::capability::IdentityMode;
use hidtabletd::event_dispatcher::uinput::UinputFactory;
use hidtabletd::event_router::ButtonBindingTable;
use hidtabletd::input_devices::usb::{DEFAULT_POLL_INTERVAL, RusbBackend};
use hidtabletd::session::error::FatalError;
use hidtabletd::session::flags::ControlFlags;
use hidtabletd::session::{Session, SessionOptions};

/// Userspace driver for Huion HS610 tablets
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Present the pad and pen as a Wacom Intuos Pro S
    #[arg(short, long)]
    wacom: bool,

    /// Move the mouse pointer with the pen (relative motion)
    #[arg(short, long)]
    cursor: bool,

    /// Use the dial as a mouse scroll wheel
    #[arg(short = 's', long)]
    wheel: bool,

    /// Send the key macros bound to pad buttons
    #[arg(short, long)]
    keyboard: bool,

    /// Scan for the tablet again after it is disconnected (experimental)
    #[arg(short, long)]
    reset: bool,

    /// Config file, instead of ~/.hidtabletd.toml or /etc/hidtabletd/config.toml
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Delay between device scans in milliseconds
    #[arg(long, value_name = "MS", default_value_t = 100)]
    scan_interval_ms: u64,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn toggles(&self) -> FeatureToggles {
        FeatureToggles {
            virtual_cursor: self.cursor,
            virtual_wheel: self.wheel,
            keyboard_emulation: self.keyboard,
        }
    }

    fn identity(&self) -> IdentityMode {
        if self.wacom {
            IdentityMode::Wacom
        } else {
            IdentityMode::Driver
        }
    }

    fn default_log_level(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.default_log_level()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("starting hidtabletd v{}", env!("CARGO_PKG_VERSION"));
    if cli.reset {
        warn!("reset on disconnect is experimental");
    }

    let flags = Arc::new(ControlFlags::new(cli.reset));

    let (bindings, cursor_speed) = match config::discover(cli.config.as_deref())
        .context("cannot load config file")?
    {
        Some((path, loaded)) => {
            let bindings = loaded.bindings.iter().count();
            info!(path = %path.display(), bindings, "config loaded");
            flags.set_should_use_config(true);
            (loaded.bindings, loaded.cursor_speed)
        }
        None => {
            if cli.keyboard {
                warn!("keyboard emulation enabled but no config file found");
            }
            (ButtonBindingTable::new(), config::Config::default().cursor_speed)
        }
    };

    let options = SessionOptions {
        toggles: cli.toggles(),
        identity: cli.identity(),
        cursor_speed,
        scan_interval: Duration::from_millis(cli.scan_interval_ms),
    };

    tokio::spawn(shutdown_on_signal(Arc::clone(&flags)));

    let worker_flags = Arc::clone(&flags);
    let bindings = Arc::new(bindings);
    tokio::task::spawn_blocking(move || -> Result<(), FatalError> {
        let backend = RusbBackend::new(DEFAULT_POLL_INTERVAL)?;
        Session::new(backend, UinputFactory, options, bindings, worker_flags).run()
    })
    .await
    .context("session worker panicked")?
    .context("session failed")?;

    info!("stopped");
    Ok(())
}

/// 只设置标志位, 设备的释放由会话线程在下一次轮询时完成
async fn shutdown_on_signal(flags: Arc<ControlFlags>) {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(error) => {
            warn!(%error, "cannot install SIGTERM handler");
            if tokio::signal::ctrl_c().await.is_ok() {
                flags.request_shutdown();
            }
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
    flags.request_shutdown();
}

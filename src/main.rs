//! vitals-monitor - wearable heart monitor ingestion service
//!
//! # Usage
//!
//! ```bash
//! # Auto-discover the USB-UART bridge and serve the API on 127.0.0.1:8090
//! vitals-monitor
//!
//! # Explicit port, custom alarm threshold
//! vitals-monitor --port /dev/ttyUSB0 --threshold 110
//!
//! # Feed from the simulator
//! telemetry-sim | vitals-monitor --stdin
//!
//! # Replay a captured session
//! vitals-monitor --replay session.log
//! ```
//!
//! # Environment Variables
//!
//! - `VITALS_CONFIG`: path to a TOML config file
//! - `VITALS_CORS_ORIGINS`: comma-separated origins allowed to call the API
//! - `RUST_LOG`: logging level (default: info)

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use vitals_monitor::acquisition::serial::list_ports;
use vitals_monitor::api::create_app;
use vitals_monitor::config::MonitorConfig;
use vitals_monitor::pipeline::{
    Connector, Monitor, MonitorSettings, ReplayConnector, SerialConnector, StdinConnector,
};
use vitals_monitor::storage::{DailyCsvLog, DataDirLock};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "vitals-monitor")]
#[command(about = "Serial telemetry ingestion and logging for a wearable heart monitor")]
#[command(version)]
struct CliArgs {
    /// TOML config file (overrides ./monitor_config.toml)
    #[arg(long, env = "VITALS_CONFIG")]
    config: Option<PathBuf>,

    /// Serial port to open instead of auto-discovery (e.g. /dev/ttyUSB0, COM3)
    #[arg(short, long)]
    port: Option<String>,

    /// Serial baud rate
    #[arg(long)]
    baud: Option<u32>,

    /// Read telemetry lines from stdin (e.g. piped from telemetry-sim)
    #[arg(long, conflicts_with_all = ["port", "replay"])]
    stdin: bool,

    /// Replay a captured telemetry log instead of a live device
    #[arg(long, value_name = "FILE")]
    replay: Option<PathBuf>,

    /// Delay between replayed lines in milliseconds
    #[arg(long, value_name = "MS")]
    replay_delay_ms: Option<u64>,

    /// Root directory for daily logs
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// High-BPM alarm threshold
    #[arg(long, value_name = "BPM")]
    threshold: Option<u32>,

    /// HTTP bind address
    #[arg(short, long, value_name = "HOST:PORT")]
    addr: Option<String>,

    /// Do not start the HTTP/WebSocket server
    #[arg(long)]
    no_server: bool,

    /// Wait for an explicit connect instead of connecting at startup
    #[arg(long)]
    no_auto_connect: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    /// List serial ports and exit
    #[arg(long)]
    list_ports: bool,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    print_config: bool,
}

impl CliArgs {
    /// Apply command-line overrides on top of the loaded config.
    fn apply(&self, config: &mut MonitorConfig) {
        if let Some(ref port) = self.port {
            config.serial.port = Some(port.clone());
        }
        if let Some(baud) = self.baud {
            config.serial.baud_rate = baud;
        }
        if let Some(delay) = self.replay_delay_ms {
            config.monitor.replay_line_delay_ms = delay;
        }
        if let Some(ref dir) = self.data_dir {
            config.persistence.data_dir = dir.clone();
        }
        if let Some(threshold) = self.threshold {
            config.alarm.threshold_bpm = threshold;
        }
        if let Some(ref addr) = self.addr {
            config.server.addr = addr.clone();
        }
        if self.no_server {
            config.server.enabled = false;
        }
        if self.no_auto_connect {
            config.monitor.auto_connect = false;
        }
    }

    fn connector(&self, config: &MonitorConfig) -> Box<dyn Connector> {
        let read_timeout = config.serial.read_timeout();
        if self.stdin {
            Box::new(StdinConnector::new(read_timeout))
        } else if let Some(ref path) = self.replay {
            Box::new(ReplayConnector::from_file(
                path.clone(),
                Duration::from_millis(config.monitor.replay_line_delay_ms),
            ))
        } else {
            Box::new(SerialConnector::new(config.serial.settings(), read_timeout))
        }
    }
}

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_logging(args.log_json);

    if args.list_ports {
        let ports = list_ports();
        if ports.is_empty() {
            println!("No serial ports found");
        }
        for p in ports {
            println!("{}\t{}", p.name, p.description);
        }
        return Ok(());
    }

    let mut config = match args.config {
        Some(ref path) => MonitorConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => MonitorConfig::load(),
    };
    args.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    if args.print_config {
        print!("{}", config.to_toml().context("Failed to render config")?);
        return Ok(());
    }

    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("  vitals-monitor {}", env!("CARGO_PKG_VERSION"));
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!(
        data_dir = %config.persistence.data_dir.display(),
        flush_interval_secs = config.persistence.flush_interval_secs,
        threshold_bpm = config.alarm.threshold_bpm,
        "Configuration loaded"
    );

    let _data_lock = DataDirLock::acquire(&config.persistence.data_dir)?;

    let connector = args.connector(&config);
    let sink = DailyCsvLog::new(&config.persistence.data_dir);
    let (monitor, handle) = Monitor::new(
        MonitorSettings::from_config(&config),
        connector,
        Box::new(sink),
    );

    // Graceful shutdown via Ctrl+C
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received Ctrl+C, initiating shutdown...");
        shutdown_token.cancel();
    });

    let mut tasks: JoinSet<Result<&'static str>> = JoinSet::new();

    let monitor_token = cancel_token.clone();
    tasks.spawn(async move {
        monitor.run(monitor_token).await;
        Ok("monitor")
    });

    if config.server.enabled {
        let listener = tokio::net::TcpListener::bind(&config.server.addr)
            .await
            .with_context(|| format!("Failed to bind to {}", config.server.addr))?;
        info!("HTTP API listening on http://{}/api/v1", config.server.addr);

        let app = create_app(handle.clone());
        let server_token = cancel_token.clone();
        tasks.spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { server_token.cancelled().await })
                .await
                .context("HTTP server error")?;
            Ok("http")
        });
    } else {
        info!("HTTP API disabled");
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(name)) => {
                info!(task = name, "Task finished");
                // Either task ending takes the other down with it
                cancel_token.cancel();
            }
            Ok(Err(e)) => {
                error!(error = %e, "Task failed");
                cancel_token.cancel();
            }
            Err(e) => {
                warn!(error = %e, "Task panicked or was aborted");
                cancel_token.cancel();
            }
        }
    }

    let final_state = handle.status().await;
    info!(
        readings = final_state.readings,
        persisted = final_state.records_persisted,
        pending = final_state.pending_records,
        "Shutdown complete"
    );
    Ok(())
}

mod config;
mod logging;

use std::io::BufWriter;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use kartscan_hardware::{AnyTransport, SerialTransport, available_ports};
use kartscan_reader::{DualReaderPoller, JsonLinesSink};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::{ConfigOverrides, KartscanConfig};
use crate::logging::{LogFormat, LogLevel, init_logging};

#[derive(Parser, Debug)]
#[command(
    name = "kartscan",
    version,
    about = "Dual RFID reader scan service; scans are written to stdout as JSON lines"
)]
struct Cli {
    /// Configuration file (defaults to $KARTSCAN_CONFIG_PATH, then ./kartscan.toml).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Cart identifier stamped on every scan.
    #[arg(long, value_name = "ID")]
    cart_id: Option<String>,

    /// Serial port of the first reader.
    #[arg(long, value_name = "PORT")]
    reader1_port: Option<String>,

    /// Serial port of the second reader.
    #[arg(long, value_name = "PORT")]
    reader2_port: Option<String>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT")]
    log_format: Option<LogFormat>,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<LogLevel>,

    /// Print the serial ports present on this machine and exit.
    #[arg(long)]
    list_ports: bool,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            cart_id: self.cart_id.clone(),
            log_level: self.log_level,
            log_format: self.log_format,
            reader1_port: self.reader1_port.clone(),
            reader2_port: self.reader2_port.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.list_ports {
        for port in available_ports().context("failed to enumerate serial ports")? {
            println!("{port}");
        }
        return Ok(());
    }

    let config = config::resolve(cli.config.as_deref(), &cli.overrides())
        .context("invalid configuration")?;
    init_logging(config.logging.format, config.logging.level);

    run(config).await
}

async fn run(config: KartscanConfig) -> anyhow::Result<()> {
    info!(
        cart_id = %config.cart_id,
        readers = config.readers.len(),
        "Starting kartscan"
    );

    let sink = JsonLinesSink::new(BufWriter::new(std::io::stdout()), config.cart_id.clone());
    let mut poller = DualReaderPoller::new(config.poller.clone(), sink)?;

    for reader in &config.readers {
        let id = reader.source_id()?;
        let transport = match SerialTransport::open(reader.serial_settings()) {
            Ok(transport) => {
                info!(source = %id, port = %reader.port, baud_rate = reader.baud_rate, "Reader opened");
                Some(AnyTransport::from(transport))
            }
            Err(e) => {
                warn!(source = %id, port = %reader.port, error = %e, "Reader unavailable, continuing without it");
                None
            }
        };
        poller.add_source(id, transport)?;
    }

    if poller.present_sources() == 0 {
        warn!("No reader could be opened; idling until shutdown");
    }

    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();

    tokio::join!(poller.run(shutdown), async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown requested"),
            Err(e) => {
                error!(error = %e, "Cannot listen for Ctrl-C; running until killed");
                std::future::pending::<()>().await;
            }
        }
        trigger.cancel();
    });

    Ok(())
}

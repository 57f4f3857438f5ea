//! # Estampa CLI
//!
//! Command-line host for BLE receipt printing.
//!
//! ## Usage
//!
//! ```bash
//! # Show the chunks of the sample receipt (no Bluetooth needed)
//! estampa preview
//!
//! # Show the chunks for your own fields
//! estampa preview --fields receipt.json
//!
//! # List nearby printers (needs --features ble)
//! estampa scan --seconds 5
//!
//! # Print to a printer by name or address
//! estampa print --device MTP-II --fields receipt.json
//! ```
//!
//! Set `RUST_LOG=estampa=debug` to see each state transition and write.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;

use estampa::{
    EstampaError, SessionConfig,
    receipt::{self, ChunkKind, ReceiptDocument, ReceiptFields},
};
use tracing_subscriber::EnvFilter;

/// Estampa - BLE receipt printer utility
#[derive(Parser, Debug)]
#[command(name = "estampa")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the chunks a receipt would be sent as
    Preview {
        /// Receipt fields as JSON (defaults to the sample receipt)
        #[arg(long, value_name = "FILE")]
        fields: Option<PathBuf>,
    },

    /// Scan for BLE peripherals and list the named ones
    Scan {
        /// Scan window in seconds
        #[arg(long, default_value = "5")]
        seconds: u64,
    },

    /// Compose a receipt and print it on a BLE printer
    Print {
        /// Printer name or address
        #[arg(long)]
        device: String,

        /// Receipt fields as JSON (defaults to the sample receipt)
        #[arg(long, value_name = "FILE")]
        fields: Option<PathBuf>,

        /// Scan window in seconds before looking for the device
        #[arg(long, default_value = "5")]
        seconds: u64,

        /// Connection timeout in seconds
        #[arg(long, default_value = "10")]
        timeout: u64,

        /// Warn when a chunk is larger than this many bytes
        #[arg(long, value_name = "BYTES")]
        max_write_len: Option<usize>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), EstampaError> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Preview { fields } => {
            let fields = load_fields(fields.as_deref())?;
            let document = receipt::compose(&fields);
            print_preview(&document);
        }
        Commands::Scan { seconds } => {
            let config = SessionConfig::default()
                .with_permission(true)
                .with_scan_window(Duration::from_secs(seconds));
            ble::scan(config).await?;
        }
        Commands::Print {
            device,
            fields,
            seconds,
            timeout,
            max_write_len,
        } => {
            let fields = load_fields(fields.as_deref())?;
            let document = receipt::compose(&fields);

            let mut config = SessionConfig::default()
                .with_permission(true)
                .with_scan_window(Duration::from_secs(seconds))
                .with_connect_timeout(Duration::from_secs(timeout));
            if let Some(len) = max_write_len {
                config = config.with_max_write_len(len);
            }

            ble::print(config, &device, &document).await?;
        }
    }

    Ok(())
}

/// Load receipt fields, filling in the timestamp and authorization token
/// when the file leaves them empty.
fn load_fields(path: Option<&Path>) -> Result<ReceiptFields, EstampaError> {
    let mut fields = match path {
        Some(path) => ReceiptFields::from_json(&std::fs::read_to_string(path)?)?,
        None => {
            let mut demo = receipt::demo_fields();
            demo.timestamp.clear();
            demo.authorization_token.clear();
            demo
        }
    };

    if fields.timestamp.is_empty() {
        fields.timestamp = chrono::Local::now()
            .format("%Y-%m-%d %H:%M:%S")
            .to_string();
    }
    if fields.authorization_token.is_empty() {
        fields.authorization_token = uuid::Uuid::new_v4().to_string();
    }
    Ok(fields)
}

fn print_preview(document: &ReceiptDocument) {
    println!("{} chunks, {} bytes", document.len(), document.byte_len());
    for (i, chunk) in document.iter().enumerate() {
        let kind = match chunk.kind() {
            ChunkKind::PlainBytes => "plain".to_string(),
            ChunkKind::Text(alignment) => format!("text/{:?}", alignment).to_lowercase(),
        };
        let hex: Vec<String> = chunk.bytes().iter().map(|b| format!("{:02X}", b)).collect();
        println!("{:>3} {:<12} {}", i, kind, hex.join(" "));
    }
}

#[cfg(feature = "ble")]
mod ble {
    use estampa::{
        ConnectionManager, EstampaError, SessionConfig,
        receipt::ReceiptDocument,
        transport::{BtlePort, PeripheralInfo},
    };

    async fn open(config: SessionConfig) -> Result<ConnectionManager<BtlePort>, EstampaError> {
        let port = BtlePort::new()
            .await
            .map_err(estampa::PrintError::AdapterUnavailable)?;
        Ok(ConnectionManager::new(port, config))
    }

    async fn discover(
        manager: &mut ConnectionManager<BtlePort>,
    ) -> Result<Vec<PeripheralInfo>, EstampaError> {
        manager.start_scan().await?;
        tokio::time::sleep(manager.config().scan_window).await;
        let devices = manager.devices().await?;
        manager.stop_scan().await?;
        Ok(devices)
    }

    pub async fn scan(config: SessionConfig) -> Result<(), EstampaError> {
        let mut manager = open(config).await?;
        let devices = discover(&mut manager).await?;

        if devices.is_empty() {
            println!("No named BLE devices found.");
        }
        for device in devices {
            println!("  {}  {}  ({:?})", device.id, device.name, device.state);
        }
        Ok(())
    }

    pub async fn print(
        config: SessionConfig,
        needle: &str,
        document: &ReceiptDocument,
    ) -> Result<(), EstampaError> {
        let mut manager = open(config).await?;
        discover(&mut manager).await?;

        let device = manager
            .registry()
            .find(needle)
            .cloned()
            .ok_or_else(|| EstampaError::Config(format!("device '{}' not found", needle)))?;

        println!("Printing to {}...", device.display_name());
        let report = manager.print_to(&device, document).await?;
        println!(
            "Printed successfully! ({} chunks, {} bytes)",
            report.chunks_written, report.bytes_written
        );
        Ok(())
    }
}

#[cfg(not(feature = "ble"))]
mod ble {
    use estampa::{EstampaError, SessionConfig, receipt::ReceiptDocument};

    fn unsupported() -> EstampaError {
        EstampaError::Config(
            "built without Bluetooth support; rebuild with `--features ble`".to_string(),
        )
    }

    pub async fn scan(_config: SessionConfig) -> Result<(), EstampaError> {
        Err(unsupported())
    }

    pub async fn print(
        _config: SessionConfig,
        _needle: &str,
        _document: &ReceiptDocument,
    ) -> Result<(), EstampaError> {
        Err(unsupported())
    }
}

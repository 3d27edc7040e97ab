//! Command line tool that tracks a shipment with one of the configured carriers.

mod config;
mod output;

use std::{io, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use shiptrack_core::{
    model::Carrier,
    transport::{HttpTransport, ReqwestTransport},
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

#[derive(Parser)]
#[command(name = "shiptrack", version, about = "Track shipments across FedEx, Landmark, OnTrac, UPS and USPS")]
struct Cli {
    /// Carrier credentials and endpoint overrides
    #[arg(short, long, default_value = "shiptrack.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch and print the event history of one shipment
    Track {
        /// fedex, landmark, ontrac, ups or usps
        carrier: Carrier,

        /// Carrier tracking number
        tracking_number: String,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG overrides the default level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;
    let transport: Arc<dyn HttpTransport> =
        Arc::new(ReqwestTransport::new().context("failed to build HTTP client")?);
    let registry = config.registry(&transport)?;

    match cli.command {
        Command::Track {
            carrier,
            tracking_number,
            json,
        } => {
            let provider = registry
                .provider(carrier)
                .with_context(|| format!("{carrier} is not configured in {}", cli.config.display()))?;
            debug!(%carrier, tracking_number, "tracking shipment");

            let info = provider
                .track(&tracking_number)
                .await
                .with_context(|| format!("failed to track {carrier} shipment {tracking_number}"))?;

            let mut stdout = io::stdout().lock();
            if json {
                output::write_json(&mut stdout, &info)?;
            } else {
                output::write_timeline(&mut stdout, carrier_title(carrier), &tracking_number, &info)?;
            }
        }
    }

    Ok(())
}

fn carrier_title(carrier: Carrier) -> &'static str {
    match carrier {
        Carrier::Fedex => "FedEx",
        Carrier::Landmark => "Landmark Global",
        Carrier::OnTrac => "OnTrac",
        Carrier::Ups => "UPS",
        Carrier::Usps => "USPS",
    }
}

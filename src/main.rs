use clap::Parser;
use log::{error, info, warn};
use std::fs;
use std::io;
use std::path::PathBuf;

use em400_uplink_etl::replay::replay;
use em400_uplink_etl::{IngestConfig, Ingestor, MemoryStore, UplinkSource};

/// Replay captured EM400 uplinks and print what the decoder makes of them
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// File with one hex or base64 uplink per line (`#` starts a comment)
    samples: PathBuf,

    /// Attribute samples to this message-bus topic instead of HTTP
    #[arg(long)]
    topic: Option<String>,

    /// One JSON document per line instead of pretty output
    #[arg(long)]
    compact: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp_secs()
        .init();

    let args = Args::parse();

    // Load configuration
    let config = match IngestConfig::new() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    let content = match fs::read_to_string(&args.samples) {
        Ok(content) => content,
        Err(e) => {
            error!("Failed to read {}: {}", args.samples.display(), e);
            return Err(e.into());
        }
    };

    let source = match args.topic {
        Some(topic) => UplinkSource::Mqtt { topic },
        None => UplinkSource::Http,
    };

    let store = MemoryStore::with_devices(config.devices.iter().cloned());
    let mut ingestor = Ingestor::new(&config, store);

    let stdout = io::stdout();
    let stderr = io::stderr();
    let summary = replay(
        &mut ingestor,
        &content,
        &source,
        !args.compact,
        &mut stdout.lock(),
        &mut stderr.lock(),
    )?;

    if summary.samples == 0 {
        info!("No samples found in {}", args.samples.display());
        return Ok(());
    }

    info!(
        "Replayed {} samples: {} stored, {} duplicate, {} unknown device, {} anonymous, {} rejected",
        summary.samples,
        summary.stored,
        summary.duplicates,
        summary.unknown_devices,
        summary.anonymous,
        summary.rejected
    );
    if summary.truncated > 0 {
        warn!(
            "{} samples stopped early, check the tag tables",
            summary.truncated
        );
    }

    Ok(())
}

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::{Sender, bounded};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::thread;

use backtrack::config::{NavConfig, OrientationSensorMode};
use backtrack::geo::GeoFix;
use backtrack::output::{OutputFormat, create_formatter};
use backtrack::processing::{NavEvent, NavigationProcessor};
use backtrack::sensors::SensorAvailability;
use backtrack::NavError;

#[derive(Parser, Debug)]
#[command(name = "backtrack")]
#[command(about = "Replay location and sensor events and print navigation state", long_about = None)]
struct Args {
    /// JSON-lines event file (default: stdin)
    input: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output format: text, json, csv
    #[arg(short = 'f', long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Destination as LAT,LON, applied before the first event
    #[arg(short, long)]
    destination: Option<GeoFix>,

    /// Orientation sensor mode: auto, raw, calculated
    #[arg(short, long, value_enum)]
    mode: Option<OrientationSensorMode>,

    /// Ignore orientation sensors, bearing from location only
    #[arg(long)]
    no_sensors: bool,

    /// Maximum output rate in Hz of event time (0 = every change)
    #[arg(long)]
    rate: Option<f64>,

    /// Increase output verbosity
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = match args.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let mut config = match &args.config {
        Some(path) => NavConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => NavConfig::default(),
    };
    if let Some(mode) = args.mode {
        config.sensors.mode = mode;
    }
    if args.no_sensors {
        config.sensors.enabled = false;
    }
    if let Some(rate) = args.rate {
        config.output.rate_hz = rate;
    }
    config.validate().context("Invalid configuration")?;

    log::info!(
        "sensors: {} ({} mode), dedupe fixes: {}",
        if config.sensors.enabled { "enabled" } else { "disabled" },
        config.sensors.mode,
        config.navigation.dedupe_fixes
    );

    let processor = NavigationProcessor::replay(config, SensorAvailability::all())?;

    let (event_tx, event_rx) = bounded(256);
    let (snapshot_tx, snapshot_rx) = bounded(64);
    let worker = processor.spawn(event_rx, snapshot_tx);

    if let Some(destination) = args.destination {
        event_tx.send(NavEvent::Destination(Some(destination)))?;
    }

    let input = args.input.clone();
    let reader = thread::spawn(move || -> Result<usize> {
        match input {
            Some(path) => {
                let file = File::open(&path)
                    .with_context(|| format!("Failed to open {}", path.display()))?;
                read_events(BufReader::new(file), &event_tx)
            }
            None => read_events(io::stdin().lock(), &event_tx),
        }
    });

    let formatter = create_formatter(args.format, args.verbose > 0);
    if let Some(header) = formatter.header() {
        println!("{}", header);
    }
    let mut last_line = String::new();
    for snapshot in snapshot_rx.iter() {
        let line = formatter.format(&snapshot);
        // text output only changes every so often
        if line != last_line {
            println!("{}", line);
            last_line = line;
        }
    }

    let count = reader
        .join()
        .map_err(|_| anyhow::anyhow!("Event reader panicked"))??;
    let processor = worker
        .join()
        .map_err(|_| anyhow::anyhow!("Navigation processor panicked"))?;

    log::info!(
        "replayed {} events, final distance {:.0} m",
        count,
        processor.navigator().distance()
    );

    Ok(())
}

/// Parse one event per line; blank lines and `#` comments are skipped
fn read_events<R: BufRead>(reader: R, tx: &Sender<NavEvent>) -> Result<usize> {
    let mut count = 0;
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let event: NavEvent = serde_json::from_str(trimmed).map_err(|e| NavError::Parse {
            line: index + 1,
            message: e.to_string(),
        })?;
        if tx.send(event).is_err() {
            log::debug!("processor stopped, not reading further");
            break;
        }
        count += 1;
    }
    Ok(count)
}

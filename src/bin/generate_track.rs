use anyhow::{Context, Result};
use clap::Parser;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use backtrack::simulation::{WalkConfig, WalkLeg, generate_walk};

#[derive(Parser, Debug)]
#[command(name = "generate_track")]
#[command(about = "Generate a synthetic walk as JSON-lines navigation events")]
struct Args {
    /// TOML walk configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Seed for reproducibility
    #[arg(short, long)]
    seed: Option<u64>,

    /// Legs as HEADING:SECONDS, comma-separated (e.g., "30:120,120:60")
    #[arg(short, long)]
    legs: Option<String>,

    /// Walking speed in m/s
    #[arg(long)]
    speed: Option<f64>,

    /// Constant magnetometer heading error in degrees
    #[arg(long)]
    compass_bias: Option<f64>,

    /// Fixes report their own bearing and speed
    #[arg(long)]
    report_motion: bool,

    /// Increase output verbosity
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn parse_legs(s: &str) -> Result<Vec<WalkLeg>> {
    s.split(',')
        .map(|part| {
            let (heading, duration) = part
                .trim()
                .split_once(':')
                .with_context(|| format!("Invalid leg '{}', use HEADING:SECONDS", part))?;
            Ok(WalkLeg {
                heading_deg: heading.trim().parse().context("Invalid heading value")?,
                duration_s: duration.trim().parse().context("Invalid duration value")?,
            })
        })
        .collect()
}

fn load_walk_config(path: &PathBuf) -> Result<WalkConfig> {
    let content = fs::read_to_string(path).context("Failed to read config file")?;
    toml::from_str(&content).context("Failed to parse config file")
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
        Some(path) => load_walk_config(path)?,
        None => WalkConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.seed = Some(seed);
    }
    if let Some(legs) = &args.legs {
        config.legs = parse_legs(legs)?;
    }
    if let Some(speed) = args.speed {
        config.speed_mps = speed;
    }
    if let Some(bias) = args.compass_bias {
        config.compass_bias_deg = bias;
    }
    if args.report_motion {
        config.report_bearing = true;
        config.report_speed = true;
    }

    let walk = generate_walk(&config).context("Failed to generate walk")?;
    log::info!(
        "walk of {:.0} s ends {:.0} m from start, {} events",
        config.total_duration_s(),
        walk.start.distance_to(&walk.end),
        walk.events.len()
    );

    let mut out: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };
    for event in &walk.events {
        serde_json::to_writer(&mut out, event)?;
        writeln!(out)?;
    }
    out.flush()?;

    Ok(())
}

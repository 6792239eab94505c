mod csv;
mod json;
mod text;

use chrono::{DateTime, Utc};

use crate::processing::NavigationSnapshot;

pub use self::csv::CsvFormatter;
pub use self::json::JsonFormatter;
pub use self::text::TextFormatter;

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Csv,
}

pub trait Formatter: Send {
    fn format(&self, snapshot: &NavigationSnapshot) -> String;

    fn header(&self) -> Option<&'static str> {
        None
    }
}

pub fn create_formatter(format: OutputFormat, verbose: bool) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Text => Box::new(TextFormatter::new(verbose)),
        OutputFormat::Json => Box::new(JsonFormatter),
        OutputFormat::Csv => Box::new(CsvFormatter),
    }
}

pub fn iso8601_timestamp() -> String {
    format_time_millis(Utc::now().timestamp_millis())
}

/// ISO 8601 UTC rendering of milliseconds since the Unix epoch
pub fn format_time_millis(millis: i64) -> String {
    match DateTime::<Utc>::from_timestamp_millis(millis) {
        Some(time) => time.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
        None => millis.to_string(),
    }
}

#[cfg(test)]
pub(crate) fn sample_snapshot() -> NavigationSnapshot {
    use crate::geo::CardinalDirection;

    NavigationSnapshot {
        time_millis: 1_700_000_000_000,
        latitude: Some(50.846700),
        longitude: Some(4.352500),
        accuracy_m: Some(8.0),
        distance_m: Some(1234.4),
        height_difference_m: None,
        absolute_direction: Some(225.04),
        cardinal_direction: Some(CardinalDirection::SouthWest),
        current_bearing: Some(180.0),
        relative_direction: Some(45.04),
        speed_mps: Some(1.26),
        sensor_heading: None,
        location_accurate: true,
        bearing_accurate: true,
        sensor_bearing_accurate: false,
        destination_reached: false,
    }
}

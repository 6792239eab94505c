use super::{Formatter, format_time_millis};
use crate::processing::NavigationSnapshot;

pub struct TextFormatter {
    verbose: bool,
}

impl TextFormatter {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

fn degrees(value: Option<f64>) -> String {
    value.map_or("  ---".to_string(), |v| format!("{:>5.1}°", v))
}

impl Formatter for TextFormatter {
    fn format(&self, s: &NavigationSnapshot) -> String {
        if !s.location_accurate {
            return format!("{} waiting for accurate location", format_time_millis(s.time_millis));
        }
        if s.destination_reached {
            return format!("{} destination reached", format_time_millis(s.time_millis));
        }

        let distance = s
            .distance_m
            .map_or("---".to_string(), |d| format!("{:.0} m", d));
        let cardinal = s
            .cardinal_direction
            .map_or(String::new(), |c| format!(" {}", c));
        let line = format!(
            "Distance: {:>8} direction: {}{} turn: {} speed: {:.1} m/s",
            distance,
            degrees(s.absolute_direction),
            cardinal,
            degrees(s.relative_direction),
            s.speed_mps.unwrap_or(0.0)
        );

        if self.verbose {
            let source = if s.sensor_bearing_accurate {
                "sensor"
            } else if s.bearing_accurate {
                "location"
            } else {
                "none"
            };
            format!(
                "{} [bearing: {} ({}), heading: {}, accuracy: {:.0} m, height: {}]",
                line,
                degrees(s.current_bearing),
                source,
                degrees(s.sensor_heading),
                s.accuracy_m.unwrap_or(0.0),
                s.height_difference_m
                    .map_or("---".to_string(), |h| format!("{:+.0} m", h))
            )
        } else {
            line
        }
    }
}

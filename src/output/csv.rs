use super::{Formatter, format_time_millis};
use crate::processing::NavigationSnapshot;

pub struct CsvFormatter;

fn field(value: Option<f64>, precision: usize) -> String {
    value.map_or(String::new(), |v| format!("{:.*}", precision, v))
}

impl Formatter for CsvFormatter {
    fn format(&self, s: &NavigationSnapshot) -> String {
        format!(
            "{},{},{},{},{},{},{},{},{},{},{},{},{},{}",
            format_time_millis(s.time_millis),
            field(s.latitude, 6),
            field(s.longitude, 6),
            field(s.accuracy_m, 1),
            field(s.distance_m, 1),
            field(s.height_difference_m, 1),
            field(s.absolute_direction, 1),
            s.cardinal_direction.map_or(String::new(), |c| c.to_string()),
            field(s.current_bearing, 1),
            field(s.relative_direction, 1),
            field(s.speed_mps, 2),
            field(s.sensor_heading, 1),
            s.bearing_accurate,
            s.destination_reached
        )
    }

    fn header(&self) -> Option<&'static str> {
        Some(
            "ts,latitude,longitude,accuracy_m,distance_m,height_difference_m,absolute_direction,cardinal,current_bearing,relative_direction,speed_mps,sensor_heading,bearing_accurate,destination_reached",
        )
    }
}

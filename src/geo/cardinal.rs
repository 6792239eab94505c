use std::fmt;

use serde::Serialize;

use crate::signal_processing::normalize_angle;

/// Quadrant of the compass rose a direction falls in
///
/// Segment boundaries are inclusive at the top: 90° is NE, 180° is SE,
/// 270° is SW. 0° is NE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CardinalDirection {
    NorthEast,
    SouthEast,
    SouthWest,
    NorthWest,
}

impl CardinalDirection {
    pub fn from_degrees(degrees: f64) -> Self {
        let angle = normalize_angle(degrees);
        if angle <= 90.0 {
            Self::NorthEast
        } else if angle <= 180.0 {
            Self::SouthEast
        } else if angle <= 270.0 {
            Self::SouthWest
        } else {
            Self::NorthWest
        }
    }

    pub fn abbreviation(&self) -> &'static str {
        match self {
            Self::NorthEast => "NE",
            Self::SouthEast => "SE",
            Self::SouthWest => "SW",
            Self::NorthWest => "NW",
        }
    }
}

impl fmt::Display for CardinalDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.abbreviation())
    }
}

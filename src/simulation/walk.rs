use rand::RngExt;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};

use crate::constants::{MILLI_IN_NANOS, SECOND_IN_MILLIS};
use crate::error::{NavError, Result};
use crate::geo::GeoFix;
use crate::processing::NavEvent;
use crate::sensors::SensorSample;
use crate::signal_processing::normalize_angle;

const GRAVITY: f64 = 9.81;
const FIELD_HORIZONTAL_UT: f64 = 20.0;
const FIELD_VERTICAL_UT: f64 = -40.0;

/// One straight segment of a walk
#[derive(Clone, Debug, serde::Deserialize)]
pub struct WalkLeg {
    /// True direction of travel, degrees from north
    pub heading_deg: f64,
    pub duration_s: f64,
}

/// Synthetic walk with a phone held flat, facing the direction of travel
#[derive(Clone, Debug, serde::Deserialize)]
#[serde(default)]
pub struct WalkConfig {
    pub seed: Option<u64>,
    pub start_latitude: f64,
    pub start_longitude: f64,
    /// Wall-clock time of the first event
    pub start_time_millis: i64,
    pub legs: Vec<WalkLeg>,
    pub speed_mps: f64,
    pub fix_interval_s: f64,
    pub sensor_rate_hz: f64,
    /// Standard deviation of the position error per axis
    pub gps_noise_m: f64,
    /// Accuracy radius reported with every fix
    pub gps_accuracy_m: f64,
    /// Constant error of the magnetometer heading (declination, soft iron)
    pub compass_bias_deg: f64,
    /// Standard deviation of the magnetometer heading error
    pub compass_noise_deg: f64,
    /// Standard deviation of accelerometer noise per axis, m/s²
    pub accel_noise: f64,
    /// Fixes carry a speed
    pub report_speed: bool,
    /// Fixes carry a bearing
    pub report_bearing: bool,
    /// Emit the start point as destination before the walk
    pub return_to_start: bool,
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self {
            seed: None,
            start_latitude: 50.8467,
            start_longitude: 4.3525,
            start_time_millis: 1_700_000_000_000,
            legs: vec![
                WalkLeg {
                    heading_deg: 30.0,
                    duration_s: 120.0,
                },
                WalkLeg {
                    heading_deg: 120.0,
                    duration_s: 60.0,
                },
            ],
            speed_mps: 1.4,
            fix_interval_s: 1.0,
            sensor_rate_hz: 5.0,
            gps_noise_m: 2.0,
            gps_accuracy_m: 8.0,
            compass_bias_deg: 0.0,
            compass_noise_deg: 2.0,
            accel_noise: 0.05,
            report_speed: false,
            report_bearing: false,
            return_to_start: true,
        }
    }
}

impl WalkConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_legs(mut self, legs: Vec<WalkLeg>) -> Self {
        self.legs = legs;
        self
    }

    pub fn with_compass_bias(mut self, bias_deg: f64) -> Self {
        self.compass_bias_deg = bias_deg;
        self
    }

    pub fn total_duration_s(&self) -> f64 {
        self.legs.iter().map(|leg| leg.duration_s.max(0.0)).sum()
    }
}

/// Events of a generated walk with the ground truth they were derived from
#[derive(Clone, Debug)]
pub struct SimulatedWalk {
    pub events: Vec<NavEvent>,
    pub start: GeoFix,
    /// True position at the end of the walk
    pub end: GeoFix,
    /// True direction of travel at the end of the walk
    pub end_heading: f64,
}

fn create_rng(seed: Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(s) => ChaCha8Rng::seed_from_u64(s),
        None => rand::make_rng(),
    }
}

fn normal(name: &str, std_dev: f64) -> Result<Normal<f64>> {
    if !std_dev.is_finite() || std_dev < 0.0 {
        return Err(NavError::Config(format!(
            "{} must be a finite, non-negative deviation, got {}",
            name, std_dev
        )));
    }
    Normal::new(0.0, std_dev).map_err(|e| NavError::Config(format!("{} = {}: {}", name, std_dev, e)))
}

/// Horizontal field for a device facing `heading` degrees
pub fn magnetic_field_for_heading(heading: f64) -> [f64; 3] {
    let radians = heading.to_radians();
    [
        -FIELD_HORIZONTAL_UT * radians.sin(),
        FIELD_HORIZONTAL_UT * radians.cos(),
        FIELD_VERTICAL_UT,
    ]
}

/// Generate the event stream of a walk, ordered by time
///
/// Accelerometer and magnetometer samples are produced at `sensor_rate_hz`
/// and location fixes every `fix_interval_s`, all stamped on one timeline
/// starting at 0 ns.
///
/// # Errors
/// `NavError::Config` if a noise deviation is negative or not finite.
pub fn generate_walk(config: &WalkConfig) -> Result<SimulatedWalk> {
    let gps_noise = normal("gps_noise_m", config.gps_noise_m)?;
    let compass_noise = normal("compass_noise_deg", config.compass_noise_deg)?;
    let accel_noise = normal("accel_noise", config.accel_noise)?;
    let mut rng = create_rng(config.seed);

    let start = GeoFix::new("gps", config.start_latitude, config.start_longitude)
        .with_time_millis(config.start_time_millis)
        .with_elapsed_realtime_nanos(0);

    let mut events = Vec::new();
    if config.return_to_start {
        events.push(NavEvent::Destination(Some(start.clone())));
    }

    let dt = if config.sensor_rate_hz > 0.0 {
        1.0 / config.sensor_rate_hz
    } else {
        config.fix_interval_s.max(0.1)
    };
    let total = config.total_duration_s();
    let steps = (total / dt).round() as u64;

    let mut position = start.clone();
    let mut heading = config.legs.first().map_or(0.0, |leg| leg.heading_deg);
    let mut next_fix_s = 0.0;

    for step in 0..=steps {
        let t = step as f64 * dt;
        let nanos = (t * 1e9).round() as u64;
        let millis = config.start_time_millis + (t * SECOND_IN_MILLIS).round() as i64;

        if step > 0 {
            position = position.offset_by(heading, config.speed_mps * dt);
        }
        heading = heading_at(&config.legs, t).unwrap_or(heading);

        if config.sensor_rate_hz > 0.0 {
            let gravity = [
                accel_noise.sample(&mut rng),
                accel_noise.sample(&mut rng),
                GRAVITY + accel_noise.sample(&mut rng),
            ];
            let sensed = heading + config.compass_bias_deg + compass_noise.sample(&mut rng);
            events.push(NavEvent::Sensor(SensorSample::accelerometer(nanos, gravity)));
            events.push(NavEvent::Sensor(SensorSample::magnetic_field(
                nanos,
                magnetic_field_for_heading(sensed),
            )));
        }

        if t + 1e-9 >= next_fix_s {
            next_fix_s += config.fix_interval_s.max(dt);

            let error_bearing = rng.random::<f64>() * 360.0;
            let error_m = gps_noise.sample(&mut rng).abs();
            let mut fix = position
                .offset_by(error_bearing, error_m)
                .with_accuracy(config.gps_accuracy_m)
                .with_time_millis(millis)
                .with_elapsed_realtime_nanos(nanos);
            if config.report_speed {
                fix = fix.with_speed(config.speed_mps);
            }
            if config.report_bearing {
                fix = fix.with_bearing(heading);
            }
            events.push(NavEvent::Location(fix));
        }
    }

    log::debug!(
        "generated {} events over {:.0} s ({} steps)",
        events.len(),
        total,
        steps
    );

    let end = position
        .with_time_millis(config.start_time_millis + (total * SECOND_IN_MILLIS) as i64)
        .with_elapsed_realtime_nanos((total * 1000.0) as u64 * MILLI_IN_NANOS);

    Ok(SimulatedWalk {
        events,
        start,
        end,
        end_heading: normalize_angle(heading),
    })
}

/// Heading of the leg active at `t` seconds, `None` past the last leg
fn heading_at(legs: &[WalkLeg], t: f64) -> Option<f64> {
    let mut leg_end = 0.0;
    for leg in legs {
        leg_end += leg.duration_s.max(0.0);
        if t < leg_end {
            return Some(leg.heading_deg);
        }
    }
    None
}

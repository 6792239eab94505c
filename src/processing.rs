//! Event-driven navigation pipeline
//!
//! Location fixes, sensor samples and destination changes arrive from
//! independent sources. [`NavigationProcessor`] owns the navigator and the
//! sensor fuser and applies events strictly one at a time; [`spawn`] runs it
//! as an actor fed by a channel, so callers on any thread only ever send.
//!
//! [`spawn`]: NavigationProcessor::spawn

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use serde::{Deserialize, Serialize};

use crate::clock::{Clock, ManualClock};
use crate::config::NavConfig;
use crate::constants::MILLI_IN_NANOS;
use crate::error::Result;
use crate::geo::{CardinalDirection, GeoFix};
use crate::navigation::Navigator;
use crate::sensors::{
    ListenerId, ReplaySensorSource, SensorAvailability, SensorOrientation, SensorSample,
    SensorSource,
};

/// Input to the navigation pipeline
///
/// Serialized adjacently tagged, one event per line in replay files:
/// `{"type":"location","data":{"latitude":50.8,"longitude":4.3,...}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum NavEvent {
    Location(GeoFix),
    Sensor(SensorSample),
    /// Set or clear the destination
    Destination(Option<GeoFix>),
}

/// Navigation state at one instant, with every value already gated
///
/// Numeric fields are `None` when the matching predicate does not hold, so
/// consumers never display untrustworthy values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NavigationSnapshot {
    /// Wall-clock time of the snapshot, milliseconds since the Unix epoch
    pub time_millis: i64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub accuracy_m: Option<f64>,
    pub distance_m: Option<f64>,
    pub height_difference_m: Option<f64>,
    pub absolute_direction: Option<f64>,
    pub cardinal_direction: Option<CardinalDirection>,
    pub current_bearing: Option<f64>,
    pub relative_direction: Option<f64>,
    pub speed_mps: Option<f64>,
    pub sensor_heading: Option<f64>,
    pub location_accurate: bool,
    pub bearing_accurate: bool,
    pub sensor_bearing_accurate: bool,
    pub destination_reached: bool,
}

/// Single owner of the navigation state
pub struct NavigationProcessor {
    navigator: Navigator,
    config: NavConfig,
    clock: Arc<dyn Clock>,
    replay_clock: Option<ManualClock>,
    /// Wall time of the last replayed fix
    replay_wall_millis: Option<i64>,
    listener: Option<ListenerId>,
}

impl NavigationProcessor {
    /// Processor reading time from `clock` and subscribing to sensors through `source`
    pub fn new(
        config: NavConfig,
        source: Box<dyn SensorSource>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        let mut sensor =
            SensorOrientation::new(config.sensors.clone(), source, Arc::clone(&clock))?;

        let listener = if sensor.has_sensors() {
            Some(sensor.add_listener(Box::new(|heading: f64| {
                log::trace!("heading {:.1}", heading)
            })))
        } else {
            log::info!("no orientation sensors, bearing from location only");
            None
        };

        Ok(Self {
            navigator: Navigator::with_sensor_orientation(sensor, Arc::clone(&clock)),
            config,
            clock,
            replay_clock: None,
            replay_wall_millis: None,
            listener,
        })
    }

    /// Processor for recorded or simulated events
    ///
    /// Time is taken from the events themselves: each event moves a manual
    /// clock forward to its own timestamps before it is applied, so staleness
    /// is judged as it would have been live.
    pub fn replay(config: NavConfig, availability: SensorAvailability) -> Result<Self> {
        let clock = ManualClock::default();
        let source = Box::new(ReplaySensorSource::new(availability));
        let mut processor = Self::new(config, source, Arc::new(clock.clone()))?;
        processor.replay_clock = Some(clock);
        Ok(processor)
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    pub fn config(&self) -> &NavConfig {
        &self.config
    }

    /// Apply one event; returns whether the navigation state changed
    pub fn handle(&mut self, event: &NavEvent) -> bool {
        if let Some(clock) = &self.replay_clock {
            advance_replay_clock(clock, &mut self.replay_wall_millis, event);
        }

        match event {
            NavEvent::Location(fix) => {
                if self.config.navigation.dedupe_fixes {
                    self.navigator.offer_location(fix.clone())
                } else {
                    self.navigator.set_location(Some(fix.clone()));
                    true
                }
            }
            NavEvent::Sensor(sample) => self
                .navigator
                .sensor_orientation_mut()
                .is_some_and(|sensor| sensor.handle_sample(sample)),
            NavEvent::Destination(destination) => {
                log::info!(
                    "destination {}",
                    destination
                        .as_ref()
                        .map_or("cleared".to_string(), |d| d.to_string())
                );
                self.navigator.set_destination(destination.clone());
                true
            }
        }
    }

    /// Current navigation state, gated by the navigator's predicates
    pub fn snapshot(&self) -> NavigationSnapshot {
        let nav = &self.navigator;
        let location = nav.location();
        let location_accurate = nav.is_location_accurate();
        let bearing_accurate = nav.is_bearing_accurate();
        let sensor_bearing_accurate = nav.is_sensor_bearing_accurate();
        let has_destination = nav.destination().is_some();

        let towards_destination = location_accurate && has_destination;
        let absolute_direction = towards_destination.then(|| nav.absolute_direction());
        let height_difference = (towards_destination
            && location.is_some_and(|l| l.altitude.is_some())
            && nav.destination().is_some_and(|d| d.altitude.is_some()))
        .then(|| nav.height_difference());

        NavigationSnapshot {
            time_millis: self.clock.wall_millis(),
            latitude: location.map(|l| l.latitude),
            longitude: location.map(|l| l.longitude),
            accuracy_m: location.and_then(|l| l.accuracy),
            distance_m: towards_destination.then(|| nav.distance()),
            height_difference_m: height_difference,
            absolute_direction,
            cardinal_direction: absolute_direction.map(CardinalDirection::from_degrees),
            current_bearing: bearing_accurate.then(|| nav.current_bearing()),
            relative_direction: (bearing_accurate && towards_destination)
                .then(|| nav.relative_direction()),
            speed_mps: location_accurate.then(|| nav.current_speed()),
            sensor_heading: sensor_bearing_accurate
                .then(|| nav.sensor_orientation().map(|s| s.orientation()))
                .flatten(),
            location_accurate,
            bearing_accurate,
            sensor_bearing_accurate,
            destination_reached: nav.is_destination_reached(),
        }
    }

    /// Run the processor on its own thread
    ///
    /// Events from `rx` are applied in arrival order. After each change a
    /// snapshot is sent on `tx`, at most `output.rate_hz` per second of clock
    /// time (every change when the rate is 0). The thread ends when `rx` is
    /// disconnected or `tx` has no receiver, and hands the processor back.
    pub fn spawn(
        mut self,
        rx: Receiver<NavEvent>,
        tx: Sender<NavigationSnapshot>,
    ) -> JoinHandle<Self> {
        thread::spawn(move || {
            let min_interval_nanos = if self.config.output.rate_hz > 0.0 {
                (1e9 / self.config.output.rate_hz) as u64
            } else {
                0
            };
            let mut last_emit: Option<u64> = None;

            for event in rx.iter() {
                if !self.handle(&event) {
                    continue;
                }

                let now = self.clock.elapsed_nanos();
                if last_emit.is_some_and(|last| now.saturating_sub(last) < min_interval_nanos) {
                    continue;
                }
                last_emit = Some(now);

                if tx.send(self.snapshot()).is_err() {
                    log::debug!("snapshot receiver closed, stopping");
                    break;
                }
            }

            log::debug!("navigation processor stopped");
            self
        })
    }
}

impl Drop for NavigationProcessor {
    fn drop(&mut self) {
        if let Some(id) = self.listener.take() {
            if let Some(sensor) = self.navigator.sensor_orientation_mut() {
                sensor.remove_listener(id);
            }
        }
    }
}

/// Fixes without a monotonic stamp still move monotonic time by the wall
/// time elapsed since the previous fix, so sensor readings age between them.
fn advance_replay_clock(
    clock: &ManualClock,
    last_wall_millis: &mut Option<i64>,
    event: &NavEvent,
) {
    match event {
        NavEvent::Location(fix) => {
            clock.advance_wall_to(fix.time_millis);
            match fix.elapsed_realtime_nanos {
                Some(nanos) => clock.advance_elapsed_to(nanos),
                None => {
                    let gained = last_wall_millis
                        .and_then(|last| fix.time_millis.checked_sub(last))
                        .filter(|delta| *delta > 0)
                        .and_then(|delta| (delta as u64).checked_mul(MILLI_IN_NANOS));
                    if let Some(nanos) = gained {
                        clock.advance_elapsed_to(clock.elapsed_nanos().saturating_add(nanos));
                    }
                }
            }
            *last_wall_millis =
                Some(last_wall_millis.map_or(fix.time_millis, |last| last.max(fix.time_millis)));
        }
        NavEvent::Sensor(sample) => clock.advance_elapsed_to(sample.timestamp_nanos),
        NavEvent::Destination(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn fix_at(seconds: u64, base: &GeoFix, bearing: f64, distance: f64) -> GeoFix {
        base.offset_by(bearing, distance)
            .with_accuracy(5.0)
            .with_time_millis(1_700_000_000_000 + seconds as i64 * 1000)
            .with_elapsed_realtime_nanos(seconds * 1000 * MILLI_IN_NANOS)
    }

    #[test]
    fn test_event_json_format() {
        let event = NavEvent::Sensor(SensorSample::orientation(5, 90.0));
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.starts_with(r#"{"type":"sensor","data":{"kind":"orientation""#));

        let parsed: NavEvent =
            serde_json::from_str(r#"{"type":"location","data":{"latitude":1.5,"longitude":2.5}}"#)
                .unwrap();
        assert_eq!(parsed, NavEvent::Location(GeoFix::new("", 1.5, 2.5)));

        let cleared: NavEvent =
            serde_json::from_str(r#"{"type":"destination","data":null}"#).unwrap();
        assert_eq!(cleared, NavEvent::Destination(None));
    }

    #[test]
    fn test_replay_clock_follows_events() {
        let mut processor =
            NavigationProcessor::replay(NavConfig::default(), SensorAvailability::none()).unwrap();
        let start = GeoFix::new("gps", 50.0, 4.0);

        assert!(processor.handle(&NavEvent::Location(fix_at(0, &start, 0.0, 0.0))));
        assert!(processor.snapshot().location_accurate);

        assert!(processor.handle(&NavEvent::Location(fix_at(5, &start, 90.0, 20.0))));
        let snapshot = processor.snapshot();
        assert_eq!(snapshot.time_millis, 1_700_000_005_000);
        assert!(snapshot.bearing_accurate);
        assert_abs_diff_eq!(snapshot.current_bearing.unwrap(), 90.0, epsilon = 0.01);
        assert_abs_diff_eq!(snapshot.speed_mps.unwrap(), 4.0, epsilon = 1e-6);

        // a sensor sample ten minutes later makes the fix stale
        processor.handle(&NavEvent::Sensor(SensorSample::orientation(
            600_000 * MILLI_IN_NANOS,
            0.0,
        )));
        let snapshot = processor.snapshot();
        assert!(!snapshot.location_accurate);
        assert_eq!(snapshot.speed_mps, None);
        assert_eq!(snapshot.current_bearing, None);
    }

    #[test]
    fn test_dedupe_follows_config() {
        let start = GeoFix::new("gps", 50.0, 4.0);
        let fix = fix_at(1, &start, 0.0, 0.0);

        let mut dedupe =
            NavigationProcessor::replay(NavConfig::default(), SensorAvailability::none()).unwrap();
        assert!(dedupe.handle(&NavEvent::Location(fix.clone())));
        assert!(!dedupe.handle(&NavEvent::Location(fix.clone())));

        let mut config = NavConfig::default();
        config.navigation.dedupe_fixes = false;
        let mut replace = NavigationProcessor::replay(config, SensorAvailability::none()).unwrap();
        assert!(replace.handle(&NavEvent::Location(fix.clone())));
        assert!(replace.handle(&NavEvent::Location(fix.clone())));
        assert_eq!(replace.navigator().previous_location(), Some(&fix));
    }

    #[test]
    fn test_snapshot_gates_destination_values() {
        let mut processor =
            NavigationProcessor::replay(NavConfig::default(), SensorAvailability::none()).unwrap();
        let start = GeoFix::new("gps", 50.0, 4.0);
        let destination = start.offset_by(225.0, 500.0);

        processor.handle(&NavEvent::Destination(Some(destination)));
        let snapshot = processor.snapshot();
        assert_eq!(snapshot.distance_m, None);
        assert_eq!(snapshot.cardinal_direction, None);

        processor.handle(&NavEvent::Location(fix_at(0, &start, 0.0, 0.0)));
        let snapshot = processor.snapshot();
        assert_abs_diff_eq!(snapshot.distance_m.unwrap(), 500.0, epsilon = 1e-6);
        assert_eq!(snapshot.cardinal_direction, Some(CardinalDirection::SouthWest));
        // no bearing yet, so no relative direction
        assert_eq!(snapshot.relative_direction, None);
        assert_eq!(snapshot.height_difference_m, None);
        assert!(!snapshot.destination_reached);

        processor.handle(&NavEvent::Destination(None));
        assert_eq!(processor.snapshot().distance_m, None);
    }

    #[test]
    fn test_sensor_events_drive_heading() {
        let mut processor =
            NavigationProcessor::replay(NavConfig::default(), SensorAvailability::all()).unwrap();
        assert!(processor.handle(&NavEvent::Sensor(SensorSample::orientation(
            MILLI_IN_NANOS,
            123.0
        ))));
        let snapshot = processor.snapshot();
        assert!(snapshot.sensor_bearing_accurate);
        assert_eq!(snapshot.sensor_heading, Some(123.0));
        assert_eq!(snapshot.current_bearing, Some(123.0));

        // throttled
        assert!(!processor.handle(&NavEvent::Sensor(SensorSample::orientation(
            2 * MILLI_IN_NANOS,
            124.0
        ))));
    }

    #[test]
    fn test_sensor_heading_ages_between_wall_clock_fixes() {
        let mut processor =
            NavigationProcessor::replay(NavConfig::default(), SensorAvailability::all()).unwrap();
        let start = GeoFix::new("gps", 50.0, 4.0).with_accuracy(5.0);
        let wall_fix = |seconds: i64| {
            NavEvent::Location(start.clone().with_time_millis(1_700_000_000_000 + seconds * 1000))
        };

        processor.handle(&NavEvent::Sensor(SensorSample::orientation(
            1000 * MILLI_IN_NANOS,
            200.0,
        )));
        assert!(processor.handle(&wall_fix(0)));
        assert!(processor.snapshot().sensor_bearing_accurate);

        // 2 s after the last sample
        assert!(processor.handle(&wall_fix(2)));
        assert!(processor.snapshot().sensor_bearing_accurate);

        // samples stopped, fixes keep coming
        assert!(processor.handle(&wall_fix(600)));
        let snapshot = processor.snapshot();
        assert!(!snapshot.sensor_bearing_accurate);
        assert_eq!(snapshot.sensor_heading, None);
        assert_eq!(snapshot.current_bearing, None);
    }

    #[test]
    fn test_sensors_disabled() {
        let mut config = NavConfig::default();
        config.sensors.enabled = false;
        let mut processor =
            NavigationProcessor::replay(config, SensorAvailability::all()).unwrap();
        processor.handle(&NavEvent::Sensor(SensorSample::orientation(MILLI_IN_NANOS, 10.0)));
        let snapshot = processor.snapshot();
        assert!(!snapshot.sensor_bearing_accurate);
        assert_eq!(snapshot.sensor_heading, None);
    }

    #[test]
    fn test_spawned_actor() {
        let processor =
            NavigationProcessor::replay(NavConfig::default(), SensorAvailability::none()).unwrap();
        let (event_tx, event_rx) = crossbeam_channel::unbounded();
        let (snapshot_tx, snapshot_rx) = crossbeam_channel::unbounded();
        let handle = processor.spawn(event_rx, snapshot_tx);

        let start = GeoFix::new("gps", 50.0, 4.0);
        let fix = fix_at(0, &start, 0.0, 0.0);
        event_tx.send(NavEvent::Location(fix.clone())).unwrap();
        // duplicate produces no snapshot
        event_tx.send(NavEvent::Location(fix)).unwrap();
        event_tx
            .send(NavEvent::Location(fix_at(5, &start, 0.0, 20.0)))
            .unwrap();
        drop(event_tx);

        let snapshots: Vec<_> = snapshot_rx.iter().collect();
        assert_eq!(snapshots.len(), 2);
        assert_abs_diff_eq!(snapshots[1].speed_mps.unwrap(), 4.0, epsilon = 1e-6);

        let processor = handle.join().unwrap();
        assert!(processor.navigator().previous_location().is_some());
    }

    #[test]
    fn test_output_rate_limits_snapshots() {
        let mut config = NavConfig::default();
        config.output.rate_hz = 1.0;
        let processor = NavigationProcessor::replay(config, SensorAvailability::all()).unwrap();
        let (event_tx, event_rx) = crossbeam_channel::unbounded();
        let (snapshot_tx, snapshot_rx) = crossbeam_channel::unbounded();
        let handle = processor.spawn(event_rx, snapshot_tx);

        // 5 Hz heading for 3 s: 15 changes, one snapshot per second
        for i in 0..15u64 {
            let sample = SensorSample::orientation((1 + i * 200) * MILLI_IN_NANOS, 90.0);
            event_tx.send(NavEvent::Sensor(sample)).unwrap();
        }
        drop(event_tx);

        assert_eq!(snapshot_rx.iter().count(), 3);
        handle.join().unwrap();
    }
}

//! Sampling and reporting schedule around a single turbidity probe
//!
//! The monitor is what the firmware and simulator main loops poll. It owns
//! the sensor and two [`PeriodicTimer`]s: one for sampling, one for
//! reporting. A timer's action only raises a flag shared with the monitor;
//! the monitor consumes the flags after polling, so the sensor stays owned
//! here.

use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::string::{String, ToString};
use core::cell::Cell;

use embassy_time::{Duration, Instant};
use log::{info, warn};

use crate::config::ScheduleConfig;
use crate::metrics::Condition;
use crate::sensors::{AnalogSource, Classification, Classifier, Snapshot, TurbiditySensor};
use crate::timer::PeriodicTimer;
use crate::uplink::TelemetryPayload;

type Tick = Box<dyn FnMut()>;

/// Timer whose action raises the returned flag
fn flagging_timer(interval_ms: u64) -> (PeriodicTimer<Tick>, Rc<Cell<bool>>) {
    let flag = Rc::new(Cell::new(false));
    let raise = Rc::clone(&flag);
    let timer = PeriodicTimer::new(
        Duration::from_millis(interval_ms),
        Box::new(move || raise.set(true)) as Tick,
    );
    (timer, flag)
}

/// Derived view of the last sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub snapshot: Snapshot,
    pub level: u8,
    pub percentage: f32,
    pub condition: Condition,
    pub ntu: f32,
}

/// What happened during one [`Monitor::tick`]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TickOutcome {
    /// Snapshot taken during this tick, if the sample timer fired
    pub sampled: Option<Snapshot>,
    /// The report timer fired; the caller should build and send a payload
    pub report_due: bool,
}

pub struct Monitor<A, C = Classification> {
    sensor: TurbiditySensor<A, C>,
    sample_timer: PeriodicTimer<Tick>,
    report_timer: PeriodicTimer<Tick>,
    sample_due: Rc<Cell<bool>>,
    report_due: Rc<Cell<bool>>,
    started: Instant,
    samples_taken: u32,
}

impl<A: AnalogSource, C: Classifier> Monitor<A, C> {
    pub fn new(sensor: TurbiditySensor<A, C>, schedule: &ScheduleConfig) -> Self {
        let (sample_timer, sample_due) = flagging_timer(schedule.sample_interval_ms);
        let (report_timer, report_due) = flagging_timer(schedule.report_interval_ms);
        Self {
            sensor,
            sample_timer,
            report_timer,
            sample_due,
            report_due,
            started: Instant::from_ticks(0),
            samples_taken: 0,
        }
    }

    /// Rebase both timers on `now` and take an initial sample.
    pub fn start(&mut self, now: Instant) -> Snapshot {
        self.started = now;
        self.sample_timer.reset(now);
        self.report_timer.reset(now);
        info!(
            "monitor: started, sampling every {} ms, reporting every {} ms",
            self.sample_timer.interval().as_millis(),
            self.report_timer.interval().as_millis()
        );
        self.take_sample()
    }

    /// Poll both timers. Never blocks.
    ///
    /// A report never goes out on a sensor that has not been sampled yet:
    /// if the report timer fires first, a sample is taken on the spot.
    pub fn tick(&mut self, now: Instant) -> TickOutcome {
        let mut outcome = TickOutcome::default();

        self.sample_timer.poll(now);
        self.report_timer.poll(now);

        if self.sample_due.replace(false) {
            outcome.sampled = Some(self.take_sample());
        }

        if self.report_due.replace(false) {
            if self.samples_taken == 0 {
                outcome.sampled = Some(self.take_sample());
            }
            outcome.report_due = true;
        }

        outcome
    }

    fn take_sample(&mut self) -> Snapshot {
        self.samples_taken = self.samples_taken.saturating_add(1);
        let snapshot = self.sensor.sample();
        if !self.sensor.condition().is_known() {
            warn!("monitor: raw {} does not match any level", snapshot.raw);
        }
        snapshot
    }

    pub fn reading(&self) -> Reading {
        Reading {
            snapshot: self.sensor.snapshot(),
            level: self.sensor.level(),
            percentage: self.sensor.percentage(),
            condition: self.sensor.condition(),
            ntu: self.sensor.estimated_ntu(),
        }
    }

    /// Build the uplink body from the last sample.
    ///
    /// `score` is the clarity percentage truncated to an integer.
    pub fn payload(&self, time: String) -> TelemetryPayload {
        let reading = self.reading();
        TelemetryPayload {
            time,
            score: reading.percentage as u8,
            level: reading.level,
            condition: reading.condition.label().to_string(),
            ntu: reading.ntu,
        }
    }

    pub fn uptime(&self, now: Instant) -> Duration {
        now.checked_duration_since(self.started)
            .unwrap_or(Duration::from_ticks(0))
    }

    pub fn samples_taken(&self) -> u32 {
        self.samples_taken
    }

    pub fn set_intervals(&mut self, schedule: &ScheduleConfig) {
        self.sample_timer
            .set_interval(Duration::from_millis(schedule.sample_interval_ms));
        self.report_timer
            .set_interval(Duration::from_millis(schedule.report_interval_ms));
    }

    pub fn sensor(&self) -> &TurbiditySensor<A, C> {
        &self.sensor
    }

    pub fn sensor_mut(&mut self) -> &mut TurbiditySensor<A, C> {
        &mut self.sensor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SensorConfig;
    use crate::uplink::format_uptime;

    struct Constant(u16);

    impl AnalogSource for Constant {
        fn read_raw(&mut self) -> u16 {
            self.0
        }
    }

    /// Counts reads so tests can tell when the ADC was touched
    struct Counting {
        value: u16,
        reads: u32,
    }

    impl AnalogSource for Counting {
        fn read_raw(&mut self) -> u16 {
            self.reads += 1;
            self.value
        }
    }

    fn schedule(sample_ms: u64, report_ms: u64) -> ScheduleConfig {
        ScheduleConfig {
            sample_interval_ms: sample_ms,
            report_interval_ms: report_ms,
        }
    }

    fn at(ms: u64) -> Instant {
        Instant::from_millis(ms)
    }

    #[test]
    fn test_start_takes_initial_sample() {
        let sensor = TurbiditySensor::from_config(Constant(447), &SensorConfig::default()).unwrap();
        let mut monitor = Monitor::new(sensor, &schedule(1000, 10_000));
        let snapshot = monitor.start(at(50));
        assert_eq!(snapshot.raw, 447);
        assert_eq!(monitor.samples_taken(), 1);
    }

    #[test]
    fn test_tick_follows_schedule() {
        let source = Counting { value: 500, reads: 0 };
        let sensor = TurbiditySensor::from_config(source, &SensorConfig::default()).unwrap();
        let mut monitor = Monitor::new(sensor, &schedule(1000, 3000));
        monitor.start(at(0));

        assert_eq!(monitor.tick(at(500)), TickOutcome::default());

        let outcome = monitor.tick(at(1000));
        assert!(outcome.sampled.is_some());
        assert!(!outcome.report_due);

        monitor.tick(at(2000));
        let outcome = monitor.tick(at(3000));
        assert!(outcome.sampled.is_some());
        assert!(outcome.report_due);

        // start + three sample ticks
        assert_eq!(monitor.sensor().raw_value(), 500);
        assert_eq!(monitor.samples_taken(), 4);
    }

    #[test]
    fn test_report_without_prior_sample_samples_first() {
        let sensor = TurbiditySensor::from_config(Constant(447), &SensorConfig::default()).unwrap();
        let mut monitor = Monitor::new(sensor, &schedule(60_000, 1000));

        let outcome = monitor.tick(at(1000));
        assert!(outcome.report_due);
        assert_eq!(outcome.sampled.map(|s| s.raw), Some(447));
    }

    #[test]
    fn test_payload_from_clean_reading() {
        let sensor = TurbiditySensor::from_config(Constant(447), &SensorConfig::default()).unwrap();
        let mut monitor = Monitor::new(sensor, &schedule(1000, 10_000));
        monitor.start(at(0));

        let payload = monitor.payload(format_uptime(monitor.uptime(at(100_000))));
        assert_eq!(payload.time, "00:01:40");
        assert_eq!(payload.score, 100);
        assert_eq!(payload.level, 5);
        assert_eq!(payload.condition, "Sangat Bersih");
        assert_eq!(payload.ntu, monitor.sensor().estimated_ntu());
    }

    #[test]
    fn test_payload_from_turbid_reading() {
        let sensor = TurbiditySensor::from_config(Constant(700), &SensorConfig::default()).unwrap();
        let mut monitor = Monitor::new(sensor, &schedule(1000, 10_000));
        monitor.start(at(0));

        let reading = monitor.reading();
        assert_eq!(reading.level, 1);
        assert_eq!(reading.condition, Condition::VeryTurbid);
        assert_eq!(monitor.payload(String::new()).score, 0);
    }

    #[test]
    fn test_uptime_before_start_point_is_zero() {
        let sensor = TurbiditySensor::from_config(Constant(0), &SensorConfig::default()).unwrap();
        let mut monitor = Monitor::new(sensor, &schedule(1000, 10_000));
        monitor.start(at(5000));
        assert_eq!(monitor.uptime(at(1000)), Duration::from_ticks(0));
        assert_eq!(monitor.uptime(at(6000)), Duration::from_secs(1));
    }

    #[test]
    fn test_fired_timers_are_consumed_once() {
        let source = Counting { value: 500, reads: 0 };
        let sensor = TurbiditySensor::from_config(source, &SensorConfig::default()).unwrap();
        let mut monitor = Monitor::new(sensor, &schedule(1000, 1000));
        monitor.start(at(0));

        let outcome = monitor.tick(at(1000));
        assert!(outcome.sampled.is_some());
        assert!(outcome.report_due);

        assert_eq!(monitor.tick(at(1000)), TickOutcome::default());
        assert_eq!(monitor.tick(at(1500)), TickOutcome::default());
        assert_eq!(monitor.samples_taken(), 2);
        assert!(!monitor.sample_due.get());
        assert!(!monitor.report_due.get());
    }

    #[test]
    fn test_set_intervals_applies_to_next_poll() {
        let sensor = TurbiditySensor::from_config(Constant(0), &SensorConfig::default()).unwrap();
        let mut monitor = Monitor::new(sensor, &schedule(1000, 10_000));
        monitor.start(at(0));
        monitor.set_intervals(&schedule(100, 200));
        assert!(monitor.tick(at(100)).sampled.is_some());
        assert!(monitor.tick(at(200)).report_due);
    }
}

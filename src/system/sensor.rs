//! Entry/exit sensor gating
//!
//! Two distance sensors watch the single lane, one facing each direction. A
//! vehicle passing through is seen by both, so a trigger on one channel
//! disables the opposite channel for a cooldown window. That keeps one
//! transit from being reported as both an entry and an exit.
//!
//! # Trigger rule
//! A reading triggers its channel iff it is valid (finite, non-negative,
//! below the detection distance) and the channel is not cooling down. There
//! is no further filtering of a single noisy channel.

use crate::system::error::SensorError;
use embassy_time::{Duration, Instant};

/// Logical sensor channel, also the direction of travel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "rp2350", derive(defmt::Format))]
pub enum Direction {
    /// Vehicle coming in
    Entry,
    /// Vehicle going out
    Exit,
}

impl Direction {
    /// The other channel
    pub fn opposite(self) -> Self {
        match self {
            Direction::Entry => Direction::Exit,
            Direction::Exit => Direction::Entry,
        }
    }

    /// Wire name used in backend events
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Entry => "entry",
            Direction::Exit => "exit",
        }
    }

    fn index(self) -> usize {
        match self {
            Direction::Entry => 0,
            Direction::Exit => 1,
        }
    }
}

/// One distance reading per call; the measurement itself is bounded by a
/// hardware timeout
#[allow(async_fn_in_trait)]
pub trait DistanceSensor {
    /// Distance to the nearest object in centimeters
    async fn measure_cm(&mut self) -> Result<f64, SensorError>;
}

/// Result of evaluating one reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "rp2350", derive(defmt::Format))]
pub enum TriggerDecision {
    /// Nothing within range
    Clear,
    /// Vehicle in range but the channel is cooling down
    Suppressed,
    /// Vehicle detected on this channel
    Triggered(Direction),
}

/// Cross-channel cooldown state
#[derive(Debug, Clone)]
pub struct SensorGate {
    disabled_until: [Instant; 2],
    cooldown: Duration,
    detection_distance_cm: f64,
}

impl SensorGate {
    /// Both channels eligible from boot
    pub fn new(detection_distance_cm: f64, cooldown: Duration) -> Self {
        Self {
            disabled_until: [Instant::from_ticks(0); 2],
            cooldown,
            detection_distance_cm,
        }
    }

    /// Evaluate one raw reading of `channel` taken at `now`
    ///
    /// On trigger the opposite channel is disabled until `now + cooldown`.
    pub fn evaluate(&mut self, channel: Direction, raw_distance_cm: f64, now: Instant) -> TriggerDecision {
        if !self.in_range(raw_distance_cm) {
            return TriggerDecision::Clear;
        }
        if now < self.disabled_until[channel.index()] {
            return TriggerDecision::Suppressed;
        }
        self.disabled_until[channel.opposite().index()] = now + self.cooldown;
        TriggerDecision::Triggered(channel)
    }

    /// Instant from which `channel` may fire again
    pub fn disabled_until(&self, channel: Direction) -> Instant {
        self.disabled_until[channel.index()]
    }

    fn in_range(&self, distance_cm: f64) -> bool {
        distance_cm.is_finite() && distance_cm >= 0.0 && distance_cm < self.detection_distance_cm
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COOLDOWN_MS: u64 = 3000;

    fn gate() -> SensorGate {
        SensorGate::new(20.0, Duration::from_millis(COOLDOWN_MS))
    }

    fn at(ms: u64) -> Instant {
        Instant::from_millis(ms)
    }

    #[test]
    fn entry_trigger_disables_exit() {
        let mut sensors = gate();
        let now = at(12_345);
        assert_eq!(
            sensors.evaluate(Direction::Entry, 8.0, now),
            TriggerDecision::Triggered(Direction::Entry)
        );
        assert_eq!(sensors.disabled_until(Direction::Exit), at(12_345 + COOLDOWN_MS));

        assert_eq!(
            sensors.evaluate(Direction::Exit, 8.0, at(12_345 + COOLDOWN_MS - 1)),
            TriggerDecision::Suppressed
        );
        assert_eq!(
            sensors.evaluate(Direction::Exit, 8.0, at(12_345 + COOLDOWN_MS)),
            TriggerDecision::Triggered(Direction::Exit)
        );
    }

    #[test]
    fn trigger_does_not_disable_own_channel() {
        let mut sensors = gate();
        assert_eq!(
            sensors.evaluate(Direction::Exit, 5.0, at(100)),
            TriggerDecision::Triggered(Direction::Exit)
        );
        // No same-channel debounce: a second reading fires again.
        assert_eq!(
            sensors.evaluate(Direction::Exit, 5.0, at(200)),
            TriggerDecision::Triggered(Direction::Exit)
        );
        assert_eq!(sensors.disabled_until(Direction::Exit), at(0));
    }

    #[test]
    fn invalid_readings_never_trigger() {
        let mut sensors = gate();
        for reading in [20.0, 150.0, -1.0, f64::NAN, f64::INFINITY] {
            assert_eq!(sensors.evaluate(Direction::Entry, reading, at(0)), TriggerDecision::Clear);
        }
        assert_eq!(sensors.disabled_until(Direction::Exit), at(0));
    }

    #[test]
    fn boundary_reading() {
        let mut sensors = gate();
        assert_eq!(
            sensors.evaluate(Direction::Entry, 0.0, at(0)),
            TriggerDecision::Triggered(Direction::Entry)
        );
        assert_eq!(
            sensors.evaluate(Direction::Entry, 19.99, at(1)),
            TriggerDecision::Triggered(Direction::Entry)
        );
    }

    #[test]
    fn suppressed_reading_does_not_extend_cooldown() {
        let mut sensors = gate();
        sensors.evaluate(Direction::Entry, 5.0, at(1000));
        assert_eq!(sensors.evaluate(Direction::Exit, 5.0, at(2000)), TriggerDecision::Suppressed);
        assert_eq!(sensors.disabled_until(Direction::Entry), at(0));
    }

    #[test]
    fn direction_names() {
        assert_eq!(Direction::Entry.as_str(), "entry");
        assert_eq!(Direction::Exit.as_str(), "exit");
        assert_eq!(Direction::Entry.opposite(), Direction::Exit);
    }
}

//! Gate actuator
//!
//! Binary Open/Closed state machine in front of the barrier hardware.
//!
//! # Transitions
//! - `Closed --open(now)--> Open`, records `opened_at`
//! - `Open --tick(now), now - opened_at >= open_duration--> Closed`
//! - `Open --close()--> Closed`
//!
//! `open()` on an open gate and `close()` on a closed gate do nothing, in
//! particular they do not restart the auto-close timer. The hardware is only
//! driven when the state actually changes, so one logical transition never
//! issues two drive commands.

use embassy_time::{Duration, Instant};

/// Barrier position commanded to the hardware
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "rp2350", derive(defmt::Format))]
pub enum GatePosition {
    /// Barrier up
    Open,
    /// Barrier down
    Closed,
}

/// Barrier hardware (servo)
pub trait GateDriver {
    /// Move the barrier to `position`
    fn drive(&mut self, position: GatePosition);
}

/// Pulse range of the barrier servo
///
/// The angle maps linearly onto the pulse width; angles outside the sweep
/// are clamped so the horn never hits its end stop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServoCalibration {
    /// Pulse at 0 degrees, microseconds
    pub min_pulse_us: u32,
    /// Pulse at full sweep, microseconds
    pub max_pulse_us: u32,
    /// Mechanical sweep, degrees
    pub sweep_degrees: f32,
}

impl ServoCalibration {
    /// SG90 / MG996R class servos
    pub const HOBBY_180: Self = Self {
        min_pulse_us: 500,
        max_pulse_us: 2400,
        sweep_degrees: 180.0,
    };

    /// Pulse width commanding `degrees`
    pub fn pulse_us(&self, degrees: f32) -> u32 {
        let degrees = degrees.clamp(0.0, self.sweep_degrees);
        let span = (self.max_pulse_us - self.min_pulse_us) as f32;
        let pulse = self.min_pulse_us + (degrees * span / self.sweep_degrees) as u32;
        pulse.min(self.max_pulse_us)
    }
}

/// Logical gate state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "rp2350", derive(defmt::Format))]
pub enum GateState {
    /// Barrier down; safe to power off
    Closed,
    /// Barrier up since `opened_at`
    Open {
        /// When the gate was opened
        opened_at: Instant,
    },
}

/// Gate state machine owning the barrier driver
pub struct GateActuator<D: GateDriver> {
    driver: D,
    state: GateState,
    open_duration: Duration,
}

impl<D: GateDriver> GateActuator<D> {
    /// Start closed, moving the barrier down to match
    pub fn new(mut driver: D, open_duration: Duration) -> Self {
        driver.drive(GatePosition::Closed);
        Self {
            driver,
            state: GateState::Closed,
            open_duration,
        }
    }

    /// Current state
    pub fn state(&self) -> GateState {
        self.state
    }

    /// Barrier is up
    pub fn is_open(&self) -> bool {
        matches!(self.state, GateState::Open { .. })
    }

    /// Open the gate; returns whether a transition happened
    pub fn open(&mut self, now: Instant) -> bool {
        match self.state {
            GateState::Open { .. } => false,
            GateState::Closed => {
                self.driver.drive(GatePosition::Open);
                self.state = GateState::Open { opened_at: now };
                log_info!("Gate opened");
                true
            }
        }
    }

    /// Close the gate; returns whether a transition happened
    pub fn close(&mut self) -> bool {
        match self.state {
            GateState::Closed => false,
            GateState::Open { .. } => {
                self.driver.drive(GatePosition::Closed);
                self.state = GateState::Closed;
                log_info!("Gate closed");
                true
            }
        }
    }

    /// Close the gate once it has been open long enough; returns whether it
    /// closed
    pub fn tick(&mut self, now: Instant) -> bool {
        match self.state {
            GateState::Open { opened_at }
                if now.saturating_duration_since(opened_at) >= self.open_duration =>
            {
                self.close()
            }
            _ => false,
        }
    }

    /// Access the driver (tests inspect issued commands)
    pub fn driver(&self) -> &D {
        &self.driver
    }
}

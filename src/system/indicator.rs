//! Operator feedback
//!
//! Display, LEDs and buzzer sit outside the coordination core. The
//! coordinator reports what happened through [`Indicator`]; how that is
//! rendered (LED colors, beeps, LCD text) belongs to the implementation.
//!
//! [`ChannelIndicator`] forwards every notification into a bounded channel so
//! the rendering task can take its time (blinking, beeping) without stalling
//! the coordinator tick.

use crate::system::sensor::Direction;
use crate::system::state::ParkingStats;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

/// Queue depth between coordinator and indicator task
pub const INDICATOR_QUEUE_SIZE: usize = 8;

/// Channel carrying indicator commands
pub type IndicatorChannel = Channel<CriticalSectionRawMutex, IndicatorCommand, INDICATOR_QUEUE_SIZE>;

/// Feedback towards the people at the gate
pub trait Indicator {
    /// Fresh stats are available
    fn stats_changed(&mut self, stats: &ParkingStats);
    /// A vehicle wants in but the lot is full
    fn parking_full(&mut self);
    /// The gate opened for a vehicle
    fn gate_opened(&mut self, direction: Direction);
    /// The gate closed
    fn gate_closed(&mut self);
    /// Unrecoverable startup failure; feedback never returns to normal
    fn fatal(&mut self);
}

/// Indicator notifications as messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "rp2350", derive(defmt::Format))]
pub enum IndicatorCommand {
    /// Show slot availability
    Stats(ParkingStats),
    /// Lot full feedback (red LED, three beeps)
    Full,
    /// Welcome feedback (green LED, one beep)
    Opened(Direction),
    /// Back to idle display
    Closed,
    /// Endless error blink
    Fatal,
}

/// [`Indicator`] feeding an [`IndicatorChannel`]
pub struct ChannelIndicator<'a> {
    channel: &'a IndicatorChannel,
}

impl<'a> ChannelIndicator<'a> {
    /// Forward into `channel`
    pub fn new(channel: &'a IndicatorChannel) -> Self {
        Self { channel }
    }

    fn push(&self, command: IndicatorCommand) {
        // Feedback is best effort; a full queue must not stall the tick.
        if self.channel.try_send(command).is_err() {
            log_warn!("Indicator queue full, dropped {:?}", command);
        }
    }
}

impl Indicator for ChannelIndicator<'_> {
    fn stats_changed(&mut self, stats: &ParkingStats) {
        self.push(IndicatorCommand::Stats(*stats));
    }

    fn parking_full(&mut self) {
        self.push(IndicatorCommand::Full);
    }

    fn gate_opened(&mut self, direction: Direction) {
        self.push(IndicatorCommand::Opened(direction));
    }

    fn gate_closed(&mut self) {
        self.push(IndicatorCommand::Closed);
    }

    fn fatal(&mut self) {
        self.push(IndicatorCommand::Fatal);
    }
}

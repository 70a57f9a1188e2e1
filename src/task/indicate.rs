//! Indicator task
//!
//! Renders coordinator feedback on the gate hardware:
//! - green LED: slots available / welcome
//! - red LED: lot full
//! - buzzer: one beep when the gate opens, three when entry is refused
//! - status LED: blinks together with red, forever, after a fatal startup error

use crate::task::resources::IndicatorResources;
use embassy_rp::gpio::{Level, Output};
use embassy_time::{Duration, Timer};
use parking_gate::system::indicator::{IndicatorChannel, IndicatorCommand};
use parking_gate::system::state::ParkingStats;

const BEEP: Duration = Duration::from_millis(100);
const BEEP_PAUSE: Duration = Duration::from_millis(100);
const FULL_BEEPS: usize = 3;
const FATAL_BLINK_INTERVAL: Duration = Duration::from_millis(250);

struct Feedback {
    green: Output<'static>,
    red: Output<'static>,
    status: Output<'static>,
    buzzer: Output<'static>,
}

impl Feedback {
    async fn beep(&mut self, times: usize) {
        for _ in 0..times {
            self.buzzer.set_high();
            Timer::after(BEEP).await;
            self.buzzer.set_low();
            Timer::after(BEEP_PAUSE).await;
        }
    }

    fn show_availability(&mut self, stats: &ParkingStats) {
        self.green.set_level(Level::from(stats.has_space()));
        self.red.set_level(Level::from(!stats.has_space()));
    }

    async fn fatal(&mut self) -> ! {
        self.green.set_low();
        loop {
            self.status.toggle();
            self.red.toggle();
            Timer::after(FATAL_BLINK_INTERVAL).await;
        }
    }
}

#[embassy_executor::task]
pub async fn indicate(r: IndicatorResources, commands: &'static IndicatorChannel) {
    let mut feedback = Feedback {
        green: Output::new(r.green_led, Level::Low),
        red: Output::new(r.red_led, Level::Low),
        status: Output::new(r.status_led, Level::Low),
        buzzer: Output::new(r.buzzer, Level::Low),
    };
    let mut stats = ParkingStats::default();

    loop {
        match commands.receive().await {
            IndicatorCommand::Stats(latest) => {
                stats = latest;
                feedback.show_availability(&stats);
            }
            IndicatorCommand::Full => {
                feedback.green.set_low();
                feedback.red.set_high();
                feedback.beep(FULL_BEEPS).await;
                feedback.show_availability(&stats);
            }
            IndicatorCommand::Opened(direction) => {
                defmt::debug!("Welcome feedback ({})", direction.as_str());
                feedback.red.set_low();
                feedback.green.set_high();
                feedback.beep(1).await;
            }
            IndicatorCommand::Closed => feedback.show_availability(&stats),
            IndicatorCommand::Fatal => feedback.fatal().await,
        }
    }
}

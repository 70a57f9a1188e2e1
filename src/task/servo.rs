//! Gate Servo
//!
//! The barrier is a hobby servo driven by a 50 Hz pulse train. The Pico 2 W
//! has plenty of PWM slices, but generating the pulse on a PIO state machine
//! keeps the timing independent of the system clock setup, so the servo runs
//! on `PioPwm` from the embassy PIO programs.

use crate::task::resources::{GateServoResources, Irqs};
use core::time::Duration;
use embassy_rp::peripherals::PIO1;
use embassy_rp::pio::{Common, Pio};
use embassy_rp::pio_programs::pwm::{PioPwm, PioPwmProgram};
use parking_gate::system::config::Config;
use parking_gate::system::gate::{GateDriver, GatePosition, ServoCalibration};

/// 50 Hz frame
const SERVO_PERIOD: Duration = Duration::from_micros(20_000);

/// Barrier servo with its two calibrated angles
pub struct GateServo<'d> {
    pwm: PioPwm<'d, PIO1, 0>,
    calibration: ServoCalibration,
    // Owns the PIO block the program is loaded into
    _common: Common<'d, PIO1>,
    _program: PioPwmProgram<'d, PIO1>,
    open_angle: f32,
    closed_angle: f32,
}

impl GateDriver for GateServo<'_> {
    fn drive(&mut self, position: GatePosition) {
        let angle = match position {
            GatePosition::Open => self.open_angle,
            GatePosition::Closed => self.closed_angle,
        };
        let pulse = self.calibration.pulse_us(angle);
        defmt::debug!("servo {} deg, pulse {} us", angle, pulse);
        self.pwm.write(Duration::from_micros(pulse as u64));
    }
}

/// Set up the PIO PWM and start the 50 Hz pulse train
pub fn gate_servo(r: GateServoResources, config: &Config) -> GateServo<'static> {
    let Pio { mut common, sm0, .. } = Pio::new(r.pio, Irqs);

    let prg = PioPwmProgram::new(&mut common);
    let mut pwm = PioPwm::new(&mut common, sm0, r.pin, &prg);
    pwm.set_period(SERVO_PERIOD);
    pwm.start();

    GateServo {
        pwm,
        calibration: ServoCalibration::HOBBY_180,
        _common: common,
        _program: prg,
        open_angle: config.gate_open_angle,
        closed_angle: config.gate_closed_angle,
    }
}

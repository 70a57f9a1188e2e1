//! HC-SR04 ultrasonic sensors
//!
//! One trigger/echo pair per lane direction. A measurement is a 10 us trigger
//! pulse followed by timing the echo pulse; the echo width is the round trip
//! time of the sound.
//!
//! # Error Handling
//! - No echo edge within 30 ms: `SensorError::Timeout` (nothing in range,
//!   or the sensor is missing)
//! - Echo already high before triggering: `SensorError::Fault`
//!
//! Readings are passed on raw. There is no median or moving-average filter
//! here; the coordinator's cross-channel cooldown is the only debounce.

use embassy_rp::gpio::{Input, Level, Output, Pin, Pull};
use embassy_rp::Peri;
use embassy_time::{with_timeout, Duration, Instant, Timer};
use parking_gate::system::error::SensorError;
use parking_gate::system::sensor::DistanceSensor;

/// Longest wait for each echo edge (~5 m round trip)
const ECHO_TIMEOUT: Duration = Duration::from_millis(30);

/// Echo microseconds per centimeter of distance at about 20 °C
const MICROS_PER_CM: f64 = 58.0;

/// One HC-SR04
pub struct HcSr04<'d> {
    trigger: Output<'d>,
    echo: Input<'d>,
}

impl<'d> HcSr04<'d> {
    pub fn new(trigger: Peri<'d, impl Pin>, echo: Peri<'d, impl Pin>) -> Self {
        Self {
            trigger: Output::new(trigger, Level::Low),
            echo: Input::new(echo, Pull::None),
        }
    }
}

impl DistanceSensor for HcSr04<'_> {
    async fn measure_cm(&mut self) -> Result<f64, SensorError> {
        if self.echo.is_high() {
            return Err(SensorError::Fault);
        }

        self.trigger.set_high();
        Timer::after_micros(10).await;
        self.trigger.set_low();

        with_timeout(ECHO_TIMEOUT, self.echo.wait_for_high())
            .await
            .map_err(|_| SensorError::Timeout)?;
        let start = Instant::now();
        with_timeout(ECHO_TIMEOUT, self.echo.wait_for_low())
            .await
            .map_err(|_| SensorError::Timeout)?;

        Ok(start.elapsed().as_micros() as f64 / MICROS_PER_CM)
    }
}

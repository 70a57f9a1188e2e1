//! Coordinator task
//!
//! Drives the coordinator at a fixed tick. A tick that runs long (an upload
//! waiting on its timeout) delays the next one; missed ticks are not made up.

use crate::task::camera::ArduCam;
use crate::task::network::NetHttpClient;
use crate::task::servo::GateServo;
use crate::task::ultrasonic::HcSr04;
use embassy_time::{Duration, Instant, Timer};
use parking_gate::system::coordinator::Coordinator;
use parking_gate::system::indicator::ChannelIndicator;

/// Coordinator wired to the Pico 2 W hardware
pub type GateCoordinator =
    Coordinator<'static, HcSr04<'static>, GateServo<'static>, ArduCam<'static>, NetHttpClient, ChannelIndicator<'static>>;

#[embassy_executor::task]
pub async fn coordinate(mut coordinator: GateCoordinator, tick_interval: Duration) {
    coordinator.start(Instant::now()).await;
    defmt::info!("Coordinator running, tick {} ms", tick_interval.as_millis());

    loop {
        let started = Instant::now();
        coordinator.tick(started).await;
        Timer::at(started + tick_interval).await;
    }
}

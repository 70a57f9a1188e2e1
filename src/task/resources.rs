//! Hardware Resource Management
//!
//! Splits the RP2350 peripherals into one group per task or driver, so each
//! piece of hardware has exactly one owner.
//!
//! # Resource Groups
//! - Entry / exit sensors: HC-SR04 trigger and echo pins
//! - Gate servo: PWM pin driven by a PIO state machine (PIO1; PIO0 belongs to the radio)
//! - Indicator: green/red/status LEDs and buzzer
//! - Camera: SPI0 bus, chip select and two DMA channels
//! - WiFi: CYW43439 power, chip select, data and clock pins on PIO0

use assign_resources::assign_resources;
use embassy_rp::bind_interrupts;
use embassy_rp::peripherals::{self, PIO0, PIO1};
use embassy_rp::pio::InterruptHandler as PioInterruptHandler;
use embassy_rp::Peri;

assign_resources! {
    /// Ultrasonic sensor facing incoming traffic
    entry_sensor: EntrySensorResources {
        trigger_pin: PIN_2,
        echo_pin: PIN_3,
    },
    /// Ultrasonic sensor facing outgoing traffic
    exit_sensor: ExitSensorResources {
        trigger_pin: PIN_6,
        echo_pin: PIN_7,
    },
    /// Barrier servo
    gate_servo: GateServoResources {
        pin: PIN_15,
        pio: PIO1,
    },
    /// Operator feedback
    indicator: IndicatorResources {
        green_led: PIN_10,
        red_led: PIN_11,
        status_led: PIN_12,
        buzzer: PIN_13,
    },
    /// ArduCAM-style SPI camera
    camera: CameraResources {
        spi: SPI0,
        clk: PIN_18,
        mosi: PIN_19,
        miso: PIN_16,
        cs: PIN_17,
        tx_dma: DMA_CH1,
        rx_dma: DMA_CH2,
    },
    /// CYW43439 radio
    wifi: WifiResources {
        pwr: PIN_23,
        dio: PIN_24,
        cs: PIN_25,
        clk: PIN_29,
        pio: PIO0,
        dma: DMA_CH0,
    },
}

bind_interrupts!(pub struct Irqs {
    PIO0_IRQ_0 => PioInterruptHandler<PIO0>;
    PIO1_IRQ_0 => PioInterruptHandler<PIO1>;
});

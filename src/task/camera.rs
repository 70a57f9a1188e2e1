//! SPI camera
//!
//! ArduCAM-style module: the image sensor is set up by the module firmware
//! and JPEG frames land in an on-board FIFO that is read over SPI. A capture
//! is:
//! 1. clear the FIFO done flag and start a capture
//! 2. poll the trigger register until the capture-done bit is set
//! 3. read the 23-bit FIFO length
//! 4. burst read the FIFO into the frame buffer
//!
//! The frame buffer is a single static region; the `FrameSource` contract
//! makes sure only one frame is in flight at a time.

use crate::task::resources::CameraResources;
use embassy_rp::gpio::{Level, Output};
use embassy_rp::peripherals::SPI0;
use embassy_rp::spi::{self, Async, Spi};
use embassy_time::{Duration, Instant, Timer};
use parking_gate::system::camera::FrameSource;
use parking_gate::system::error::CameraError;

/// Frame buffer size; larger frames are dropped
pub const FRAME_BUFFER_SIZE: usize = 64 * 1024;

const SPI_FREQUENCY: u32 = 8_000_000;
const CAPTURE_TIMEOUT: Duration = Duration::from_millis(1000);
const POLL_INTERVAL: Duration = Duration::from_millis(2);

const REG_TEST: u8 = 0x00;
const REG_FIFO: u8 = 0x04;
const REG_TRIGGER: u8 = 0x41;
const REG_FIFO_SIZE_LOW: u8 = 0x42;
const REG_FIFO_SIZE_MID: u8 = 0x43;
const REG_FIFO_SIZE_HIGH: u8 = 0x44;
const BURST_READ: u8 = 0x3C;

const FIFO_CLEAR: u8 = 0x01;
const FIFO_START: u8 = 0x02;
const CAPTURE_DONE: u8 = 0x08;
const WRITE_FLAG: u8 = 0x80;
const TEST_PATTERN: u8 = 0x55;

/// Camera on SPI0 with its frame buffer
pub struct ArduCam<'d> {
    spi: Spi<'d, SPI0, Async>,
    cs: Output<'d>,
    buffer: &'d mut [u8],
    start: usize,
    len: usize,
}

impl ArduCam<'static> {
    pub fn new(r: CameraResources, buffer: &'static mut [u8]) -> Self {
        let mut config = spi::Config::default();
        config.frequency = SPI_FREQUENCY;
        let spi = Spi::new(r.spi, r.clk, r.mosi, r.miso, r.tx_dma, r.rx_dma, config);
        Self {
            spi,
            cs: Output::new(r.cs, Level::High),
            buffer,
            start: 0,
            len: 0,
        }
    }
}

impl ArduCam<'_> {
    /// Startup presence check: the test register echoes what is written
    pub async fn probe(&mut self) -> Result<(), CameraError> {
        self.write_reg(REG_TEST, TEST_PATTERN).await?;
        match self.read_reg(REG_TEST).await? {
            TEST_PATTERN => {
                defmt::info!("Camera detected");
                Ok(())
            }
            other => {
                defmt::error!("Camera test register read {:#x}", other);
                Err(CameraError::NotDetected)
            }
        }
    }

    async fn write_reg(&mut self, reg: u8, value: u8) -> Result<(), CameraError> {
        self.cs.set_low();
        let result = self.spi.write(&[reg | WRITE_FLAG, value]).await;
        self.cs.set_high();
        result.map_err(|_| CameraError::Fault)
    }

    async fn read_reg(&mut self, reg: u8) -> Result<u8, CameraError> {
        let mut value = [0u8];
        self.cs.set_low();
        let result = match self.spi.write(&[reg & !WRITE_FLAG]).await {
            Ok(()) => self.spi.read(&mut value).await,
            Err(e) => Err(e),
        };
        self.cs.set_high();
        result.map_err(|_| CameraError::Fault)?;
        Ok(value[0])
    }

    async fn wait_capture_done(&mut self) -> Result<(), CameraError> {
        let deadline = Instant::now() + CAPTURE_TIMEOUT;
        while self.read_reg(REG_TRIGGER).await? & CAPTURE_DONE == 0 {
            if Instant::now() >= deadline {
                return Err(CameraError::CaptureFailed);
            }
            Timer::after(POLL_INTERVAL).await;
        }
        Ok(())
    }

    async fn fifo_length(&mut self) -> Result<usize, CameraError> {
        let low = self.read_reg(REG_FIFO_SIZE_LOW).await? as usize;
        let mid = self.read_reg(REG_FIFO_SIZE_MID).await? as usize;
        let high = (self.read_reg(REG_FIFO_SIZE_HIGH).await? & 0x7F) as usize;
        Ok((high << 16) | (mid << 8) | low)
    }

    async fn burst_read(&mut self, len: usize) -> Result<(), CameraError> {
        self.cs.set_low();
        let result = match self.spi.write(&[BURST_READ]).await {
            Ok(()) => self.spi.read(&mut self.buffer[..len]).await,
            Err(e) => Err(e),
        };
        self.cs.set_high();
        result.map_err(|_| CameraError::Fault)
    }
}

/// Offset of the JPEG start-of-image marker; some modules send a dummy byte first
fn jpeg_start(data: &[u8]) -> Option<usize> {
    data.windows(2).take(8).position(|w| w == [0xFF, 0xD8])
}

impl FrameSource for ArduCam<'_> {
    async fn acquire(&mut self) -> Result<(), CameraError> {
        self.write_reg(REG_FIFO, FIFO_CLEAR).await?;
        self.write_reg(REG_FIFO, FIFO_START).await?;
        self.wait_capture_done().await?;

        let len = self.fifo_length().await?;
        if len == 0 {
            return Err(CameraError::CaptureFailed);
        }
        if len > self.buffer.len() {
            return Err(CameraError::FrameTooLarge(len));
        }
        self.burst_read(len).await?;

        self.start = jpeg_start(&self.buffer[..len]).ok_or(CameraError::CaptureFailed)?;
        self.len = len;
        Ok(())
    }

    fn frame(&self) -> &[u8] {
        &self.buffer[self.start..self.len]
    }

    fn release(&mut self) {
        self.start = 0;
        self.len = 0;
    }
}

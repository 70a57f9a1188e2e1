//! Live MJPEG stream
//!
//! One `/stream` client at a time. [`StreamStatus`] is the single source of
//! truth for "a stream is being served": the HTTP server claims it with
//! [`StreamStatus::try_begin`] before writing anything, and the coordinator
//! reads it every tick to hold back detection while someone is watching.
//!
//! Each frame is captured, written as one multipart part and released before
//! the inter-frame delay, so the camera is free for the coordinator between
//! frames.

use crate::system::camera::{FrameHandle, FrameSource, SharedCamera};
use crate::system::error::CameraError;
use core::fmt::Write as _;
use core::sync::atomic::{AtomicBool, Ordering};
use embassy_time::Duration;
use embedded_hal_async::delay::DelayNs;
use embedded_io_async::Write;

/// Multipart boundary between frames
pub const BOUNDARY: &str = "123456789000000000000987654321";

/// Response head opening the stream
pub const RESPONSE_HEAD: &str = concat!(
    "HTTP/1.1 200 OK\r\n",
    "Access-Control-Allow-Origin: *\r\n",
    "Content-Type: multipart/x-mixed-replace;boundary=",
    "123456789000000000000987654321",
    "\r\n\r\n"
);

/// Longest part header: boundary line plus the two part headers
const PART_HEADER_CAPACITY: usize = 128;

/// Whether a stream client is being served
#[derive(Debug, Default)]
pub struct StreamStatus {
    active: AtomicBool,
}

impl StreamStatus {
    pub const fn new() -> Self {
        Self {
            active: AtomicBool::new(false),
        }
    }

    /// A stream session is running
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Claim the stream slot, `None` while another client holds it
    pub fn try_begin(&self) -> Option<StreamGuard<'_>> {
        self.active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| StreamGuard { status: self })
    }
}

/// Holds the stream slot; dropping it marks the stream inactive
pub struct StreamGuard<'a> {
    status: &'a StreamStatus,
}

impl Drop for StreamGuard<'_> {
    fn drop(&mut self) {
        self.status.active.store(false, Ordering::Release);
    }
}

/// Why a stream session stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "rp2350", derive(defmt::Format))]
pub enum StreamEnd {
    /// Client went away or the socket failed
    Disconnected,
    /// Camera failed in a way retrying will not fix
    CameraFault(CameraError),
}

/// Frame loop for one connected client
pub struct StreamSession<'a, F: FrameSource> {
    camera: &'a SharedCamera<F>,
    frame_delay: Duration,
    frames_sent: u32,
    _guard: StreamGuard<'a>,
}

impl<'a, F: FrameSource> StreamSession<'a, F> {
    /// Session holding the stream slot for its whole lifetime
    pub fn new(camera: &'a SharedCamera<F>, guard: StreamGuard<'a>, frame_delay: Duration) -> Self {
        Self {
            camera,
            frame_delay,
            frames_sent: 0,
            _guard: guard,
        }
    }

    /// Frames written so far
    pub fn frames_sent(&self) -> u32 {
        self.frames_sent
    }

    /// Write frames to `transport` until the client disconnects or the camera faults
    ///
    /// The response head ([`RESPONSE_HEAD`]) must already be written.
    pub async fn serve<W: Write, D: DelayNs>(&mut self, transport: &mut W, delay: &mut D) -> StreamEnd {
        let end = loop {
            match self.send_frame(transport).await {
                Ok(()) => self.frames_sent += 1,
                Err(StreamEnd::CameraFault(error)) if error.is_transient() => {
                    log_warn!("Stream frame skipped: {:?}", error);
                }
                Err(end) => break end,
            }
            delay.delay_ms(self.frame_delay.as_millis() as u32).await;
        };
        log_info!("Stream ended after {} frames: {:?}", self.frames_sent, end);
        end
    }

    async fn send_frame<W: Write>(&mut self, transport: &mut W) -> Result<(), StreamEnd> {
        let mut camera = self.camera.lock().await;
        let frame = FrameHandle::acquire(&mut *camera)
            .await
            .map_err(StreamEnd::CameraFault)?;
        let header = part_header(frame.len()).map_err(|_| StreamEnd::Disconnected)?;
        transport
            .write_all(header.as_bytes())
            .await
            .map_err(|_| StreamEnd::Disconnected)?;
        transport
            .write_all(frame.bytes())
            .await
            .map_err(|_| StreamEnd::Disconnected)?;
        transport.flush().await.map_err(|_| StreamEnd::Disconnected)
    }
}

/// Boundary line and headers preceding a frame of `len` bytes
pub fn part_header(len: usize) -> Result<heapless::String<PART_HEADER_CAPACITY>, core::fmt::Error> {
    let mut header = heapless::String::new();
    write!(
        header,
        "\r\n--{}\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
        BOUNDARY, len
    )?;
    Ok(header)
}

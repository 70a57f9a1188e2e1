//! Camera access
//!
//! The camera owns exactly one frame buffer. A [`FrameHandle`] is the
//! ownership token for that buffer: it is created by a successful capture,
//! borrows the source mutably so no second capture can start while it
//! lives, and hands the buffer back when dropped. Dropping covers every exit
//! path, including `?` returns on upload failures.
//!
//! The camera is shared between the coordinator (uploads, detection) and the
//! stream session through an async mutex, the same way other shared
//! peripherals are guarded. A frame is always acquired, used and released
//! while the lock is held, within one operation.

use crate::system::error::CameraError;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;

/// Camera shared between the coordinator and the HTTP server
pub type SharedCamera<F> = Mutex<CriticalSectionRawMutex, F>;

/// Source of JPEG frames with a single buffer
#[allow(async_fn_in_trait)]
pub trait FrameSource {
    /// Capture one frame into the buffer
    async fn acquire(&mut self) -> Result<(), CameraError>;

    /// JPEG bytes of the captured frame
    fn frame(&self) -> &[u8];

    /// Return the buffer to the camera
    fn release(&mut self);
}

/// Ownership token for the captured frame
pub struct FrameHandle<'a, F: FrameSource> {
    source: &'a mut F,
}

impl<'a, F: FrameSource> FrameHandle<'a, F> {
    /// Capture a frame and take ownership of the buffer
    pub async fn acquire(source: &'a mut F) -> Result<Self, CameraError> {
        source.acquire().await?;
        Ok(Self { source })
    }

    /// JPEG bytes
    pub fn bytes(&self) -> &[u8] {
        self.source.frame()
    }

    /// Frame size in bytes
    pub fn len(&self) -> usize {
        self.source.frame().len()
    }

    /// Whether the frame is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<F: FrameSource> Drop for FrameHandle<'_, F> {
    fn drop(&mut self) {
        self.source.release();
    }
}

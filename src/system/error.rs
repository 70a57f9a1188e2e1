//! Error types
//!
//! One enum per concern. None of these is fatal on its own: the coordinator
//! and the HTTP server absorb them at their boundary, log them and carry on.
//! The only fatal condition (camera missing at startup) is handled by the
//! firmware entry point.

use thiserror::Error;

/// Distance sensor errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "rp2350", derive(defmt::Format))]
pub enum SensorError {
    /// No echo within the measurement window
    #[error("no echo within the measurement window")]
    Timeout,
    /// Echo line stuck or sensor not wired
    #[error("sensor fault")]
    Fault,
}

/// Camera / frame source errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "rp2350", derive(defmt::Format))]
pub enum CameraError {
    /// Camera did not answer the presence check
    #[error("camera not detected")]
    NotDetected,
    /// A single capture failed, the next one may succeed
    #[error("frame capture failed")]
    CaptureFailed,
    /// Camera is held by the stream right now
    #[error("camera busy")]
    Busy,
    /// Captured frame does not fit the frame buffer
    #[error("frame of {0} bytes exceeds the frame buffer")]
    FrameTooLarge(usize),
    /// Camera stopped responding; no further frames will come
    #[error("camera fault")]
    Fault,
}

impl CameraError {
    /// Whether retrying on the next cycle can succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CameraError::CaptureFailed | CameraError::Busy | CameraError::FrameTooLarge(_)
        )
    }
}

/// Outbound HTTP errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "rp2350", derive(defmt::Format))]
pub enum HttpError {
    /// URL is not a plain `http://host[:port]/path` URL
    #[error("malformed url")]
    MalformedUrl,
    /// Host name could not be resolved
    #[error("dns lookup failed")]
    Dns,
    /// TCP connection could not be established
    #[error("connection failed")]
    Connect,
    /// Request did not complete within its timeout
    #[error("request timed out")]
    Timeout,
    /// Transport error while reading or writing
    #[error("transport error")]
    Io,
    /// Status line or headers could not be parsed
    #[error("malformed response")]
    MalformedResponse,
    /// Response body exceeds the receive limit
    #[error("response too large")]
    ResponseTooLarge,
    /// Network is not up
    #[error("network unavailable")]
    NetworkDown,
}

/// Remote sync errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "rp2350", derive(defmt::Format))]
pub enum SyncError {
    /// Request failed at the HTTP level
    #[error("http: {0}")]
    Http(#[from] HttpError),
    /// Server answered with a non-2xx status
    #[error("unexpected status {0}")]
    Status(u16),
    /// Body is not the expected JSON
    #[error("malformed response body")]
    MalformedBody,
    /// Server answered `success: false`
    #[error("request rejected by server")]
    Rejected,
    /// Request body could not be allocated
    #[error("out of memory building request body")]
    OutOfMemory,
    /// No frame to send
    #[error("camera: {0}")]
    Camera(#[from] CameraError),
}

/// Device HTTP server errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "rp2350", derive(defmt::Format))]
pub enum ServerError {
    /// Request line could not be parsed
    #[error("malformed request")]
    MalformedRequest,
    /// Request head does not fit the receive buffer
    #[error("request too large")]
    RequestTooLarge,
    /// Client went away
    #[error("transport error")]
    Io,
}

/// Settings that do not fit the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "rp2350", derive(defmt::Format))]
pub enum ConfigError {
    /// SSID longer than 32 bytes
    #[error("SSID too long")]
    SsidTooLong,
    /// Passphrase longer than 63 bytes
    #[error("WiFi password too long")]
    PasswordTooLong,
}

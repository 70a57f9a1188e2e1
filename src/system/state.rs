//! Device State
//!
//! State shared between the coordinator and the HTTP server:
//! - Parking statistics as last fetched from the backend
//! - Gate position
//! - Camera readiness, last detection result, network address
//!
//! Startup records camera readiness and the network address; after that the
//! coordinator is the only writer. It publishes a [`DeviceStatus`] snapshot
//! after every tick and the HTTP server only reads it.
//!
//! # State Access Pattern
//! ```rust,ignore
//! let status = shared_status.lock().await.clone();
//! // lock released here, render from the copy
//! ```

use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, mutex::Mutex};

/// Device status behind an async mutex
pub type SharedStatus = Mutex<CriticalSectionRawMutex, DeviceStatus>;

/// Slot occupancy as reported by the backend
///
/// The authoritative count lives server side. The device never adjusts it on
/// gate events; it only replaces it with the next successful fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "rp2350", derive(defmt::Format))]
pub struct ParkingStats {
    /// Slots in the lot
    pub total: u32,
    /// Slots currently taken
    pub occupied: u32,
    /// `total - occupied`, never below zero
    pub available: u32,
}

impl ParkingStats {
    /// Build stats from counts, deriving `available`
    pub fn from_counts(total: u32, occupied: u32) -> Self {
        Self {
            total,
            occupied,
            available: total.saturating_sub(occupied),
        }
    }

    /// At least one free slot
    pub fn has_space(&self) -> bool {
        self.available > 0
    }
}

/// Snapshot of everything `/status` and the indicators report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "rp2350", derive(defmt::Format))]
pub struct DeviceStatus {
    /// Last known good stats
    pub stats: ParkingStats,
    /// Gate barrier is up
    pub gate_open: bool,
    /// Camera passed its startup check
    pub camera_ready: bool,
    /// Vehicles counted by the last AI detection
    pub last_vehicles_detected: Option<u32>,
    /// IPv4 address once the network is up
    pub ip: Option<[u8; 4]>,
    /// Milliseconds since boot at the last publish
    pub uptime_ms: u64,
}

/// Create the shared status cell
pub const fn shared_status() -> SharedStatus {
    Mutex::new(DeviceStatus {
        stats: ParkingStats {
            total: 0,
            occupied: 0,
            available: 0,
        },
        gate_open: false,
        camera_ready: false,
        last_vehicles_detected: None,
        ip: None,
        uptime_ms: 0,
    })
}

//! Parking gate coordination core
//!
//! Hardware-agnostic part of the parking gate firmware: sensor cooldown, gate
//! state machine, interval scheduling, MJPEG stream sessions, backend/AI sync
//! and the cooperative coordinator tying them together. Hardware collaborators
//! (distance sensors, gate servo, camera, network client, indicators) are
//! reached through the traits in [`system`], so everything here runs on the
//! host under `cargo test` as well as on the RP2350.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

/// Logging macros (defmt on the device, stdout in host tests)
#[macro_use]
pub mod logging;

/// Coordination core
pub mod system;

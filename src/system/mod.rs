//! Core system components for the parking gate
pub mod camera;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod gate;
pub mod indicator;
pub mod remote;
pub mod scheduler;
pub mod sensor;
pub mod server;
pub mod state;
pub mod stream;

#[cfg(test)]
pub(crate) mod mock;

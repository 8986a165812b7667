//! Infrastructure layer - hardware-backed implementations
//!
//! Concrete ESP32 implementations of the update controller's ports, plus the
//! tasks that keep the network, HTTP server and restart scheduler running.

pub mod adapters;
pub mod drivers;
pub mod services;
pub mod tasks;
pub mod types;

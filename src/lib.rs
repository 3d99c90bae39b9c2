//! Geolocation permission broker CLI
//!
//! Exposes modules for integration testing

pub mod cli;
pub mod scenario;

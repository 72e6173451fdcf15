//! Ambient runtime concerns: configuration, fatal error aggregation,
//! telemetry, and the signal-driven lifecycle wrapper.

pub mod config;
pub mod fatal;
pub mod runner;
pub mod telemetry;

//! Linehaul CLI Library
//!
//! Command implementations and configuration for the `linehaul` binary.
//! Kept as a library so the orchestration logic is testable without
//! spawning the binary.

pub mod commands;
pub mod config;

pub use config::Config;

//! Monitor Configuration Module
//!
//! Transport, buffer, persistence and alarm settings loaded from TOML.
//!
//! ## Loading Order
//!
//! 1. `VITALS_CONFIG` environment variable (path to TOML file)
//! 2. `monitor_config.toml` in the current working directory
//! 3. Built-in defaults
//!
//! Command-line flags are applied on top by the binary.

mod monitor_config;
pub mod defaults;
pub mod validation;

pub use monitor_config::*;

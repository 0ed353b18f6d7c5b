//! Configuration Management Module
//!
//! Gateway settings file with per-section defaults and environment overrides.

mod storage;
mod types;

pub use storage::{config_dir, config_file, ConfigError, ConfigStorage};
pub use types::{GatewayConfig, CONFIG_VERSION, ENCRYPTION_KEY_ENV};

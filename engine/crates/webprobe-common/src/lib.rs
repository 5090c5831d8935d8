//! WebProbe Common - Shared utilities: logging and configuration
//!
//! This crate provides the ambient setup used by the `webprobe` binary and
//! anything else embedding the scan engine.

pub mod config;
pub mod logging;

pub use config::{seconds_to_ms, ChecksConfig, Config, ConfigBuilder, LoggingConfig, ScannerConfig};
pub use logging::{init_logging, init_logging_with_config, LogConfig, LogFormat};

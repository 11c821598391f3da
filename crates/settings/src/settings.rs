//! Configuration system for the aiterm session engine.
//!
//! Provides compile-time constants and TOML config file support.

pub mod constants;
mod file;

pub use file::{config_path, load_config, Config, EngineTuning};

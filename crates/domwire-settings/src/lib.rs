//! DOMWire Settings Crate
//!
//! Handles configuration files for the event bus and the frame host.

pub mod config;
pub mod error;

pub use config::{BusSettings, Config, FrameSettings};
pub use error::{ConfigError, SettingsError, SettingsResult};

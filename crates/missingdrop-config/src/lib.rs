//! MissingDrop configuration system.
//!
//! TOML-based configuration for the relay hub and the device runner.
//! All sections use defaults so partial configs work out of the box.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use missingdrop_config::{load_config, config_to_json};
//!
//! let config = load_config(None).expect("failed to load config");
//! let json = config_to_json(&config);
//! println!("{json}");
//! ```

pub mod schema;
pub mod toml_loader;
pub mod validation;

pub use schema::{
    DeviceConfig, DropRoute, EnterpriseCredentials, HubConfig, LoggingConfig, MissingDropConfig,
    NetworkConfig,
};

use missingdrop_common::ConfigError;
use std::path::Path;

/// Load config from `path` when given, else from the platform default path
/// (creating a commented default file on first run).
pub fn load_config(path: Option<&Path>) -> Result<MissingDropConfig, ConfigError> {
    match path {
        Some(path) => toml_loader::load_from_path(path),
        None => toml_loader::load_default(),
    }
}

/// Serialize a config to a pretty-printed JSON string.
pub fn config_to_json(config: &MissingDropConfig) -> String {
    serde_json::to_string_pretty(config)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize config: {e}\"}}"))
}

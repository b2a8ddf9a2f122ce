//! TOML config file loading and creation.

use crate::schema::MissingDropConfig;
use crate::validation;
use missingdrop_common::ConfigError;
use std::path::Path;
use tracing::info;

/// Load config from a specific TOML file path.
///
/// Missing fields take their serde defaults. Unlike a UI config, a relay
/// with an invalid config must not silently fall back to defaults, so
/// validation failures are returned to the caller.
pub fn load_from_path(path: &Path) -> Result<MissingDropConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path).map_err(|e| {
        ConfigError::ParseError(format!("failed to read {}: {e}", path.display()))
    })?;

    let config: MissingDropConfig = toml::from_str(&content)
        .map_err(|e| ConfigError::ParseError(format!("failed to parse TOML: {e}")))?;

    validation::validate(&config)?;

    info!("loaded config from {}", path.display());
    Ok(config)
}

/// Load config from the platform-specific default path.
///
/// On macOS: `~/Library/Application Support/missingdrop/config.toml`
/// On Linux: `~/.config/missingdrop/config.toml`
///
/// If the file does not exist, creates a default config file and returns defaults.
pub fn load_default() -> Result<MissingDropConfig, ConfigError> {
    let path = default_config_path()?;

    if !path.exists() {
        info!("no config found at {}, creating default", path.display());
        create_default_config(&path)?;
        return Ok(MissingDropConfig::default());
    }

    load_from_path(&path)
}

/// Get the platform-specific default config file path.
pub fn default_config_path() -> Result<std::path::PathBuf, ConfigError> {
    let config_dir = dirs::config_dir().ok_or_else(|| {
        ConfigError::ParseError("could not determine config directory".into())
    })?;
    Ok(config_dir.join("missingdrop").join("config.toml"))
}

/// Create a default TOML config file with documentation comments.
pub fn create_default_config(path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            ConfigError::ParseError(format!(
                "failed to create config directory {}: {e}",
                parent.display()
            ))
        })?;
    }

    std::fs::write(path, default_config_toml()).map_err(|e| {
        ConfigError::ParseError(format!(
            "failed to write default config to {}: {e}",
            path.display()
        ))
    })?;

    info!("created default config at {}", path.display());
    Ok(())
}

/// Generate the default TOML config content with comments.
fn default_config_toml() -> String {
    r##"# MissingDrop Configuration
# Only override what you want to change -- missing fields use defaults.

[hub]
# bind = "0.0.0.0"
# port = 3000
# path = "/ws"
# pairs = 2                     # 1-16
# liveness_interval_secs = 30   # 1-600
# frame_queue = 2               # 1-64, frames beyond this are dropped
# status_port = 3001            # read-only pair status, disabled when unset

# Drop routing. With exactly two pairs the default swaps 1 <-> 2.
# [[hub.drop_routes]]
# from = 1
# to = 2

[device]
# server_host = "127.0.0.1"     # bare hostname, no ws:// prefix
# server_port = 3000
# server_path = "/ws"
# secure = false                # true = wss://
# role = "display"              # display, producer
# pair = 1
# frame_width = 32
# frame_height = 32
# attach_timeout_secs = 20
# connect_timeout_secs = 10
# reconnect_delay_secs = 3
# max_join_failures = 3
# tick_interval_ms = 10
# pattern_fps = 0               # producer test pattern, 0 disables

[device.network]
# ssid = "YourNetworkName"
# password = "YourPassword"

# WPA2-Enterprise, replaces the passphrase when present.
# [device.network.enterprise]
# identity = "anonymous@university.edu"
# username = "your.username@university.edu"
# password = "YourEnterprisePassword"

[logging]
# level = "info"                # any tracing EnvFilter directive
"##
    .to_string()
}

//! Full configuration validation.
//!
//! Validates numeric ranges, pair ids, and drop routes, collecting every
//! error into one message.

use crate::schema::{DeviceConfig, HubConfig, MissingDropConfig};
use missingdrop_common::{ConfigError, PairId};

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &MissingDropConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    validate_hub(&mut errors, &config.hub);
    validate_device(&mut errors, &config.device);

    if config.logging.level.trim().is_empty() {
        errors.push("logging.level must not be empty".into());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}

fn validate_hub(errors: &mut Vec<String>, hub: &HubConfig) {
    validate_range(errors, "hub.pairs", hub.pairs as u64, 1, 16);
    validate_range(
        errors,
        "hub.liveness_interval_secs",
        hub.liveness_interval_secs,
        1,
        600,
    );
    validate_range(errors, "hub.frame_queue", hub.frame_queue as u64, 1, 64);

    if !hub.path.starts_with('/') {
        errors.push(format!("hub.path = {:?} must start with '/'", hub.path));
    }

    for route in &hub.drop_routes {
        validate_pair(errors, "hub.drop_routes.from", route.from, hub.pairs);
        validate_pair(errors, "hub.drop_routes.to", route.to, hub.pairs);
    }
    let mut sources: Vec<PairId> = hub.drop_routes.iter().map(|r| r.from).collect();
    sources.sort();
    sources.dedup();
    if sources.len() != hub.drop_routes.len() {
        errors.push("hub.drop_routes has more than one route from the same pair".into());
    }
}

fn validate_device(errors: &mut Vec<String>, device: &DeviceConfig) {
    if device.server_host.trim().is_empty() {
        errors.push("device.server_host must not be empty".into());
    }
    if device.server_host.contains("://") {
        errors.push(format!(
            "device.server_host = {:?} must be a bare hostname without a scheme",
            device.server_host
        ));
    }
    if !device.server_path.starts_with('/') {
        errors.push(format!(
            "device.server_path = {:?} must start with '/'",
            device.server_path
        ));
    }
    if device.pair.get() == 0 {
        errors.push("device.pair = 0 is not a valid pair id".into());
    }
    validate_range(errors, "device.frame_width", device.frame_width as u64, 1, 256);
    validate_range(errors, "device.frame_height", device.frame_height as u64, 1, 256);
    validate_range(
        errors,
        "device.attach_timeout_secs",
        device.attach_timeout_secs,
        1,
        300,
    );
    validate_range(
        errors,
        "device.connect_timeout_secs",
        device.connect_timeout_secs,
        1,
        120,
    );
    validate_range(
        errors,
        "device.reconnect_delay_secs",
        device.reconnect_delay_secs,
        1,
        300,
    );
    validate_range(
        errors,
        "device.max_join_failures",
        device.max_join_failures as u64,
        1,
        100,
    );
    validate_range(errors, "device.tick_interval_ms", device.tick_interval_ms, 1, 1000);
    validate_range(errors, "device.pattern_fps", device.pattern_fps as u64, 0, 120);
}

/// Push an error if `value` is outside `[min, max]`.
fn validate_range(errors: &mut Vec<String>, name: &str, value: u64, min: u64, max: u64) {
    if value < min || value > max {
        errors.push(format!("{name} = {value} is out of range [{min}, {max}]"));
    }
}

fn validate_pair(errors: &mut Vec<String>, name: &str, pair: PairId, pairs: u8) {
    if pair.get() == 0 || pair.get() > pairs {
        errors.push(format!("{name} = {pair} is not a configured pair (1..={pairs})"));
    }
}

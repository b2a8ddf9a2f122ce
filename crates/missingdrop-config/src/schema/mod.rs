//! Configuration schema types for MissingDrop.
//!
//! All structs use `serde(default)` so partial configs work correctly.

mod device;
mod hub;
mod logging;

pub use device::*;
pub use hub::*;
pub use logging::*;

use serde::{Deserialize, Serialize};

/// Root configuration shared by the relay hub and the device runner.
/// Each binary reads only its own section plus `[logging]`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MissingDropConfig {
    pub hub: HubConfig,
    pub device: DeviceConfig,
    pub logging: LoggingConfig,
}

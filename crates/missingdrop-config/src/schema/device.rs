use missingdrop_common::{PairId, Role};
use serde::{Deserialize, Serialize};

/// WPA2-Enterprise credentials (e.g. eduroam).
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EnterpriseCredentials {
    pub identity: String,
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for EnterpriseCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnterpriseCredentials")
            .field("identity", &self.identity)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Network the device radio associates with.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub ssid: String,
    /// WPA2-Personal passphrase. Ignored when `enterprise` is set.
    pub password: String,
    pub enterprise: Option<EnterpriseCredentials>,
}

impl std::fmt::Debug for NetworkConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkConfig")
            .field("ssid", &self.ssid)
            .field("password", &"[REDACTED]")
            .field("enterprise", &self.enterprise)
            .finish()
    }
}

/// Configuration for a device endpoint (the LED matrix, or a producer).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Bare hostname of the relay hub, no scheme.
    pub server_host: String,
    pub server_port: u16,
    pub server_path: String,
    /// `wss://` when true, `ws://` otherwise.
    pub secure: bool,
    pub role: Role,
    pub pair: PairId,
    pub frame_width: u16,
    pub frame_height: u16,
    /// Seconds to wait for network association before a full restart.
    pub attach_timeout_secs: u64,
    /// Seconds to wait for a `joined` reply before abandoning a socket.
    pub connect_timeout_secs: u64,
    /// Seconds between session reconnect attempts.
    pub reconnect_delay_secs: u64,
    /// Consecutive `kicked`/`error` replies tolerated before reconnecting.
    pub max_join_failures: u32,
    /// Main-loop period in milliseconds.
    pub tick_interval_ms: u64,
    /// Test-pattern frames per second when running as a producer. 0 disables.
    pub pattern_fps: u32,
    pub network: NetworkConfig,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            server_host: "127.0.0.1".into(),
            server_port: 3000,
            server_path: "/ws".into(),
            secure: false,
            role: Role::Display,
            pair: PairId(1),
            frame_width: 32,
            frame_height: 32,
            attach_timeout_secs: 20,
            connect_timeout_secs: 10,
            reconnect_delay_secs: 3,
            max_join_failures: 3,
            tick_interval_ms: 10,
            pattern_fps: 0,
            network: NetworkConfig::default(),
        }
    }
}

impl DeviceConfig {
    /// WebSocket URL of the hub.
    pub fn server_url(&self) -> String {
        let scheme = if self.secure { "wss" } else { "ws" };
        format!(
            "{scheme}://{}:{}{}",
            self.server_host, self.server_port, self.server_path
        )
    }
}

use missingdrop_common::PairId;
use serde::{Deserialize, Serialize};

/// One directed `drop` route: drops sent by members of `from` are delivered
/// to the producer of `to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropRoute {
    pub from: PairId,
    pub to: PairId,
}

/// Configuration for the relay hub.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Address to bind the WebSocket listener to.
    pub bind: String,
    /// Port to listen on.
    pub port: u16,
    /// Only upgrades on this path are accepted.
    pub path: String,
    /// Number of pairs; valid pair ids are `1..=pairs`.
    pub pairs: u8,
    /// Seconds between liveness sweeps.
    pub liveness_interval_secs: u64,
    /// Frames buffered per display before new frames are dropped.
    pub frame_queue: usize,
    /// Explicit drop routing. Empty means the two-pair swap when
    /// `pairs == 2`, and no routing otherwise.
    pub drop_routes: Vec<DropRoute>,
    /// Port for the read-only status listener. Disabled when unset.
    pub status_port: Option<u16>,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: 3000,
            path: "/ws".into(),
            pairs: 2,
            liveness_interval_secs: 30,
            frame_queue: 2,
            drop_routes: Vec::new(),
            status_port: None,
        }
    }
}

impl HubConfig {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    /// Routes in effect after applying the two-pair default.
    pub fn effective_drop_routes(&self) -> Vec<DropRoute> {
        if !self.drop_routes.is_empty() {
            return self.drop_routes.clone();
        }
        if self.pairs == 2 {
            return vec![
                DropRoute {
                    from: PairId(1),
                    to: PairId(2),
                },
                DropRoute {
                    from: PairId(2),
                    to: PairId(1),
                },
            ];
        }
        Vec::new()
    }
}

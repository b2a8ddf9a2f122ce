//! Control-channel wire protocol. One JSON object per text frame, tagged by
//! `type`. Binary frames carry pixel data and never pass through here.

use serde::{Deserialize, Serialize};

use crate::types::{PairId, PairStatus, Role};

/// Color carried by a `drop` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// A touch on one installation, mirrored onto the peer pair's producer.
///
/// The hub only routes these; `x`/`y` are grid cells (0..31 on a 32×32
/// panel) and are interpreted by the receiving simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropEvent {
    pub x: u32,
    pub y: u32,
    pub strength: f64,
    pub radius: u32,
    pub color: DropColor,
}

/// Every control message exchanged between endpoints and the hub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ControlMessage {
    /// Endpoint → hub: claim a slot.
    #[serde(rename = "join")]
    Join { role: Role, pair: PairId },

    /// Hub → endpoint: the slot is yours.
    #[serde(rename = "joined")]
    Joined { role: Role, pair: PairId },

    /// Hub → both slot members after every assignment or release.
    #[serde(rename = "status")]
    Status {
        pair: PairId,
        producer_present: bool,
        display_present: bool,
    },

    /// Hub → endpoint: the last message was rejected.
    #[serde(rename = "error")]
    Error { message: String },

    /// Hub → evicted endpoint, sent right before its transport is closed.
    #[serde(rename = "kicked")]
    Kicked { reason: String },

    /// Endpoint ↔ hub ↔ peer pair.
    #[serde(rename = "drop")]
    Drop(DropEvent),
}

impl ControlMessage {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn status(pair: PairId, status: PairStatus) -> Self {
        Self::Status {
            pair,
            producer_present: status.producer_present,
            display_present: status.display_present,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn kicked(reason: impl Into<String>) -> Self {
        Self::Kicked {
            reason: reason.into(),
        }
    }

    /// Wire name of the message type, for logging.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Join { .. } => "join",
            Self::Joined { .. } => "joined",
            Self::Status { .. } => "status",
            Self::Error { .. } => "error",
            Self::Kicked { .. } => "kicked",
            Self::Drop(_) => "drop",
        }
    }

    /// Serialize to a JSON text frame.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!("{{\"type\":\"error\",\"message\":\"failed to encode message: {e}\"}}")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_join() {
        let msg = ControlMessage::parse(r#"{"type":"join","role":"producer","pair":1}"#).unwrap();
        assert_eq!(
            msg,
            ControlMessage::Join {
                role: Role::Producer,
                pair: PairId(1)
            }
        );
    }

    #[test]
    fn parse_firmware_join() {
        // The matrix firmware announces itself with the legacy role name.
        let msg = ControlMessage::parse(r#"{"type":"join","role":"matrix","pair":2}"#).unwrap();
        assert_eq!(
            msg,
            ControlMessage::Join {
                role: Role::Display,
                pair: PairId(2)
            }
        );
    }

    #[test]
    fn parse_invalid_role_fails() {
        assert!(ControlMessage::parse(r#"{"type":"join","role":"referee","pair":1}"#).is_err());
    }

    #[test]
    fn parse_unknown_type_fails() {
        assert!(ControlMessage::parse(r#"{"type":"teleport"}"#).is_err());
        assert!(ControlMessage::parse("not json").is_err());
        assert!(ControlMessage::parse(r#"{"role":"producer","pair":1}"#).is_err());
    }

    #[test]
    fn parse_drop() {
        let msg = ControlMessage::parse(
            r#"{"type":"drop","x":3,"y":31,"strength":0.8,"radius":2,"color":{"r":255,"g":0,"b":12}}"#,
        )
        .unwrap();
        match msg {
            ControlMessage::Drop(drop) => {
                assert_eq!(drop.x, 3);
                assert_eq!(drop.y, 31);
                assert_eq!(drop.radius, 2);
                assert_eq!(drop.color, DropColor { r: 255, g: 0, b: 12 });
            }
            other => panic!("expected drop, got {other:?}"),
        }
    }

    #[test]
    fn drop_with_out_of_range_color_fails() {
        let text =
            r#"{"type":"drop","x":3,"y":4,"strength":1.0,"radius":2,"color":{"r":256,"g":0,"b":0}}"#;
        assert!(ControlMessage::parse(text).is_err());
    }

    #[test]
    fn status_wire_shape() {
        let msg = ControlMessage::status(
            PairId(1),
            PairStatus {
                producer_present: true,
                display_present: false,
            },
        );
        let value: serde_json::Value = serde_json::from_str(&msg.to_json()).unwrap();
        assert_eq!(value["type"], "status");
        assert_eq!(value["pair"], 1);
        assert_eq!(value["producer_present"], true);
        assert_eq!(value["display_present"], false);
    }

    #[test]
    fn joined_and_kicked_wire_shape() {
        let joined = ControlMessage::Joined {
            role: Role::Display,
            pair: PairId(2),
        };
        assert_eq!(
            joined.to_json(),
            r#"{"type":"joined","role":"display","pair":2}"#
        );
        assert_eq!(
            ControlMessage::kicked("replaced").to_json(),
            r#"{"type":"kicked","reason":"replaced"}"#
        );
        assert_eq!(
            ControlMessage::error("bad").to_json(),
            r#"{"type":"error","message":"bad"}"#
        );
    }

    #[test]
    fn type_names() {
        assert_eq!(ControlMessage::error("x").type_name(), "error");
        assert_eq!(ControlMessage::kicked("x").type_name(), "kicked");
    }
}

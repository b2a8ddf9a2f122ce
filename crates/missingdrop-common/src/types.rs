use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of a producer/display pair. Valid ids are `1..=N` for a
/// deployment configured with N pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PairId(pub u8);

impl PairId {
    pub fn get(self) -> u8 {
        self.0
    }
}

impl fmt::Display for PairId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Role an endpoint announces when it joins a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Originates binary frames (the phone in the installation).
    #[serde(alias = "phone")]
    Producer,
    /// Consumes binary frames (the LED matrix).
    #[serde(alias = "matrix")]
    Display,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Producer => "producer",
            Role::Display => "display",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "producer" | "phone" => Ok(Role::Producer),
            "display" | "matrix" => Ok(Role::Display),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// A (pair, role) coordinate a connection may occupy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Slot {
    pub pair: PairId,
    pub role: Role,
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.pair, self.role)
    }
}

/// Occupancy of both slots of one pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairStatus {
    pub producer_present: bool,
    pub display_present: bool,
}

impl PairStatus {
    /// Whether the slot opposite to `role` is occupied.
    pub fn peer_present(&self, role: Role) -> bool {
        match role {
            Role::Producer => self.display_present,
            Role::Display => self.producer_present,
        }
    }
}

//! missingdrop-relay: WebSocket rendezvous hub for producer/display pairs.
//!
//! Endpoints connect, announce `join{role, pair}`, and the hub relays the
//! producer's binary frames to the display of the same pair without looking
//! at them. Drop events are routed between pairs, and a periodic liveness
//! sweep reclaims slots held by silent connections.

pub mod connection;
pub mod hub;
pub mod liveness;
pub mod registry;
pub mod server;
pub mod status;

pub use hub::{HubSettings, Outbound, RelayHub, SweepReport, KICK_REPLACED};
pub use liveness::spawn_liveness_monitor;
pub use registry::{Assignment, PairRegistry, RegistryError};
pub use server::serve;
pub use status::{serve_status, status_json};

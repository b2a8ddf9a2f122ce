//! missingdrop-device: keeps one producer or display endpoint attached to
//! the relay.
//!
//! [`supervisor::Supervisor`] holds the attach and session state machines
//! and performs no I/O itself; the traits in [`link`] are its only contact
//! with the outside. [`host`] implements them for an ordinary machine.

pub mod host;
pub mod link;
pub mod panel;
pub mod pattern;
pub mod supervisor;

pub use host::{HostLink, LogIndicator, WsSocket};
pub use link::{FrameSink, Indicator, NetworkLink, SessionSocket, SocketEvent};
pub use panel::PanelBuffer;
pub use pattern::TestPattern;
pub use supervisor::{
    AttachState, SessionState, Supervisor, SupervisorConfig, TickOutcome,
    DEFAULT_MAX_EVENTS_PER_TICK,
};

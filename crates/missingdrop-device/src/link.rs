//! I/O seams of the device supervisor.
//!
//! The supervisor never blocks: every trait method here must return
//! immediately, with completion reported on a later poll.

use bytes::Bytes;
use missingdrop_common::FrameError;

/// The radio (or whatever carries IP for the device).
pub trait NetworkLink {
    /// Start associating. Called once per entry into `Attaching`.
    fn begin(&mut self);

    /// Whether the link currently carries traffic.
    fn is_attached(&mut self) -> bool;
}

/// Something observed on the rendezvous socket since the last poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    Opened,
    Text(String),
    Binary(Bytes),
    /// Closed by the peer, failed to connect, or broke.
    Closed,
}

/// Non-blocking WebSocket client.
pub trait SessionSocket {
    /// Begin opening a connection, abandoning any previous one.
    fn connect(&mut self, url: &str);

    /// Next pending event, if any.
    fn poll_event(&mut self) -> Option<SocketEvent>;

    fn send_text(&mut self, text: String);

    fn send_binary(&mut self, data: Bytes);

    /// Drop the connection. Events of the old connection are not reported.
    fn close(&mut self);
}

/// Status light.
pub trait Indicator {
    fn set(&mut self, on: bool);
}

/// Display driver fed with validated frames.
pub trait FrameSink {
    fn present(&mut self, frame: &[u8]) -> Result<(), FrameError>;
}

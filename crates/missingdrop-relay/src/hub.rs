//! Relay hub: owns the pair registry and the table of live connections.
//!
//! Every handler takes the hub lock, mutates, enqueues its outbound
//! messages, and releases the lock without awaiting I/O. That makes a
//! registry mutation and its status broadcast atomic with respect to every
//! other message, sweep, or teardown.

use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use missingdrop_common::{ConnectionId, ControlMessage, PairId, PairStatus, Role, Slot};
use missingdrop_config::HubConfig;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, trace, warn};

use crate::registry::PairRegistry;

/// Reason sent with `kicked` when a newcomer takes an occupied slot.
pub const KICK_REPLACED: &str = "replaced";

/// Commands for a connection's writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Text(String),
    Ping,
    /// Flush a close frame and end the connection.
    Close,
}

/// Receiving ends handed to the task that owns the socket.
pub struct ConnectionChannels {
    pub control: mpsc::UnboundedReceiver<Outbound>,
    pub frames: mpsc::Receiver<Bytes>,
}

/// Hub-side view of one live connection.
struct ConnectionHandle {
    addr: SocketAddr,
    control: mpsc::UnboundedSender<Outbound>,
    frames: mpsc::Sender<Bytes>,
    /// Set by any inbound traffic, cleared by each liveness sweep.
    alive: bool,
}

impl ConnectionHandle {
    fn send(&self, msg: &ControlMessage) {
        let _ = self.control.send(Outbound::Text(msg.to_json()));
    }

    fn close(&self) {
        let _ = self.control.send(Outbound::Close);
    }
}

/// Static hub parameters.
#[derive(Debug, Clone)]
pub struct HubSettings {
    pub pairs: u8,
    pub frame_queue: usize,
    /// Source pair → pair whose producer receives its drops.
    pub drop_routes: HashMap<PairId, PairId>,
}

impl HubSettings {
    pub fn from_config(config: &HubConfig) -> Self {
        Self {
            pairs: config.pairs,
            frame_queue: config.frame_queue,
            drop_routes: config
                .effective_drop_routes()
                .into_iter()
                .map(|route| (route.from, route.to))
                .collect(),
        }
    }
}

impl Default for HubSettings {
    fn default() -> Self {
        Self::from_config(&HubConfig::default())
    }
}

/// Result of one liveness sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Connections that were probed.
    pub probed: usize,
    /// Connections closed for missing the previous probe.
    pub reaped: usize,
}

struct HubState {
    registry: PairRegistry,
    connections: HashMap<ConnectionId, ConnectionHandle>,
    routes: HashMap<PairId, PairId>,
}

impl HubState {
    fn reply(&self, id: ConnectionId, msg: &ControlMessage) {
        if let Some(handle) = self.connections.get(&id) {
            handle.send(msg);
        }
    }

    fn touch(&mut self, id: ConnectionId) {
        if let Some(handle) = self.connections.get_mut(&id) {
            handle.alive = true;
        }
    }

    /// Send the pair's recomputed status to whoever occupies its slots.
    fn broadcast_status(&self, pair: PairId) {
        let Some(status) = self.registry.status_of(pair) else {
            return;
        };
        let msg = ControlMessage::status(pair, status);
        for member in self.registry.members(pair) {
            self.reply(member, &msg);
        }
        debug!(
            pair = %pair,
            producer = status.producer_present,
            display = status.display_present,
            "Status broadcast"
        );
    }

    fn join(&mut self, id: ConnectionId, role: Role, pair: PairId) {
        let assignment = match self.registry.assign(id, pair, role) {
            Ok(assignment) => assignment,
            Err(e) => {
                warn!(conn = %id, error = %e, "Join rejected");
                self.reply(id, &ControlMessage::error(e.to_string()));
                return;
            }
        };

        // Notify, then close: the incumbent must see why it lost the slot.
        if let Some(evicted) = assignment.evicted {
            if let Some(handle) = self.connections.remove(&evicted) {
                handle.send(&ControlMessage::kicked(KICK_REPLACED));
                handle.close();
                info!(
                    conn = %evicted,
                    peer = %handle.addr,
                    pair = %pair,
                    role = %role,
                    "Evicted slot occupant"
                );
            }
        }

        info!(conn = %id, pair = %pair, role = %role, "Client joined");
        self.reply(id, &ControlMessage::Joined { role, pair });

        if let Some(released) = assignment.released {
            if released.pair != pair {
                self.broadcast_status(released.pair);
            }
        }
        self.broadcast_status(pair);
    }

    fn route_drop(&self, id: ConnectionId, text: &str) {
        let Some(slot) = self.registry.slot_of(id) else {
            self.reply(id, &ControlMessage::error("join a pair before sending drop"));
            return;
        };
        let Some(target) = self.route_for(slot) else {
            self.reply(
                id,
                &ControlMessage::error(format!("no drop route configured for pair {}", slot.pair)),
            );
            return;
        };

        match self
            .registry
            .occupant(target, Role::Producer)
            .and_then(|peer| self.connections.get(&peer))
        {
            Some(handle) => {
                let _ = handle.control.send(Outbound::Text(text.to_string()));
                trace!(conn = %id, from = %slot.pair, to = %target, "Drop forwarded");
            }
            None => debug!(from = %slot.pair, to = %target, "Drop target absent, discarded"),
        }
    }

    fn route_for(&self, slot: Slot) -> Option<PairId> {
        self.routes.get(&slot.pair).copied()
    }

    /// Tear down a connection: close its writer, release its slot, and tell
    /// the remaining pair member. A no-op for connections already removed.
    fn remove(&mut self, id: ConnectionId) -> bool {
        let Some(handle) = self.connections.remove(&id) else {
            return false;
        };
        handle.close();
        if let Some(slot) = self.registry.release(id) {
            info!(conn = %id, peer = %handle.addr, slot = %slot, "Slot released");
            self.broadcast_status(slot.pair);
        }
        true
    }
}

/// Cloneable handle to the shared hub state.
#[derive(Clone)]
pub struct RelayHub {
    state: Arc<Mutex<HubState>>,
    frame_queue: usize,
}

impl RelayHub {
    pub fn new(settings: HubSettings) -> Self {
        Self {
            state: Arc::new(Mutex::new(HubState {
                registry: PairRegistry::new(settings.pairs),
                connections: HashMap::new(),
                routes: settings.drop_routes,
            })),
            frame_queue: settings.frame_queue.max(1),
        }
    }

    /// Register a freshly accepted transport. The connection starts
    /// unassigned and counts as alive until the next sweep.
    pub async fn connect(&self, addr: SocketAddr) -> (ConnectionId, ConnectionChannels) {
        let id = ConnectionId::next();
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (frames_tx, frames_rx) = mpsc::channel(self.frame_queue);

        self.state.lock().await.connections.insert(
            id,
            ConnectionHandle {
                addr,
                control: control_tx,
                frames: frames_tx,
                alive: true,
            },
        );

        (
            id,
            ConnectionChannels {
                control: control_rx,
                frames: frames_rx,
            },
        )
    }

    /// Handle one inbound text frame.
    pub async fn handle_text(&self, id: ConnectionId, text: &str) {
        let mut state = self.state.lock().await;
        if !state.connections.contains_key(&id) {
            return;
        }
        state.touch(id);

        match ControlMessage::parse(text) {
            Ok(ControlMessage::Join { role, pair }) => state.join(id, role, pair),
            Ok(ControlMessage::Drop(_)) => state.route_drop(id, text),
            Ok(other) => {
                debug!(conn = %id, kind = other.type_name(), "Unexpected message type");
                state.reply(
                    id,
                    &ControlMessage::error(format!(
                        "unexpected message type '{}'",
                        other.type_name()
                    )),
                );
            }
            Err(e) => {
                debug!(conn = %id, error = %e, "Malformed control message");
                state.reply(id, &ControlMessage::error(format!("invalid message: {e}")));
            }
        }
    }

    /// Forward a producer's frame to its pair's display, if there is one.
    ///
    /// Never waits: when the display's frame queue is full the frame is
    /// dropped, and nothing is kept for a display that is not connected.
    pub async fn forward_frame(&self, id: ConnectionId, frame: Bytes) {
        let mut state = self.state.lock().await;
        state.touch(id);

        let pair = match state.registry.slot_of(id) {
            Some(Slot {
                pair,
                role: Role::Producer,
            }) => pair,
            _ => {
                trace!(conn = %id, "Binary frame from non-producer dropped");
                return;
            }
        };

        let Some(display) = state
            .registry
            .occupant(pair, Role::Display)
            .and_then(|display| state.connections.get(&display))
        else {
            trace!(pair = %pair, "No display, frame dropped");
            return;
        };

        if let Err(mpsc::error::TrySendError::Full(_)) = display.frames.try_send(frame) {
            debug!(pair = %pair, "Display lagging, frame dropped");
        }
    }

    /// Record a liveness signal (pong or any other inbound frame).
    pub async fn mark_alive(&self, id: ConnectionId) {
        self.state.lock().await.touch(id);
    }

    /// Transport closed or errored. Safe to call for connections that were
    /// already evicted or reaped.
    pub async fn disconnect(&self, id: ConnectionId) {
        if self.state.lock().await.remove(id) {
            info!(conn = %id, "Client disconnected");
        }
    }

    /// One mark-and-probe pass: close every connection that stayed silent
    /// since the previous sweep, then clear the flag and ping the rest.
    pub async fn sweep_liveness(&self) -> SweepReport {
        let mut state = self.state.lock().await;

        let dead: Vec<ConnectionId> = state
            .connections
            .iter()
            .filter(|(_, handle)| !handle.alive)
            .map(|(id, _)| *id)
            .collect();
        for id in &dead {
            warn!(conn = %id, "No liveness response, closing");
            state.remove(*id);
        }

        for handle in state.connections.values_mut() {
            handle.alive = false;
            let _ = handle.control.send(Outbound::Ping);
        }

        SweepReport {
            probed: state.connections.len(),
            reaped: dead.len(),
        }
    }

    /// Presence of both roles for every pair.
    pub async fn status_snapshot(&self) -> BTreeMap<PairId, PairStatus> {
        self.state.lock().await.registry.snapshot()
    }

    pub async fn connection_count(&self) -> usize {
        self.state.lock().await.connections.len()
    }

    pub async fn slot_of(&self, id: ConnectionId) -> Option<Slot> {
        self.state.lock().await.registry.slot_of(id)
    }
}

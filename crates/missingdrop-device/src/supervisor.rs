//! Device connection supervisor.
//!
//! Two nested state machines, polled by the device main loop:
//!
//! ```text
//! attach:  Detached ─> Attaching ─> Attached ─(link lost)─> Attaching
//!                         │
//!                         └─(attach timeout)─> Restart
//!
//! session: Disconnected ─> Connecting ─(joined)─> Joined
//!               ^               │                    │
//!               └───────────────┴──(close/kicked)────┘
//! ```
//!
//! The session machine only runs while the link is `Attached`. Time is passed
//! in by the caller, so the whole thing is deterministic under test.

use std::time::{Duration, Instant};

use bytes::Bytes;
use missingdrop_common::{frame_len, ControlMessage, PairId, PairStatus, Role};
use missingdrop_config::DeviceConfig;
use tracing::{debug, error, info, trace, warn};

use crate::link::{FrameSink, Indicator, NetworkLink, SessionSocket, SocketEvent};

/// Upper bound on socket events handled per tick.
pub const DEFAULT_MAX_EVENTS_PER_TICK: usize = 8;

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub url: String,
    pub role: Role,
    pub pair: PairId,
    /// Expected binary frame size in bytes.
    pub frame_len: usize,
    pub attach_timeout: Duration,
    pub connect_timeout: Duration,
    pub reconnect_delay: Duration,
    /// Consecutive `kicked`/`error` replies tolerated before giving up on
    /// the current socket.
    pub max_join_failures: u32,
    pub max_events_per_tick: usize,
}

impl SupervisorConfig {
    pub fn from_device(config: &DeviceConfig) -> Self {
        Self {
            url: config.server_url(),
            role: config.role,
            pair: config.pair,
            frame_len: frame_len(
                usize::from(config.frame_width),
                usize::from(config.frame_height),
            ),
            attach_timeout: Duration::from_secs(config.attach_timeout_secs),
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
            reconnect_delay: Duration::from_secs(config.reconnect_delay_secs),
            max_join_failures: config.max_join_failures,
            max_events_per_tick: DEFAULT_MAX_EVENTS_PER_TICK,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachState {
    Detached,
    Attaching { since: Instant },
    Attached,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Idle. `retry_at` of `None` means connect on the next tick.
    Disconnected { retry_at: Option<Instant> },
    /// Socket requested; `opened` once the transport is up and `join` sent.
    Connecting { since: Instant, opened: bool },
    Joined,
}

/// What the runner must do after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    /// The link could not attach in time. The runner should call
    /// [`Supervisor::restart`] (or reboot the device).
    Restart,
}

pub struct Supervisor<L, S, I, F> {
    config: SupervisorConfig,
    link: L,
    socket: S,
    indicator: I,
    sink: F,
    attach: AttachState,
    session: SessionState,
    peer_present: bool,
    join_failures: u32,
    reconnect_attempts: u32,
    frames_presented: u64,
}

impl<L, S, I, F> Supervisor<L, S, I, F>
where
    L: NetworkLink,
    S: SessionSocket,
    I: Indicator,
    F: FrameSink,
{
    pub fn new(config: SupervisorConfig, link: L, socket: S, indicator: I, sink: F) -> Self {
        Self {
            config,
            link,
            socket,
            indicator,
            sink,
            attach: AttachState::Detached,
            session: SessionState::Disconnected { retry_at: None },
            peer_present: false,
            join_failures: 0,
            reconnect_attempts: 0,
            frames_presented: 0,
        }
    }

    pub fn attach_state(&self) -> AttachState {
        self.attach
    }

    pub fn session_state(&self) -> SessionState {
        self.session
    }

    /// Whether the other member of our pair is connected, per the last
    /// `status` received.
    pub fn peer_present(&self) -> bool {
        self.peer_present
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    pub fn socket(&self) -> &S {
        &self.socket
    }

    pub fn socket_mut(&mut self) -> &mut S {
        &mut self.socket
    }

    pub fn indicator(&self) -> &I {
        &self.indicator
    }

    pub fn sink(&self) -> &F {
        &self.sink
    }

    /// Advance both machines. Never blocks.
    pub fn tick(&mut self, now: Instant) -> TickOutcome {
        match self.attach {
            AttachState::Detached => {
                self.begin_attach(now);
            }
            AttachState::Attaching { since } => {
                if self.link.is_attached() {
                    info!("Network attached");
                    self.indicator.set(false);
                    self.attach = AttachState::Attached;
                    self.session = SessionState::Disconnected { retry_at: None };
                } else if now.saturating_duration_since(since) >= self.config.attach_timeout {
                    error!(
                        timeout_secs = self.config.attach_timeout.as_secs(),
                        "Network attach timed out, restart required"
                    );
                    return TickOutcome::Restart;
                }
            }
            AttachState::Attached => {
                if !self.link.is_attached() {
                    warn!("Network lost, re-attaching");
                    self.end_session(None);
                    self.begin_attach(now);
                } else {
                    self.tick_session(now);
                }
            }
        }
        TickOutcome::Continue
    }

    /// Clear all local state, as a device reboot would.
    pub fn restart(&mut self) {
        info!("Supervisor restart");
        self.socket.close();
        self.attach = AttachState::Detached;
        self.session = SessionState::Disconnected { retry_at: None };
        self.peer_present = false;
        self.join_failures = 0;
        self.reconnect_attempts = 0;
        self.indicator.set(false);
    }

    /// Send a producer frame. Returns `false` (and sends nothing) unless the
    /// session is joined.
    pub fn send_frame(&mut self, frame: Bytes) -> bool {
        if self.session != SessionState::Joined {
            return false;
        }
        self.socket.send_binary(frame);
        true
    }

    /// Close the socket for good, e.g. on shutdown.
    pub fn shutdown(&mut self) {
        self.end_session(None);
    }

    fn begin_attach(&mut self, now: Instant) {
        info!("Attaching to network");
        self.link.begin();
        self.indicator.set(true);
        self.attach = AttachState::Attaching { since: now };
    }

    fn tick_session(&mut self, now: Instant) {
        match self.session {
            SessionState::Disconnected { retry_at } => {
                if retry_at.map_or(true, |at| now >= at) {
                    self.reconnect_attempts += 1;
                    info!(
                        url = %self.config.url,
                        attempt = self.reconnect_attempts,
                        "Connecting to relay"
                    );
                    self.socket.connect(&self.config.url);
                    self.session = SessionState::Connecting {
                        since: now,
                        opened: false,
                    };
                }
            }
            SessionState::Connecting { since, .. } => {
                self.drain_events(now);
                if let SessionState::Connecting { .. } = self.session {
                    if now.saturating_duration_since(since) >= self.config.connect_timeout {
                        warn!(
                            timeout_secs = self.config.connect_timeout.as_secs(),
                            "Relay did not confirm join in time"
                        );
                        self.end_session(Some(now));
                    }
                }
            }
            SessionState::Joined => self.drain_events(now),
        }
    }

    fn drain_events(&mut self, now: Instant) {
        for _ in 0..self.config.max_events_per_tick {
            let Some(event) = self.socket.poll_event() else {
                return;
            };
            self.handle_event(event, now);
            if let SessionState::Disconnected { .. } = self.session {
                return;
            }
        }
    }

    fn handle_event(&mut self, event: SocketEvent, now: Instant) {
        match event {
            SocketEvent::Opened => {
                if let SessionState::Connecting { since, .. } = self.session {
                    info!("Relay socket open, joining");
                    self.send_join();
                    self.session = SessionState::Connecting {
                        since,
                        opened: true,
                    };
                }
            }
            SocketEvent::Closed => {
                info!("Relay socket closed");
                self.end_session(Some(now));
            }
            SocketEvent::Text(text) => self.handle_control(&text, now),
            SocketEvent::Binary(frame) => self.handle_frame(&frame),
        }
    }

    fn handle_control(&mut self, text: &str, now: Instant) {
        let msg = match ControlMessage::parse(text) {
            Ok(msg) => msg,
            Err(e) => {
                debug!(error = %e, "Unparseable control message ignored");
                return;
            }
        };

        match msg {
            ControlMessage::Joined { role, pair } => {
                info!(role = %role, pair = %pair, "Joined");
                self.session = SessionState::Joined;
                self.join_failures = 0;
                self.reconnect_attempts = 0;
                self.indicator.set(true);
            }
            ControlMessage::Status {
                producer_present,
                display_present,
                ..
            } => {
                self.peer_present = PairStatus {
                    producer_present,
                    display_present,
                }
                .peer_present(self.config.role);
                debug!(peer_present = self.peer_present, "Pair status");
            }
            ControlMessage::Kicked { reason } => {
                self.join_failures += 1;
                warn!(reason = %reason, failures = self.join_failures, "Kicked by relay");
                self.end_session(Some(now));
            }
            ControlMessage::Error { message } => {
                if self.session == SessionState::Joined {
                    warn!(message = %message, "Relay error");
                    return;
                }
                self.join_failures += 1;
                warn!(message = %message, failures = self.join_failures, "Join refused");
                if self.join_failures >= self.config.max_join_failures {
                    self.join_failures = 0;
                    self.end_session(Some(now));
                } else {
                    self.send_join();
                }
            }
            ControlMessage::Drop(event) => {
                debug!(x = event.x, y = event.y, radius = event.radius, "Drop event");
            }
            other => {
                debug!(kind = other.type_name(), "Unexpected control message ignored");
            }
        }
    }

    fn handle_frame(&mut self, frame: &[u8]) {
        if self.session != SessionState::Joined {
            trace!(len = frame.len(), "Frame before join ignored");
            return;
        }
        if frame.len() != self.config.frame_len {
            warn!(
                expected = self.config.frame_len,
                actual = frame.len(),
                "Frame size mismatch, discarded"
            );
            return;
        }
        match self.sink.present(frame) {
            Ok(()) => self.frames_presented += 1,
            Err(e) => warn!(error = %e, "Frame rejected by display"),
        }
    }

    fn send_join(&mut self) {
        let join = ControlMessage::Join {
            role: self.config.role,
            pair: self.config.pair,
        };
        self.socket.send_text(join.to_json());
    }

    /// Tear the session down. With `now`, schedule a retry after the
    /// reconnect delay; without, reconnect as soon as the session runs again.
    fn end_session(&mut self, now: Option<Instant>) {
        self.socket.close();
        self.peer_present = false;
        self.indicator.set(false);
        self.session = SessionState::Disconnected {
            retry_at: now.map(|now| now + self.config.reconnect_delay),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use missingdrop_common::FrameError;
    use std::collections::VecDeque;

    #[derive(Default)]
    struct FakeLink {
        attached: bool,
        begins: u32,
    }

    impl NetworkLink for FakeLink {
        fn begin(&mut self) {
            self.begins += 1;
        }

        fn is_attached(&mut self) -> bool {
            self.attached
        }
    }

    #[derive(Default)]
    struct FakeSocket {
        connects: Vec<String>,
        closes: u32,
        pending: VecDeque<SocketEvent>,
        sent_text: Vec<String>,
        sent_binary: Vec<Bytes>,
    }

    impl FakeSocket {
        fn push(&mut self, event: SocketEvent) {
            self.pending.push_back(event);
        }

        fn push_text(&mut self, msg: ControlMessage) {
            self.push(SocketEvent::Text(msg.to_json()));
        }
    }

    impl SessionSocket for FakeSocket {
        fn connect(&mut self, url: &str) {
            self.connects.push(url.to_string());
        }

        fn poll_event(&mut self) -> Option<SocketEvent> {
            self.pending.pop_front()
        }

        fn send_text(&mut self, text: String) {
            self.sent_text.push(text);
        }

        fn send_binary(&mut self, data: Bytes) {
            self.sent_binary.push(data);
        }

        fn close(&mut self) {
            self.closes += 1;
        }
    }

    #[derive(Default)]
    struct FakeLight {
        on: bool,
        history: Vec<bool>,
    }

    impl Indicator for FakeLight {
        fn set(&mut self, on: bool) {
            self.on = on;
            self.history.push(on);
        }
    }

    #[derive(Default)]
    struct FakeSink {
        frames: Vec<Vec<u8>>,
    }

    impl FrameSink for FakeSink {
        fn present(&mut self, frame: &[u8]) -> Result<(), FrameError> {
            self.frames.push(frame.to_vec());
            Ok(())
        }
    }

    type TestSupervisor = Supervisor<FakeLink, FakeSocket, FakeLight, FakeSink>;

    fn config(role: Role) -> SupervisorConfig {
        SupervisorConfig {
            url: "ws://relay.test:3000/ws".into(),
            role,
            pair: PairId(1),
            frame_len: 2048,
            attach_timeout: Duration::from_secs(20),
            connect_timeout: Duration::from_secs(10),
            reconnect_delay: Duration::from_secs(3),
            max_join_failures: 3,
            max_events_per_tick: DEFAULT_MAX_EVENTS_PER_TICK,
        }
    }

    fn supervisor(role: Role) -> TestSupervisor {
        Supervisor::new(
            config(role),
            FakeLink::default(),
            FakeSocket::default(),
            FakeLight::default(),
            FakeSink::default(),
        )
    }

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    fn joined(role: Role) -> ControlMessage {
        ControlMessage::Joined {
            role,
            pair: PairId(1),
        }
    }

    /// Drive a display supervisor to `Joined` starting at `t0`.
    fn join_display(sup: &mut TestSupervisor, t0: Instant) {
        sup.tick(t0);
        sup.link_mut().attached = true;
        sup.tick(t0);
        sup.tick(t0);
        sup.socket_mut().push(SocketEvent::Opened);
        sup.socket_mut().push_text(joined(Role::Display));
        sup.tick(t0);
        assert_eq!(sup.session_state(), SessionState::Joined);
    }

    #[test]
    fn attach_turns_indicator_on_then_off() {
        let t0 = Instant::now();
        let mut sup = supervisor(Role::Display);

        sup.tick(t0);
        assert_eq!(sup.attach_state(), AttachState::Attaching { since: t0 });
        assert!(sup.indicator().on);

        sup.link_mut().attached = true;
        sup.tick(t0 + secs(1));
        assert_eq!(sup.attach_state(), AttachState::Attached);
        assert!(!sup.indicator().on);
        assert_eq!(sup.link_mut().begins, 1);
    }

    #[test]
    fn attach_timeout_requests_restart() {
        let t0 = Instant::now();
        let mut sup = supervisor(Role::Display);
        sup.tick(t0);

        assert_eq!(sup.tick(t0 + secs(19)), TickOutcome::Continue);
        assert_eq!(sup.tick(t0 + secs(20)), TickOutcome::Restart);

        sup.restart();
        assert_eq!(sup.attach_state(), AttachState::Detached);
        sup.tick(t0 + secs(21));
        assert_eq!(
            sup.attach_state(),
            AttachState::Attaching {
                since: t0 + secs(21)
            }
        );
        assert_eq!(sup.link_mut().begins, 2);
    }

    #[test]
    fn join_sent_immediately_on_open() {
        let t0 = Instant::now();
        let mut sup = supervisor(Role::Display);
        sup.tick(t0);
        sup.link_mut().attached = true;
        sup.tick(t0);
        sup.tick(t0);
        assert_eq!(sup.socket().connects, vec!["ws://relay.test:3000/ws".to_string()]);
        assert!(sup.socket().sent_text.is_empty());

        sup.socket_mut().push(SocketEvent::Opened);
        sup.tick(t0);

        assert_eq!(
            sup.socket().sent_text,
            vec![r#"{"type":"join","role":"display","pair":1}"#.to_string()]
        );
        assert_eq!(
            sup.session_state(),
            SessionState::Connecting {
                since: t0,
                opened: true
            }
        );
    }

    #[test]
    fn joined_lights_indicator_and_status_sets_peer() {
        let t0 = Instant::now();
        let mut sup = supervisor(Role::Display);
        join_display(&mut sup, t0);
        assert!(sup.indicator().on);
        assert!(!sup.peer_present());

        sup.socket_mut().push_text(ControlMessage::Status {
            pair: PairId(1),
            producer_present: true,
            display_present: true,
        });
        sup.tick(t0);
        assert!(sup.peer_present());
        assert_eq!(sup.session_state(), SessionState::Joined);
    }

    #[test]
    fn close_schedules_reconnect_after_delay() {
        let t0 = Instant::now();
        let mut sup = supervisor(Role::Display);
        join_display(&mut sup, t0);

        sup.socket_mut().push(SocketEvent::Closed);
        sup.tick(t0 + secs(5));
        assert_eq!(
            sup.session_state(),
            SessionState::Disconnected {
                retry_at: Some(t0 + secs(8))
            }
        );
        assert!(!sup.indicator().on);

        sup.tick(t0 + secs(7));
        assert_eq!(sup.socket().connects.len(), 1);
        sup.tick(t0 + secs(8));
        assert_eq!(sup.socket().connects.len(), 2);
    }

    #[test]
    fn connect_timeout_tears_down() {
        let t0 = Instant::now();
        let mut sup = supervisor(Role::Display);
        sup.tick(t0);
        sup.link_mut().attached = true;
        sup.tick(t0);
        sup.tick(t0);

        sup.tick(t0 + secs(9));
        assert!(matches!(sup.session_state(), SessionState::Connecting { .. }));
        sup.tick(t0 + secs(10));
        assert_eq!(
            sup.session_state(),
            SessionState::Disconnected {
                retry_at: Some(t0 + secs(13))
            }
        );
        assert_eq!(sup.socket().closes, 1);
    }

    #[test]
    fn three_join_errors_give_up_on_socket() {
        let t0 = Instant::now();
        let mut sup = supervisor(Role::Display);
        sup.tick(t0);
        sup.link_mut().attached = true;
        sup.tick(t0);
        sup.tick(t0);
        sup.socket_mut().push(SocketEvent::Opened);
        sup.tick(t0);

        for _ in 0..2 {
            sup.socket_mut()
                .push_text(ControlMessage::error("invalid pair 1"));
            sup.tick(t0);
            assert!(matches!(sup.session_state(), SessionState::Connecting { .. }));
        }
        // Each error is answered with a fresh join.
        assert_eq!(sup.socket().sent_text.len(), 3);

        sup.socket_mut().push_text(ControlMessage::error("invalid pair 1"));
        sup.tick(t0);
        assert!(matches!(
            sup.session_state(),
            SessionState::Disconnected { .. }
        ));
    }

    #[test]
    fn kicked_ends_session() {
        let t0 = Instant::now();
        let mut sup = supervisor(Role::Display);
        join_display(&mut sup, t0);

        sup.socket_mut().push_text(ControlMessage::kicked("replaced"));
        sup.tick(t0);

        assert!(matches!(
            sup.session_state(),
            SessionState::Disconnected { .. }
        ));
        assert!(!sup.peer_present());
    }

    #[test]
    fn frames_presented_only_with_correct_length() {
        let t0 = Instant::now();
        let mut sup = supervisor(Role::Display);
        join_display(&mut sup, t0);

        sup.socket_mut()
            .push(SocketEvent::Binary(Bytes::from(vec![0u8; 100])));
        sup.socket_mut()
            .push(SocketEvent::Binary(Bytes::from(vec![7u8; 2048])));
        sup.tick(t0);

        assert_eq!(sup.session_state(), SessionState::Joined);
        assert_eq!(sup.sink().frames.len(), 1);
        assert_eq!(sup.sink().frames[0], vec![7u8; 2048]);
        assert_eq!(sup.frames_presented(), 1);
    }

    #[test]
    fn frames_before_join_are_ignored() {
        let t0 = Instant::now();
        let mut sup = supervisor(Role::Display);
        sup.tick(t0);
        sup.link_mut().attached = true;
        sup.tick(t0);
        sup.tick(t0);
        sup.socket_mut().push(SocketEvent::Opened);
        sup.socket_mut()
            .push(SocketEvent::Binary(Bytes::from(vec![0u8; 2048])));
        sup.tick(t0);
        assert!(sup.sink().frames.is_empty());
    }

    #[test]
    fn network_loss_reattaches_before_reconnecting() {
        let t0 = Instant::now();
        let mut sup = supervisor(Role::Display);
        join_display(&mut sup, t0);

        sup.link_mut().attached = false;
        sup.tick(t0 + secs(1));
        assert_eq!(
            sup.attach_state(),
            AttachState::Attaching {
                since: t0 + secs(1)
            }
        );
        assert!(matches!(
            sup.session_state(),
            SessionState::Disconnected { .. }
        ));
        assert!(sup.indicator().on);

        // No session retry while attaching.
        sup.tick(t0 + secs(10));
        assert_eq!(sup.socket().connects.len(), 1);

        sup.link_mut().attached = true;
        sup.tick(t0 + secs(11));
        sup.tick(t0 + secs(11));
        assert_eq!(sup.socket().connects.len(), 2);
    }

    #[test]
    fn events_per_tick_are_bounded() {
        let t0 = Instant::now();
        let mut sup = supervisor(Role::Display);
        join_display(&mut sup, t0);

        for _ in 0..(DEFAULT_MAX_EVENTS_PER_TICK + 2) {
            sup.socket_mut()
                .push(SocketEvent::Binary(Bytes::from(vec![1u8; 2048])));
        }
        sup.tick(t0);
        assert_eq!(sup.frames_presented(), DEFAULT_MAX_EVENTS_PER_TICK as u64);
        sup.tick(t0);
        assert_eq!(
            sup.frames_presented(),
            DEFAULT_MAX_EVENTS_PER_TICK as u64 + 2
        );
    }

    #[test]
    fn producer_sends_frames_only_when_joined() {
        let t0 = Instant::now();
        let mut sup = supervisor(Role::Producer);
        assert!(!sup.send_frame(Bytes::from_static(&[1, 2])));

        sup.tick(t0);
        sup.link_mut().attached = true;
        sup.tick(t0);
        sup.tick(t0);
        sup.socket_mut().push(SocketEvent::Opened);
        sup.socket_mut().push_text(joined(Role::Producer));
        sup.tick(t0);

        assert!(sup.send_frame(Bytes::from_static(&[1, 2])));
        assert_eq!(sup.socket().sent_binary, vec![Bytes::from_static(&[1, 2])]);
    }

    #[test]
    fn producer_peer_follows_display_presence() {
        let t0 = Instant::now();
        let mut sup = supervisor(Role::Producer);
        sup.tick(t0);
        sup.link_mut().attached = true;
        sup.tick(t0);
        sup.tick(t0);
        sup.socket_mut().push(SocketEvent::Opened);
        sup.socket_mut().push_text(joined(Role::Producer));
        sup.socket_mut().push_text(ControlMessage::Status {
            pair: PairId(1),
            producer_present: true,
            display_present: false,
        });
        sup.tick(t0);
        assert!(!sup.peer_present());
    }
}

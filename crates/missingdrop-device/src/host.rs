//! Host implementations of the supervisor's I/O seams: a tokio-tungstenite
//! socket bridged through channels, an always-up network link, and a status
//! light that logs.

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use missingdrop_config::NetworkConfig;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use crate::link::{Indicator, NetworkLink, SessionSocket, SocketEvent};

/// WebSocket client whose I/O runs on a spawned task. Must be used from
/// inside a tokio runtime.
#[derive(Default)]
pub struct WsSocket {
    events: Option<mpsc::UnboundedReceiver<SocketEvent>>,
    outbound: Option<mpsc::UnboundedSender<Message>>,
}

impl WsSocket {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionSocket for WsSocket {
    fn connect(&mut self, url: &str) {
        self.close();

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        tokio::spawn(run_socket(url.to_string(), event_tx, outbound_rx));
        self.events = Some(event_rx);
        self.outbound = Some(outbound_tx);
    }

    fn poll_event(&mut self) -> Option<SocketEvent> {
        self.events.as_mut()?.try_recv().ok()
    }

    fn send_text(&mut self, text: String) {
        if let Some(tx) = &self.outbound {
            let _ = tx.send(Message::Text(text.into()));
        }
    }

    fn send_binary(&mut self, data: Bytes) {
        if let Some(tx) = &self.outbound {
            let _ = tx.send(Message::Binary(data));
        }
    }

    fn close(&mut self) {
        // Dropping the sender makes the task send a close frame and exit.
        self.outbound = None;
        self.events = None;
    }
}

async fn run_socket(
    url: String,
    events: mpsc::UnboundedSender<SocketEvent>,
    mut outbound: mpsc::UnboundedReceiver<Message>,
) {
    let ws = match connect_async(&url).await {
        Ok((ws, _)) => ws,
        Err(e) => {
            tracing::warn!(url = %url, error = %e, "Failed to connect to relay");
            let _ = events.send(SocketEvent::Closed);
            return;
        }
    };
    let _ = events.send(SocketEvent::Opened);

    let (mut sink, mut stream) = ws.split();
    loop {
        tokio::select! {
            msg = outbound.recv() => match msg {
                Some(msg) => {
                    if sink.send(msg).await.is_err() {
                        break;
                    }
                }
                None => {
                    let _ = sink.close().await;
                    return;
                }
            },

            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    let _ = events.send(SocketEvent::Text(text.to_string()));
                }
                Some(Ok(Message::Binary(data))) => {
                    let _ = events.send(SocketEvent::Binary(data));
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    tracing::debug!(error = %e, "Relay socket error");
                    break;
                }
                Some(Ok(_)) => {}
            },
        }
    }

    let _ = events.send(SocketEvent::Closed);
}

/// Network link for a host that already has connectivity.
pub struct HostLink {
    network: NetworkConfig,
}

impl HostLink {
    pub fn new(network: NetworkConfig) -> Self {
        Self { network }
    }
}

impl NetworkLink for HostLink {
    fn begin(&mut self) {
        match (&self.network.ssid, &self.network.enterprise) {
            (ssid, _) if ssid.is_empty() => tracing::debug!("Using host network"),
            (ssid, Some(enterprise)) => tracing::info!(
                ssid = %ssid,
                identity = %enterprise.identity,
                "Using host network (enterprise profile configured)"
            ),
            (ssid, None) => tracing::info!(ssid = %ssid, "Using host network"),
        }
    }

    fn is_attached(&mut self) -> bool {
        true
    }
}

/// Status light rendered as log lines.
#[derive(Debug, Default)]
pub struct LogIndicator {
    on: bool,
}

impl LogIndicator {
    pub fn is_on(&self) -> bool {
        self.on
    }
}

impl Indicator for LogIndicator {
    fn set(&mut self, on: bool) {
        if self.on != on {
            tracing::debug!(on, "Status light");
        }
        self.on = on;
    }
}

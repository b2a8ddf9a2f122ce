//! Per-connection task: pump hub output into the socket and socket input
//! into the hub until either side ends the connection.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use crate::hub::{Outbound, RelayHub};

/// How long a close frame may take to flush before the socket is dropped.
const CLOSE_FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// Handle a single upgraded WebSocket connection.
pub async fn handle_connection(ws: WebSocketStream<TcpStream>, addr: SocketAddr, hub: RelayHub) {
    let (mut sink, mut stream) = ws.split();
    let (id, mut channels) = hub.connect(addr).await;

    tracing::info!(peer = %addr, conn = %id, "Client connected");

    loop {
        tokio::select! {
            biased;

            // Hub → client: control replies, probes, close requests.
            outbound = channels.control.recv() => {
                let message = match outbound {
                    Some(Outbound::Text(text)) => Message::Text(text.into()),
                    Some(Outbound::Ping) => Message::Ping(Default::default()),
                    Some(Outbound::Close) | None => {
                        let _ = tokio::time::timeout(CLOSE_FLUSH_TIMEOUT, sink.close()).await;
                        break;
                    }
                };
                if sink.send(message).await.is_err() {
                    break;
                }
            }

            // Producer frames relayed to this display.
            Some(frame) = channels.frames.recv() => {
                if sink.send(Message::Binary(frame)).await.is_err() {
                    break;
                }
            }

            // Client → hub.
            frame = stream.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        hub.handle_text(id, text.as_str()).await;
                    }
                    Some(Ok(Message::Binary(data))) => {
                        hub.forward_frame(id, data).await;
                    }
                    // tungstenite answers pings itself.
                    Some(Ok(Message::Pong(_))) | Some(Ok(Message::Ping(_))) => {
                        hub.mark_alive(id).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(peer = %addr, conn = %id, error = %e, "WS error");
                        break;
                    }
                    Some(Ok(Message::Frame(_))) => {}
                }
            }
        }
    }

    hub.disconnect(id).await;
    tracing::debug!(peer = %addr, conn = %id, "Connection task finished");
}

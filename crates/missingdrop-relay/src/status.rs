//! Plain-HTTP status listener for health checks.
//!
//! Answers every request with the presence map of all pairs, e.g.
//! `{"1":{"producer_present":true,"display_present":false}}`.

use std::collections::BTreeMap;
use std::time::Duration;

use missingdrop_common::{PairId, PairStatus};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use crate::hub::RelayHub;

const REQUEST_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Render a registry snapshot as the status body.
pub fn status_json(snapshot: &BTreeMap<PairId, PairStatus>) -> String {
    serde_json::to_string(snapshot).unwrap_or_else(|_| "{}".to_string())
}

/// Serve status requests until the process exits.
pub async fn serve_status(listener: TcpListener, hub: RelayHub) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let hub = hub.clone();
                tokio::spawn(async move {
                    if let Err(e) = respond(stream, &hub).await {
                        tracing::debug!(peer = %addr, error = %e, "Status request failed");
                    }
                });
            }
            Err(e) => tracing::warn!(error = %e, "Status accept error"),
        }
    }
}

async fn respond(mut stream: TcpStream, hub: &RelayHub) -> std::io::Result<()> {
    // The request itself is irrelevant; read what arrives so the client
    // sees an orderly response instead of a reset.
    let mut buf = [0u8; 1024];
    let _ = tokio::time::timeout(REQUEST_READ_TIMEOUT, stream.read(&mut buf)).await;

    let body = status_json(&hub.status_snapshot().await);
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await
}

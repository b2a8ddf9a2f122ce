//! Accept loop: TCP accept, WebSocket upgrade on the configured path, one
//! task per connection.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;

use crate::connection::handle_connection;
use crate::hub::RelayHub;

/// Serve WebSocket clients on `listener` until the process exits.
///
/// Upgrade requests for any path other than `path` are answered with 404.
pub async fn serve(listener: TcpListener, hub: RelayHub, path: String) {
    let path: Arc<str> = path.into();

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let hub = hub.clone();
                let path = Arc::clone(&path);
                tokio::spawn(async move {
                    let check_path = |req: &Request, resp: Response| {
                        if req.uri().path() == &*path {
                            Ok(resp)
                        } else {
                            tracing::debug!(peer = %addr, path = req.uri().path(), "Upgrade on unknown path");
                            Err(not_found())
                        }
                    };
                    match accept_hdr_async(stream, check_path).await {
                        Ok(ws) => handle_connection(ws, addr, hub).await,
                        Err(e) => {
                            tracing::warn!(peer = %addr, error = %e, "WS handshake failed");
                        }
                    }
                });
            }
            Err(e) => {
                tracing::warn!(error = %e, "TCP accept error");
            }
        }
    }
}

fn not_found() -> ErrorResponse {
    let mut response = ErrorResponse::new(Some("not found".into()));
    *response.status_mut() = StatusCode::NOT_FOUND;
    response
}

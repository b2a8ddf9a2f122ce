//! Socket-level tests: real WebSocket clients against a hub on a loopback port.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use missingdrop_common::{ControlMessage, PairId, Role};
use missingdrop_relay::{serve, HubSettings, RelayHub};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

async fn start_hub() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hub = RelayHub::new(HubSettings::default());
    tokio::spawn(serve(listener, hub, "/ws".to_string()));
    addr
}

async fn client(addr: SocketAddr) -> Client {
    let (ws, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
    ws
}

async fn join(ws: &mut Client, role: &str, pair: u8) {
    let text = format!(r#"{{"type":"join","role":"{role}","pair":{pair}}}"#);
    ws.send(Message::Text(text.into())).await.unwrap();
}

/// Next data or close frame, skipping control pings.
async fn next_message(ws: &mut Client) -> Option<Message> {
    loop {
        let frame = tokio::time::timeout(RECV_TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for a frame");
        match frame {
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
            Some(Ok(msg)) => return Some(msg),
            Some(Err(_)) | None => return None,
        }
    }
}

async fn next_control(ws: &mut Client) -> ControlMessage {
    match next_message(ws).await {
        Some(Message::Text(text)) => ControlMessage::parse(text.as_str()).unwrap(),
        other => panic!("expected a text frame, got {other:?}"),
    }
}

fn status(pair: u8, producer: bool, display: bool) -> ControlMessage {
    ControlMessage::Status {
        pair: PairId(pair),
        producer_present: producer,
        display_present: display,
    }
}

#[tokio::test]
async fn pair_joins_and_frame_is_relayed_byte_exact() {
    let addr = start_hub().await;
    let mut producer = client(addr).await;
    let mut display = client(addr).await;

    join(&mut producer, "producer", 1).await;
    assert_eq!(
        next_control(&mut producer).await,
        ControlMessage::Joined {
            role: Role::Producer,
            pair: PairId(1)
        }
    );
    assert_eq!(next_control(&mut producer).await, status(1, true, false));

    join(&mut display, "display", 1).await;
    assert_eq!(
        next_control(&mut display).await,
        ControlMessage::Joined {
            role: Role::Display,
            pair: PairId(1)
        }
    );
    assert_eq!(next_control(&mut display).await, status(1, true, true));
    assert_eq!(next_control(&mut producer).await, status(1, true, true));

    let frame: Vec<u8> = (0..2048u32).map(|i| (i * 7 % 256) as u8).collect();
    producer
        .send(Message::Binary(frame.clone().into()))
        .await
        .unwrap();

    match next_message(&mut display).await {
        Some(Message::Binary(data)) => assert_eq!(&data[..], &frame[..]),
        other => panic!("expected a binary frame, got {other:?}"),
    }
}

#[tokio::test]
async fn firmware_role_alias_is_accepted() {
    let addr = start_hub().await;
    let mut matrix = client(addr).await;

    join(&mut matrix, "matrix", 2).await;
    assert_eq!(
        next_control(&mut matrix).await,
        ControlMessage::Joined {
            role: Role::Display,
            pair: PairId(2)
        }
    );
}

#[tokio::test]
async fn replaced_display_is_kicked_then_closed() {
    let addr = start_hub().await;
    let mut first = client(addr).await;
    let mut second = client(addr).await;

    join(&mut first, "display", 1).await;
    next_control(&mut first).await;
    next_control(&mut first).await;

    join(&mut second, "display", 1).await;

    assert_eq!(
        next_control(&mut first).await,
        ControlMessage::Kicked {
            reason: "replaced".to_string()
        }
    );
    assert!(matches!(
        next_message(&mut first).await,
        Some(Message::Close(_)) | None
    ));

    assert_eq!(
        next_control(&mut second).await,
        ControlMessage::Joined {
            role: Role::Display,
            pair: PairId(1)
        }
    );
    assert_eq!(next_control(&mut second).await, status(1, false, true));
}

#[tokio::test]
async fn invalid_role_gets_error_without_status() {
    let addr = start_hub().await;
    let mut display = client(addr).await;
    let mut stranger = client(addr).await;

    join(&mut display, "display", 1).await;
    next_control(&mut display).await;
    next_control(&mut display).await;

    join(&mut stranger, "spectator", 1).await;
    assert!(matches!(
        next_control(&mut stranger).await,
        ControlMessage::Error { .. }
    ));

    // The display hears nothing about the rejected join.
    let quiet = tokio::time::timeout(Duration::from_millis(200), display.next()).await;
    assert!(quiet.is_err());
}

#[tokio::test]
async fn closing_producer_updates_display_status() {
    let addr = start_hub().await;
    let mut producer = client(addr).await;
    let mut display = client(addr).await;

    join(&mut display, "display", 2).await;
    next_control(&mut display).await;
    next_control(&mut display).await;
    join(&mut producer, "producer", 2).await;
    assert_eq!(next_control(&mut display).await, status(2, true, true));

    producer.close(None).await.unwrap();

    assert_eq!(next_control(&mut display).await, status(2, false, true));
}

#[tokio::test]
async fn upgrade_on_other_path_is_rejected() {
    let addr = start_hub().await;
    let err = connect_async(format!("ws://{addr}/elsewhere"))
        .await
        .unwrap_err();
    match err {
        tungstenite::Error::Http(response) => assert_eq!(response.status().as_u16(), 404),
        other => panic!("expected an HTTP error, got {other:?}"),
    }
}

#[tokio::test]
async fn client_ping_is_answered_once() {
    let addr = start_hub().await;
    let mut ws = client(addr).await;

    ws.send(Message::Ping(b"keepalive".to_vec().into()))
        .await
        .unwrap();

    let mut pongs = 0;
    while let Ok(Some(Ok(msg))) =
        tokio::time::timeout(Duration::from_millis(300), ws.next()).await
    {
        if let Message::Pong(data) = msg {
            assert_eq!(&data[..], b"keepalive");
            pongs += 1;
        }
    }
    assert_eq!(pongs, 1);
}

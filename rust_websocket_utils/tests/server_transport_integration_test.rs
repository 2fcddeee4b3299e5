// rust_websocket_utils/tests/server_transport_integration_test.rs

//! ServerTransport integration tests: accept loop, handshake and callback dispatch,
//! driven by the crate's own client transport.

use common_models::ws_payloads::{EmptyPayload, GET_CONFIG_MESSAGE_TYPE, KEEP_ALIVE_RESPONSE_MESSAGE_TYPE};
use common_models::ClientType;
use futures_util::{SinkExt, StreamExt};
use log::{info, warn, LevelFilter};
use rust_websocket_utils::client::transport::{connect_client, receive_message};
use rust_websocket_utils::frame::next_text_frame;
use rust_websocket_utils::server::transport::{ServerTransport, WsStream};
use rust_websocket_utils::{WsError, WsMessage};
use std::net::SocketAddr;
use std::sync::mpsc;
use std::time::Duration;
use tokio_tungstenite::tungstenite::protocol::Message as TungsteniteMessage;

fn init_test_logger() {
    let _ = env_logger::builder().filter_level(LevelFilter::Info).is_test(true).try_init();
}

/// Reads the identity preamble and one envelope, reports both, then answers with a
/// `keepAliveResponse` carrying the envelope's id.
async fn test_on_connect_handler(
    ws_stream: WsStream,
    peer_addr: SocketAddr,
    processed_tx: mpsc::Sender<(Option<ClientType>, String)>,
) {
    info!("[Test Server] new connection from {}", peer_addr);
    let (mut sink, mut stream) = ws_stream.split();

    let client_type = match next_text_frame(&mut stream).await {
        Some(Ok(token)) => ClientType::from_identity_token(&token),
        _ => None,
    };
    let envelope = match next_text_frame(&mut stream).await {
        Some(Ok(text)) => WsMessage::from_text(&text).ok(),
        _ => None,
    };
    let message_type = envelope.as_ref().map(|m| m.message_type.clone()).unwrap_or_default();

    if let Some(request) = envelope {
        let response = request
            .reply(KEEP_ALIVE_RESPONSE_MESSAGE_TYPE, &EmptyPayload {})
            .and_then(|m| m.to_text());
        if let Ok(text) = response {
            if sink.send(TungsteniteMessage::Text(text)).await.is_err() {
                warn!("[Test Server] reply to {} failed", peer_addr);
            }
        }
    }

    if processed_tx.send((client_type, message_type)).is_err() {
        warn!("[Test Server] test receiver already gone");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_server_accepts_preamble_and_envelope() {
    init_test_logger();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    let (tx, rx) = mpsc::channel::<(Option<ClientType>, String)>();

    let server_handle = tokio::spawn(async move {
        let on_connect = move |ws_stream: WsStream, peer_addr: SocketAddr| {
            let tx_clone = tx.clone();
            test_on_connect_handler(ws_stream, peer_addr, tx_clone)
        };
        let _ = ServerTransport::serve(listener, on_connect).await;
    });

    let mut conn = connect_client(format!("ws://{}/", addr)).await.expect("client connects");
    conn.send_text(ClientType::User.identity_token()).await.unwrap();
    let request = WsMessage::new(GET_CONFIG_MESSAGE_TYPE, &EmptyPayload {}).unwrap().with_id(1);
    conn.send_message(&request).await.unwrap();

    let reply = tokio::time::timeout(Duration::from_secs(5), receive_message(&mut conn.ws_receiver))
        .await
        .expect("reply in time")
        .expect("connection open")
        .expect("decodable reply");
    assert_eq!(reply.message_type, KEEP_ALIVE_RESPONSE_MESSAGE_TYPE);
    assert_eq!(reply.id, Some(1));

    let (client_type, message_type) = rx.recv_timeout(Duration::from_secs(5)).expect("callback ran");
    assert_eq!(client_type, Some(ClientType::User));
    assert_eq!(message_type, GET_CONFIG_MESSAGE_TYPE);

    let _ = conn.ws_sender.close().await;
    server_handle.abort();
    let _ = server_handle.await;
}

#[tokio::test]
async fn test_start_reports_bind_failure() {
    init_test_logger();

    let occupied = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind ephemeral port");
    let addr = occupied.local_addr().unwrap();

    let result = ServerTransport::start(addr, |_ws: WsStream, _peer: SocketAddr| async {}).await;
    assert!(matches!(result, Err(WsError::IoError(_))));
}

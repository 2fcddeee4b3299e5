// irrigation_client/tests/peer_close_test.rs

//! Teardown started by the authority: the socket goes away under the engine while a
//! request is in flight and a debounced push is still waiting.

use common_models::ws_payloads::{
    GetConfigResponse, GET_CONFIG_MESSAGE_TYPE, GET_CONFIG_RESPONSE_MESSAGE_TYPE, STATUS_MESSAGE_TYPE,
    USER_IDENTITY_TOKEN,
};
use common_models::{ActivePeriod, Schedule, Zone};
use futures_util::{SinkExt, StreamExt};
use irrigation_client::{AppConfig, ClientError, EngineEvent, WebSocketClientService};
use rust_websocket_utils::frame::next_text_frame;
use rust_websocket_utils::message::WsMessage;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::protocol::Message;

/// Accepts one user, answers `getConfig` with a single schedule, then closes the
/// connection as soon as the next request arrives without answering it.
async fn authority_that_hangs_up(listener: TcpListener) {
    let (tcp_stream, _) = listener.accept().await.expect("engine connects");
    let ws_stream = tokio_tungstenite::accept_async(tcp_stream).await.expect("handshake");
    let (mut sink, mut stream) = ws_stream.split();

    let identity = next_text_frame(&mut stream).await.expect("identity frame").unwrap();
    assert_eq!(identity, USER_IDENTITY_TOKEN);

    let get_config = WsMessage::from_text(&next_text_frame(&mut stream).await.unwrap().unwrap()).unwrap();
    assert_eq!(get_config.message_type, GET_CONFIG_MESSAGE_TYPE);
    let config = GetConfigResponse {
        schedules: vec![Schedule::numbered(1)],
        ..GetConfigResponse::default()
    };
    let reply = get_config.reply(GET_CONFIG_RESPONSE_MESSAGE_TYPE, &config).unwrap();
    sink.send(Message::Text(reply.to_text().unwrap())).await.unwrap();

    let unanswered = WsMessage::from_text(&next_text_frame(&mut stream).await.unwrap().unwrap()).unwrap();
    assert_eq!(unanswered.message_type, STATUS_MESSAGE_TYPE);
    let _ = sink.close().await;
}

#[tokio::test]
async fn test_authority_hang_up_tears_the_session_down() {
    let _ = env_logger::builder().is_test(true).try_init();

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind ephemeral port");
    let url = format!("ws://{}/", listener.local_addr().unwrap());
    let authority = tokio::spawn(authority_that_hangs_up(listener));

    let engine = WebSocketClientService::new(&AppConfig {
        request_timeout_ms: 5_000,
        debounce_ms: 60_000,
        ..AppConfig::default()
    });
    let mut events = engine.subscribe();
    engine.connect(&url).await.expect("connects");
    assert_eq!(engine.schedule_sync().schedules().await.len(), 1);

    engine
        .schedule_sync()
        .update_active_period(ActivePeriod::new(Zone::Zone2, 10))
        .await;
    assert!(engine.schedule_sync().has_pending_push().await);

    let result = tokio::time::timeout(Duration::from_secs(2), engine.status())
        .await
        .expect("in-flight request fails before its own timeout");
    assert!(matches!(result, Err(ClientError::ConnectionLost)));
    authority.await.expect("authority side finished cleanly");

    // The down status is the last thing teardown emits.
    let down = EngineEvent::ConnectionStatus { client_connected: false, controller_connected: false };
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if events.recv().await.expect("event bus open") == down {
                break;
            }
        }
    })
    .await
    .expect("teardown reported");

    let state = engine.connection_state().await;
    assert!(!state.client_connected);
    assert!(!state.controller_connected);
    assert!(!engine.schedule_sync().has_pending_push().await);
    assert_eq!(engine.current_session().await, None);

    assert!(matches!(
        engine.zone_control().toggle_zone(Zone::Zone3).await,
        Err(ClientError::NotConnected)
    ));
    assert!(!engine.zone_control().is_on(Zone::Zone3).await);
}

// irrigation_server/src/ws_server/service.rs

//! Accept loop and per-connection lifecycle.
//!
//! A connection is identified by its first text frame (`user` or `controller`); anything
//! else closes it. After that a writer task drains the session's queue into the socket
//! and the reader loop feeds frames to the `MessageRouter` until the peer goes away or a
//! newer session of the same type takes over.

use crate::config::ServerConfig;
use crate::error::AppError;
use crate::state::IrrigationStore;
use crate::ws_server::connection_manager::ConnectionManager;
use crate::ws_server::heartbeat_monitor::HeartbeatMonitor;
use crate::ws_server::message_router::MessageRouter;
use common_models::ClientType;
use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use rust_websocket_utils::frame::next_text_frame;
use rust_websocket_utils::server::transport::{ServerTransport, WsStream};
use rust_websocket_utils::WsError;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::Message as TungsteniteMessage;

/// The WebSocket server: accept loop, per-connection tasks and the heartbeat monitor.
pub struct WsService {
    /// Listen address and heartbeat timings.
    config: ServerConfig,
    /// Shared with the router and the heartbeat monitor.
    connection_manager: Arc<ConnectionManager>,
    router: MessageRouter,
}

/// Stops the heartbeat task when the serving future is dropped or returns.
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

impl WsService {
    /// Wires the registry, router and store together. Nothing is bound until `start` or
    /// `serve` runs.
    pub fn new(config: ServerConfig, store: Arc<IrrigationStore>) -> Arc<Self> {
        let connection_manager = Arc::new(ConnectionManager::new());
        let router = MessageRouter::new(connection_manager.clone(), store, config.controller_timeout());
        Arc::new(Self {
            config,
            connection_manager,
            router,
        })
    }

    /// The session registry, mainly for inspection in tests.
    pub fn connection_manager(&self) -> &Arc<ConnectionManager> {
        &self.connection_manager
    }

    /// Binds the configured address and serves until a fatal error.
    pub async fn start(self: Arc<Self>) -> Result<(), AppError> {
        let addr = self.config.listen_addr()?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| AppError::WebSocketService(format!("binding {} failed: {}", addr, e)))?;
        self.serve(listener).await
    }

    /// Serves on an already bound listener, with the heartbeat monitor running alongside.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> Result<(), AppError> {
        let monitor = HeartbeatMonitor::new(
            self.connection_manager.clone(),
            self.config.controller_timeout(),
            self.config.heartbeat_interval(),
        );
        let _heartbeat = AbortOnDrop(tokio::spawn(monitor.run()));

        let service = Arc::clone(&self);
        let on_connect = move |ws_stream: WsStream, peer_addr: SocketAddr| {
            let service = Arc::clone(&service);
            async move { service.handle_connection(ws_stream, peer_addr).await }
        };
        ServerTransport::serve(listener, on_connect).await?;
        Ok(())
    }

    async fn handle_connection(&self, ws_stream: WsStream, peer_addr: SocketAddr) {
        let (mut ws_sender, mut ws_receiver) = ws_stream.split();

        let client_type = match next_text_frame(&mut ws_receiver).await {
            Some(Ok(token)) => match ClientType::from_identity_token(&token) {
                Some(client_type) => client_type,
                None => {
                    warn!("[WsService] {} sent unknown identity '{}', closing", peer_addr, token);
                    return;
                }
            },
            Some(Err(e)) => {
                warn!("[WsService] {} failed before identifying: {}", peer_addr, e);
                return;
            }
            None => {
                debug!("[WsService] {} closed before identifying", peer_addr);
                return;
            }
        };

        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let session = self.connection_manager.add_client(client_type, peer_addr, tx);

        let writer_session_id = session.session_id;
        let writer_task = tokio::spawn(async move {
            while let Some(text) = rx.recv().await {
                if let Err(e) = ws_sender.send(TungsteniteMessage::Text(text)).await {
                    debug!("[WsService] writer {}: send failed: {}", writer_session_id, e);
                    return;
                }
            }
            let _ = ws_sender.close().await;
        });

        loop {
            let frame = tokio::select! {
                _ = session.closed() => {
                    info!("[WsService] {} {} superseded, closing", client_type, session.session_id);
                    break;
                }
                frame = next_text_frame(&mut ws_receiver) => frame,
            };
            match frame {
                Some(Ok(text)) => self.router.handle_frame(&session, &text).await,
                Some(Err(WsError::Message(reason))) => {
                    debug!("[WsService] {} {}: {} ignored", client_type, session.session_id, reason);
                }
                Some(Err(e)) => {
                    warn!("[WsService] {} {}: transport error: {}", client_type, session.session_id, e);
                    break;
                }
                None => break,
            }
        }

        self.connection_manager.remove_client(client_type, session.session_id);
        writer_task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common_models::ws_payloads::{
        ControllerHeartbeatPayload, KeepAlivePayload, CONTROLLER_HEARTBEAT_MESSAGE_TYPE, KEEP_ALIVE_MESSAGE_TYPE,
        KEEP_ALIVE_RESPONSE_MESSAGE_TYPE,
    };
    use rust_websocket_utils::client::transport::{connect_client, receive_message, ClientConnection};
    use rust_websocket_utils::WsMessage;
    use std::time::Duration;
    use tempfile::TempDir;

    struct Running {
        service: Arc<WsService>,
        url: String,
        task: JoinHandle<()>,
        _dir: TempDir,
    }

    impl Drop for Running {
        fn drop(&mut self) {
            self.task.abort();
        }
    }

    async fn running_service(heartbeat_interval_ms: u64) -> Running {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig {
            heartbeat_interval_ms,
            config_file_path: dir.path().join("irrigation.json"),
            ..ServerConfig::default()
        };
        let store = Arc::new(IrrigationStore::load(&config.config_file_path).unwrap());
        let service = WsService::new(config, store);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}/", listener.local_addr().unwrap());
        let task = tokio::spawn({
            let service = service.clone();
            async move {
                let _ = service.serve(listener).await;
            }
        });
        Running {
            service,
            url,
            task,
            _dir: dir,
        }
    }

    async fn identified(url: &str, client_type: ClientType) -> ClientConnection {
        let mut connection = connect_client(url.to_string()).await.unwrap();
        connection.send_text(client_type.identity_token()).await.unwrap();
        connection
    }

    async fn wait_for<F: Fn() -> bool>(condition: F) {
        for _ in 0..100 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("condition not reached in time");
    }

    #[tokio::test]
    async fn test_unknown_identity_is_dropped() {
        let _ = env_logger::builder().is_test(true).try_init();
        let running = running_service(60_000).await;

        let mut connection = connect_client(running.url.clone()).await.unwrap();
        connection.send_text("gardener").await.unwrap();
        let next = tokio::time::timeout(Duration::from_secs(5), receive_message(&mut connection.ws_receiver))
            .await
            .expect("server closes the connection");
        assert!(!matches!(next, Some(Ok(_))));
        assert_eq!(running.service.connection_manager().client_count(), 0);
    }

    #[tokio::test]
    async fn test_second_user_replaces_first() {
        let _ = env_logger::builder().is_test(true).try_init();
        let running = running_service(60_000).await;
        let (service, url) = (&running.service, &running.url);

        let mut first = identified(url, ClientType::User).await;
        wait_for(|| service.connection_manager().get_client(ClientType::User).is_some()).await;
        let first_id = service.connection_manager().get_client(ClientType::User).unwrap().session_id;

        let mut second = identified(url, ClientType::User).await;
        wait_for(|| {
            service
                .connection_manager()
                .get_client(ClientType::User)
                .is_some_and(|s| s.session_id != first_id)
        })
        .await;

        let ended = tokio::time::timeout(Duration::from_secs(5), receive_message(&mut first.ws_receiver))
            .await
            .expect("first connection is closed");
        assert!(!matches!(ended, Some(Ok(_))));

        let ping = WsMessage::new(KEEP_ALIVE_MESSAGE_TYPE, &KeepAlivePayload {}).unwrap().with_id(3);
        second.send_message(&ping).await.unwrap();
        let pong = tokio::time::timeout(Duration::from_secs(5), receive_message(&mut second.ws_receiver))
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(pong.message_type, KEEP_ALIVE_RESPONSE_MESSAGE_TYPE);
        assert_eq!(pong.id, Some(3));
    }

    #[tokio::test]
    async fn test_user_receives_heartbeats() {
        let _ = env_logger::builder().is_test(true).try_init();
        let running = running_service(50).await;

        let _controller = identified(&running.url, ClientType::Controller).await;
        let mut user = identified(&running.url, ClientType::User).await;

        let mut saw_connected = false;
        for _ in 0..20 {
            let frame = tokio::time::timeout(Duration::from_secs(5), receive_message(&mut user.ws_receiver))
                .await
                .unwrap()
                .unwrap()
                .unwrap();
            assert_eq!(frame.message_type, CONTROLLER_HEARTBEAT_MESSAGE_TYPE);
            if frame.deserialize_payload::<ControllerHeartbeatPayload>().unwrap().is_controller_connected {
                saw_connected = true;
                break;
            }
        }
        assert!(saw_connected);
    }
}

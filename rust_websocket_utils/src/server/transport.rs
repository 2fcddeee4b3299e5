// rust_websocket_utils/src/server/transport.rs

//! Server transport: TCP accept loop plus WebSocket handshake.
//!
//! Each upgraded connection is handed to the `on_connect` callback on its own task.
//! What happens on the connection (preamble, routing) is up to the callback.

use crate::error::WsError;
use log::{error, info};
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{accept_async, WebSocketStream};

pub type WsStream = WebSocketStream<TcpStream>;

pub struct ServerTransport;

impl ServerTransport {
    /// Binds `addr` and serves forever. Only a bind failure makes this return.
    pub async fn start<F, Fut>(addr: SocketAddr, on_connect: F) -> Result<(), WsError>
    where
        F: Fn(WsStream, SocketAddr) -> Fut + Send + Sync + Clone + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(&addr).await?;
        Self::serve(listener, on_connect).await
    }

    /// Serves on an already bound listener, e.g. one bound to port 0 in tests.
    pub async fn serve<F, Fut>(listener: TcpListener, on_connect: F) -> Result<(), WsError>
    where
        F: Fn(WsStream, SocketAddr) -> Fut + Send + Sync + Clone + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        info!("[ServerTransport] listening on {}", listener.local_addr()?);

        loop {
            match listener.accept().await {
                Ok((tcp_stream, peer_addr)) => {
                    info!("[ServerTransport] accepted TCP connection from {}", peer_addr);
                    let on_connect_callback = on_connect.clone();

                    tokio::spawn(async move {
                        match accept_async(tcp_stream).await {
                            Ok(ws_stream) => {
                                info!("[ServerTransport] handshake with {} completed", peer_addr);
                                on_connect_callback(ws_stream, peer_addr).await;
                            }
                            Err(e) => {
                                error!("[ServerTransport] handshake with {} failed: {}", peer_addr, e);
                            }
                        }
                    });
                }
                Err(e) => {
                    error!("[ServerTransport] accept failed: {}. Still listening.", e);
                }
            }
        }
    }
}

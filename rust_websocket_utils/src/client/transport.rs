// rust_websocket_utils/src/client/transport.rs

//! Client transport: opening a connection to an endpoint URL and moving envelopes over it.
//!
//! The connection is split into a sink and a stream right away so that the caller can
//! hand the sink to a writer task and read from the stream on another task.

use crate::error::WsError;
use crate::frame::next_text_frame;
use crate::message::WsMessage;
use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use log::{debug, error, info};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message, WebSocketStream};
use url::Url;

pub type ClientWsStream = WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

pub struct ClientConnection {
    pub ws_sender: SplitSink<ClientWsStream, Message>,
    pub ws_receiver: SplitStream<ClientWsStream>,
}

impl ClientConnection {
    pub async fn send_message(&mut self, message: &WsMessage) -> Result<(), WsError> {
        let msg_json = message.to_text()?;
        debug!("[ClientTransport] sending: {}", msg_json);
        self.ws_sender.send(Message::Text(msg_json)).await?;
        Ok(())
    }

    /// Sends a bare text frame, e.g. the identity preamble.
    pub async fn send_text(&mut self, text: &str) -> Result<(), WsError> {
        debug!("[ClientTransport] sending raw text: {}", text);
        self.ws_sender.send(Message::Text(text.to_string())).await?;
        Ok(())
    }
}

/// Parses `url_str` and performs the WebSocket handshake.
pub async fn connect_client(url_str: String) -> Result<ClientConnection, WsError> {
    info!("[ClientTransport] connecting to {}", url_str);
    let parsed_url =
        Url::parse(&url_str).map_err(|e| WsError::InvalidUrl(format!("'{}': {}", url_str, e)))?;
    if parsed_url.scheme() != "ws" && parsed_url.scheme() != "wss" {
        return Err(WsError::InvalidUrl(format!(
            "'{}': scheme must be ws or wss",
            url_str
        )));
    }

    match connect_async(parsed_url.as_str()).await {
        Ok((ws_stream, response)) => {
            info!("[ClientTransport] connected to {} (HTTP {})", url_str, response.status());
            let (ws_sender, ws_receiver) = ws_stream.split();
            Ok(ClientConnection { ws_sender, ws_receiver })
        }
        Err(e) => {
            error!("[ClientTransport] connecting to {} failed: {}", url_str, e);
            Err(WsError::WebSocketProtocolError(e))
        }
    }
}

/// Reads and decodes the next envelope.
///
/// `Some(Err(WsError::DeserializationError(_)))` and `Some(Err(WsError::Message(_)))`
/// concern a single frame; the stream is still usable afterwards. `None` means the
/// connection is gone.
pub async fn receive_message(
    ws_receiver: &mut SplitStream<ClientWsStream>,
) -> Option<Result<WsMessage, WsError>> {
    match next_text_frame(ws_receiver).await? {
        Ok(text) => Some(WsMessage::from_text(&text)),
        Err(e) => Some(Err(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::transport::{ServerTransport, WsStream};
    use common_models::ws_payloads::{StatusResponse, STATUS_MESSAGE_TYPE, STATUS_RESPONSE_MESSAGE_TYPE};
    use std::net::SocketAddr;
    use tokio::net::TcpListener;
    use tokio::time::{timeout, Duration};

    /// Echo server: answers the first text frame with itself, then answers every
    /// `status` request with a `statusResponse` carrying the same id.
    async fn spawn_echo_server() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(ServerTransport::serve(listener, |ws_stream: WsStream, _peer: SocketAddr| async move {
            let (mut sink, mut stream) = ws_stream.split();
            while let Some(Ok(text)) = next_text_frame(&mut stream).await {
                let reply = match WsMessage::from_text(&text) {
                    Ok(request) => request
                        .reply(STATUS_RESPONSE_MESSAGE_TYPE, &StatusResponse { is_controller_connected: true })
                        .unwrap()
                        .to_text()
                        .unwrap(),
                    Err(_) => text,
                };
                if sink.send(Message::Text(reply)).await.is_err() {
                    break;
                }
            }
        }));
        addr
    }

    #[tokio::test]
    async fn test_client_connect_send_receive() {
        let _ = env_logger::builder().is_test(true).try_init();
        let addr = spawn_echo_server().await;

        let mut conn = connect_client(format!("ws://{}/ws", addr)).await.unwrap();
        conn.send_text("user").await.unwrap();
        let request = WsMessage::new(STATUS_MESSAGE_TYPE, &serde_json::json!({})).unwrap().with_id(9);
        conn.send_message(&request).await.unwrap();

        // The preamble comes back as a non-envelope frame, which is a per-frame error.
        let first = timeout(Duration::from_secs(5), receive_message(&mut conn.ws_receiver)).await.unwrap();
        assert!(matches!(first, Some(Err(WsError::DeserializationError(_)))));

        let second = timeout(Duration::from_secs(5), receive_message(&mut conn.ws_receiver))
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(second.message_type, STATUS_RESPONSE_MESSAGE_TYPE);
        assert_eq!(second.id, Some(9));
        let status: StatusResponse = second.deserialize_payload().unwrap();
        assert!(status.is_controller_connected);
    }

    #[tokio::test]
    async fn test_connect_rejects_invalid_urls() {
        assert!(matches!(connect_client("not a url".to_string()).await, Err(WsError::InvalidUrl(_))));
        assert!(matches!(
            connect_client("http://127.0.0.1:1/".to_string()).await,
            Err(WsError::InvalidUrl(_))
        ));
    }
}

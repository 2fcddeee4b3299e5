// rust_websocket_utils/src/frame.rs

//! Frame-level reading shared by the client and server transports.

use crate::error::WsError;
use futures_util::{Stream, StreamExt};
use log::debug;
use tokio_tungstenite::tungstenite::{protocol::Message, Error as TungsteniteError};

/// Waits for the next text frame.
///
/// Ping, pong and raw frames are skipped. A binary frame yields `WsError::Message`.
/// Returns `None` once the peer closed the connection or the stream ended.
pub async fn next_text_frame<S>(stream: &mut S) -> Option<Result<String, WsError>>
where
    S: Stream<Item = Result<Message, TungsteniteError>> + Unpin,
{
    loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => {
                debug!("[Frame] text frame: '{}'", text);
                break Some(Ok(text));
            }
            Some(Ok(Message::Binary(bin))) => {
                debug!("[Frame] binary frame of {} bytes", bin.len());
                break Some(Err(WsError::Message("unexpected binary frame".to_string())));
            }
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) | Some(Ok(Message::Frame(_))) => {}
            Some(Ok(Message::Close(close_frame))) => {
                debug!("[Frame] close frame: {:?}", close_frame);
                break None;
            }
            Some(Err(TungsteniteError::ConnectionClosed)) | Some(Err(TungsteniteError::AlreadyClosed)) => {
                debug!("[Frame] connection already closed");
                break None;
            }
            Some(Err(e)) => break Some(Err(WsError::WebSocketProtocolError(e))),
            None => break None,
        }
    }
}

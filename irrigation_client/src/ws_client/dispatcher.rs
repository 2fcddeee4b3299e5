// irrigation_client/src/ws_client/dispatcher.rs

//! Outbound request path: id assignment, correlation and the writer queue.
//!
//! Frames are not written to the socket here. They go into an unbounded queue that the
//! session's writer task drains in order, so every caller sees the same ordering of
//! "id assigned, entry recorded, frame queued". The queue sender only exists while a
//! session is attached; without it every send fails with `NotConnected` at once.

use crate::error::ClientError;
use crate::ws_client::correlator::MessageCorrelator;
use common_models::ws_payloads::response_type_for;
use log::{debug, warn};
use rust_websocket_utils::message::WsMessage;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex as TokioMutex};

/// Text frames waiting for the writer task.
pub type OutboundSender = mpsc::UnboundedSender<String>;
pub type OutboundReceiver = mpsc::UnboundedReceiver<String>;

/// Request/response plumbing shared by every engine component that talks to the
/// authority.
///
/// Outlives sessions: each new session `attach`es its writer queue and teardown
/// `detach`es it again.
#[derive(Debug)]
pub struct RequestDispatcher {
    /// Writer queue of the current session. `None` between sessions, which makes every
    /// send fail with `NotConnected`.
    outbound: TokioMutex<Option<OutboundSender>>,
    /// Pending requests by correlation id.
    correlator: MessageCorrelator,
    /// How long `request` waits for the matching response.
    request_timeout: Duration,
}

impl RequestDispatcher {
    /// A detached dispatcher. Requests fail until `attach` is called.
    pub fn new(request_timeout: Duration) -> Self {
        Self {
            outbound: TokioMutex::new(None),
            correlator: MessageCorrelator::new(),
            request_timeout,
        }
    }

    /// Starts routing frames to a new session's writer queue.
    pub async fn attach(&self, sender: OutboundSender) {
        *self.outbound.lock().await = Some(sender);
    }

    /// Drops the writer queue and fails every in-flight request with `ConnectionLost`.
    ///
    /// Dropping the sender lets the writer task flush what is queued and close the socket.
    ///
    /// # Returns
    /// How many requests were failed.
    pub async fn detach(&self) -> usize {
        let previous = self.outbound.lock().await.take();
        let failed = self.correlator.fail_all().await;
        if previous.is_some() {
            debug!("[Dispatcher] detached, {} in-flight request(s) failed", failed);
        }
        failed
    }

    pub async fn is_attached(&self) -> bool {
        self.outbound.lock().await.is_some()
    }

    /// Queues a bare text frame (the identity preamble).
    pub async fn send_text(&self, text: &str) -> Result<(), ClientError> {
        let guard = self.outbound.lock().await;
        let sender = guard.as_ref().ok_or(ClientError::NotConnected)?;
        sender.send(text.to_string()).map_err(|_| ClientError::NotConnected)
    }

    /// Sends `request_type` with `payload` and waits for its response payload.
    ///
    /// # Errors
    /// * `NotConnected` - no session is attached.
    /// * `UnknownRequestType` - `request_type` has no response type.
    /// * `Timeout` - nothing came back within `request_timeout`.
    /// * `ConnectionLost` - the session was torn down while waiting.
    /// * `MalformedFrame` - the response payload did not decode as `R`.
    pub async fn request<P, R>(&self, request_type: &'static str, payload: &P) -> Result<R, ClientError>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let response_type = response_type_for(request_type)
            .ok_or_else(|| ClientError::UnknownRequestType(request_type.to_string()))?;
        let message = WsMessage::new(request_type, payload)?;

        let (id, receiver) = {
            let guard = self.outbound.lock().await;
            let sender = guard.as_ref().ok_or(ClientError::NotConnected)?;
            let id = self.correlator.next_id();
            let text = message.with_id(id).to_text()?;
            let receiver = self.correlator.register(id, request_type, response_type).await;
            if sender.send(text).is_err() {
                self.correlator.discard(id).await;
                return Err(ClientError::NotConnected);
            }
            (id, receiver)
        };
        debug!("[Dispatcher] '{}' sent with id {}", request_type, id);

        match tokio::time::timeout(self.request_timeout, receiver).await {
            Ok(Ok(Ok(response))) => response
                .deserialize_payload::<R>()
                .map_err(|e| ClientError::MalformedFrame(e.to_string())),
            Ok(Ok(Err(e))) => Err(e),
            Ok(Err(_)) => Err(ClientError::ConnectionLost),
            Err(_) => {
                self.correlator.discard(id).await;
                warn!(
                    "[Dispatcher] '{}' (id {}) timed out after {:?}",
                    request_type, id, self.request_timeout
                );
                Err(ClientError::Timeout(request_type.to_string()))
            }
        }
    }

    /// Hands an inbound response to the correlator. `false` if nobody waits for its id.
    pub async fn resolve(&self, message: WsMessage) -> bool {
        self.correlator.resolve(message).await
    }

    /// Requests sent and not yet answered, failed or timed out.
    pub async fn pending_count(&self) -> usize {
        self.correlator.pending_count().await
    }
}

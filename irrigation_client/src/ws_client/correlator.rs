// irrigation_client/src/ws_client/correlator.rs

//! Message Correlator: pairs each in-flight request with the response that answers it.
//!
//! Every request gets a fresh id from a monotonic counter. The id travels in the
//! envelope and the authority echoes it on the response, so responses may arrive in
//! any order. An entry resolves at most once: it is removed from the table before its
//! completion is fired.

use crate::error::ClientError;
use log::{debug, warn};
use rust_websocket_utils::message::WsMessage;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{oneshot, Mutex as TokioMutex};

pub type ResponseResult = Result<WsMessage, ClientError>;

#[derive(Debug)]
struct PendingRequest {
    request_type: &'static str,
    expected_type: &'static str,
    responder: oneshot::Sender<ResponseResult>,
}

#[derive(Debug)]
pub struct MessageCorrelator {
    next_id: AtomicU64,
    pending: TokioMutex<HashMap<u64, PendingRequest>>,
}

impl Default for MessageCorrelator {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageCorrelator {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            pending: TokioMutex::new(HashMap::new()),
        }
    }

    pub fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Records a pending completion for `id`, answered only by `expected_type`.
    pub async fn register(
        &self,
        id: u64,
        request_type: &'static str,
        expected_type: &'static str,
    ) -> oneshot::Receiver<ResponseResult> {
        let (responder, receiver) = oneshot::channel();
        self.pending.lock().await.insert(
            id,
            PendingRequest {
                request_type,
                expected_type,
                responder,
            },
        );
        receiver
    }

    /// Resolves the entry matching `message.id`. Returns `false` if the frame was dropped.
    ///
    /// A response whose type does not answer the recorded request leaves the entry
    /// pending.
    pub async fn resolve(&self, message: WsMessage) -> bool {
        let Some(id) = message.id else {
            warn!("[Correlator] '{}' without correlation id dropped", message.message_type);
            return false;
        };

        let mut pending = self.pending.lock().await;
        let Some(entry) = pending.get(&id) else {
            warn!("[Correlator] '{}' for unknown or stale id {} dropped", message.message_type, id);
            return false;
        };
        if entry.expected_type != message.message_type {
            warn!(
                "[Correlator] id {} was '{}', expected '{}' but got '{}'; dropped",
                id, entry.request_type, entry.expected_type, message.message_type
            );
            return false;
        }
        let Some(entry) = pending.remove(&id) else {
            return false;
        };
        drop(pending);

        debug!("[Correlator] id {} ('{}') resolved", id, entry.request_type);
        if entry.responder.send(Ok(message)).is_err() {
            debug!("[Correlator] caller of id {} is gone", id);
        }
        true
    }

    /// Purges an entry whose caller gave up, e.g. after a timeout.
    pub async fn discard(&self, id: u64) -> bool {
        self.pending.lock().await.remove(&id).is_some()
    }

    /// Fails every pending request with `ConnectionLost`. Returns how many there were.
    pub async fn fail_all(&self) -> usize {
        let drained: Vec<(u64, PendingRequest)> = self.pending.lock().await.drain().collect();
        let count = drained.len();
        for (id, entry) in drained {
            debug!("[Correlator] failing id {} ('{}'): connection lost", id, entry.request_type);
            let _ = entry.responder.send(Err(ClientError::ConnectionLost));
        }
        count
    }

    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }
}

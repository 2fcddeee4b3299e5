// irrigation_client/src/ws_client/service.rs

//! Connection Manager: the engine facade owning one WebSocket session at a time.
//!
//! Session lifecycle:
//!
//! 1. `connect` tears down any current session, opens the transport, starts the writer
//!    task and queues the `user` identity preamble as the very first frame.
//! 2. `client_connected` goes up, the reader task starts, and a `getConfig` round trip
//!    seeds the schedule mirror.
//! 3. Teardown (explicit `close`, peer close or transport error) runs once per session:
//!    both flags drop, in-flight requests fail with `ConnectionLost`, the debounce timer
//!    and keep-alive loop stop.
//!
//! Reconnecting is left to the caller.

use crate::config::AppConfig;
use crate::error::ClientError;
use crate::event::{EngineEvent, EventBus};
use crate::state::{ConnectionState, SharedConnectionState, StaggerSettings};
use crate::ws_client::dispatcher::{OutboundReceiver, RequestDispatcher};
use crate::ws_client::heartbeat::{run_keep_alive_loop, HeartbeatMonitor};
use crate::ws_client::schedule_sync::ScheduleSynchronizer;
use crate::ws_client::zone_control::ZoneController;
use common_models::ws_payloads::{
    GetConfigPayload, GetConfigResponse, KeepAlivePayload, KeepAliveResponse, MessageKind, StatusPayload,
    StatusResponse, GET_CONFIG_MESSAGE_TYPE, GET_CONFIG_RESPONSE_MESSAGE_TYPE, KEEP_ALIVE_MESSAGE_TYPE,
    STATUS_MESSAGE_TYPE, USER_IDENTITY_TOKEN,
};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::SinkExt;
use log::{debug, error, info, warn};
use rust_websocket_utils::client::transport::{self, ClientConnection, ClientWsStream};
use rust_websocket_utils::error::WsError;
use rust_websocket_utils::message::WsMessage;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, Mutex as TokioMutex, RwLock};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::Message as TungsteniteMessage;

/// Identifies one session. A handle of a replaced or closed session is stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionHandle {
    /// Counter value assigned by `connect`, starting at 1.
    session_id: u64,
    /// URL the session was opened to.
    endpoint: String,
}

impl ConnectionHandle {
    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    /// URL passed to `connect`, kept verbatim.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Tasks of the open session. Taken out of the slot exactly once on teardown.
#[derive(Debug)]
struct ActiveSession {
    handle: ConnectionHandle,
    reader_task: JoinHandle<()>,
    /// Dropped, not aborted, so queued frames still go out before the socket closes.
    writer_task: JoinHandle<()>,
    keep_alive_task: Option<JoinHandle<()>>,
}

/// The engine. One instance per remote controller, shared as `Arc`.
///
/// The dispatcher, state and components live as long as the engine; only the transport
/// and its tasks are per session.
#[derive(Debug)]
pub struct WebSocketClientService {
    /// Endpoint from the configuration, used by `connect_configured`.
    endpoint: String,
    /// `None` disables the keep-alive loop.
    keep_alive_interval: Option<Duration>,
    /// Shared with the schedule synchronizer, the zone controller and the keep-alive loop.
    dispatcher: Arc<RequestDispatcher>,
    /// Health flags, also read by the zone controller before it sends anything.
    connection_state: SharedConnectionState,
    events: EventBus,
    heartbeat: HeartbeatMonitor,
    schedule_sync: ScheduleSynchronizer,
    zone_control: ZoneController,
    /// Last stagger flags received from the authority.
    stagger: RwLock<StaggerSettings>,
    /// The current session. Its lock also serializes `connect` against teardown.
    session: TokioMutex<Option<ActiveSession>>,
    /// Source of `ConnectionHandle::session_id`.
    session_counter: AtomicU64,
}

impl WebSocketClientService {
    /// Builds a disconnected engine from `config`. Nothing touches the network yet.
    pub fn new(config: &AppConfig) -> Arc<Self> {
        info!("[ConnectionManager] initialising, endpoint {}", config.endpoint_url());
        let dispatcher = Arc::new(RequestDispatcher::new(config.request_timeout()));
        let connection_state: SharedConnectionState = Arc::new(RwLock::new(ConnectionState::default()));
        let events = EventBus::new();

        Arc::new(Self {
            endpoint: config.endpoint_url(),
            keep_alive_interval: config.keep_alive_interval(),
            heartbeat: HeartbeatMonitor::new(connection_state.clone(), events.clone()),
            schedule_sync: ScheduleSynchronizer::new(dispatcher.clone(), events.clone(), config.debounce()),
            zone_control: ZoneController::new(dispatcher.clone(), connection_state.clone(), events.clone()),
            stagger: RwLock::new(StaggerSettings::default()),
            session: TokioMutex::new(None),
            session_counter: AtomicU64::new(0),
            dispatcher,
            connection_state,
            events,
        })
    }

    /// Connects to the endpoint from the configuration.
    pub async fn connect_configured(self: &Arc<Self>) -> Result<ConnectionHandle, ClientError> {
        let endpoint = self.endpoint.clone();
        self.connect(&endpoint).await
    }

    /// Opens a new session to `url`, replacing the current one if any.
    ///
    /// A failed `getConfig` does not fail the connect: it is logged and reported as
    /// `ScheduleSyncFailed`, and `refresh_config` can be retried.
    pub async fn connect(self: &Arc<Self>, url: &str) -> Result<ConnectionHandle, ClientError> {
        let mut slot = self.session.lock().await;
        if let Some(previous) = slot.take() {
            info!(
                "[ConnectionManager] replacing session {} before connecting",
                previous.handle.session_id
            );
            self.teardown_session(previous, true).await;
        }

        let ClientConnection { ws_sender, ws_receiver } =
            transport::connect_client(url.to_string()).await.map_err(|e| match e {
                WsError::InvalidUrl(reason) => ClientError::InvalidUrl(reason),
                other => ClientError::Transport(other),
            })?;

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let writer_task = tokio::spawn(run_writer(ws_sender, outbound_rx));
        self.dispatcher.attach(outbound_tx).await;
        if let Err(e) = self.dispatcher.send_text(USER_IDENTITY_TOKEN).await {
            self.dispatcher.detach().await;
            writer_task.abort();
            return Err(e);
        }

        {
            let mut state = self.connection_state.write().await;
            state.client_connected = true;
            state.controller_connected = false;
        }
        self.emit_connection_status().await;

        let session_id = self.session_counter.fetch_add(1, Ordering::Relaxed) + 1;
        let handle = ConnectionHandle {
            session_id,
            endpoint: url.to_string(),
        };
        let reader_task = tokio::spawn(Arc::clone(self).run_reader(session_id, ws_receiver));
        let keep_alive_task = self
            .keep_alive_interval
            .map(|interval| tokio::spawn(run_keep_alive_loop(self.dispatcher.clone(), interval)));
        *slot = Some(ActiveSession {
            handle: handle.clone(),
            reader_task,
            writer_task,
            keep_alive_task,
        });
        drop(slot);
        info!("[ConnectionManager] session {} open to {}", session_id, url);

        if let Err(e) = self.refresh_config().await {
            warn!("[ConnectionManager] initial getConfig failed: {}", e);
            self.events.emit(EngineEvent::ScheduleSyncFailed {
                error: format!("getConfig failed: {}", e),
            });
        }
        Ok(handle)
    }

    /// Closes the session `handle` refers to. Returns `false` for a stale handle.
    pub async fn close(&self, handle: &ConnectionHandle) -> bool {
        self.close_session(handle.session_id, true).await
    }

    /// Closes whatever session is current.
    pub async fn disconnect(&self) -> bool {
        let current = self.session.lock().await.as_ref().map(|s| s.handle.session_id);
        match current {
            Some(session_id) => self.close_session(session_id, true).await,
            None => false,
        }
    }

    /// Handle of the open session, `None` while disconnected.
    pub async fn current_session(&self) -> Option<ConnectionHandle> {
        self.session.lock().await.as_ref().map(|s| s.handle.clone())
    }

    /// Snapshot of the health flags.
    pub async fn connection_state(&self) -> ConnectionState {
        self.connection_state.read().await.clone()
    }

    pub async fn is_connected(&self) -> bool {
        self.connection_state.read().await.client_connected
    }

    pub async fn stagger_settings(&self) -> StaggerSettings {
        *self.stagger.read().await
    }

    /// New receiver for engine events. Only events emitted after this call arrive.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    pub fn schedule_sync(&self) -> &ScheduleSynchronizer {
        &self.schedule_sync
    }

    pub fn zone_control(&self) -> &ZoneController {
        &self.zone_control
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// `getConfig` round trip; seeds the mirror and the stagger flags.
    pub async fn refresh_config(&self) -> Result<GetConfigResponse, ClientError> {
        let config: GetConfigResponse = self
            .dispatcher
            .request(GET_CONFIG_MESSAGE_TYPE, &GetConfigPayload {})
            .await?;
        self.apply_config(config.clone()).await;
        Ok(config)
    }

    /// `status` round trip. The answer also overwrites `controller_connected`.
    pub async fn status(&self) -> Result<bool, ClientError> {
        let response: StatusResponse = self.dispatcher.request(STATUS_MESSAGE_TYPE, &StatusPayload {}).await?;
        self.heartbeat.apply_liveness(response.is_controller_connected).await;
        Ok(response.is_controller_connected)
    }

    /// One `keepAlive` round trip, independent of the periodic loop.
    pub async fn keep_alive(&self) -> Result<(), ClientError> {
        let _: KeepAliveResponse = self.dispatcher.request(KEEP_ALIVE_MESSAGE_TYPE, &KeepAlivePayload {}).await?;
        Ok(())
    }

    async fn apply_config(&self, config: GetConfigResponse) {
        *self.stagger.write().await = StaggerSettings {
            stagger_on: config.stagger_on,
            stagger_zones: config.stagger_zones,
        };
        self.schedule_sync.replace_all(config.schedules).await;
    }

    async fn run_reader(self: Arc<Self>, session_id: u64, mut ws_receiver: SplitStream<ClientWsStream>) {
        debug!("[ConnectionManager] (reader {}) started", session_id);
        let reason = loop {
            match transport::receive_message(&mut ws_receiver).await {
                Some(Ok(message)) => self.route_inbound(message).await,
                Some(Err(WsError::DeserializationError(e))) | Some(Err(WsError::Message(e))) => {
                    warn!("[ConnectionManager] (reader {}) malformed frame dropped: {}", session_id, e);
                }
                Some(Err(e)) => break format!("transport error: {}", e),
                None => break "closed by peer".to_string(),
            }
        };
        info!("[ConnectionManager] (reader {}) ended: {}", session_id, reason);
        self.close_session(session_id, false).await;
    }

    async fn route_inbound(&self, message: WsMessage) {
        match message.kind() {
            MessageKind::Unsolicited => {
                if let Err(e) = self.heartbeat.handle_heartbeat(&message).await {
                    warn!("[ConnectionManager] heartbeat dropped: {}", e);
                }
            }
            MessageKind::Response if message.id.is_some() => {
                self.dispatcher.resolve(message).await;
            }
            MessageKind::Response if message.message_type == GET_CONFIG_RESPONSE_MESSAGE_TYPE => {
                // An uncorrelated configuration is an authoritative push.
                match message.deserialize_payload::<GetConfigResponse>() {
                    Ok(config) => {
                        info!("[ConnectionManager] configuration pushed by authority");
                        self.apply_config(config).await;
                    }
                    Err(e) => warn!("[ConnectionManager] pushed configuration dropped: {}", e),
                }
            }
            MessageKind::Response => {
                warn!(
                    "[ConnectionManager] '{}' without correlation id dropped",
                    message.message_type
                );
            }
            MessageKind::Request => {
                warn!(
                    "[ConnectionManager] request type '{}' from authority ignored",
                    message.message_type
                );
            }
            MessageKind::Unknown => {
                warn!("[ConnectionManager] unknown message type '{}' ignored", message.message_type);
            }
        }
    }

    async fn close_session(&self, session_id: u64, abort_reader: bool) -> bool {
        let mut slot = self.session.lock().await;
        if slot.as_ref().map(|s| s.handle.session_id) != Some(session_id) {
            debug!("[ConnectionManager] session {} already closed", session_id);
            return false;
        }
        let Some(session) = slot.take() else {
            return false;
        };
        self.teardown_session(session, abort_reader).await;
        true
    }

    async fn teardown_session(&self, session: ActiveSession, abort_reader: bool) {
        let session_id = session.handle.session_id;
        if let Some(keep_alive_task) = session.keep_alive_task {
            keep_alive_task.abort();
        }
        self.connection_state.write().await.reset();
        // The writer flushes what is queued, then closes the socket.
        let failed = self.dispatcher.detach().await;
        self.schedule_sync.cancel_pending_push().await;
        if abort_reader {
            session.reader_task.abort();
        }
        drop(session.writer_task);

        info!(
            "[ConnectionManager] session {} closed, {} in-flight request(s) failed",
            session_id, failed
        );
        self.emit_connection_status().await;
    }

    async fn emit_connection_status(&self) {
        let state = self.connection_state.read().await.clone();
        self.events.emit(EngineEvent::ConnectionStatus {
            client_connected: state.client_connected,
            controller_connected: state.controller_connected,
        });
    }
}

/// Drains the outbound queue into the socket, then closes it.
async fn run_writer(mut ws_sender: SplitSink<ClientWsStream, TungsteniteMessage>, mut outbound_rx: OutboundReceiver) {
    while let Some(text) = outbound_rx.recv().await {
        if let Err(e) = ws_sender.send(TungsteniteMessage::Text(text)).await {
            error!("[ConnectionManager] (writer) send failed: {}", e);
            break;
        }
    }
    if let Err(e) = ws_sender.close().await {
        debug!("[ConnectionManager] (writer) close: {}", e);
    }
}

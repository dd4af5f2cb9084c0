//! The session: one logical, authenticated connection to the service that
//! survives transport loss.
//!
//! Architecture:
//! - All mutable state lives in one [`SessionState`] behind a mutex that is
//!   never held across an await
//! - Every transport gets a new connection version; callbacks captured under
//!   an older version check it first and only report a diagnostic
//! - Long-lived activity (heartbeat, reconnect timer, event pump) runs in
//!   spawned tasks holding a `Weak` back-reference
//!
//! Usage:
//! ```ignore
//! let client = RtvtClient::new(ClientConfig::new(endpoint, pid, uid), connector);
//! let mut events = client.subscribe();
//! client.login(&token, ts).await?;
//! let stream = client.open_stream(StreamConfig::new("en", "fr")).await?;
//! client.send_voice_frame(&stream, 1, &frame)?;
//! ```

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use serde::Serialize;
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::codes::{self, method};
use crate::config::ClientConfig;
use crate::error::{RtvtError, TransportError};
use crate::events::{Diagnostic, SessionEvent, Transcript};
use crate::messages::{
    self, Empty, LoginAnswer, LoginRequest, RecognizedPush, TranslatedPush, VoiceDataRequest,
    VoiceEndRequest, VoiceStartAnswer, VoiceStartRequest,
};
use crate::registry::StreamRegistry;
use crate::stream::{LocalStreamId, RemoteStreamId, Stream, StreamConfig};
use crate::timer::TaskSlot;
use crate::transport::{Connector, PushMessage, Transport, TransportEvent, TransportLink};

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// Never logged in
    Idle,
    /// Caller-initiated login in progress
    Connecting,
    /// Authenticated, heartbeat running
    Active,
    /// Connection lost; a reconnect is scheduled or running
    Recovering,
    /// Torn down or terminally rejected
    Closed,
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionPhase::Idle => "idle",
            SessionPhase::Connecting => "connecting",
            SessionPhase::Active => "active",
            SessionPhase::Recovering => "recovering",
            SessionPhase::Closed => "closed",
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Credentials {
    pub token: String,
    pub ts: i64,
}

pub(crate) struct SessionState {
    pub phase: SessionPhase,
    /// Incremented for every transport opened.
    pub version: u64,
    pub transport: Option<Arc<dyn Transport>>,
    pub credentials: Option<Credentials>,
    pub may_auto_reconnect: bool,
    pub registry: StreamRegistry,
    pub heartbeat: TaskSlot,
    pub last_heartbeat: Option<Instant>,
    pub reconnect: TaskSlot,
    pub last_reconnect_attempt: Option<Instant>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            phase: SessionPhase::Idle,
            version: 0,
            transport: None,
            credentials: None,
            may_auto_reconnect: false,
            registry: StreamRegistry::default(),
            heartbeat: TaskSlot::default(),
            last_heartbeat: None,
            reconnect: TaskSlot::default(),
            last_reconnect_attempt: None,
        }
    }
}

pub(crate) struct SessionInner {
    pub config: ClientConfig,
    connector: Arc<dyn Connector>,
    state: Mutex<SessionState>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionInner {
    pub fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        // A panic while holding the lock leaves plain data behind; keep going.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    pub fn diagnostic(&self, diagnostic: Diagnostic) {
        self.emit(SessionEvent::ErrorRecorder(diagnostic));
    }

    /// Open a transport, connect, authenticate, and install it as the live
    /// connection. Returns the connection version on success.
    ///
    /// Does not touch `may_auto_reconnect` on failure; callers decide.
    pub async fn establish(self: &Arc<Self>, credentials: &Credentials) -> Result<u64, RtvtError> {
        let url = self.config.service_url();
        let TransportLink { transport, events } = self.connector.open(&url);

        let (version, previous) = {
            let mut st = self.lock_state();
            st.version += 1;
            st.heartbeat.cancel();
            (st.version, st.transport.take())
        };
        if let Some(previous) = previous {
            debug!(version, "closing previous transport");
            previous.close().await;
        }

        info!(version, url = %url, uid = %self.config.uid, "connecting");
        match tokio::time::timeout(self.config.connect_timeout, transport.connect()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(version, error = %e, "connect failed");
                transport.close().await;
                return Err(RtvtError::Connection(e));
            }
            Err(_) => {
                warn!(version, "connect timed out");
                transport.close().await;
                return Err(RtvtError::Connection(TransportError::timeout()));
            }
        }
        self.ensure_current(version, &transport).await?;

        let request = LoginRequest {
            pid: self.config.pid,
            uid: self.config.uid.clone(),
            token: credentials.token.clone(),
            ts: credentials.ts,
            version: codes::PROTOCOL_VERSION.to_string(),
        };
        let body = messages::encode(method::LOGIN, &request)?;
        let reply = transport
            .request(method::LOGIN, body, self.config.request_timeout)
            .await;
        self.ensure_current(version, &transport).await?;

        let answer: Result<LoginAnswer, RtvtError> = match reply {
            Ok(body) => messages::decode(method::LOGIN, &body).map_err(RtvtError::from),
            Err(e) if codes::is_terminal_login_code(e.code) => {
                Err(RtvtError::AuthRejected { code: e.code })
            }
            Err(e) => Err(RtvtError::Request {
                method: method::LOGIN,
                source: e,
            }),
        };
        match answer {
            Ok(LoginAnswer { successed: true }) => {}
            Ok(LoginAnswer { successed: false }) => {
                warn!(version, "login rejected");
                transport.close().await;
                return Err(RtvtError::AuthRejected {
                    code: codes::TOKEN_INVALID,
                });
            }
            Err(e) => {
                warn!(version, code = e.code(), error = %e, "login failed");
                transport.close().await;
                return Err(e);
            }
        }

        {
            let mut st = self.lock_state();
            if st.version == version && st.phase != SessionPhase::Closed {
                st.transport = Some(transport.clone());
                st.phase = SessionPhase::Active;
                st.may_auto_reconnect = self.config.auto_reconnect;
                st.last_heartbeat = Some(Instant::now());
                self.start_heartbeat(&mut st, version, transport.clone());
                tokio::spawn(pump_events(Arc::downgrade(self), version, events));
                info!(version, "session authenticated");
                return Ok(version);
            }
        }

        transport.close().await;
        Err(RtvtError::Superseded {
            current: self.lock_state().version,
        })
    }

    /// Fail with `Superseded` (closing `transport`) if `version` is no
    /// longer current or the session was torn down.
    async fn ensure_current(
        &self,
        version: u64,
        transport: &Arc<dyn Transport>,
    ) -> Result<(), RtvtError> {
        let current = {
            let st = self.lock_state();
            if st.version == version && st.phase != SessionPhase::Closed {
                return Ok(());
            }
            st.version
        };
        debug!(version, current, "login superseded");
        transport.close().await;
        Err(RtvtError::Superseded { current })
    }

    /// Issue a stream-open request. Shared by caller opens and recovery.
    pub async fn voice_start(
        &self,
        transport: &dyn Transport,
        config: &StreamConfig,
    ) -> Result<RemoteStreamId, RtvtError> {
        let body = messages::encode(method::VOICE_START, &VoiceStartRequest::from(config))?;
        let reply = transport
            .request(method::VOICE_START, body, self.config.request_timeout)
            .await
            .map_err(|source| RtvtError::Request {
                method: method::VOICE_START,
                source,
            })?;
        let answer: VoiceStartAnswer = messages::decode(method::VOICE_START, &reply)?;
        Ok(answer.stream_id)
    }

    pub async fn voice_end(
        &self,
        transport: &dyn Transport,
        remote_id: RemoteStreamId,
        last_seq: Option<i64>,
    ) -> Result<(), RtvtError> {
        let body = messages::encode(
            method::VOICE_END,
            &VoiceEndRequest {
                stream_id: remote_id,
                last_seq,
            },
        )?;
        transport
            .request(method::VOICE_END, body, self.config.request_timeout)
            .await
            .map(|_| ())
            .map_err(|source| RtvtError::Request {
                method: method::VOICE_END,
                source,
            })
    }

    /// A request under `version` failed; treat revocation as connection loss.
    pub fn check_revoked(self: &Arc<Self>, version: u64, code: u32) {
        if codes::is_session_revoked(code) {
            warn!(version, code, "session revoked by server");
            self.connection_lost(version, code);
        }
    }

    fn on_transport_closed(self: &Arc<Self>, version: u64) {
        let current = self.lock_state().version;
        if current != version {
            debug!(version, current, "ignoring close from stale transport");
            self.diagnostic(Diagnostic::StaleCallback {
                event: "closed",
                version,
                current,
            });
            return;
        }
        info!(version, "transport closed");
        self.connection_lost(version, codes::CORE_CONNECTION_CLOSED);
    }

    fn on_push(&self, version: u64, push: PushMessage) {
        let PushMessage {
            method: name,
            payload,
            ack,
        } = push;
        ack.ack(messages::encode("ack", &Empty {}).unwrap_or_default());

        let current = self.lock_state().version;
        if current != version {
            self.diagnostic(Diagnostic::StaleCallback {
                event: "push",
                version,
                current,
            });
            return;
        }

        let event = match name.as_str() {
            method::RECOGNIZED_RESULT | method::RECOGNIZED_TEMP_RESULT => {
                messages::decode::<RecognizedPush>(method::RECOGNIZED_RESULT, &payload).map(|p| {
                    let local = self.lock_state().registry.local_for_remote(p.stream_id);
                    let transcript = Transcript::recognized(p, local);
                    if name == method::RECOGNIZED_RESULT {
                        SessionEvent::RecognizedResult(transcript)
                    } else {
                        SessionEvent::RecognizedTempResult(transcript)
                    }
                })
            }
            method::TRANSLATED_RESULT | method::TRANSLATED_TEMP_RESULT => {
                messages::decode::<TranslatedPush>(method::TRANSLATED_RESULT, &payload).map(|p| {
                    let local = self.lock_state().registry.local_for_remote(p.stream_id);
                    let transcript = Transcript::translated(p, local);
                    if name == method::TRANSLATED_RESULT {
                        SessionEvent::TranslatedResult(transcript)
                    } else {
                        SessionEvent::TranslatedTempResult(transcript)
                    }
                })
            }
            other => {
                debug!(version, method = other, "ignoring unknown push");
                return;
            }
        };

        match event {
            Ok(event) => self.emit(event),
            Err(e) => {
                warn!(version, method = %name, error = %e, "undecodable push");
                self.diagnostic(Diagnostic::PushDecodeFailed {
                    method: name,
                    message: e.to_string(),
                });
            }
        }
    }
}

/// Forward transport events for one connection version until it closes.
async fn pump_events(
    inner: Weak<SessionInner>,
    version: u64,
    mut events: mpsc::UnboundedReceiver<TransportEvent>,
) {
    while let Some(event) = events.recv().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        match event {
            TransportEvent::Closed => {
                inner.on_transport_closed(version);
                break;
            }
            TransportEvent::Error(message) => {
                warn!(version, error = %message, "transport error");
                inner.diagnostic(Diagnostic::TransportError { version, message });
            }
            TransportEvent::Push(push) => {
                trace!(version, method = %push.method, "push received");
                inner.on_push(version, push);
            }
        }
    }
    trace!(version, "event pump exiting");
}

/// Point-in-time view of a session, for health endpoints and tests.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub phase: SessionPhase,
    pub connection_version: u64,
    pub may_auto_reconnect: bool,
    pub heartbeat_active: bool,
    pub reconnect_pending: bool,
    pub stream_count: usize,
    pub last_heartbeat_ms_ago: Option<u64>,
}

impl SessionStatus {
    pub fn summary(&self) -> serde_json::Value {
        serde_json::json!({
            "phase": self.phase.as_str(),
            "connection_version": self.connection_version,
            "may_auto_reconnect": self.may_auto_reconnect,
            "heartbeat_active": self.heartbeat_active,
            "reconnect_pending": self.reconnect_pending,
            "streams": self.stream_count,
            "last_heartbeat_ms_ago": self.last_heartbeat_ms_ago,
        })
    }
}

/// Client-side session manager for the voice translation service.
///
/// Cheap to clone; clones share the session.
#[derive(Clone)]
pub struct RtvtClient {
    inner: Arc<SessionInner>,
}

impl RtvtClient {
    pub fn new(config: ClientConfig, connector: Arc<dyn Connector>) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            inner: Arc::new(SessionInner {
                config,
                connector,
                state: Mutex::new(SessionState::default()),
                events,
            }),
        }
    }

    /// Receive every event emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Connect and authenticate. A later `login` supersedes this one, in
    /// which case this returns [`RtvtError::Superseded`].
    pub async fn login(&self, token: &str, ts: i64) -> Result<(), RtvtError> {
        let credentials = Credentials {
            token: token.to_string(),
            ts,
        };
        {
            let mut st = self.inner.lock_state();
            st.credentials = Some(credentials.clone());
            st.phase = SessionPhase::Connecting;
            st.reconnect.cancel();
        }

        match self.inner.establish(&credentials).await {
            Ok(version) => {
                // Streams opened on the replaced connection move to this one.
                self.inner.recover_streams(version).await;
                Ok(())
            }
            Err(e @ RtvtError::Superseded { .. }) => Err(e),
            Err(e) => {
                let mut st = self.inner.lock_state();
                st.may_auto_reconnect = false;
                if st.phase == SessionPhase::Connecting {
                    st.phase = SessionPhase::Idle;
                }
                Err(e)
            }
        }
    }

    /// Close every stream (best effort), stop all timers and drop the
    /// connection. No reconnect happens afterwards.
    pub async fn teardown(&self) {
        let (transport, streams) = {
            let mut st = self.inner.lock_state();
            st.may_auto_reconnect = false;
            st.phase = SessionPhase::Closed;
            st.heartbeat.cancel();
            st.reconnect.cancel();
            (st.transport.take(), st.registry.drain())
        };

        if let Some(transport) = transport {
            let ends = streams.iter().map(|(local_id, remote_id)| {
                let transport = transport.as_ref();
                async move {
                    if let Err(e) = self.inner.voice_end(transport, *remote_id, None).await {
                        debug!(local_id = %local_id, error = %e, "voice end during teardown failed");
                    }
                }
            });
            futures::future::join_all(ends).await;
            transport.close().await;
        }
        info!(streams = streams.len(), "session torn down");
    }

    /// Open a new stream on the live connection.
    pub async fn open_stream(&self, config: StreamConfig) -> Result<Stream, RtvtError> {
        let (version, transport) = self.active_transport()?;

        let remote_id = match self.inner.voice_start(transport.as_ref(), &config).await {
            Ok(id) => id,
            Err(e) => {
                self.inner.check_revoked(version, e.code());
                return Err(e);
            }
        };

        let mut st = self.inner.lock_state();
        if st.version != version {
            let current = st.version;
            drop(st);
            // The remote id belongs to a dead connection; nothing to keep.
            return Err(RtvtError::Superseded { current });
        }
        let local_id = st.registry.allocate();
        st.registry.insert(local_id, config.clone(), remote_id, version);
        info!(local_id = %local_id, remote_id = %remote_id, src = %config.src_lang, dest = %config.dest_lang, "stream opened");
        Ok(Stream::new(local_id, config))
    }

    /// Signal end of voice and forget the stream.
    ///
    /// The stream stops accepting frames immediately; its registry entry is
    /// removed once the service answers, or at once if its remote id belongs
    /// to a replaced connection.
    pub fn close_stream(&self, stream: Stream, last_seq: Option<i64>) {
        let local_id = stream.id();
        let (version, transport, remote_id) = {
            let mut st = self.inner.lock_state();
            let Some((remote_id, issued_under)) = st.registry.begin_close(local_id) else {
                debug!(local_id = %local_id, "close of unknown stream ignored");
                return;
            };
            match st.transport.clone() {
                Some(transport) if issued_under == st.version => (st.version, transport, remote_id),
                // Either no connection or the remote id died with the old one.
                // A pending recovery closes whatever it recreates for this stream.
                _ => {
                    st.registry.remove(local_id);
                    debug!(local_id = %local_id, "stream closed without a live remote id");
                    return;
                }
            }
        };

        let inner = self.inner.clone();
        tokio::spawn(async move {
            let result = inner
                .voice_end(transport.as_ref(), remote_id, last_seq)
                .await;
            inner.lock_state().registry.remove(local_id);
            match result {
                Ok(()) => debug!(local_id = %local_id, "stream closed"),
                Err(e) => {
                    let code = e.code();
                    debug!(local_id = %local_id, error = %e, "voice end failed");
                    inner.diagnostic(Diagnostic::StreamCloseFailed { local_id, code });
                    inner.check_revoked(version, code);
                }
            }
        });
    }

    /// Send one 640-byte voice frame. Validation is local and synchronous;
    /// the request itself is not awaited, failures arrive as diagnostics.
    pub fn send_voice_frame(&self, stream: &Stream, seq: i64, frame: &[u8]) -> Result<(), RtvtError> {
        if frame.len() != codes::VOICE_FRAME_BYTES {
            return Err(RtvtError::FrameLength {
                expected: codes::VOICE_FRAME_BYTES,
                actual: frame.len(),
            });
        }

        let local_id = stream.id();
        let (version, transport, remote_id) = {
            let st = self.inner.lock_state();
            let (remote_id, issued_under) = st
                .registry
                .sendable(local_id)
                .ok_or(RtvtError::UnknownStream(local_id))?;
            // Remote ids from an older connection are stale until recovery commits.
            if issued_under != st.version {
                return Err(RtvtError::NotConnected);
            }
            let transport = st.transport.clone().ok_or(RtvtError::NotConnected)?;
            (st.version, transport, remote_id)
        };

        let body = messages::encode(
            method::VOICE_DATA,
            &VoiceDataRequest {
                stream_id: remote_id,
                seq,
                data: frame.to_vec(),
                ts: chrono::Utc::now().timestamp_millis(),
            },
        )?;

        let inner = self.inner.clone();
        let timeout = self.inner.config.request_timeout;
        tokio::spawn(async move {
            if let Err(e) = transport.request(method::VOICE_DATA, body, timeout).await {
                debug!(local_id = %local_id, seq, error = %e, "voice data failed");
                inner.diagnostic(Diagnostic::VoiceDataFailed {
                    local_id,
                    seq,
                    code: e.code,
                    message: e.message.clone(),
                });
                inner.check_revoked(version, e.code);
            }
        });
        Ok(())
    }

    /// Current server-side id of a stream, if it is still registered.
    pub fn remote_id(&self, stream: &Stream) -> Option<RemoteStreamId> {
        self.inner.lock_state().registry.remote_for_local(stream.id())
    }

    /// Local ids of every open stream.
    pub fn streams(&self) -> Vec<LocalStreamId> {
        self.inner.lock_state().registry.ids()
    }

    pub fn status(&self) -> SessionStatus {
        let st = self.inner.lock_state();
        SessionStatus {
            phase: st.phase,
            connection_version: st.version,
            may_auto_reconnect: st.may_auto_reconnect,
            heartbeat_active: st.heartbeat.is_pending(),
            reconnect_pending: st.reconnect.is_pending(),
            stream_count: st.registry.ids().len(),
            last_heartbeat_ms_ago: st
                .last_heartbeat
                .map(|t| t.elapsed().as_millis() as u64),
        }
    }

    fn active_transport(&self) -> Result<(u64, Arc<dyn Transport>), RtvtError> {
        let st = self.inner.lock_state();
        match (&st.phase, &st.transport) {
            (SessionPhase::Active, Some(transport)) => Ok((st.version, transport.clone())),
            _ => Err(RtvtError::NotConnected),
        }
    }
}

impl std::fmt::Debug for RtvtClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RtvtClient")
            .field("endpoint", &self.inner.config.endpoint)
            .field("uid", &self.inner.config.uid)
            .finish_non_exhaustive()
    }
}

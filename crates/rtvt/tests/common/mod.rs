//! Scripted in-memory service for session tests.
//!
//! `MockServer` is the `Connector`; every `open` creates a numbered
//! connection (0, 1, 2, ...). Requests are answered immediately according to
//! the server's current script and recorded with the (paused) clock time.
//! `voiceStart` on one chosen connection can be held back until released or
//! until that connection closes.

#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::Instant;

use rtvt::codes::{self, method};
use rtvt::messages::{self, Empty, LoginAnswer, VoiceStartAnswer, VoiceStartRequest};
use rtvt::{
    ClientConfig, Connector, PushAck, PushMessage, RemoteStreamId, RtvtClient, SessionEvent,
    Transport, TransportError, TransportEvent, TransportLink,
};

/// How the server treats one connection's connect + login.
#[derive(Debug, Clone, Copy)]
pub enum LoginReply {
    Accept,
    /// Answer `successed: false`
    Reject,
    /// Error answer with this code
    Error(u32),
    /// Fail the connect itself
    ConnectFail,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PingReply {
    Ok,
    Error(u32),
    /// Never answer
    Hang,
}

#[derive(Debug, Clone)]
pub struct Recorded {
    pub conn: usize,
    pub method: String,
    pub payload: Bytes,
    pub at: Instant,
}

impl Recorded {
    pub fn decode<T: DeserializeOwned>(&self) -> T {
        messages::decode("recorded", &self.payload).unwrap()
    }
}

struct Link {
    closed: Arc<watch::Sender<bool>>,
    events: mpsc::UnboundedSender<TransportEvent>,
}

struct ServerState {
    logins: VecDeque<LoginReply>,
    failing_langs: HashSet<String>,
    ping: PingReply,
    voice_data_error: Option<u32>,
    held_voice_start: Option<usize>,
    gate: Arc<watch::Sender<bool>>,
    next_remote: i64,
    links: Vec<Link>,
    urls: Vec<String>,
    connects: Vec<Instant>,
    requests: Vec<Recorded>,
}

#[derive(Clone)]
pub struct MockServer {
    state: Arc<Mutex<ServerState>>,
}

impl MockServer {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ServerState {
                logins: VecDeque::new(),
                failing_langs: HashSet::new(),
                ping: PingReply::Ok,
                voice_data_error: None,
                held_voice_start: None,
                gate: Arc::new(watch::Sender::new(true)),
                next_remote: 1000,
                links: Vec::new(),
                urls: Vec::new(),
                connects: Vec::new(),
                requests: Vec::new(),
            })),
        }
    }

    /// Replies for upcoming logins, in order. Unscripted logins are accepted.
    pub fn script_logins(&self, replies: impl IntoIterator<Item = LoginReply>) {
        self.state.lock().unwrap().logins.extend(replies);
    }

    /// Reject `voiceStart` for streams translating from `lang`.
    pub fn fail_voice_start(&self, lang: &str) {
        self.state.lock().unwrap().failing_langs.insert(lang.to_string());
    }

    pub fn set_ping(&self, reply: PingReply) {
        self.state.lock().unwrap().ping = reply;
    }

    pub fn set_voice_data_error(&self, code: Option<u32>) {
        self.state.lock().unwrap().voice_data_error = code;
    }

    /// Keep `voiceStart` answers on connection `conn` pending until
    /// [`release_voice_start`](Self::release_voice_start) or until the
    /// connection closes, whichever comes first.
    pub fn hold_voice_start(&self, conn: usize) {
        let mut st = self.state.lock().unwrap();
        st.held_voice_start = Some(conn);
        st.gate.send_replace(false);
    }

    pub fn release_voice_start(&self) {
        self.state.lock().unwrap().gate.send_replace(true);
    }

    /// Server-side close of connection `conn`.
    pub fn drop_connection(&self, conn: usize) {
        let st = self.state.lock().unwrap();
        let link = &st.links[conn];
        if !link.closed.send_replace(true) {
            let _ = link.events.send(TransportEvent::Closed);
        }
    }

    pub fn send_error_event(&self, conn: usize, message: &str) {
        let st = self.state.lock().unwrap();
        let _ = st.links[conn]
            .events
            .send(TransportEvent::Error(message.to_string()));
    }

    /// Push `body` on connection `conn`; resolves with the client's ack.
    pub fn push<T: Serialize>(&self, conn: usize, name: &str, body: &T) -> oneshot::Receiver<Bytes> {
        let (ack, rx) = PushAck::new();
        let payload = messages::encode("push", body).unwrap();
        let st = self.state.lock().unwrap();
        st.links[conn]
            .events
            .send(TransportEvent::Push(PushMessage {
                method: name.to_string(),
                payload,
                ack,
            }))
            .unwrap();
        rx
    }

    pub fn connection_count(&self) -> usize {
        self.state.lock().unwrap().links.len()
    }

    pub fn urls(&self) -> Vec<String> {
        self.state.lock().unwrap().urls.clone()
    }

    /// When each connection's connect was attempted.
    pub fn connect_times(&self) -> Vec<Instant> {
        self.state.lock().unwrap().connects.clone()
    }

    pub fn requests(&self, name: &str) -> Vec<Recorded> {
        self.state
            .lock()
            .unwrap()
            .requests
            .iter()
            .filter(|r| r.method == name)
            .cloned()
            .collect()
    }
}

impl Connector for MockServer {
    fn open(&self, url: &str) -> TransportLink {
        let (tx, rx) = mpsc::unbounded_channel();
        let closed = Arc::new(watch::Sender::new(false));
        let mut st = self.state.lock().unwrap();
        let conn = st.links.len();
        st.links.push(Link {
            closed: closed.clone(),
            events: tx.clone(),
        });
        st.urls.push(url.to_string());
        TransportLink {
            transport: Arc::new(MockTransport {
                conn,
                server: self.state.clone(),
                closed,
                events: tx,
                login: Mutex::new(None),
            }),
            events: rx,
        }
    }
}

struct MockTransport {
    conn: usize,
    server: Arc<Mutex<ServerState>>,
    closed: Arc<watch::Sender<bool>>,
    events: mpsc::UnboundedSender<TransportEvent>,
    login: Mutex<Option<LoginReply>>,
}

enum Reply {
    Now(Result<Bytes, TransportError>),
    Hang,
    /// Answer once the gate opens, unless the connection closes first
    Gated(watch::Receiver<bool>, Result<Bytes, TransportError>),
}

/// Resolve once the flag behind `rx` is true.
async fn wait_true(mut rx: watch::Receiver<bool>) {
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

fn ok<T: Serialize>(body: &T) -> Reply {
    Reply::Now(Ok(messages::encode("reply", body).unwrap()))
}

fn err(code: u32) -> Reply {
    Reply::Now(Err(TransportError::new(code, "scripted failure")))
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        let reply = {
            let mut st = self.server.lock().unwrap();
            st.connects.push(Instant::now());
            st.logins.pop_front().unwrap_or(LoginReply::Accept)
        };
        if let LoginReply::ConnectFail = reply {
            return Err(TransportError::new(codes::CORE_CONNECTION_CLOSED, "refused"));
        }
        *self.login.lock().unwrap() = Some(reply);
        Ok(())
    }

    async fn request(
        &self,
        method: &str,
        payload: Bytes,
        _timeout: Duration,
    ) -> Result<Bytes, TransportError> {
        if *self.closed.borrow() {
            return Err(TransportError::closed());
        }

        let login = *self.login.lock().unwrap();
        let reply = {
            let mut st = self.server.lock().unwrap();
            st.requests.push(Recorded {
                conn: self.conn,
                method: method.to_string(),
                payload: payload.clone(),
                at: Instant::now(),
            });
            match method {
                method::LOGIN => match login.unwrap_or(LoginReply::Accept) {
                    LoginReply::Accept => ok(&LoginAnswer { successed: true }),
                    LoginReply::Reject => ok(&LoginAnswer { successed: false }),
                    LoginReply::Error(code) => err(code),
                    LoginReply::ConnectFail => unreachable!(),
                },
                method::PING => match st.ping {
                    PingReply::Ok => ok(&Empty {}),
                    PingReply::Error(code) => err(code),
                    PingReply::Hang => Reply::Hang,
                },
                method::VOICE_START => {
                    let request: VoiceStartRequest = messages::decode("voiceStart", &payload).unwrap();
                    let answer = if st.failing_langs.contains(&request.src_language) {
                        err(800200)
                    } else {
                        st.next_remote += 1;
                        ok(&VoiceStartAnswer {
                            stream_id: RemoteStreamId(st.next_remote),
                        })
                    };
                    match answer {
                        Reply::Now(result) if st.held_voice_start == Some(self.conn) => {
                            Reply::Gated(st.gate.subscribe(), result)
                        }
                        other => other,
                    }
                }
                method::VOICE_DATA => match st.voice_data_error {
                    Some(code) => err(code),
                    None => ok(&Empty {}),
                },
                method::VOICE_END => ok(&Empty {}),
                other => panic!("unexpected method {other}"),
            }
        };

        match reply {
            Reply::Now(result) => result,
            Reply::Hang => std::future::pending().await,
            Reply::Gated(gate, result) => {
                tokio::select! {
                    _ = wait_true(self.closed.subscribe()) => Err(TransportError::closed()),
                    _ = wait_true(gate) => result,
                }
            }
        }
    }

    async fn close(&self) {
        if !self.closed.send_replace(true) {
            let _ = self.events.send(TransportEvent::Closed);
        }
    }
}

pub fn client(server: &MockServer) -> RtvtClient {
    client_with(server, test_config())
}

pub fn client_with(server: &MockServer, config: ClientConfig) -> RtvtClient {
    RtvtClient::new(config, Arc::new(server.clone()))
}

pub fn test_config() -> ClientConfig {
    ClientConfig::new("ws://mock:14001", 7, "user-1")
}

pub fn frame() -> Vec<u8> {
    vec![0u8; codes::VOICE_FRAME_BYTES]
}

/// Let spawned fire-and-forget requests run.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

/// Wait (in paused time) for the first event matching `pred`, returning it
/// and everything skipped on the way.
pub async fn wait_for(
    events: &mut broadcast::Receiver<SessionEvent>,
    pred: impl Fn(&SessionEvent) -> bool,
) -> (SessionEvent, Vec<SessionEvent>) {
    let mut skipped = Vec::new();
    let deadline = Duration::from_secs(300);
    loop {
        let event = tokio::time::timeout(deadline, events.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed");
        if pred(&event) {
            return (event, skipped);
        }
        skipped.push(event);
    }
}

/// Everything already queued on `events`.
pub fn drain(events: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

pub fn is_relogin(event: &SessionEvent) -> bool {
    matches!(event, SessionEvent::ReloginCompleted { .. })
}

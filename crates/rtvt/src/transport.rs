//! Transport contract consumed by the session.
//!
//! The session never touches sockets. It asks a [`Connector`] for a fresh
//! [`TransportLink`] on every login, drives it through [`Transport`], and
//! listens to the link's event channel for closes, errors and pushes.
//!
//! Implementors should:
//! - Resolve `request` with the decoded-or-error answer, or a timeout error
//!   once `timeout` elapses
//! - Emit exactly one [`TransportEvent::Closed`] when the connection ends,
//!   including when the session calls `close`
//! - Never reconnect on their own; the session owns reconnection

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};

use crate::error::TransportError;

/// One request/response connection.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Resolve once the connection is established.
    async fn connect(&self) -> Result<(), TransportError>;

    /// Send a request and wait for its answer body.
    async fn request(
        &self,
        method: &str,
        payload: Bytes,
        timeout: Duration,
    ) -> Result<Bytes, TransportError>;

    /// Close the connection. Idempotent.
    async fn close(&self);
}

/// Factory for transports; called once per login attempt.
pub trait Connector: Send + Sync {
    fn open(&self, url: &str) -> TransportLink;
}

/// A freshly opened transport and its event channel.
pub struct TransportLink {
    pub transport: Arc<dyn Transport>,
    pub events: mpsc::UnboundedReceiver<TransportEvent>,
}

/// Lifecycle events and unsolicited messages from a transport.
#[derive(Debug)]
pub enum TransportEvent {
    Closed,
    Error(String),
    Push(PushMessage),
}

/// A server-initiated message. The receiver must answer via `ack`.
#[derive(Debug)]
pub struct PushMessage {
    pub method: String,
    pub payload: Bytes,
    pub ack: PushAck,
}

/// Completion handle for a push; dropping it without acking leaves the
/// transport to report a missing answer.
#[derive(Debug)]
pub struct PushAck(oneshot::Sender<Bytes>);

impl PushAck {
    pub fn new() -> (Self, oneshot::Receiver<Bytes>) {
        let (tx, rx) = oneshot::channel();
        (Self(tx), rx)
    }

    pub fn ack(self, answer: Bytes) {
        let _ = self.0.send(answer);
    }
}

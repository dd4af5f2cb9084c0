//! rtvt - session client for the real-time voice translation service
//!
//! A [`RtvtClient`] keeps one authenticated connection to the service alive
//! and lets callers open voice streams on it, push 640-byte voice frames, and
//! receive recognition and translation results as [`SessionEvent`]s.
//!
//! ## Connection lifecycle
//!
//! - `login` opens a transport through the caller's [`Connector`], connects,
//!   authenticates and starts the heartbeat
//! - A failed heartbeat, a transport close, or a revoked-session answer
//!   starts recovery
//! - Recovery waits out the reconnect debounce, logs in again with the last
//!   credentials, recreates every open stream in parallel and commits the new
//!   server ids in one step
//!
//! Callers keep using the same [`Stream`] handles across reconnects; only
//! the server-side id behind them changes.
//!
//! ## Transport
//!
//! This crate does not open sockets. Implement [`Transport`] and
//! [`Connector`] over whatever carries the msgpack request/answer frames.
//!
//! ## Configuration
//!
//! [`ClientConfig::from_conf`] builds a client configuration from the
//! layered files and environment handled by the `rtvtconf` crate.

pub mod codes;
pub mod config;
pub mod error;
pub mod events;
pub mod heartbeat;
pub mod messages;
pub mod reconnect;
mod registry;
pub mod session;
pub mod stream;
pub mod telemetry;
mod timer;
pub mod transport;

pub use config::ClientConfig;
pub use error::{CodecError, RtvtError, TransportError};
pub use events::{Diagnostic, SessionEvent, Transcript};
pub use heartbeat::HeartbeatConfig;
pub use reconnect::ReconnectPolicy;
pub use session::{RtvtClient, SessionPhase, SessionStatus};
pub use stream::{LocalStreamId, RemoteStreamId, Stream, StreamConfig};
pub use transport::{Connector, PushAck, PushMessage, Transport, TransportEvent, TransportLink};

pub use rtvtconf::RtvtConfig;

//! Heartbeat supervision for the live connection.
//!
//! One probe loop runs per authenticated connection:
//! - Sleep one interval, then send a `ping` with the short probe timeout
//! - A failed probe means the connection is lost
//! - A successful probe that arrives too long after the previous one also
//!   counts as lost (the loop itself was starved)
//!
//! The loop is held in the session's heartbeat slot, so starting a new one
//! aborts the old one.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::codes::{self, method};
use crate::error::TransportError;
use crate::messages::{self, Empty};
use crate::session::{SessionInner, SessionState};
use crate::transport::Transport;

/// Configuration for heartbeat behavior
#[derive(Debug, Clone)]
pub struct HeartbeatConfig {
    /// How often to probe
    pub interval: Duration,
    /// How long to wait for the probe reply
    pub timeout: Duration,
    /// Extra slack past `interval` before a gap between good probes is fatal
    pub staleness: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            timeout: Duration::from_secs(2),
            staleness: Duration::from_secs(5),
        }
    }
}

impl HeartbeatConfig {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Judge one probe.
    ///
    /// `previous_success` is when the last good probe (or authentication)
    /// completed. Returns the loss code, or `None` if the connection is alive.
    pub fn verdict(
        &self,
        probe: &Result<(), TransportError>,
        previous_success: Option<Instant>,
        now: Instant,
    ) -> Option<u32> {
        if let Err(e) = probe {
            return Some(e.code);
        }
        match previous_success {
            Some(prev) if now.saturating_duration_since(prev) > self.interval + self.staleness => {
                Some(codes::CORE_TIMEOUT)
            }
            _ => None,
        }
    }
}

/// Send one ping and wait at most `timeout` for the answer.
async fn probe(transport: &dyn Transport, timeout: Duration) -> Result<(), TransportError> {
    let body = messages::encode(method::PING, &Empty {})
        .map_err(|e| TransportError::new(codes::CORE_UNKNOWN_ERROR, e.to_string()))?;
    match tokio::time::timeout(timeout, transport.request(method::PING, body, timeout)).await {
        Ok(result) => result.map(|_| ()),
        Err(_) => Err(TransportError::timeout()),
    }
}

impl SessionInner {
    /// Install the probe loop for `version`, replacing any previous one.
    pub(crate) fn start_heartbeat(
        self: &Arc<Self>,
        st: &mut SessionState,
        version: u64,
        transport: Arc<dyn Transport>,
    ) {
        let weak = Arc::downgrade(self);
        let config = self.config.heartbeat.clone();

        st.heartbeat.replace(tokio::spawn(async move {
            debug!(version, interval_ms = config.interval.as_millis() as u64, "heartbeat started");
            loop {
                tokio::time::sleep(config.interval).await;

                let Some(inner) = weak.upgrade() else {
                    break;
                };
                let result = probe(transport.as_ref(), config.timeout).await;
                let now = Instant::now();

                let lost = {
                    let mut st = inner.lock_state();
                    if st.version != version {
                        break;
                    }
                    let lost = config.verdict(&result, st.last_heartbeat, now);
                    if lost.is_none() {
                        st.last_heartbeat = Some(now);
                    }
                    lost
                };

                match lost {
                    None => trace!(version, "heartbeat ok"),
                    Some(code) => {
                        warn!(version, code, "heartbeat failed, connection lost");
                        // Cancels this task's slot; nothing below may await.
                        inner.connection_lost(version, code);
                        break;
                    }
                }
            }
        }));
    }
}

//! Connection loss handling and recovery.
//!
//! Loss → one debounced timer → re-login → recreate every open stream in
//! parallel → commit all results to the registry in one step. Results that
//! come back after the connection they ran on was replaced or lost are
//! discarded whole.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::codes;
use crate::error::RtvtError;
use crate::events::{Diagnostic, SessionEvent};
use crate::registry::RecoveryOutcome;
use crate::session::{SessionInner, SessionPhase, SessionState};

/// Spacing between reconnect attempts.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// Minimum gap between two attempts
    pub interval: Duration,
    /// No attempt is scheduled sooner than this
    pub floor: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            floor: Duration::from_secs(5),
        }
    }
}

impl ReconnectPolicy {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_floor(mut self, floor: Duration) -> Self {
        self.floor = floor;
        self
    }

    /// Delay before the next attempt.
    ///
    /// If the previous attempt started less than one interval ago, wait out
    /// the rest of that interval; otherwise wait one interval. Never less
    /// than `floor`.
    pub fn delay(&self, last_attempt: Option<Instant>, now: Instant) -> Duration {
        let base = match last_attempt {
            Some(last) => {
                let since = now.saturating_duration_since(last);
                if since < self.interval {
                    self.interval - since
                } else {
                    self.interval
                }
            }
            None => self.interval,
        };
        base.max(self.floor)
    }
}

impl SessionInner {
    /// Failure-detection entry point. Safe to call from any callback; a stale
    /// `version` or a session that is not active makes it a no-op.
    pub(crate) fn connection_lost(self: &Arc<Self>, version: u64, code: u32) {
        let transport = {
            let mut st = self.lock_state();
            if st.version != version {
                let current = st.version;
                drop(st);
                debug!(version, current, code, "ignoring loss from stale connection");
                self.diagnostic(Diagnostic::StaleCallback {
                    event: "connection_lost",
                    version,
                    current,
                });
                return;
            }
            if st.phase != SessionPhase::Active {
                debug!(version, phase = st.phase.as_str(), code, "loss ignored outside active phase");
                return;
            }

            info!(version, code, "connection lost");
            st.heartbeat.cancel();
            st.phase = SessionPhase::Recovering;
            let transport = st.transport.take();
            self.schedule_reconnect(&mut st, code);
            transport
        };

        if let Some(transport) = transport {
            tokio::spawn(async move { transport.close().await });
        }
    }

    /// Arm the reconnect timer, or close the session if reconnecting is not
    /// allowed. At most one timer is ever pending.
    pub(crate) fn schedule_reconnect(self: &Arc<Self>, st: &mut SessionState, code: u32) {
        if !st.may_auto_reconnect {
            info!(code, "auto reconnect disabled, closing session");
            st.phase = SessionPhase::Closed;
            self.emit(SessionEvent::SessionClosed { code });
            return;
        }
        if st.reconnect.is_pending() {
            debug!("reconnect already scheduled");
            return;
        }

        let delay = self.config.reconnect.delay(st.last_reconnect_attempt, Instant::now());
        debug!(delay_ms = delay.as_millis() as u64, "scheduling reconnect");

        let weak = Arc::downgrade(self);
        st.reconnect.replace(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = weak.upgrade() {
                inner.attempt_reconnect().await;
            }
        }));
    }

    async fn attempt_reconnect(self: Arc<Self>) {
        let credentials = {
            let mut st = self.lock_state();
            // The timer has fired; a retry must be able to arm a new one.
            st.reconnect.release();
            if st.phase != SessionPhase::Recovering {
                return;
            }
            st.last_reconnect_attempt = Some(Instant::now());
            match st.credentials.clone() {
                Some(credentials) => credentials,
                None => return,
            }
        };

        info!("attempting reconnect");
        match self.establish(&credentials).await {
            Ok(version) => {
                if self.recover_streams(version).await {
                    info!(version, "session recovered");
                    self.emit(SessionEvent::ReloginCompleted {
                        success: true,
                        code: codes::OK,
                    });
                }
            }
            Err(RtvtError::Superseded { current }) => {
                debug!(current, "reconnect superseded");
            }
            Err(err) => {
                let code = err.code();
                let mut st = self.lock_state();
                if st.phase != SessionPhase::Recovering {
                    return;
                }
                if codes::is_terminal_login_code(code) {
                    warn!(code, "credentials rejected during reconnect, giving up");
                    st.may_auto_reconnect = false;
                    st.phase = SessionPhase::Closed;
                    self.emit(SessionEvent::SessionClosed {
                        code: codes::TOKEN_INVALID,
                    });
                } else {
                    warn!(code, error = %err, "reconnect failed");
                    self.emit(SessionEvent::ReloginCompleted {
                        success: false,
                        code,
                    });
                    self.schedule_reconnect(&mut st, code);
                }
            }
        }
    }

    /// Recreate every open stream on connection `version` and commit.
    ///
    /// Returns false when the results were discarded: the connection was
    /// replaced or lost before they could be committed. The registry is then
    /// left exactly as it was.
    pub(crate) async fn recover_streams(self: &Arc<Self>, version: u64) -> bool {
        let (transport, snapshot) = {
            let st = self.lock_state();
            if st.version != version {
                return false;
            }
            let Some(transport) = st.transport.clone() else {
                return false;
            };
            (transport, st.registry.recovery_snapshot())
        };
        if snapshot.is_empty() {
            return true;
        }

        info!(version, streams = snapshot.len(), "recreating streams");
        let transport_ref = transport.as_ref();
        let staged = join_all(snapshot.into_iter().map(|(local_id, config)| async move {
            let result = self
                .voice_start(transport_ref, &config)
                .await
                .map_err(|e| e.code());
            (local_id, result)
        }))
        .await;

        // A recreation that failed because the connection went away says
        // nothing about the stream itself.
        let interrupted = staged.iter().find_map(|(_, result)| match result {
            Err(code) if codes::is_connection_failure(*code) => Some(*code),
            _ => None,
        });

        let orphans = {
            let mut st = self.lock_state();
            if st.version != version || st.phase != SessionPhase::Active || interrupted.is_some() {
                let current = st.version;
                drop(st);
                warn!(version, current, ?interrupted, "recovery interrupted, discarding results");
                self.diagnostic(Diagnostic::RecoveryDiscarded { version, current });
                if let Some(code) = interrupted {
                    self.connection_lost(version, code);
                }
                return false;
            }

            let mut orphans = Vec::new();
            for outcome in st.registry.commit_recovery(staged, version) {
                match outcome {
                    RecoveryOutcome::Recovered {
                        local_id,
                        old_remote,
                        new_remote,
                    } => {
                        debug!(local_id = %local_id, old = %old_remote, new = %new_remote, "stream recovered");
                        self.diagnostic(Diagnostic::StreamRecovered {
                            local_id,
                            remote_id: new_remote,
                        });
                    }
                    RecoveryOutcome::Dropped { local_id, code } => {
                        warn!(local_id = %local_id, code, "stream could not be recreated, dropped");
                        self.diagnostic(Diagnostic::StreamRecoveryFailed { local_id, code });
                    }
                    RecoveryOutcome::Orphaned {
                        local_id,
                        remote_id,
                    } => {
                        debug!(local_id = %local_id, "stream closed during recovery");
                        orphans.push(remote_id);
                    }
                }
            }
            orphans
        };

        for remote_id in orphans {
            if let Err(e) = self.voice_end(transport.as_ref(), remote_id, None).await {
                debug!(remote_id = %remote_id, error = %e, "closing orphaned stream failed");
            }
        }
        true
    }
}

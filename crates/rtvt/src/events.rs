//! Notifications delivered to subscribers of a session.

use serde::Serialize;

use crate::messages::{RecognizedPush, TranslatedPush};
use crate::stream::{LocalStreamId, RemoteStreamId};

/// Everything a caller can observe without polling.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    RecognizedResult(Transcript),
    RecognizedTempResult(Transcript),
    TranslatedResult(Transcript),
    TranslatedTempResult(Transcript),
    /// A reconnect attempt finished. `code` is 0 on success.
    ReloginCompleted { success: bool, code: u32 },
    /// The session is gone for good; no further recovery is attempted.
    SessionClosed { code: u32 },
    /// Non-fatal diagnostics (the `ErrorRecorder` channel).
    ErrorRecorder(Diagnostic),
}

/// A recognition or translation result pushed by the service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transcript {
    /// Resolved through the registry; `None` if the remote id is unknown.
    pub local_id: Option<LocalStreamId>,
    pub remote_id: RemoteStreamId,
    pub text: String,
    pub lang: String,
    pub start_ts: i64,
    pub end_ts: i64,
    pub rec_ts: i64,
    pub task_id: i64,
}

impl Transcript {
    pub(crate) fn recognized(push: RecognizedPush, local_id: Option<LocalStreamId>) -> Self {
        Self {
            local_id,
            remote_id: push.stream_id,
            text: push.asr,
            lang: push.lang,
            start_ts: push.start_ts,
            end_ts: push.end_ts,
            rec_ts: push.rec_ts,
            task_id: push.task_id,
        }
    }

    pub(crate) fn translated(push: TranslatedPush, local_id: Option<LocalStreamId>) -> Self {
        Self {
            local_id,
            remote_id: push.stream_id,
            text: push.trans,
            lang: push.lang,
            start_ts: push.start_ts,
            end_ts: push.end_ts,
            rec_ts: push.rec_ts,
            task_id: push.task_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// A callback from an older connection fired after a newer one replaced it.
    StaleCallback {
        event: &'static str,
        version: u64,
        current: u64,
    },
    TransportError { version: u64, message: String },
    VoiceDataFailed {
        local_id: LocalStreamId,
        seq: i64,
        code: u32,
        message: String,
    },
    StreamRecovered {
        local_id: LocalStreamId,
        remote_id: RemoteStreamId,
    },
    StreamRecoveryFailed { local_id: LocalStreamId, code: u32 },
    StreamCloseFailed { local_id: LocalStreamId, code: u32 },
    /// Recovery finished after its connection was replaced or lost; nothing
    /// committed.
    RecoveryDiscarded { version: u64, current: u64 },
    PushDecodeFailed { method: String, message: String },
}

//! Stream identity and configuration.
//!
//! A [`Stream`] is the caller's handle to one directional voice-translation
//! channel. It carries only the stable local identity and the configuration
//! it was opened with; the server-assigned remote id lives in the session's
//! registry because it changes on every reconnect.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Caller-stable stream identity, assigned once and kept across reconnects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LocalStreamId(pub u64);

impl fmt::Display for LocalStreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Server-assigned stream id, valid only for the connection that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteStreamId(pub i64);

impl fmt::Display for RemoteStreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a stream translates and which results the service should push back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConfig {
    pub src_lang: String,
    pub dest_lang: String,
    /// Push final recognition results.
    pub asr_result: bool,
    /// Push partial (in-progress) recognition results.
    pub asr_temp_result: bool,
    /// Push translation results.
    pub trans_result: bool,
}

impl StreamConfig {
    /// Final recognition and translation on, partial recognition off.
    pub fn new(src_lang: impl Into<String>, dest_lang: impl Into<String>) -> Self {
        Self {
            src_lang: src_lang.into(),
            dest_lang: dest_lang.into(),
            asr_result: true,
            asr_temp_result: false,
            trans_result: true,
        }
    }

    pub fn with_asr_result(mut self, enabled: bool) -> Self {
        self.asr_result = enabled;
        self
    }

    pub fn with_asr_temp_result(mut self, enabled: bool) -> Self {
        self.asr_temp_result = enabled;
        self
    }

    pub fn with_trans_result(mut self, enabled: bool) -> Self {
        self.trans_result = enabled;
        self
    }
}

/// Handle to an open stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stream {
    id: LocalStreamId,
    config: StreamConfig,
}

impl Stream {
    pub(crate) fn new(id: LocalStreamId, config: StreamConfig) -> Self {
        Self { id, config }
    }

    pub fn id(&self) -> LocalStreamId {
        self.id
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }
}

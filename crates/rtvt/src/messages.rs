//! Wire records for every request, answer and push, plus the msgpack codec.
//!
//! Field names follow the service protocol (camelCase msgpack maps).

use bytes::Bytes;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::CodecError;
use crate::stream::{RemoteStreamId, StreamConfig};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub pid: u64,
    pub uid: String,
    pub token: String,
    pub ts: i64,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginAnswer {
    // Spelling is the service's.
    #[serde(default)]
    pub successed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceStartRequest {
    pub src_language: String,
    pub dest_language: String,
    pub asr_result: bool,
    pub asr_temp_result: bool,
    pub trans_result: bool,
}

impl From<&StreamConfig> for VoiceStartRequest {
    fn from(config: &StreamConfig) -> Self {
        Self {
            src_language: config.src_lang.clone(),
            dest_language: config.dest_lang.clone(),
            asr_result: config.asr_result,
            asr_temp_result: config.asr_temp_result,
            trans_result: config.trans_result,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceStartAnswer {
    pub stream_id: RemoteStreamId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceDataRequest {
    pub stream_id: RemoteStreamId,
    pub seq: i64,
    #[serde(with = "serde_bytes")]
    pub data: Vec<u8>,
    /// Capture time, unix milliseconds.
    pub ts: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceEndRequest {
    pub stream_id: RemoteStreamId,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub last_seq: Option<i64>,
}

/// Empty map; used for ping bodies and push acknowledgements.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Empty {}

/// Body of a `recognizedResult` / `recognizedTempResult` push.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognizedPush {
    pub stream_id: RemoteStreamId,
    #[serde(default)]
    pub start_ts: i64,
    #[serde(default)]
    pub end_ts: i64,
    #[serde(default)]
    pub rec_ts: i64,
    #[serde(default)]
    pub asr: String,
    #[serde(default)]
    pub lang: String,
    #[serde(default)]
    pub task_id: i64,
}

/// Body of a `translatedResult` / `translatedTempResult` push.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslatedPush {
    pub stream_id: RemoteStreamId,
    #[serde(default)]
    pub start_ts: i64,
    #[serde(default)]
    pub end_ts: i64,
    #[serde(default)]
    pub rec_ts: i64,
    #[serde(default)]
    pub trans: String,
    #[serde(default)]
    pub lang: String,
    #[serde(default)]
    pub task_id: i64,
}

/// Encode a record as a msgpack map.
pub fn encode<T: Serialize>(what: &'static str, value: &T) -> Result<Bytes, CodecError> {
    rmp_serde::to_vec_named(value)
        .map(Bytes::from)
        .map_err(|source| CodecError::Encode { what, source })
}

/// Decode a msgpack body into a record.
pub fn decode<T: DeserializeOwned>(what: &'static str, body: &[u8]) -> Result<T, CodecError> {
    rmp_serde::from_slice(body).map_err(|source| CodecError::Decode { what, source })
}

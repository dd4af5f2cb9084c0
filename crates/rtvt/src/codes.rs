//! Protocol constants: error codes, method names, fixed sizes.
//!
//! Codes below 100000 come from the transport core; the 3xxxxx range is
//! produced locally by this client; the 8xxxxx range is sent by the service.

/// Success.
pub const OK: u32 = 0;

// Transport core
pub const CORE_UNKNOWN_ERROR: u32 = 20001;
pub const CORE_CONNECTION_CLOSED: u32 = 20002;
pub const CORE_TIMEOUT: u32 = 20003;
pub const CORE_DECODING: u32 = 20006;
pub const CORE_INVALID_CONNECTION: u32 = 20012;

// Client
pub const TOKEN_INVALID: u32 = 300001;
pub const VOICE_LENGTH_ERROR: u32 = 300002;
pub const STREAM_ERROR: u32 = 300003;

// Service
/// The service revoked the session; reconnect even if the socket looks healthy.
pub const SESSION_REVOKED: u32 = 800001;
pub const TOKEN_EXPIRED: u32 = 800101;
pub const TOKEN_REJECTED: u32 = 800103;

/// Version string sent with every login.
pub const PROTOCOL_VERSION: &str = "1.0.3";

/// Exact byte length of one voice frame (20ms of 16kHz mono s16le).
pub const VOICE_FRAME_BYTES: usize = 640;

/// Path appended to the configured endpoint when opening a transport.
pub const SERVICE_PATH: &str = "/service/websocket";

/// Request and push method names.
pub mod method {
    pub const LOGIN: &str = "login";
    pub const PING: &str = "*ping";
    pub const VOICE_START: &str = "voiceStart";
    pub const VOICE_DATA: &str = "voiceData";
    pub const VOICE_END: &str = "voiceEnd";

    pub const RECOGNIZED_RESULT: &str = "recognizedResult";
    pub const RECOGNIZED_TEMP_RESULT: &str = "recognizedTempResult";
    pub const TRANSLATED_RESULT: &str = "translatedResult";
    pub const TRANSLATED_TEMP_RESULT: &str = "translatedTempResult";
}

/// Login failures after which retrying with the same credentials is pointless.
pub fn is_terminal_login_code(code: u32) -> bool {
    matches!(code, TOKEN_EXPIRED | TOKEN_REJECTED | TOKEN_INVALID)
}

/// Request failures that mean the server no longer recognises this session.
pub fn is_session_revoked(code: u32) -> bool {
    code == SESSION_REVOKED
}

/// Request failures caused by the connection going away rather than by the
/// request itself.
pub fn is_connection_failure(code: u32) -> bool {
    matches!(
        code,
        CORE_CONNECTION_CLOSED | CORE_INVALID_CONNECTION | SESSION_REVOKED
    )
}

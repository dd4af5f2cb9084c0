//! Config sections: where the service lives, protocol timing, telemetry.

use serde::{Deserialize, Serialize};

/// Translation service endpoint and the identity the client logs in as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Base endpoint; the websocket path is appended by the client.
    /// Default: ws://127.0.0.1:14001
    #[serde(default = "ServiceConfig::default_endpoint")]
    pub endpoint: String,

    /// Project id issued by the service console.
    #[serde(default)]
    pub pid: u64,

    /// User id this client authenticates as.
    #[serde(default)]
    pub uid: String,
}

impl ServiceConfig {
    fn default_endpoint() -> String {
        "ws://127.0.0.1:14001".to_string()
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            endpoint: Self::default_endpoint(),
            pid: 0,
            uid: String::new(),
        }
    }
}

/// Protocol timing. All values in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Timeout for ordinary requests (login, voiceStart, voiceData, voiceEnd).
    /// Default: 5000
    #[serde(default = "TimingConfig::default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// How long a fresh transport may take to reach the connected state.
    /// Default: 10000
    #[serde(default = "TimingConfig::default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Delay between heartbeat probes.
    /// Default: 5000
    #[serde(default = "TimingConfig::default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,

    /// Timeout for a single heartbeat probe. Must stay below `request_timeout_ms`.
    /// Default: 2000
    #[serde(default = "TimingConfig::default_heartbeat_timeout_ms")]
    pub heartbeat_timeout_ms: u64,

    /// Allowed lateness of a heartbeat before the session is considered lost.
    /// Default: 5000
    #[serde(default = "TimingConfig::default_heartbeat_staleness_ms")]
    pub heartbeat_staleness_ms: u64,

    /// Base spacing between reconnect attempts.
    /// Default: 5000
    #[serde(default = "TimingConfig::default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,

    /// Lower bound for any reconnect delay.
    /// Default: 5000
    #[serde(default = "TimingConfig::default_reconnect_floor_ms")]
    pub reconnect_floor_ms: u64,
}

impl TimingConfig {
    fn default_request_timeout_ms() -> u64 {
        5_000
    }

    fn default_connect_timeout_ms() -> u64 {
        10_000
    }

    fn default_heartbeat_interval_ms() -> u64 {
        5_000
    }

    fn default_heartbeat_timeout_ms() -> u64 {
        2_000
    }

    fn default_heartbeat_staleness_ms() -> u64 {
        5_000
    }

    fn default_reconnect_interval_ms() -> u64 {
        5_000
    }

    fn default_reconnect_floor_ms() -> u64 {
        5_000
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: Self::default_request_timeout_ms(),
            connect_timeout_ms: Self::default_connect_timeout_ms(),
            heartbeat_interval_ms: Self::default_heartbeat_interval_ms(),
            heartbeat_timeout_ms: Self::default_heartbeat_timeout_ms(),
            heartbeat_staleness_ms: Self::default_heartbeat_staleness_ms(),
            reconnect_interval_ms: Self::default_reconnect_interval_ms(),
            reconnect_floor_ms: Self::default_reconnect_floor_ms(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level or full `EnvFilter` directive (trace, debug, info, warn, error).
    /// Default: info
    #[serde(default = "TelemetryConfig::default_log_level")]
    pub log_level: String,
}

impl TelemetryConfig {
    fn default_log_level() -> String {
        "info".to_string()
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
        }
    }
}

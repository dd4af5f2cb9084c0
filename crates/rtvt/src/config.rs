//! Runtime configuration for a session client.

use std::time::Duration;

use rtvtconf::RtvtConfig;

use crate::codes;
use crate::heartbeat::HeartbeatConfig;
use crate::reconnect::ReconnectPolicy;

/// Configuration for [`RtvtClient`](crate::RtvtClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Service endpoint; [`codes::SERVICE_PATH`] is appended per connection.
    pub endpoint: String,
    /// Project id
    pub pid: u64,
    /// User id
    pub uid: String,
    /// Timeout for ordinary requests
    pub request_timeout: Duration,
    /// Time allowed for a transport to connect
    pub connect_timeout: Duration,
    pub heartbeat: HeartbeatConfig,
    pub reconnect: ReconnectPolicy,
    /// Reconnect after an authenticated connection drops
    pub auto_reconnect: bool,
    /// Capacity of the event broadcast channel
    pub event_capacity: usize,
}

impl ClientConfig {
    pub fn new(endpoint: &str, pid: u64, uid: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            pid,
            uid: uid.to_string(),
            request_timeout: Duration::from_millis(5_000),
            connect_timeout: Duration::from_millis(10_000),
            heartbeat: HeartbeatConfig::default(),
            reconnect: ReconnectPolicy::default(),
            auto_reconnect: true,
            event_capacity: 256,
        }
    }

    /// Build from loaded file/env configuration.
    pub fn from_conf(conf: &RtvtConfig) -> Self {
        let t = &conf.timing;
        Self {
            endpoint: conf.service.endpoint.clone(),
            pid: conf.service.pid,
            uid: conf.service.uid.clone(),
            request_timeout: Duration::from_millis(t.request_timeout_ms),
            connect_timeout: Duration::from_millis(t.connect_timeout_ms),
            heartbeat: HeartbeatConfig {
                interval: Duration::from_millis(t.heartbeat_interval_ms),
                timeout: Duration::from_millis(t.heartbeat_timeout_ms),
                staleness: Duration::from_millis(t.heartbeat_staleness_ms),
            },
            reconnect: ReconnectPolicy {
                interval: Duration::from_millis(t.reconnect_interval_ms),
                floor: Duration::from_millis(t.reconnect_floor_ms),
            },
            auto_reconnect: true,
            event_capacity: 256,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_heartbeat(mut self, heartbeat: HeartbeatConfig) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectPolicy) -> Self {
        self.reconnect = reconnect;
        self
    }

    pub fn with_auto_reconnect(mut self, enabled: bool) -> Self {
        self.auto_reconnect = enabled;
        self
    }

    /// Full URL handed to the connector.
    pub fn service_url(&self) -> String {
        format!("{}{}", self.endpoint.trim_end_matches('/'), codes::SERVICE_PATH)
    }
}

//! Builder-style channel/endpoint configuration, modeled on the teacher's
//! `Endpoint` builder (SPEC_FULL.md ambient-stack section).

use std::time::Duration;

/// Per-channel tunables (spec §4.2-§4.4). Mirrors the teacher's `Endpoint`:
/// a plain data struct with `with_*` builder methods and sane defaults.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub polling_interval: Duration,
    pub piggybacking_enabled: bool,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        ChannelConfig {
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(20),
            polling_interval: Duration::from_secs(3),
            piggybacking_enabled: true,
        }
    }
}

impl ChannelConfig {
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_polling_interval(mut self, interval: Duration) -> Self {
        self.polling_interval = interval;
        self
    }

    pub fn with_piggybacking(mut self, enabled: bool) -> Self {
        self.piggybacking_enabled = enabled;
        self
    }

    /// `pollingInterval=0` is the streaming variant (spec §4.3 edge case).
    pub fn streaming(mut self) -> Self {
        self.polling_interval = Duration::ZERO;
        self
    }
}

/// A named, ordered list of channel endpoints plus the cluster/heartbeat
/// knobs a [`super::ChannelSet`] needs (spec §4.6).
#[derive(Debug, Clone, Default)]
pub struct EndpointConfig {
    pub endpoints: Vec<(String, String)>,
    pub heartbeat_interval: Option<Duration>,
    pub cluster_endpoint: Option<String>,
}

impl EndpointConfig {
    pub fn new() -> Self {
        EndpointConfig::default()
    }

    pub fn add_endpoint(mut self, id: impl Into<String>, uri: impl Into<String>) -> Self {
        self.endpoints.push((id.into(), uri.into()));
        self
    }

    pub fn with_heartbeat(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = Some(interval);
        self
    }

    pub fn with_cluster_endpoint(mut self, uri: impl Into<String>) -> Self {
        self.cluster_endpoint = Some(uri.into());
        self
    }
}

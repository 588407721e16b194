//! Channel lifecycle, credentials, and the per-send responder (spec §4.2).

use std::time::{Duration, Instant};

use bytes::Bytes;
use uuid::Uuid;

use crate::message::MessageKind;

use super::config::ChannelConfig;
use super::error::TransportError;

/// `disconnected -> connecting -> connected -> disconnecting -> disconnected`
/// (spec §4.2). `Connecting` may recurse across `failover_uris` entries
/// before surfacing a connect failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

/// Kept as a distinct name for readers coming from the spec's lifecycle
/// diagram; identical to [`ChannelState`].
pub type ChannelLifecycle = ChannelState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    /// `DSCredsCharset` (spec §6): UTF-8 if true, else ISO-8859-1.
    pub utf8_charset: bool,
}

/// Which concrete family of channel this instance realizes (spec §4.4 vs
/// §4.5). Polling/piggyback fields below only apply to `Amf`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Amf,
    DirectHttp,
}

/// A single logical transport to one endpoint (spec §3 "Channel", §4.2).
#[derive(Debug, Clone)]
pub struct Channel {
    pub id: String,
    pub endpoint_uri: String,
    pub kind: ChannelKind,
    pub state: ChannelState,
    pub authenticated: bool,
    pub failover_uris: Vec<String>,
    pub failover_index: Option<usize>,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub credentials: Option<Credentials>,
    pub remote_credentials: Option<Credentials>,

    // PollingChannel state (spec §4.3) — only meaningful for `ChannelKind::Amf`.
    pub polling_ref: u32,
    pub should_poll: bool,
    pub poll_outstanding: bool,
    pub polling_interval: Duration,
    pub piggybacking_enabled: bool,
    pub suppress_handlers: bool,

    // AmfChannel state (spec §4.4).
    pub messaging_version: Option<String>,
    pub needs_config: bool,
    pub flex_client_id: Option<Uuid>,
    pub session_append_uri: Option<String>,

    // DirectHTTPChannel synthetic identity (spec §4.5).
    pub synthetic_client_id: Uuid,
}

impl Channel {
    pub fn new(id: impl Into<String>, endpoint_uri: impl Into<String>, kind: ChannelKind) -> Self {
        Channel::with_config(id, endpoint_uri, kind, ChannelConfig::default())
    }

    pub fn with_config(
        id: impl Into<String>,
        endpoint_uri: impl Into<String>,
        kind: ChannelKind,
        config: ChannelConfig,
    ) -> Self {
        Channel {
            id: id.into(),
            endpoint_uri: endpoint_uri.into(),
            kind,
            state: ChannelState::Disconnected,
            authenticated: false,
            failover_uris: Vec::new(),
            failover_index: None,
            request_timeout: config.request_timeout,
            connect_timeout: config.connect_timeout,
            credentials: None,
            remote_credentials: None,
            polling_ref: 0,
            should_poll: false,
            poll_outstanding: false,
            polling_interval: config.polling_interval,
            piggybacking_enabled: config.piggybacking_enabled,
            suppress_handlers: false,
            messaging_version: None,
            needs_config: false,
            flex_client_id: None,
            session_append_uri: None,
            synthetic_client_id: Uuid::new_v4(),
        }
    }

    pub fn set_failover_uris(&mut self, uris: Vec<String>) {
        self.failover_uris = uris;
    }

    pub fn set_credentials(&mut self, creds: Credentials) {
        self.credentials = Some(creds);
    }

    pub fn effective_uri(&self) -> &str {
        self.session_append_uri
            .as_deref()
            .unwrap_or(&self.endpoint_uri)
    }

    pub fn connected(&self) -> bool {
        self.state == ChannelState::Connected
    }

    /// Invariant (spec §3): `connected=true` implies a live transport; this
    /// is the caller-visible half of that invariant (the other half —
    /// actually holding a live socket — lives in the transport injected via
    /// [`super::HttpTransport`]).
    pub fn assert_invariant(&self) {
        debug_assert!(!self.connected() || self.state == ChannelState::Connected);
    }
}

/// Per-send HTTP response shape returned by the injected [`super::HttpTransport`].
#[derive(Debug, Clone)]
pub struct RawHttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl RawHttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Retained per outbound send until the transport returns a correlated
/// result, fault, or timeout (spec §4.2 "MessageResponder").
#[derive(Debug, Clone)]
pub struct MessageResponder {
    pub agent_id: Uuid,
    pub message_id: Uuid,
    pub sent_at: Instant,
    pub timeout: Option<Duration>,
}

impl MessageResponder {
    pub fn new(agent_id: Uuid, message: &MessageKind, timeout: Option<Duration>) -> Self {
        MessageResponder {
            agent_id,
            message_id: message.message_id(),
            sent_at: Instant::now(),
            timeout,
        }
    }

    pub fn is_expired(&self) -> bool {
        match self.timeout {
            Some(t) => self.sent_at.elapsed() >= t,
            None => false,
        }
    }
}

pub fn timeout_fault(channel_id: &str) -> TransportError {
    TransportError::CallFailed {
        channel_id: channel_id.to_string(),
        reason: "request timed out".to_string(),
    }
}

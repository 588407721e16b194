//! `ChannelSet`: hunting/failover across channels, the pending-send queue,
//! cluster endpoint discovery, heartbeats, and login/logout (spec §4.6).

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::{Duration, Instant};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use uuid::Uuid;

use crate::codec::AmfValue;
use crate::message::{CommandOperation, MessageHeader, MessageKind};

use super::channel::{Channel, ChannelKind, ChannelState, Credentials, MessageResponder};
use super::error::TransportError;
use super::{HttpTransport, RawHttpResponse};

/// Charset flag header for base64 login credentials (spec §6).
pub const DS_CREDS_CHARSET_HEADER: &str = "DSCredsCharset";
/// Heartbeat flag on a `Command(ping)` (spec §4.6 "Heartbeat").
pub const DS_HEARTBEAT_HEADER: &str = "DSHeartbeat";

/// One outstanding send awaiting a result/fault from the current channel.
#[derive(Debug)]
struct PendingSend {
    message: MessageKind,
    responder: MessageResponder,
    /// Mirrors the owning agent's `needsConfig` (spec §4.7 `MessageAgent`);
    /// a `ping` drained from the queue with this set gets a `DSNeedsConfig`
    /// header installed before forwarding (spec §4.6).
    needs_config: bool,
}

/// What happened to one pending-send drained by [`ChannelSet::send_next`].
#[derive(Debug)]
pub enum DrainOutcome {
    /// Forwarded over the wire; here is the raw response.
    Sent(RawHttpResponse),
    /// `trigger-connect` operations are acknowledged locally and never put
    /// on the wire (spec §4.6 "pending-send queue").
    LocallyAcknowledged,
}

/// Hunts across an ordered list of channels until one connects, queues
/// sends so they survive failover, and owns the cluster/heartbeat/auth
/// bookkeeping shared by every agent on the set (spec §4.6).
#[derive(Debug)]
pub struct ChannelSet {
    pub channels: Vec<Channel>,
    /// Index into `channels` of the channel currently being hunted or in
    /// use; `None` before the first `connect()`.
    current: Option<usize>,
    pending: VecDeque<PendingSend>,
    /// De-dups re-sends of the same message while failover is in progress
    /// (spec §4.6 "pending-send queue with dedup").
    queued_ids: HashSet<Uuid>,
    credentials: Option<Credentials>,
    /// Credentials awaiting a login ack/fault; only one login may be in
    /// flight at a time (spec §4.6 "Only one login/logout may be in
    /// flight; attempting a second fails with a state error").
    pending_login: Option<Credentials>,
    heartbeat_interval: Option<Duration>,
    last_heartbeat: Option<Instant>,
    cluster_endpoint: Option<String>,
    /// Flattened cluster endpoint discovery result, channel-id → failover
    /// uri sequence (spec §3 `ChannelSet.channelFailoverURIs`).
    channel_failover_uris: HashMap<String, Vec<String>>,
}

impl ChannelSet {
    pub fn new(channels: Vec<Channel>) -> Self {
        ChannelSet {
            channels,
            current: None,
            pending: VecDeque::new(),
            queued_ids: HashSet::new(),
            credentials: None,
            pending_login: None,
            heartbeat_interval: None,
            last_heartbeat: None,
            cluster_endpoint: None,
            channel_failover_uris: HashMap::new(),
        }
    }

    pub fn with_heartbeat(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = Some(interval);
        self
    }

    pub fn with_cluster_endpoint(mut self, uri: impl Into<String>) -> Self {
        self.cluster_endpoint = Some(uri.into());
        self
    }

    pub fn current_channel(&self) -> Option<&Channel> {
        self.current.map(|i| &self.channels[i])
    }

    fn current_channel_mut(&mut self) -> Option<&mut Channel> {
        self.current.map(move |i| &mut self.channels[i])
    }

    pub fn connected(&self) -> bool {
        self.current_channel().map(Channel::connected).unwrap_or(false)
    }

    /// Hunt: try each channel in order starting just after the last
    /// attempted one, stopping at the first that connects (spec §4.6
    /// "hunting/failover cursor"). `ping` builds the connect-time probe for
    /// a given channel (AMF ping, or a no-op for direct HTTP channels).
    pub async fn connect(
        &mut self,
        transport: &dyn HttpTransport,
        mut ping: impl FnMut(&Channel) -> (bytes::Bytes, String),
    ) -> Result<(), TransportError> {
        let start = self.current.map(|i| i + 1).unwrap_or(0);
        let n = self.channels.len();
        if n == 0 {
            return Err(TransportError::ConnectFailed {
                channel_id: String::new(),
                reason: "channel set is empty".to_string(),
            });
        }

        let mut last_err = None;
        for offset in 0..n {
            let idx = (start + offset) % n;
            let outcome = {
                let channel = &mut self.channels[idx];
                match channel.kind {
                    ChannelKind::DirectHttp => {
                        channel.state = ChannelState::Connected;
                        Ok(None)
                    }
                    ChannelKind::Amf => {
                        let (body, content_type) = ping(channel);
                        super::amf_channel::AmfChannel::connect(channel, transport, body, &content_type)
                            .await
                    }
                }
            };
            match outcome {
                Ok(_fault) => {
                    tracing::debug!(channel_id = %self.channels[idx].id, "hunt settled on channel");
                    self.current = Some(idx);
                    return Ok(());
                }
                Err(e) => {
                    tracing::debug!(channel_id = %self.channels[idx].id, error = %e, "hunt advancing to next channel");
                    last_err = Some(e);
                }
            }
        }
        // Hunt exhaustion (spec §8 property 4): every channel failed, so
        // the cursor resets rather than staying parked on the last one
        // tried.
        tracing::warn!("hunt exhausted all {n} channels");
        self.current = None;
        Err(last_err.unwrap_or(TransportError::ConnectFailed {
            channel_id: String::new(),
            reason: "no channel available".to_string(),
        }))
    }

    pub fn disconnect(&mut self) {
        if let Some(channel) = self.current_channel_mut() {
            channel.state = ChannelState::Disconnected;
        }
        self.pending.clear();
        self.queued_ids.clear();
    }

    pub fn set_credentials(&mut self, creds: Credentials) {
        self.credentials = Some(creds.clone());
        if let Some(channel) = self.current_channel_mut() {
            channel.set_credentials(creds);
        }
    }

    /// Build the synthetic login command (spec §4.6 "Authentication
    /// (login/logout)"): body is base64 of `user:password`, charset flagged
    /// via `DSCredsCharset` when UTF-8. Fails if a login is already in
    /// flight.
    pub fn login(&mut self, creds: Credentials) -> Result<MessageKind, TransportError> {
        if self.pending_login.is_some() {
            tracing::warn!("login rejected: one already in flight");
            return Err(TransportError::ConcurrentLogin);
        }
        tracing::debug!(username = %creds.username, "login command built");
        let token = format!("{}:{}", creds.username, creds.password);
        // `String` is always UTF-8 in Rust; ISO-8859-1 re-encoding of
        // non-ASCII credentials is left to the caller per spec §6 — the
        // wire bytes are identical for the ASCII-only common case either
        // way, only the `DSCredsCharset` header differs.
        let body = STANDARD.encode(token.as_bytes());
        let mut header = MessageHeader::new("");
        if creds.utf8_charset {
            header = header.with_header(DS_CREDS_CHARSET_HEADER, AmfValue::string("UTF-8"));
        }
        self.pending_login = Some(creds);
        Ok(MessageKind::Command {
            header,
            operation: CommandOperation::Login,
            body: AmfValue::string(body),
        })
    }

    /// Credentials propagate to every member channel and the set itself
    /// once the login ack arrives (spec §4.6).
    pub fn handle_login_ack(&mut self) {
        let Some(creds) = self.pending_login.take() else { return };
        tracing::debug!(username = %creds.username, "login acknowledged, credentials propagated");
        self.credentials = Some(creds.clone());
        for channel in &mut self.channels {
            channel.set_credentials(creds.clone());
            channel.authenticated = true;
        }
    }

    /// A login fault discards the attempt; existing state is unchanged
    /// (spec §4.6 "On fault: auth agent discarded, state unchanged").
    pub fn handle_login_fault(&mut self) {
        tracing::warn!("login fault, attempt discarded");
        self.pending_login = None;
    }

    pub fn logout(&mut self) -> Option<MessageKind> {
        tracing::debug!("logout, credentials cleared across all member channels");
        self.credentials = None;
        for channel in &mut self.channels {
            channel.authenticated = false;
            channel.credentials = None;
        }
        self.current_channel()?;
        Some(MessageKind::command("", CommandOperation::Logout))
    }

    /// Enqueue a send for the current channel; returns `false` (no-op) if
    /// this `message_id` is already pending, which is how failover avoids
    /// double-delivery when a send is retried against the next channel.
    /// `needs_config` mirrors the owning agent's `needsConfig` attribute
    /// (spec §4.7) and is consulted by [`Self::send_next`] when draining.
    pub fn enqueue(
        &mut self,
        agent_id: Uuid,
        message: MessageKind,
        timeout: Option<Duration>,
        needs_config: bool,
    ) -> bool {
        let id = message.message_id();
        if !self.queued_ids.insert(id) {
            return false;
        }
        let responder = MessageResponder::new(agent_id, &message, timeout);
        self.pending.push_back(PendingSend {
            message,
            responder,
            needs_config,
        });
        true
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Pop and send the oldest pending message through the current channel,
    /// applying the spec §4.6 drain rules first: `trigger-connect`
    /// operations are acknowledged locally and dropped without forwarding,
    /// and a `ping` whose agent `needsConfig` gets a `DSNeedsConfig` header
    /// installed before it goes out. Returns `None` when the queue is
    /// empty.
    pub async fn send_next(
        &mut self,
        transport: &dyn HttpTransport,
        encode: impl FnOnce(&MessageKind) -> (bytes::Bytes, String),
    ) -> Option<Result<(MessageResponder, DrainOutcome), TransportError>> {
        let mut item = self.pending.pop_front()?;
        self.queued_ids.remove(&item.message.message_id());

        if let MessageKind::Command {
            operation: CommandOperation::TriggerConnect,
            ..
        } = &item.message
        {
            tracing::debug!("trigger-connect acknowledged locally, dropped from queue");
            return Some(Ok((item.responder, DrainOutcome::LocallyAcknowledged)));
        }

        if item.needs_config {
            if let MessageKind::Command {
                header,
                operation: CommandOperation::Ping,
                ..
            } = &mut item.message
            {
                header.headers.insert(
                    super::amf_channel::DS_NEEDS_CONFIG_HEADER.to_string(),
                    AmfValue::Bool(true),
                );
            }
        }

        let current_idx = self.current?;
        let channel = &self.channels[current_idx];
        let (body, content_type) = encode(&item.message);
        let result = transport
            .send(channel.effective_uri(), "POST", &content_type, body)
            .await;
        Some(result.map(|resp| (item.responder, DrainOutcome::Sent(resp))))
    }

    /// Expire any pending sends whose per-message timeout has elapsed,
    /// draining them and returning their responders for fault dispatch.
    pub fn expire_timed_out(&mut self) -> Vec<MessageResponder> {
        let mut expired = Vec::new();
        let mut remaining = VecDeque::with_capacity(self.pending.len());
        while let Some(item) = self.pending.pop_front() {
            if item.responder.is_expired() {
                self.queued_ids.remove(&item.message.message_id());
                expired.push(item.responder);
            } else {
                remaining.push_back(item);
            }
        }
        self.pending = remaining;
        expired
    }

    /// Spec §8 property 8: the heartbeat timer is suppressed while the
    /// current channel has an outstanding poll in flight, since a poll
    /// round-trip already serves as a liveness signal.
    pub fn due_for_heartbeat(&self, now: Instant) -> bool {
        if self.current_channel().map(|c| c.poll_outstanding).unwrap_or(false) {
            return false;
        }
        match (self.heartbeat_interval, self.last_heartbeat) {
            (Some(interval), Some(last)) => now.duration_since(last) >= interval,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    pub fn mark_heartbeat_sent(&mut self, now: Instant) {
        self.last_heartbeat = Some(now);
    }

    /// Build the heartbeat probe (spec §4.6 "a Command(ping) with header
    /// `heartbeat=true` is sent"), mirroring how [`Self::login`] and
    /// [`Self::logout`] build their own commands.
    pub fn heartbeat_ping(&self) -> MessageKind {
        let mut header = MessageHeader::new("");
        header = header.with_header(DS_HEARTBEAT_HEADER, AmfValue::Bool(true));
        MessageKind::Command {
            header,
            operation: CommandOperation::Ping,
            body: AmfValue::Undefined,
        }
    }

    /// Parse a `cluster-request` response body — a sequence of
    /// `{channel-id -> endpoint-uri}` mappings — flatten it into
    /// `channelFailoverURIs` (channel-id -> uri sequence), and assign each
    /// current or lazily-materialized channel its failover URI sequence
    /// (spec §4.6/§3 "cluster endpoint discovery").
    pub fn apply_cluster_discovery(&mut self, body: &AmfValue) {
        let AmfValue::Array(cell) = body else { return };
        let kind = self
            .current_channel()
            .map(|c| c.kind)
            .unwrap_or(ChannelKind::Amf);

        for mapping in cell.borrow().dense.iter() {
            let AmfValue::Object(obj) = mapping else { continue };
            let obj = obj.borrow();
            for (channel_id, uri) in obj.dynamic.iter() {
                let AmfValue::String(uri) = uri else { continue };
                self.channel_failover_uris
                    .entry(channel_id.clone())
                    .or_default()
                    .push(uri.to_string());
            }
        }

        for (channel_id, uris) in self.channel_failover_uris.clone() {
            if let Some(channel) = self.channels.iter_mut().find(|c| c.id == channel_id) {
                channel.set_failover_uris(uris);
            } else {
                // Lazily materialize: not yet a member of the set, so the
                // first discovered uri becomes its endpoint and the rest
                // its failover sequence.
                let Some((endpoint, rest)) = uris.split_first() else { continue };
                let mut channel = Channel::new(channel_id, endpoint.clone(), kind);
                channel.set_failover_uris(rest.to_vec());
                self.channels.push(channel);
            }
        }
    }
}

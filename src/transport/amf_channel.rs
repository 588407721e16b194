//! `AmfChannel`: ping probe, session continuity, and `Client.Authentication`
//! handling layered onto [`Channel`] (spec §4.4).

use crate::codec::AmfValue;
use crate::message::{CommandOperation, MessageHeader, MessageKind};

use super::channel::{Channel, ChannelKind, ChannelState};
use super::error::TransportError;
use super::{HttpTransport, RawHttpResponse};

/// Header the server echoes back with a session id to append to subsequent
/// request URIs (spec §4.4 "session continuity via DSId").
pub const DSID_HEADER: &str = "DSId";
pub const APPEND_TO_GATEWAY_URL_HEADER: &str = "AppendToGatewayUrl";
pub const DS_MESSAGING_VERSION_HEADER: &str = "DSMessagingVersion";
pub const DS_NEEDS_CONFIG_HEADER: &str = "DSNeedsConfig";

/// Like [`super::polling::PollingChannel`], this is a behavior module over
/// `&mut Channel` rather than a distinct owned type — BlazeDS's `AMFChannel
/// extends PollingChannel extends Channel` single-inheritance chain is
/// flattened into one struct plus composable free functions.
#[derive(Debug)]
pub struct AmfChannel;

impl AmfChannel {
    pub fn new_channel(id: impl Into<String>, endpoint_uri: impl Into<String>) -> Channel {
        Channel::new(id, endpoint_uri, ChannelKind::Amf)
    }

    /// Build the connect-time ping probe (spec §4.4: "also carries
    /// `messagingVersion` and, optionally, `needsConfig=true`").
    pub fn build_ping(channel: &Channel) -> MessageKind {
        let mut header = MessageHeader::new("");
        if let Some(version) = &channel.messaging_version {
            header = header.with_header(DS_MESSAGING_VERSION_HEADER, AmfValue::string(version.clone()));
        }
        if channel.needs_config {
            header = header.with_header(DS_NEEDS_CONFIG_HEADER, AmfValue::Bool(true));
        }
        MessageKind::Command {
            header,
            operation: CommandOperation::Ping,
            body: AmfValue::Undefined,
        }
    }

    /// Interpret the ping response: apply session continuity headers and
    /// resolve the messaging version / needsConfig flags.
    ///
    /// `Client.Authentication` faults surfaced at ping time do not fail the
    /// connect attempt — the channel still reports `connected` (spec §4.4
    /// edge case) — so this returns `Ok` with the channel left connected and
    /// `authenticated = false`, while still surfacing the fault to the
    /// caller for dispatch.
    pub fn apply_ping_response(
        channel: &mut Channel,
        response: &RawHttpResponse,
    ) -> Result<Option<TransportError>, TransportError> {
        if let Some(dsid) = response.header(DSID_HEADER) {
            if response
                .header(APPEND_TO_GATEWAY_URL_HEADER)
                .map(|v| v.eq_ignore_ascii_case("true"))
                .unwrap_or(false)
            {
                let sep = if channel.endpoint_uri.contains(';') { "&" } else { ";" };
                channel.session_append_uri =
                    Some(format!("{}{}{}={}", channel.endpoint_uri, sep, DSID_HEADER, dsid));
            }
        }

        if response.status == 401 || response.status == 403 {
            channel.state = ChannelState::Connected;
            channel.authenticated = false;
            tracing::warn!(channel_id = %channel.id, status = response.status, "ping rejected, channel left connected");
            return Ok(Some(TransportError::AuthenticationError {
                channel_id: channel.id.clone(),
                reason: format!("ping rejected with status {}", response.status),
            }));
        }

        if response.status >= 400 {
            channel.state = ChannelState::Disconnected;
            tracing::warn!(channel_id = %channel.id, status = response.status, "ping failed, connect aborted");
            return Err(TransportError::ConnectFailed {
                channel_id: channel.id.clone(),
                reason: format!("ping failed with status {}", response.status),
            });
        }

        channel.state = ChannelState::Connected;
        channel.authenticated = channel.credentials.is_some();
        tracing::debug!(channel_id = %channel.id, "channel connected");
        Ok(None)
    }

    pub async fn connect(
        channel: &mut Channel,
        transport: &dyn HttpTransport,
        encoded_ping: bytes::Bytes,
        content_type: &str,
    ) -> Result<Option<TransportError>, TransportError> {
        channel.state = ChannelState::Connecting;
        tracing::trace!(channel_id = %channel.id, uri = channel.effective_uri(), "sending connect ping");
        let response = transport
            .send(channel.effective_uri(), "POST", content_type, encoded_ping)
            .await
            .map_err(|e| {
                tracing::warn!(channel_id = %channel.id, error = %e, "connect ping transport error");
                TransportError::ConnectFailed {
                    channel_id: channel.id.clone(),
                    reason: e.to_string(),
                }
            })?;
        AmfChannel::apply_ping_response(channel, &response)
    }

    pub fn value_for_destination(destination: &str) -> AmfValue {
        AmfValue::string(destination)
    }
}

//! `DirectHTTPChannel`: the plain request/response channel used by the
//! HTTP service layer — always reports connected, no polling, no ping
//! handshake (spec §4.5).

use super::channel::{Channel, ChannelKind, ChannelState};
use super::error::TransportError;
use super::{HttpTransport, RawHttpResponse};

#[derive(Debug)]
pub struct DirectHttpChannel;

impl DirectHttpChannel {
    pub fn new_channel(id: impl Into<String>, endpoint_uri: impl Into<String>) -> Channel {
        let mut channel = Channel::new(id, endpoint_uri, ChannelKind::DirectHttp);
        // Spec §4.5: "always connected=true" — no handshake to perform.
        channel.state = ChannelState::Connected;
        channel
    }

    /// Every send constructs a fresh request; there is no shared session,
    /// so the channel's `synthetic_client_id` stands in for a `clientId`
    /// where the HTTP service layer needs one (spec §4.5).
    pub async fn send(
        channel: &Channel,
        transport: &dyn HttpTransport,
        url: &str,
        method: &str,
        content_type: &str,
        body: bytes::Bytes,
    ) -> Result<RawHttpResponse, TransportError> {
        debug_assert_eq!(channel.kind, ChannelKind::DirectHttp);
        transport.send(url, method, content_type, body).await
    }

    pub fn disconnect(channel: &mut Channel) {
        // Spec §4.5: disconnect is a no-op beyond bookkeeping — there is no
        // persistent connection to tear down.
        channel.state = ChannelState::Disconnected;
    }
}

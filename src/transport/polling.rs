//! Polling loop behavior layered onto [`Channel`] (spec §4.3).
//!
//! BlazeDS models `PollingChannel` as a subclass of `Channel`; Rust favors
//! composition, so this module operates on a plain `&mut Channel` the same
//! way the teacher's `reconnect.rs` operates on a `&mut State` rather than
//! inheriting from the inner service.

use std::time::Duration;

use crate::codec::AmfValue;
use crate::message::{CommandOperation, MessageHeader, MessageKind};

use super::channel::{Channel, ChannelKind};
use super::error::TransportError;
use super::{HttpTransport, RawHttpResponse};

/// Header the server uses to adapt the client's poll cadence (spec §4.3
/// "adaptive interval").
pub const DS_POLL_WAIT_HEADER: &str = "DSPollWait";

/// A thin handle that layers polling semantics on top of a [`Channel`].
/// `PollingChannel::new` is only meaningful for `ChannelKind::Amf` channels;
/// `DirectHttpChannel` never polls (spec §4.5).
#[derive(Debug)]
pub struct PollingChannel;

impl PollingChannel {
    /// Increment the polling reference count; the first subscriber to call
    /// this turns polling on (spec §4.3 "polling ref count").
    pub fn start_polling(channel: &mut Channel) {
        channel.polling_ref += 1;
        channel.should_poll = true;
    }

    /// Decrement the polling reference count; polling stops once the last
    /// subscriber calls this.
    pub fn stop_polling(channel: &mut Channel) {
        channel.polling_ref = channel.polling_ref.saturating_sub(1);
        if channel.polling_ref == 0 {
            channel.should_poll = false;
        }
    }

    pub fn is_streaming(channel: &Channel) -> bool {
        channel.polling_interval.is_zero()
    }

    /// Whether the next timer/piggyback trigger should actually issue a
    /// poll (spec §8 property 7: "while `pollOutstanding` is true,
    /// additional internal poll triggers are no-ops").
    pub fn should_trigger_poll(channel: &Channel) -> bool {
        channel.should_poll && !channel.poll_outstanding
    }

    /// Build the `CommandOperation::Poll` message for the next poll tick,
    /// optionally piggybacking an already-encoded batch of queued outbound
    /// messages as the command body (spec §4.3 "piggybacking").
    pub fn build_poll_message(
        channel: &Channel,
        destination: impl Into<String>,
        piggyback: AmfValue,
    ) -> MessageKind {
        let mut header = MessageHeader::new(destination);
        header.client_id = channel.flex_client_id;
        MessageKind::Command {
            header,
            operation: CommandOperation::Poll,
            body: piggyback,
        }
    }

    /// Drive one poll tick: send, and on success adapt `polling_interval`
    /// from the `DSPollWait` response header if present.
    pub async fn poll_once(
        channel: &mut Channel,
        transport: &dyn HttpTransport,
        body: bytes::Bytes,
        content_type: &str,
    ) -> Result<RawHttpResponse, TransportError> {
        if channel.kind != ChannelKind::Amf {
            return Err(TransportError::PollNotSupported {
                channel_id: channel.id.clone(),
            });
        }
        channel.poll_outstanding = true;
        tracing::trace!(channel_id = %channel.id, "poll send");
        let result = transport
            .send(channel.effective_uri(), "POST", content_type, body)
            .await;
        channel.poll_outstanding = false;

        let response = result.map_err(|e| {
            tracing::warn!(channel_id = %channel.id, error = %e, "poll failed");
            TransportError::PollingError {
                channel_id: channel.id.clone(),
                reason: e.to_string(),
            }
        })?;
        tracing::trace!(channel_id = %channel.id, "poll received");

        if let Some(wait) = response
            .header(DS_POLL_WAIT_HEADER)
            .and_then(|v| v.parse::<u64>().ok())
        {
            tracing::debug!(channel_id = %channel.id, wait_ms = wait, "poll interval adapted from DSPollWait");
            channel.polling_interval = Duration::from_millis(wait);
        }
        Ok(response)
    }
}

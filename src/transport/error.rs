//! Channel/transport error taxonomy (spec §7).

use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum TransportError {
    #[error("channel {channel_id} failed to connect: {reason}")]
    ConnectFailed { channel_id: String, reason: String },

    #[error("channel {channel_id} call failed: {reason}")]
    CallFailed { channel_id: String, reason: String },

    #[error("channel {channel_id} ping failed: {reason}")]
    PingFailed { channel_id: String, reason: String },

    /// Ping-time auth fault (`Client.Authentication`); the channel still
    /// reports `connected` per spec §4.4.
    #[error("channel {channel_id} authentication rejected: {reason}")]
    AuthenticationError { channel_id: String, reason: String },

    #[error("channel {channel_id} security error: {reason}")]
    SecurityError { channel_id: String, reason: String },

    #[error("channel {channel_id} polling error: {reason}")]
    PollingError { channel_id: String, reason: String },

    #[error("server does not support polling on channel {channel_id}")]
    PollNotSupported { channel_id: String },

    /// Spec §4.6: "Only one login/logout may be in flight; attempting a
    /// second fails with a state error."
    #[error("a login is already in flight on this channel set")]
    ConcurrentLogin,
}

impl TransportError {
    pub fn channel_id(&self) -> Option<&str> {
        match self {
            TransportError::ConnectFailed { channel_id, .. }
            | TransportError::CallFailed { channel_id, .. }
            | TransportError::PingFailed { channel_id, .. }
            | TransportError::AuthenticationError { channel_id, .. }
            | TransportError::SecurityError { channel_id, .. }
            | TransportError::PollingError { channel_id, .. }
            | TransportError::PollNotSupported { channel_id } => Some(channel_id),
            TransportError::ConcurrentLogin => None,
        }
    }
}

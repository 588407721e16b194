//! Agent-layer error taxonomy (spec §5 "MessageAgent").

use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum AgentError {
    #[error("a call to destination {destination} is already active under the Single concurrency policy")]
    ConcurrencyError { destination: String },

    #[error("no destination configured for this agent")]
    InvalidDestination,

    #[error("no channel available to send on")]
    NoChannelAvailable,

    #[error(transparent)]
    Transport(#[from] crate::transport::TransportError),

    #[error("server fault: {0}")]
    Fault(Box<crate::message::FaultMessage>),
}

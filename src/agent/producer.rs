//! `Producer`: sends messages to a destination and tracks their
//! acknowledgement via `AsyncToken` (spec §5).

use uuid::Uuid;

use crate::codec::AmfValue;
use crate::message::{Message, MessageHeader, MessageKind};

use super::{AgentError, AsyncToken, ConcurrencyPolicy, MessageAgent};

#[derive(Debug)]
pub struct Producer {
    agent: MessageAgent,
}

impl Producer {
    pub fn new(destination: impl Into<String>) -> Self {
        Producer {
            // Producer sends are independent by nature; BlazeDS never
            // serializes them against each other.
            agent: MessageAgent::new(destination, ConcurrencyPolicy::Multiple),
        }
    }

    pub fn destination(&self) -> &str {
        &self.agent.destination
    }

    /// Build the outbound `Async` message and register its token.
    pub fn send(&mut self, body: AmfValue) -> Result<(Message, AsyncToken), AgentError> {
        if self.agent.destination.is_empty() {
            return Err(AgentError::InvalidDestination);
        }
        let header = MessageHeader::new(self.agent.destination.clone());
        let message_id = header.message_id;
        let message = MessageKind::Async { header, body };
        let token = self.agent.begin_call(message_id)?;
        Ok((message, token))
    }

    pub fn handle_acknowledge(&mut self, message_id: Uuid, body: AmfValue) {
        self.agent.complete(message_id, Ok(body));
    }

    pub fn handle_fault(&mut self, message_id: Uuid, fault: crate::message::FaultMessage) {
        self.agent.complete(message_id, Err(fault));
    }
}

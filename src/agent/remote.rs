//! `RemoteObject`: invokes named operations on a destination (spec §5
//! "remote-object invoker").

use uuid::Uuid;

use crate::codec::{AmfArray, AmfValue};
use crate::message::{Message, MessageHeader, MessageKind};

use super::{AgentError, AsyncToken, ConcurrencyPolicy, MessageAgent};

#[derive(Debug)]
pub struct RemoteObject {
    agent: MessageAgent,
}

impl RemoteObject {
    pub fn new(destination: impl Into<String>, concurrency: ConcurrencyPolicy) -> Self {
        RemoteObject {
            agent: MessageAgent::new(destination, concurrency),
        }
    }

    pub fn destination(&self) -> &str {
        &self.agent.destination
    }

    pub fn invoke(
        &mut self,
        operation: impl Into<String>,
        args: Vec<AmfValue>,
    ) -> Result<(Message, AsyncToken), AgentError> {
        if self.agent.destination.is_empty() {
            return Err(AgentError::InvalidDestination);
        }
        let header = MessageHeader::new(self.agent.destination.clone());
        let message_id = header.message_id;
        let message = MessageKind::Remoting {
            header,
            operation: operation.into(),
            body: AmfValue::array(AmfArray {
                dense: args,
                assoc: Vec::new(),
            }),
        };
        let token = self.agent.begin_call(message_id)?;
        Ok((message, token))
    }

    pub fn handle_result(&mut self, message_id: Uuid, body: AmfValue) {
        self.agent.complete(message_id, Ok(body));
    }

    pub fn handle_fault(&mut self, message_id: Uuid, fault: crate::message::FaultMessage) {
        self.agent.complete(message_id, Err(fault));
    }
}

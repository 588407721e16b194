//! `Consumer`: subscribes to a destination and receives pushed messages
//! (spec §5 "subscription state machine").

use uuid::Uuid;

use crate::codec::AmfValue;
use crate::message::{CommandOperation, Message, MessageHeader, MessageKind};

use super::{AgentError, AsyncToken, ConcurrencyPolicy, MessageAgent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Unsubscribed,
    Subscribing,
    Subscribed,
    Unsubscribing,
}

#[derive(Debug)]
pub struct Consumer {
    agent: MessageAgent,
    pub state: SubscriptionState,
    pub selector: Option<String>,
    pub subtopic: Option<String>,
}

impl Consumer {
    pub fn new(destination: impl Into<String>) -> Self {
        Consumer {
            // A subscribe/unsubscribe pair is the only overlap a Consumer
            // allows; Single matches BlazeDS's guard against double-subscribe.
            agent: MessageAgent::new(destination, ConcurrencyPolicy::Single),
            state: SubscriptionState::Unsubscribed,
            selector: None,
            subtopic: None,
        }
    }

    pub fn destination(&self) -> &str {
        &self.agent.destination
    }

    fn command_header(&self) -> MessageHeader {
        let mut header = MessageHeader::new(self.agent.destination.clone());
        if let Some(selector) = &self.selector {
            header = header.with_header("DSSelector", AmfValue::string(selector.clone()));
        }
        if let Some(subtopic) = &self.subtopic {
            header = header.with_header("DSSubtopic", AmfValue::string(subtopic.clone()));
        }
        header
    }

    pub fn subscribe(&mut self) -> Result<(Message, AsyncToken), AgentError> {
        if self.state != SubscriptionState::Unsubscribed {
            return Err(AgentError::ConcurrencyError {
                destination: self.agent.destination.clone(),
            });
        }
        let header = self.command_header();
        let message_id = header.message_id;
        let message = MessageKind::Command {
            header,
            operation: CommandOperation::Subscribe,
            body: AmfValue::Undefined,
        };
        let token = self.agent.begin_call(message_id)?;
        self.state = SubscriptionState::Subscribing;
        Ok((message, token))
    }

    pub fn unsubscribe(&mut self) -> Result<(Message, AsyncToken), AgentError> {
        if self.state != SubscriptionState::Subscribed {
            return Err(AgentError::ConcurrencyError {
                destination: self.agent.destination.clone(),
            });
        }
        let header = self.command_header();
        let message_id = header.message_id;
        let message = MessageKind::Command {
            header,
            operation: CommandOperation::Unsubscribe,
            body: AmfValue::Undefined,
        };
        let token = self.agent.begin_call(message_id)?;
        self.state = SubscriptionState::Unsubscribing;
        Ok((message, token))
    }

    /// Settle a subscribe/unsubscribe call and transition `state`.
    ///
    /// A `Consumer` has no channel reference (agents stay decoupled from
    /// transport, see `DESIGN.md`), so the `Subscribing` -> `Subscribed`
    /// transition here only updates local state. The caller driving the
    /// channel set is responsible for calling
    /// `PollingChannel::start_polling`/`stop_polling` on the current
    /// channel when `state` flips to/from `Subscribed`, mirroring spec
    /// §4.7's `enablePolling` call.
    pub fn handle_acknowledge(&mut self, message_id: Uuid, body: AmfValue) {
        match self.state {
            SubscriptionState::Subscribing => self.state = SubscriptionState::Subscribed,
            SubscriptionState::Unsubscribing => self.state = SubscriptionState::Unsubscribed,
            _ => {}
        }
        self.agent.complete(message_id, Ok(body));
    }

    pub fn handle_fault(&mut self, message_id: Uuid, fault: crate::message::FaultMessage) {
        // A rejected subscribe/unsubscribe leaves the consumer in its prior
        // stable state rather than stuck mid-transition.
        match self.state {
            SubscriptionState::Subscribing => self.state = SubscriptionState::Unsubscribed,
            SubscriptionState::Unsubscribing => self.state = SubscriptionState::Subscribed,
            _ => {}
        }
        self.agent.complete(message_id, Err(fault));
    }

    /// A pushed message delivered over the channel while subscribed (not
    /// correlated to any outstanding call).
    pub fn is_deliverable(&self) -> bool {
        self.state == SubscriptionState::Subscribed
    }
}

//! Message agents: the per-destination invokers layered on a
//! [`crate::transport::ChannelSet`] (spec §5).

pub mod consumer;
pub mod error;
pub mod producer;
pub mod remote;
pub mod token;

pub use consumer::{Consumer, SubscriptionState};
pub use error::AgentError;
pub use producer::Producer;
pub use remote::RemoteObject;
pub use token::{AsyncToken, Responder};

use std::collections::HashMap;

use uuid::Uuid;

use crate::codec::AmfValue;
use crate::message::FaultMessage;

/// How an agent handles overlapping invocations (spec §5 "concurrency
/// policies").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcurrencyPolicy {
    /// All calls run concurrently; every token settles independently.
    Multiple,
    /// A second call while one is outstanding is rejected.
    Single,
    /// A second call supersedes the first: the first's eventual result is
    /// dropped and never delivered to its token.
    Last,
}

/// Shared base behavior for [`Producer`], [`Consumer`], and [`RemoteObject`]
/// (spec §5 "MessageAgent"): the active-call table and concurrency policy
/// enforcement. Concrete agents embed this and add their own send shaping.
#[derive(Debug)]
pub struct MessageAgent {
    pub id: Uuid,
    pub destination: String,
    pub concurrency: ConcurrencyPolicy,
    active_calls: HashMap<Uuid, AsyncToken>,
    /// Tracks the single outstanding call id under `Last`/`Single`, so a
    /// superseded call's late result can be recognized and dropped.
    last_active: Option<Uuid>,
}

impl MessageAgent {
    pub fn new(destination: impl Into<String>, concurrency: ConcurrencyPolicy) -> Self {
        MessageAgent {
            id: Uuid::new_v4(),
            destination: destination.into(),
            concurrency,
            active_calls: HashMap::new(),
            last_active: None,
        }
    }

    pub fn active_call_count(&self) -> usize {
        self.active_calls.len()
    }

    /// Register a new outbound call's token, enforcing the concurrency
    /// policy. Under `Last`, any previously active call is superseded: its
    /// table entry is dropped so a later [`MessageAgent::complete`] for it
    /// is a no-op.
    pub fn begin_call(&mut self, message_id: Uuid) -> Result<AsyncToken, AgentError> {
        match self.concurrency {
            ConcurrencyPolicy::Single if !self.active_calls.is_empty() => {
                tracing::warn!(destination = %self.destination, "call rejected: one already in flight under Single");
                return Err(AgentError::ConcurrencyError {
                    destination: self.destination.clone(),
                })
            }
            ConcurrencyPolicy::Last => {
                if let Some(prev) = self.last_active.take() {
                    tracing::debug!(destination = %self.destination, "call superseded under Last");
                    self.active_calls.remove(&prev);
                }
            }
            _ => {}
        }
        let token = AsyncToken::new(message_id);
        self.active_calls.insert(message_id, token.clone());
        self.last_active = Some(message_id);
        Ok(token)
    }

    /// Deliver a result/fault to the call's token, if it is still active
    /// (i.e. not superseded under `Last`). Always removes the table entry.
    pub fn complete(&mut self, message_id: Uuid, outcome: Result<AmfValue, FaultMessage>) {
        let Some(token) = self.active_calls.remove(&message_id) else {
            return;
        };
        if self.last_active == Some(message_id) {
            self.last_active = None;
        }
        match outcome {
            Ok(value) => token.settle_result(value),
            Err(fault) => token.settle_fault(fault),
        }
    }
}

//! Wire message types (spec §3): a discriminated record with common
//! attributes shared by every kind, plus kind-specific payloads.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use uuid::Uuid;

use crate::codec::AmfValue;

/// Command operation codes carried by [`MessageKind::Command`] (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOperation {
    Subscribe = 0,
    Unsubscribe = 1,
    Poll = 2,
    TriggerConnect = 7,
    Login = 8,
    Logout = 9,
    Ping = 5,
    ClusterRequest = 11,
    Disconnect = 12,
}

impl CommandOperation {
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Attributes shared by every message kind.
#[derive(Debug, Clone)]
pub struct MessageHeader {
    pub message_id: Uuid,
    pub correlation_id: Option<Uuid>,
    pub timestamp: u64,
    pub time_to_live: u64,
    pub client_id: Option<Uuid>,
    pub destination: String,
    pub headers: HashMap<String, AmfValue>,
}

impl MessageHeader {
    pub fn new(destination: impl Into<String>) -> Self {
        MessageHeader {
            message_id: Uuid::new_v4(),
            correlation_id: None,
            timestamp: now_millis(),
            time_to_live: 0,
            client_id: None,
            destination: destination.into(),
            headers: HashMap::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: AmfValue) -> Self {
        self.headers.insert(name.into(), value);
        self
    }

    pub fn header(&self, name: &str) -> Option<&AmfValue> {
        self.headers.get(name)
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// `Error` kind's root cause, carried opaquely (spec §3: `rootCause`).
#[derive(Debug, Clone)]
pub struct FaultMessage {
    pub header: MessageHeader,
    pub fault_code: String,
    pub fault_string: String,
    pub fault_detail: String,
    pub root_cause: Option<Box<MessageKind>>,
    pub extended_data: Option<AmfValue>,
}

impl FaultMessage {
    pub fn new(
        destination: impl Into<String>,
        fault_code: impl Into<String>,
        fault_string: impl Into<String>,
    ) -> Self {
        FaultMessage {
            header: MessageHeader::new(destination),
            fault_code: fault_code.into(),
            fault_string: fault_string.into(),
            fault_detail: String::new(),
            root_cause: None,
            extended_data: None,
        }
    }

    /// `retryable` hint per spec §5/§7 (`Client.Error.MessageSend`).
    pub fn retryable(&self) -> bool {
        matches!(
            self.header.header("DSRetryableErrorHint"),
            Some(AmfValue::Bool(true))
        )
    }
}

#[derive(Debug, Clone)]
pub struct HttpRequestMessage {
    pub header: MessageHeader,
    pub url: String,
    pub method: String,
    pub content_type: String,
    pub http_headers: HashMap<String, String>,
    pub body: AmfValue,
}

/// The discriminated message record (spec §3).
#[derive(Debug, Clone)]
pub enum MessageKind {
    Async {
        header: MessageHeader,
        body: AmfValue,
    },
    Acknowledge {
        header: MessageHeader,
        body: AmfValue,
    },
    Command {
        header: MessageHeader,
        operation: CommandOperation,
        body: AmfValue,
    },
    Error(FaultMessage),
    Remoting {
        header: MessageHeader,
        operation: String,
        body: AmfValue,
    },
    HttpRequest(HttpRequestMessage),
}

impl MessageKind {
    pub fn header(&self) -> &MessageHeader {
        match self {
            MessageKind::Async { header, .. }
            | MessageKind::Acknowledge { header, .. }
            | MessageKind::Command { header, .. }
            | MessageKind::Remoting { header, .. } => header,
            MessageKind::Error(f) => &f.header,
            MessageKind::HttpRequest(r) => &r.header,
        }
    }

    pub fn header_mut(&mut self) -> &mut MessageHeader {
        match self {
            MessageKind::Async { header, .. }
            | MessageKind::Acknowledge { header, .. }
            | MessageKind::Command { header, .. }
            | MessageKind::Remoting { header, .. } => header,
            MessageKind::Error(f) => &mut f.header,
            MessageKind::HttpRequest(r) => &mut r.header,
        }
    }

    pub fn message_id(&self) -> Uuid {
        self.header().message_id
    }

    /// Build the acknowledgement counterpart for this message, correlated
    /// by `correlationId` (spec §3/§4.7 active-call table).
    pub fn acknowledge(&self, body: AmfValue) -> MessageKind {
        let mut header = MessageHeader::new(self.header().destination.clone());
        header.correlation_id = Some(self.message_id());
        header.client_id = self.header().client_id;
        MessageKind::Acknowledge { header, body }
    }

    pub fn command(destination: impl Into<String>, operation: CommandOperation) -> MessageKind {
        MessageKind::Command {
            header: MessageHeader::new(destination),
            operation,
            body: AmfValue::Undefined,
        }
    }
}

/// Convenience alias matching spec terminology ("Message").
pub type Message = MessageKind;

//! Minimal publish/subscribe primitive (spec §9 design notes: "event
//! dispatch is assumed"). Collapsed into a single tagged variant carried on
//! a channel, as the design notes suggest, rather than per-event-type
//! dispatch tables — callers filter on the variant they care about.

use std::fmt;

use uuid::Uuid;

use crate::message::MessageKind;
use crate::transport::TransportError;

/// Event types enumerated in spec §9: `connect`, `disconnect`,
/// `channel-fault`, `message`, `result`, `fault`, `invoke`, `acknowledge`.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    Connect { channel_id: String, reconnecting: bool },
    Disconnect { channel_id: String },
    ChannelFault { channel_id: String, error: TransportError },
    Message(MessageKind),
    Result { message_id: Uuid, body: crate::codec::AmfValue },
    Fault { message_id: Uuid, fault: crate::message::FaultMessage },
    Invoke { message_id: Uuid },
    Acknowledge { message_id: Uuid },
}

/// A simple ordered list of listeners. The runtime is single-threaded and
/// cooperative (spec §5), so this holds plain `FnMut` closures rather than
/// needing `Send + Sync` boxed callbacks behind a lock.
#[derive(Default)]
pub struct Dispatcher {
    listeners: Vec<Box<dyn FnMut(&ClientEvent)>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Dispatcher {
            listeners: Vec::new(),
        }
    }

    pub fn subscribe<F>(&mut self, listener: F)
    where
        F: FnMut(&ClientEvent) + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    pub fn dispatch(&mut self, event: ClientEvent) {
        for listener in &mut self.listeners {
            listener(&event);
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

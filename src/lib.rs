//! Client-side RPC and messaging runtime.
//!
//! A port of the Flex/BlazeDS RPC stack: a remote-object invocation service
//! (binary AMF3 over HTTP) and a generic HTTP service with pluggable result
//! formats, layered on a shared messaging substrate — a channel set that
//! hunts across transports on failure, polling channels that multiplex
//! pushed messages and client requests on stateless HTTP, a credential
//! lifecycle that survives reconnects, a concurrency policy engine for
//! overlapping in-flight calls, and an AMF3 binary codec with reference
//! tables and traits-based typed-object serialization.

pub mod agent;
pub mod codec;
#[doc(hidden)]
pub mod error;
pub mod event;
pub mod http_service;
pub mod message;
pub mod transport;

pub use error::Error;
pub use event::{ClientEvent, Dispatcher};
pub use message::{CommandOperation, FaultMessage, Message, MessageHeader, MessageKind};

pub(crate) use error::Error as CrateError;

//! The generic HTTP service operation: content-type-aware request shaping
//! plus a pluggable result-format decoding pipeline (spec §4.8).

pub mod error;
pub mod request;
pub mod response;
mod xml_transform;

pub use error::HttpServiceError;
pub use request::{BuiltRequest, HttpRequestSpec, ParamRecord, ParamValue, RequestBody, SerializationFilter};
pub use response::decode_response;

use crate::agent::{AgentError, AsyncToken, ConcurrencyPolicy, MessageAgent};
use crate::transport::{Channel, DirectHttpChannel, HttpTransport};

/// Result-format tag selecting the response decoding pipeline (spec §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultFormat {
    Object,
    Array,
    Xml,
    HaxeXml,
    E4x,
    FlashVars,
    Text,
    Json,
    Custom,
}

/// One configured HTTP service call. Unlike the AMF agents, an HTTP
/// operation talks directly to a [`DirectHttpChannel`] rather than through
/// a hunting [`crate::transport::ChannelSet`] (spec §4.5: "used by the HTTP
/// service pipeline when no proxy is configured").
pub struct HttpOperation {
    agent: MessageAgent,
    pub result_format: ResultFormat,
    pub channel: Channel,
}

impl HttpOperation {
    pub fn new(destination: impl Into<String>, result_format: ResultFormat) -> Self {
        let destination = destination.into();
        HttpOperation {
            agent: MessageAgent::new(destination.clone(), ConcurrencyPolicy::Multiple),
            result_format,
            channel: DirectHttpChannel::new_channel("http-service", String::new()),
        }
    }

    /// Build the request and register its token, without performing any
    /// I/O — the `AsyncToken` is available immediately (spec §4.8: "an
    /// operation's `send` returns an `AsyncToken` immediately"). Pass the
    /// returned [`BuiltRequest`] to the transport and feed the result back
    /// through [`HttpOperation::complete`].
    pub fn start(
        &mut self,
        spec: HttpRequestSpec,
        filter: Option<&dyn SerializationFilter>,
    ) -> Result<(BuiltRequest, AsyncToken), HttpServiceError> {
        if spec.url.is_empty() {
            return Err(HttpServiceError::UrlRequired);
        }
        let built = request::build_request(spec, filter);
        let message_id = uuid::Uuid::new_v4();
        let token = self
            .agent
            .begin_call(message_id)
            .map_err(|_: AgentError| HttpServiceError::UrlRequired)?;
        Ok((built, token))
    }

    /// Decode a transport response per [`HttpOperation::result_format`] and
    /// settle the matching token (looked up by `message_id`, the opaque
    /// correlation key spec §4.9 specifies).
    pub fn complete(&mut self, message_id: uuid::Uuid, body: &[u8]) {
        match decode_response(self.result_format, body) {
            Ok(value) => self.agent.complete(message_id, Ok(value)),
            Err(e) => {
                let fault = crate::message::FaultMessage::new(
                    self.agent.destination.clone(),
                    "Client.CouldNotDecode",
                    e.to_string(),
                );
                self.agent.complete(message_id, Err(fault));
            }
        }
    }

    /// Convenience wrapper driving [`HttpOperation::start`], the injected
    /// transport, and [`HttpOperation::complete`] in sequence — the shape
    /// most callers want when they don't need to interleave other sends
    /// while this one is in flight.
    pub async fn send(
        &mut self,
        transport: &dyn HttpTransport,
        spec: HttpRequestSpec,
        filter: Option<&dyn SerializationFilter>,
    ) -> Result<AsyncToken, HttpServiceError> {
        let (built, token) = self.start(spec, filter)?;
        let response = crate::transport::DirectHttpChannel::send(
            &self.channel,
            transport,
            &built.url,
            &built.method,
            &built.content_type,
            built.body,
        )
        .await?;
        self.complete(token.message_id, &response.body);
        Ok(token)
    }
}

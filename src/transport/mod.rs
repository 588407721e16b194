//! Channel/transport layer (spec §4.2-§4.6): channel lifecycle,
//! hunting/failover, reconnect, heartbeats, credential propagation.

mod amf_channel;
mod channel;
mod channel_set;
mod config;
mod direct_http;
mod error;
mod polling;

pub use amf_channel::AmfChannel;
pub use channel::{
    Channel, ChannelKind, ChannelLifecycle, ChannelState, Credentials, MessageResponder,
    RawHttpResponse,
};
pub use channel_set::{ChannelSet, DrainOutcome};
pub use config::{ChannelConfig, EndpointConfig};
pub use direct_http::DirectHttpChannel;
pub use error::TransportError;
pub use polling::PollingChannel;

use bytes::Bytes;

/// The transport-level HTTP I/O primitive (spec §1: "transport-level
/// HTTP/WebSocket I/O ... assumed available as a request/response
/// primitive"). Channels depend on this trait, never on a concrete HTTP
/// stack directly, mirroring the way the teacher's `Channel`/`Connection`
/// types are generic over a `tower_service::Service`.
#[async_trait::async_trait(?Send)]
pub trait HttpTransport {
    async fn send(
        &self,
        url: &str,
        method: &str,
        content_type: &str,
        body: Bytes,
    ) -> Result<RawHttpResponse, TransportError>;
}

#[cfg(feature = "channel")]
pub use hyper_transport::HyperHttpTransport;

#[cfg(feature = "channel")]
mod hyper_transport {
    use std::convert::Infallible;

    use bytes::Bytes;
    use http_body_util::{BodyExt, Full};
    use hyper_util::client::legacy::{connect::HttpConnector, Client};
    use hyper_util::rt::TokioExecutor;

    use super::{HttpTransport, RawHttpResponse, TransportError};

    /// Default [`HttpTransport`] built on `hyper`/`hyper-util` (the
    /// teacher's own transport dependency set).
    pub struct HyperHttpTransport {
        client: Client<HttpConnector, Full<Bytes>>,
    }

    impl Default for HyperHttpTransport {
        fn default() -> Self {
            HyperHttpTransport {
                client: Client::builder(TokioExecutor::new()).build_http(),
            }
        }
    }

    #[async_trait::async_trait(?Send)]
    impl HttpTransport for HyperHttpTransport {
        async fn send(
            &self,
            url: &str,
            method: &str,
            content_type: &str,
            body: Bytes,
        ) -> Result<RawHttpResponse, TransportError> {
            let uri: http::Uri = url.parse().map_err(|e: http::uri::InvalidUri| {
                TransportError::CallFailed {
                    channel_id: String::new(),
                    reason: e.to_string(),
                }
            })?;
            let req = http::Request::builder()
                .method(method)
                .uri(uri)
                .header(http::header::CONTENT_TYPE, content_type)
                .body(Full::<Bytes>::new(body))
                .map_err(|e| TransportError::CallFailed {
                    channel_id: String::new(),
                    reason: e.to_string(),
                })?;
            let resp = self
                .client
                .request(req)
                .await
                .map_err(|e| TransportError::CallFailed {
                    channel_id: String::new(),
                    reason: e.to_string(),
                })?;
            let status = resp.status().as_u16();
            let headers = resp
                .headers()
                .iter()
                .filter_map(|(k, v)| Some((k.to_string(), v.to_str().ok()?.to_string())))
                .collect();
            let body: Result<Bytes, Infallible> = Ok(resp
                .into_body()
                .collect()
                .await
                .map_err(|e: hyper::Error| TransportError::CallFailed {
                    channel_id: String::new(),
                    reason: e.to_string(),
                })?
                .to_bytes());
            Ok(RawHttpResponse {
                status,
                headers,
                body: body.expect("Infallible"),
            })
        }
    }
}

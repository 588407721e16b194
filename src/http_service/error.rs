//! HTTP service error taxonomy (spec §7 `Client.*` fault codes).

use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum HttpServiceError {
    #[error("Client.URLRequired: HTTP operation has no url")]
    UrlRequired,

    #[error("Client.CouldNotDecode: {0}")]
    CouldNotDecode(String),

    #[error(transparent)]
    Transport(#[from] crate::transport::TransportError),
}

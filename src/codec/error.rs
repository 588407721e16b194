//! Codec failure taxonomy (spec §4.1 "Failure semantics").

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("u29 value {0} exceeds the 29-bit range")]
    Overflow(u32),
    #[error("no class alias registered for {0:?}")]
    UnknownAlias(String),
    #[error("unsupported AMF3 type marker 0x{0:02x}")]
    UnsupportedMarker(u8),
    #[error("AMF3 stream ended before a complete value could be read")]
    TruncatedStream,
}

//! AMF remoting envelope (spec §6 "External interfaces — Wire protocol —
//! AMF3"): a 16-bit version, headers, and bodies framing the AMF3 payload
//! carried by the AMF channel (spec §4.4).

use std::sync::atomic::{AtomicU64, Ordering};

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::error::CodecError;
use super::reader::Amf3Decoder;
use super::value::AmfValue;
use super::writer::Amf3Encoder;

const AMF3_VERSION: u16 = 3;
/// Marker that escapes an AMF0 envelope slot to an AMF3-encoded payload
/// (spec §6: "Bodies are typically prefixed with marker 0x11").
const AMF3_ESCAPE_MARKER: u8 = 0x11;

#[derive(Debug, Clone)]
pub struct AmfHeader {
    pub name: String,
    pub must_understand: bool,
    pub body: AmfValue,
}

#[derive(Debug, Clone)]
pub struct AmfMessageBody {
    pub target_uri: String,
    pub response_uri: String,
    pub body: AmfValue,
}

/// Back-compat alias used by some call sites that only care about a single
/// request/response body pair.
pub type AmfBody = AmfMessageBody;

#[derive(Debug, Clone, Default)]
pub struct Envelope {
    pub headers: Vec<AmfHeader>,
    pub bodies: Vec<AmfMessageBody>,
}

static RESPONSE_URI_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generates the next `/<monotonic integer>` response URI (spec §6).
pub fn next_response_uri() -> String {
    let n = RESPONSE_URI_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("/{n}")
}

impl Envelope {
    pub fn new() -> Self {
        Envelope::default()
    }

    pub fn with_body(target_uri: impl Into<String>, body: AmfValue) -> Self {
        let mut env = Envelope::new();
        env.bodies.push(AmfMessageBody {
            target_uri: target_uri.into(),
            response_uri: next_response_uri(),
            body,
        });
        env
    }

    pub fn encode(&self) -> Result<Bytes, CodecError> {
        let mut buf = BytesMut::new();
        buf.put_u16(AMF3_VERSION);
        buf.put_u16(self.headers.len() as u16);
        for header in &self.headers {
            write_utf(&mut buf, &header.name);
            buf.put_u8(u8::from(header.must_understand));
            let body_bytes = encode_escaped(&header.body)?;
            buf.put_u32(body_bytes.len() as u32);
            buf.put_slice(&body_bytes);
        }
        buf.put_u16(self.bodies.len() as u16);
        for body in &self.bodies {
            write_utf(&mut buf, &body.target_uri);
            write_utf(&mut buf, &body.response_uri);
            let body_bytes = encode_escaped(&body.body)?;
            buf.put_u32(body_bytes.len() as u32);
            buf.put_slice(&body_bytes);
        }
        Ok(buf.freeze())
    }

    pub fn decode(mut buf: Bytes) -> Result<Envelope, CodecError> {
        if buf.remaining() < 2 {
            return Err(CodecError::TruncatedStream);
        }
        let _version = buf.get_u16();
        if buf.remaining() < 2 {
            return Err(CodecError::TruncatedStream);
        }
        let header_count = buf.get_u16();
        let mut headers = Vec::with_capacity(header_count as usize);
        for _ in 0..header_count {
            let name = read_utf(&mut buf)?;
            if !buf.has_remaining() {
                return Err(CodecError::TruncatedStream);
            }
            let must_understand = buf.get_u8() != 0;
            if buf.remaining() < 4 {
                return Err(CodecError::TruncatedStream);
            }
            let len = buf.get_u32() as usize;
            if buf.remaining() < len {
                return Err(CodecError::TruncatedStream);
            }
            let body_bytes = buf.copy_to_bytes(len);
            let body = decode_escaped(body_bytes)?;
            headers.push(AmfHeader {
                name,
                must_understand,
                body,
            });
        }
        if buf.remaining() < 2 {
            return Err(CodecError::TruncatedStream);
        }
        let body_count = buf.get_u16();
        let mut bodies = Vec::with_capacity(body_count as usize);
        for _ in 0..body_count {
            let target_uri = read_utf(&mut buf)?;
            let response_uri = read_utf(&mut buf)?;
            if buf.remaining() < 4 {
                return Err(CodecError::TruncatedStream);
            }
            let len = buf.get_u32() as usize;
            if buf.remaining() < len {
                return Err(CodecError::TruncatedStream);
            }
            let body_bytes = buf.copy_to_bytes(len);
            let body = decode_escaped(body_bytes)?;
            bodies.push(AmfMessageBody {
                target_uri,
                response_uri,
                body,
            });
        }
        Ok(Envelope { headers, bodies })
    }
}

fn encode_escaped(value: &AmfValue) -> Result<Bytes, CodecError> {
    let mut encoder = Amf3Encoder::new();
    let mut buf = BytesMut::new();
    buf.put_u8(AMF3_ESCAPE_MARKER);
    encoder.encode(value, &mut buf)?;
    Ok(buf.freeze())
}

fn decode_escaped(mut bytes: Bytes) -> Result<AmfValue, CodecError> {
    if !bytes.has_remaining() {
        return Err(CodecError::TruncatedStream);
    }
    let marker = bytes.get_u8();
    if marker != AMF3_ESCAPE_MARKER {
        return Err(CodecError::UnsupportedMarker(marker));
    }
    let mut decoder = Amf3Decoder::new();
    decoder.decode(&mut bytes)
}

fn write_utf(buf: &mut BytesMut, s: &str) {
    buf.put_u16(s.len() as u16);
    buf.put_slice(s.as_bytes());
}

fn read_utf(buf: &mut Bytes) -> Result<String, CodecError> {
    if buf.remaining() < 2 {
        return Err(CodecError::TruncatedStream);
    }
    let len = buf.get_u16() as usize;
    if buf.remaining() < len {
        return Err(CodecError::TruncatedStream);
    }
    let bytes = buf.copy_to_bytes(len);
    String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::TruncatedStream)
}

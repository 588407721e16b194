//! AMF3 decoder (spec §4.1). A fresh [`Amf3Decoder`] must be used per
//! top-level value, mirroring the encoder's reference-table reset rule.

use std::cell::RefCell;
use std::rc::Rc;

use bytes::{Buf, Bytes};

use super::error::CodecError;
use super::registry;
use super::traits::Traits;
use super::value::{
    AmfArray, AmfDate, AmfDictionary, AmfObject, AmfValue, AmfVector, VectorKind,
};
use super::varint::{read_ref_header, read_u29, RefHeader};

const MARKER_UNDEFINED: u8 = 0x00;
const MARKER_NULL: u8 = 0x01;
const MARKER_FALSE: u8 = 0x02;
const MARKER_TRUE: u8 = 0x03;
const MARKER_INTEGER: u8 = 0x04;
const MARKER_DOUBLE: u8 = 0x05;
const MARKER_STRING: u8 = 0x06;
const MARKER_XML_DOC: u8 = 0x07;
const MARKER_DATE: u8 = 0x08;
const MARKER_ARRAY: u8 = 0x09;
const MARKER_OBJECT: u8 = 0x0A;
const MARKER_XML: u8 = 0x0B;
const MARKER_BYTE_ARRAY: u8 = 0x0C;
const MARKER_VECTOR_INT: u8 = 0x0D;
const MARKER_VECTOR_UINT: u8 = 0x0E;
const MARKER_VECTOR_DOUBLE: u8 = 0x0F;
const MARKER_VECTOR_OBJECT: u8 = 0x10;
const MARKER_DICTIONARY: u8 = 0x11;

pub struct Amf3Decoder {
    object_refs: Vec<AmfValue>,
    string_refs: Vec<Rc<str>>,
    traits_refs: Vec<Traits>,
}

impl Default for Amf3Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Amf3Decoder {
    pub fn new() -> Self {
        Amf3Decoder {
            object_refs: Vec::new(),
            string_refs: Vec::new(),
            traits_refs: Vec::new(),
        }
    }

    pub fn decode(&mut self, buf: &mut Bytes) -> Result<AmfValue, CodecError> {
        if !buf.has_remaining() {
            return Err(CodecError::TruncatedStream);
        }
        let marker = buf.get_u8();
        match marker {
            MARKER_UNDEFINED => Ok(AmfValue::Undefined),
            MARKER_NULL => Ok(AmfValue::Null),
            MARKER_FALSE => Ok(AmfValue::Bool(false)),
            MARKER_TRUE => Ok(AmfValue::Bool(true)),
            MARKER_INTEGER => {
                let raw = read_u29(buf)?;
                Ok(AmfValue::Integer(u29_to_i32(raw)))
            }
            MARKER_DOUBLE => {
                if buf.remaining() < 8 {
                    return Err(CodecError::TruncatedStream);
                }
                Ok(AmfValue::Double(buf.get_f64()))
            }
            MARKER_STRING => {
                let s = self.decode_string(buf)?;
                Ok(AmfValue::String(s))
            }
            MARKER_XML_DOC => {
                let s = self.decode_xml_body(buf)?;
                Ok(AmfValue::XmlDocument(Rc::from(s)))
            }
            MARKER_XML => {
                let s = self.decode_xml_body(buf)?;
                Ok(AmfValue::XmlExtended(Rc::from(s)))
            }
            MARKER_DATE => self.decode_date(buf),
            MARKER_ARRAY => self.decode_array(buf),
            MARKER_OBJECT => self.decode_object(buf),
            MARKER_BYTE_ARRAY => self.decode_byte_array(buf),
            MARKER_VECTOR_INT => self.decode_vector(buf, VectorKind::Int),
            MARKER_VECTOR_UINT => self.decode_vector(buf, VectorKind::Uint),
            MARKER_VECTOR_DOUBLE => self.decode_vector(buf, VectorKind::Double),
            MARKER_VECTOR_OBJECT => self.decode_vector(buf, VectorKind::Object),
            MARKER_DICTIONARY => self.decode_dictionary(buf),
            other => Err(CodecError::UnsupportedMarker(other)),
        }
    }

    fn decode_string(&mut self, buf: &mut Bytes) -> Result<Rc<str>, CodecError> {
        match read_ref_header(buf)? {
            RefHeader::Reference(idx) => self
                .string_refs
                .get(idx as usize)
                .cloned()
                .ok_or(CodecError::TruncatedStream),
            RefHeader::Inline(len) => {
                if len == 0 {
                    return Ok(Rc::from(""));
                }
                let len = len as usize;
                if buf.remaining() < len {
                    return Err(CodecError::TruncatedStream);
                }
                let bytes = buf.copy_to_bytes(len);
                let s: Rc<str> = Rc::from(
                    std::str::from_utf8(&bytes)
                        .map_err(|_| CodecError::TruncatedStream)?,
                );
                self.string_refs.push(s.clone());
                Ok(s)
            }
        }
    }

    fn decode_xml_body(&mut self, buf: &mut Bytes) -> Result<String, CodecError> {
        let header = read_ref_header(buf)?;
        let len = match header {
            RefHeader::Inline(len) => len as usize,
            RefHeader::Reference(_) => return Err(CodecError::TruncatedStream),
        };
        if buf.remaining() < len {
            return Err(CodecError::TruncatedStream);
        }
        let bytes = buf.copy_to_bytes(len);
        String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::TruncatedStream)
    }

    fn decode_date(&mut self, buf: &mut Bytes) -> Result<AmfValue, CodecError> {
        match read_ref_header(buf)? {
            RefHeader::Reference(idx) => self
                .object_refs
                .get(idx as usize)
                .cloned()
                .ok_or(CodecError::TruncatedStream),
            RefHeader::Inline(_) => {
                if buf.remaining() < 8 {
                    return Err(CodecError::TruncatedStream);
                }
                let millis = buf.get_f64();
                let value = AmfValue::Date(Rc::new(AmfDate { millis }));
                self.object_refs.push(value.clone());
                Ok(value)
            }
        }
    }

    fn decode_array(&mut self, buf: &mut Bytes) -> Result<AmfValue, CodecError> {
        match read_ref_header(buf)? {
            RefHeader::Reference(idx) => self
                .object_refs
                .get(idx as usize)
                .cloned()
                .ok_or(CodecError::TruncatedStream),
            RefHeader::Inline(dense_len) => {
                // Register the (still-empty) array before reading its
                // contents so a self-referential array decodes correctly.
                let cell = Rc::new(RefCell::new(AmfArray::default()));
                let value = AmfValue::Array(cell.clone());
                self.object_refs.push(value.clone());

                let mut assoc = Vec::new();
                loop {
                    let key = self.decode_string(buf)?;
                    if key.is_empty() {
                        break;
                    }
                    let v = self.decode(buf)?;
                    assoc.push((key.to_string(), v));
                }
                let mut dense = Vec::with_capacity(dense_len as usize);
                for _ in 0..dense_len {
                    dense.push(self.decode(buf)?);
                }
                *cell.borrow_mut() = AmfArray { dense, assoc };
                Ok(value)
            }
        }
    }

    fn decode_byte_array(&mut self, buf: &mut Bytes) -> Result<AmfValue, CodecError> {
        match read_ref_header(buf)? {
            RefHeader::Reference(idx) => self
                .object_refs
                .get(idx as usize)
                .cloned()
                .ok_or(CodecError::TruncatedStream),
            RefHeader::Inline(len) => {
                let len = len as usize;
                if buf.remaining() < len {
                    return Err(CodecError::TruncatedStream);
                }
                let bytes = buf.copy_to_bytes(len).to_vec();
                let value = AmfValue::ByteArray(Rc::new(RefCell::new(bytes)));
                self.object_refs.push(value.clone());
                Ok(value)
            }
        }
    }

    fn decode_vector(&mut self, buf: &mut Bytes, kind: VectorKind) -> Result<AmfValue, CodecError> {
        match read_ref_header(buf)? {
            RefHeader::Reference(idx) => self
                .object_refs
                .get(idx as usize)
                .cloned()
                .ok_or(CodecError::TruncatedStream),
            RefHeader::Inline(len) => {
                if !buf.has_remaining() {
                    return Err(CodecError::TruncatedStream);
                }
                let fixed = buf.get_u8() != 0;
                let object_type_name = if kind == VectorKind::Object {
                    self.decode_string(buf)?.to_string()
                } else {
                    String::new()
                };
                let mut vector = AmfVector {
                    kind,
                    fixed,
                    object_type_name,
                    int_values: Vec::new(),
                    uint_values: Vec::new(),
                    double_values: Vec::new(),
                    object_values: Vec::new(),
                };
                let cell = Rc::new(RefCell::new(AmfVector {
                    kind,
                    fixed,
                    object_type_name: vector.object_type_name.clone(),
                    int_values: Vec::new(),
                    uint_values: Vec::new(),
                    double_values: Vec::new(),
                    object_values: Vec::new(),
                }));
                let value = AmfValue::Vector(cell.clone());
                self.object_refs.push(value.clone());
                for _ in 0..len {
                    match kind {
                        VectorKind::Int => {
                            if buf.remaining() < 4 {
                                return Err(CodecError::TruncatedStream);
                            }
                            vector.int_values.push(buf.get_i32());
                        }
                        VectorKind::Uint => {
                            if buf.remaining() < 4 {
                                return Err(CodecError::TruncatedStream);
                            }
                            vector.uint_values.push(buf.get_u32());
                        }
                        VectorKind::Double => {
                            if buf.remaining() < 8 {
                                return Err(CodecError::TruncatedStream);
                            }
                            vector.double_values.push(buf.get_f64());
                        }
                        VectorKind::Object => {
                            vector.object_values.push(self.decode(buf)?);
                        }
                    }
                }
                *cell.borrow_mut() = vector;
                Ok(value)
            }
        }
    }

    fn decode_dictionary(&mut self, buf: &mut Bytes) -> Result<AmfValue, CodecError> {
        match read_ref_header(buf)? {
            RefHeader::Reference(idx) => self
                .object_refs
                .get(idx as usize)
                .cloned()
                .ok_or(CodecError::TruncatedStream),
            RefHeader::Inline(len) => {
                if !buf.has_remaining() {
                    return Err(CodecError::TruncatedStream);
                }
                let weak_keys = buf.get_u8() != 0;
                let cell = Rc::new(RefCell::new(AmfDictionary {
                    weak_keys,
                    entries: Vec::new(),
                }));
                let value = AmfValue::Dictionary(cell.clone());
                self.object_refs.push(value.clone());
                let mut entries = Vec::with_capacity(len as usize);
                for _ in 0..len {
                    let k = self.decode(buf)?;
                    let v = self.decode(buf)?;
                    entries.push((k, v));
                }
                cell.borrow_mut().entries = entries;
                Ok(value)
            }
        }
    }

    fn decode_object(&mut self, buf: &mut Bytes) -> Result<AmfValue, CodecError> {
        let header = read_u29(buf)?;
        if header & 1 == 0 {
            let idx = (header >> 1) as usize;
            return self
                .object_refs
                .get(idx)
                .cloned()
                .ok_or(CodecError::TruncatedStream);
        }
        let traits = if header & 0b10 == 0 {
            // Traits reference: bits [2..] = traits ref index.
            let idx = (header >> 2) as usize;
            self.traits_refs
                .get(idx)
                .cloned()
                .ok_or(CodecError::TruncatedStream)?
        } else {
            let is_externalizable = header & 0b100 != 0;
            let is_dynamic = header & 0b1000 != 0;
            let sealed_count = header >> 4;
            let alias = self.decode_string(buf)?.to_string();
            let mut sealed_properties = Vec::with_capacity(sealed_count as usize);
            if !is_externalizable {
                for _ in 0..sealed_count {
                    sealed_properties.push(self.decode_string(buf)?.to_string());
                }
            }
            let traits = Traits {
                qualified_name: alias.clone(),
                alias,
                is_dynamic,
                is_externalizable,
                sealed_properties,
            };
            self.traits_refs.push(traits.clone());
            traits
        };

        if traits.is_externalizable {
            let mut instance = registry::instantiate(&traits.alias)
                .ok_or_else(|| CodecError::UnknownAlias(traits.alias.clone()))?;
            // Register the placeholder before reading so self-references
            // inside `read_external` resolve to the same instance.
            let cell = Rc::new(RefCell::new(instance_placeholder()));
            let value = AmfValue::Externalizable(cell.clone(), Rc::from(traits.alias.as_str()));
            self.object_refs.push(value.clone());
            instance.read_external(self, buf)?;
            *cell.borrow_mut() = instance;
            return Ok(value);
        }

        let cell = Rc::new(RefCell::new(AmfObject {
            traits: Rc::new(traits.clone()),
            sealed: Vec::new(),
            dynamic: Vec::new(),
        }));
        let value = AmfValue::Object(cell.clone());
        self.object_refs.push(value.clone());

        let mut sealed = Vec::with_capacity(traits.sealed_properties.len());
        for _ in &traits.sealed_properties {
            sealed.push(self.decode(buf)?);
        }
        let mut dynamic = Vec::new();
        if traits.is_dynamic {
            loop {
                let key = self.decode_string(buf)?;
                if key.is_empty() {
                    break;
                }
                let v = self.decode(buf)?;
                dynamic.push((key.to_string(), v));
            }
        }
        cell.borrow_mut().sealed = sealed;
        cell.borrow_mut().dynamic = dynamic;
        Ok(value)
    }
}

/// AMF3 integers are 29-bit two's complement.
fn u29_to_i32(raw: u32) -> i32 {
    if raw >= (1 << 28) {
        (raw as i64 - (1 << 29)) as i32
    } else {
        raw as i32
    }
}

fn instance_placeholder() -> Box<dyn super::value::Externalizable> {
    struct Empty;
    impl std::fmt::Debug for Empty {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "Empty")
        }
    }
    impl super::value::Externalizable for Empty {
        fn write_external(
            &self,
            _enc: &mut super::writer::Amf3Encoder,
            _buf: &mut bytes::BytesMut,
        ) -> Result<(), CodecError> {
            Ok(())
        }
        fn read_external(
            &mut self,
            _dec: &mut Amf3Decoder,
            _buf: &mut Bytes,
        ) -> Result<(), CodecError> {
            Ok(())
        }
    }
    Box::new(Empty)
}

/// Decodes a standalone top-level value with fresh reference tables.
pub fn decode_value(mut buf: Bytes) -> Result<AmfValue, CodecError> {
    let mut decoder = Amf3Decoder::new();
    decoder.decode(&mut buf)
}

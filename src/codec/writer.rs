//! AMF3 encoder (spec §4.1). A fresh [`Amf3Encoder`] must be used per
//! top-level value — the object/string/traits reference tables reset at
//! the start of every top-level object (spec §3).

use std::rc::Rc;

use bytes::{BufMut, Bytes, BytesMut};

use super::error::CodecError;
use super::registry;
use super::traits::Traits;
use super::value::{AmfArray, AmfDictionary, AmfObject, AmfValue, VectorKind};
use super::varint::{write_ref_header, write_u29, RefHeader};

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

/// Lower/upper bound of the signed 28-bit range AMF3 integers can encode
/// without promotion to a double (spec §4.1 "u29").
const I28_MIN: i32 = -(1 << 28);
const I28_MAX: i32 = (1 << 28) - 1;

pub struct Amf3Encoder {
    object_refs: Vec<usize>,
    string_refs: Vec<Rc<str>>,
    traits_refs: Vec<String>,
}

impl Default for Amf3Encoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Amf3Encoder {
    pub fn new() -> Self {
        Amf3Encoder {
            object_refs: Vec::new(),
            string_refs: Vec::new(),
            traits_refs: Vec::new(),
        }
    }

    pub fn encode(&mut self, value: &AmfValue, buf: &mut BytesMut) -> Result<(), CodecError> {
        match value {
            AmfValue::Undefined => buf.put_u8(MARKER_UNDEFINED),
            AmfValue::Null => buf.put_u8(MARKER_NULL),
            AmfValue::Bool(false) => buf.put_u8(MARKER_FALSE),
            AmfValue::Bool(true) => buf.put_u8(MARKER_TRUE),
            AmfValue::Integer(i) => self.encode_integer(*i, buf),
            AmfValue::Double(d) => {
                buf.put_u8(MARKER_DOUBLE);
                buf.put_f64(*d);
            }
            AmfValue::String(s) => {
                buf.put_u8(MARKER_STRING);
                self.encode_string(s, buf)?;
            }
            AmfValue::XmlDocument(s) => {
                buf.put_u8(MARKER_XML_DOC);
                self.encode_xml_body(s, buf)?;
            }
            AmfValue::XmlExtended(s) => {
                buf.put_u8(MARKER_XML);
                self.encode_xml_body(s, buf)?;
            }
            AmfValue::Date(d) => {
                buf.put_u8(MARKER_DATE);
                let ptr = Rc::as_ptr(d) as *const () as usize;
                if let Some(idx) = self.object_refs.iter().position(|p| *p == ptr) {
                    write_ref_header(buf, RefHeader::Reference(idx as u32))?;
                } else {
                    self.object_refs.push(ptr);
                    write_ref_header(buf, RefHeader::Inline(0))?;
                    buf.put_f64(d.millis);
                }
            }
            AmfValue::Array(a) => {
                buf.put_u8(MARKER_ARRAY);
                let ptr = Rc::as_ptr(a) as *const () as usize;
                if let Some(idx) = self.object_refs.iter().position(|p| *p == ptr) {
                    write_ref_header(buf, RefHeader::Reference(idx as u32))?;
                } else {
                    self.object_refs.push(ptr);
                    self.encode_array(&a.borrow(), buf)?;
                }
            }
            AmfValue::ByteArray(b) => {
                buf.put_u8(MARKER_BYTE_ARRAY);
                let ptr = Rc::as_ptr(b) as *const () as usize;
                if let Some(idx) = self.object_refs.iter().position(|p| *p == ptr) {
                    write_ref_header(buf, RefHeader::Reference(idx as u32))?;
                } else {
                    self.object_refs.push(ptr);
                    let bytes = b.borrow();
                    write_ref_header(buf, RefHeader::Inline(bytes.len() as u32))?;
                    buf.put_slice(&bytes);
                }
            }
            AmfValue::Vector(v) => {
                let vec = v.borrow();
                let marker = match vec.kind {
                    VectorKind::Int => MARKER_VECTOR_INT,
                    VectorKind::Uint => MARKER_VECTOR_UINT,
                    VectorKind::Double => MARKER_VECTOR_DOUBLE,
                    VectorKind::Object => MARKER_VECTOR_OBJECT,
                };
                buf.put_u8(marker);
                let ptr = Rc::as_ptr(v) as *const () as usize;
                if let Some(idx) = self.object_refs.iter().position(|p| *p == ptr) {
                    write_ref_header(buf, RefHeader::Reference(idx as u32))?;
                } else {
                    self.object_refs.push(ptr);
                    self.encode_vector(&vec, buf)?;
                }
            }
            AmfValue::Dictionary(d) => {
                buf.put_u8(MARKER_DICTIONARY);
                let ptr = Rc::as_ptr(d) as *const () as usize;
                if let Some(idx) = self.object_refs.iter().position(|p| *p == ptr) {
                    write_ref_header(buf, RefHeader::Reference(idx as u32))?;
                } else {
                    self.object_refs.push(ptr);
                    self.encode_dictionary(&d.borrow(), buf)?;
                }
            }
            AmfValue::Object(o) => {
                buf.put_u8(MARKER_OBJECT);
                let ptr = Rc::as_ptr(o) as *const () as usize;
                if let Some(idx) = self.object_refs.iter().position(|p| *p == ptr) {
                    write_ref_header(buf, RefHeader::Reference(idx as u32))?;
                } else {
                    self.object_refs.push(ptr);
                    self.encode_object(&o.borrow(), buf)?;
                }
            }
            AmfValue::Externalizable(obj, alias) => {
                buf.put_u8(MARKER_OBJECT);
                if !registry::is_registered(alias) {
                    return Err(CodecError::UnknownAlias(alias.to_string()));
                }
                let ptr = Rc::as_ptr(obj) as *const () as usize;
                if let Some(idx) = self.object_refs.iter().position(|p| *p == ptr) {
                    write_ref_header(buf, RefHeader::Reference(idx as u32))?;
                } else {
                    self.object_refs.push(ptr);
                    let key = Traits::externalizable(alias.to_string()).cache_key();
                    if let Some(idx) = self.traits_refs.iter().position(|k| k == &key) {
                        write_u29(buf, ((idx as u32) << 2) | 0b01)?;
                    } else {
                        self.traits_refs.push(key);
                        // Traits header, inline, externalizable, 0 sealed props.
                        write_u29(buf, 0b0111)?;
                        self.encode_string(alias, buf)?;
                    }
                    obj.borrow().write_external(self, buf)?;
                }
            }
        }
        Ok(())
    }

    fn encode_integer(&self, value: i32, buf: &mut BytesMut) {
        if (I28_MIN..=I28_MAX).contains(&value) {
            buf.put_u8(MARKER_INTEGER);
            // 29-bit two's complement representation.
            let bits = (value as u32) & 0x1FFF_FFFF;
            write_u29(buf, bits).expect("28-bit range always fits in 29 bits");
        } else {
            buf.put_u8(MARKER_DOUBLE);
            buf.put_f64(value as f64);
        }
    }

    /// Strings participate in the shared string table unless empty (spec
    /// §4.1 "String de-duplication").
    fn encode_string(&mut self, s: &str, buf: &mut BytesMut) -> Result<(), CodecError> {
        if s.is_empty() {
            write_ref_header(buf, RefHeader::Inline(0))?;
            return Ok(());
        }
        if let Some(idx) = self.string_refs.iter().position(|cached| &**cached == s) {
            write_ref_header(buf, RefHeader::Reference(idx as u32))?;
        } else {
            self.string_refs.push(Rc::from(s));
            let bytes = s.as_bytes();
            write_ref_header(buf, RefHeader::Inline(bytes.len() as u32))?;
            buf.put_slice(bytes);
        }
        Ok(())
    }

    fn encode_xml_body(&mut self, s: &str, buf: &mut BytesMut) -> Result<(), CodecError> {
        // XML documents use the same ref-or-inline + UTF8 body layout as
        // byte arrays, but are not interned in the string table.
        write_ref_header(buf, RefHeader::Inline(s.len() as u32))?;
        buf.put_slice(s.as_bytes());
        Ok(())
    }

    fn encode_array(&mut self, arr: &AmfArray, buf: &mut BytesMut) -> Result<(), CodecError> {
        write_ref_header(buf, RefHeader::Inline(arr.dense.len() as u32))?;
        for (key, value) in &arr.assoc {
            self.encode_string(key, buf)?;
            self.encode(value, buf)?;
        }
        self.encode_string("", buf)?;
        for value in &arr.dense {
            self.encode(value, buf)?;
        }
        Ok(())
    }

    fn encode_object(&mut self, obj: &AmfObject, buf: &mut BytesMut) -> Result<(), CodecError> {
        let key = obj.traits.cache_key();
        if let Some(idx) = self.traits_refs.iter().position(|k| k == &key) {
            // Traits reference: bit0=1 (inline object), bit1=0 (traits ref).
            write_u29(buf, ((idx as u32) << 2) | 0b01)?;
        } else {
            self.traits_refs.push(key);
            let ext = u32::from(obj.traits.is_externalizable);
            let dyn_flag = u32::from(obj.traits.is_dynamic);
            let count = obj.traits.sealed_properties.len() as u32;
            let header = (count << 4) | (dyn_flag << 3) | (ext << 2) | 0b11;
            write_u29(buf, header)?;
            self.encode_string(&obj.traits.alias, buf)?;
            for name in &obj.traits.sealed_properties {
                self.encode_string(name, buf)?;
            }
        }
        for value in &obj.sealed {
            self.encode(value, buf)?;
        }
        if obj.traits.is_dynamic {
            for (name, value) in &obj.dynamic {
                self.encode_string(name, buf)?;
                self.encode(value, buf)?;
            }
            self.encode_string("", buf)?;
        }
        Ok(())
    }

    fn encode_vector(
        &mut self,
        vec: &super::value::AmfVector,
        buf: &mut BytesMut,
    ) -> Result<(), CodecError> {
        use super::value::VectorKind::*;
        let len = match vec.kind {
            Int => vec.int_values.len(),
            Uint => vec.uint_values.len(),
            Double => vec.double_values.len(),
            Object => vec.object_values.len(),
        };
        write_ref_header(buf, RefHeader::Inline(len as u32))?;
        buf.put_u8(u8::from(vec.fixed));
        if vec.kind == Object {
            self.encode_string(&vec.object_type_name, buf)?;
        }
        match vec.kind {
            Int => {
                for v in &vec.int_values {
                    buf.put_i32(*v);
                }
            }
            Uint => {
                for v in &vec.uint_values {
                    buf.put_u32(*v);
                }
            }
            Double => {
                for v in &vec.double_values {
                    buf.put_f64(*v);
                }
            }
            Object => {
                for v in &vec.object_values {
                    self.encode(v, buf)?;
                }
            }
        }
        Ok(())
    }

    fn encode_dictionary(
        &mut self,
        dict: &AmfDictionary,
        buf: &mut BytesMut,
    ) -> Result<(), CodecError> {
        write_ref_header(buf, RefHeader::Inline(dict.entries.len() as u32))?;
        buf.put_u8(u8::from(dict.weak_keys));
        for (k, v) in &dict.entries {
            self.encode(k, buf)?;
            self.encode(v, buf)?;
        }
        Ok(())
    }
}

/// Encodes a standalone top-level value with fresh reference tables (spec
/// §3: "Reset at the start of every top-level object").
pub fn encode_value(value: &AmfValue) -> Result<Bytes, CodecError> {
    let mut encoder = Amf3Encoder::new();
    let mut buf = BytesMut::new();
    encoder.encode(value, &mut buf)?;
    Ok(buf.freeze())
}

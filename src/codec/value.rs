//! Runtime value model the AMF3 codec serializes (spec §4.1, §3 "AMF
//! Reference Tables" / "Traits").
//!
//! Complex values (objects, arrays, byte arrays, dates, vectors,
//! dictionaries) are held behind `Rc<RefCell<_>>` so that decoding a
//! back-reference yields the *same instance* (pointer identity), matching
//! spec §8 property 2.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::error::CodecError;
use super::traits::Traits;

/// A class descriptor callback for externalizable objects (spec §4.1
/// "Externalizable objects", design note §9: "the codec interface takes
/// descriptors, not arbitrary values").
pub trait Externalizable: fmt::Debug {
    fn write_external(
        &self,
        enc: &mut super::writer::Amf3Encoder,
        buf: &mut bytes::BytesMut,
    ) -> Result<(), CodecError>;

    fn read_external(
        &mut self,
        dec: &mut super::reader::Amf3Decoder,
        buf: &mut bytes::Bytes,
    ) -> Result<(), CodecError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct AmfDate {
    pub millis: f64,
}

#[derive(Debug, Clone, Default)]
pub struct AmfArray {
    pub dense: Vec<AmfValue>,
    pub assoc: Vec<(String, AmfValue)>,
}

impl AmfArray {
    /// Strict per spec §4.1: contiguous integer keys `0..len`, no functions
    /// (functions aren't representable in `AmfValue` at all, so any array
    /// with no associative entries is strict).
    pub fn is_strict(&self) -> bool {
        self.assoc.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct AmfObject {
    pub traits: Rc<Traits>,
    /// Parallel to `traits.sealed_properties`.
    pub sealed: Vec<AmfValue>,
    /// Only populated when `traits.is_dynamic`.
    pub dynamic: Vec<(String, AmfValue)>,
}

impl AmfObject {
    pub fn anonymous() -> Self {
        AmfObject {
            traits: Rc::new(Traits::anonymous_dynamic()),
            sealed: Vec::new(),
            dynamic: Vec::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&AmfValue> {
        if let Some(idx) = self
            .traits
            .sealed_properties
            .iter()
            .position(|p| p == name)
        {
            return self.sealed.get(idx);
        }
        self.dynamic.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn set_dynamic(&mut self, name: impl Into<String>, value: AmfValue) {
        self.dynamic.push((name.into(), value));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorKind {
    Int,
    Uint,
    Double,
    Object,
}

#[derive(Debug, Clone)]
pub struct AmfVector {
    pub kind: VectorKind,
    pub fixed: bool,
    pub object_type_name: String,
    pub int_values: Vec<i32>,
    pub uint_values: Vec<u32>,
    pub double_values: Vec<f64>,
    pub object_values: Vec<AmfValue>,
}

#[derive(Debug, Clone, Default)]
pub struct AmfDictionary {
    pub weak_keys: bool,
    pub entries: Vec<(AmfValue, AmfValue)>,
}

/// The closed set of runtime values the codec round-trips (spec §4.1).
#[derive(Clone)]
pub enum AmfValue {
    Undefined,
    Null,
    Bool(bool),
    Integer(i32),
    Double(f64),
    /// Non-empty strings participate in the string reference table; the
    /// empty string never does (spec §4.1 "String de-duplication").
    String(Rc<str>),
    /// Legacy XML document (marker `0x07`).
    XmlDocument(Rc<str>),
    /// E4X XML (marker `0x0B`).
    XmlExtended(Rc<str>),
    Date(Rc<AmfDate>),
    Array(Rc<RefCell<AmfArray>>),
    Object(Rc<RefCell<AmfObject>>),
    ByteArray(Rc<RefCell<Vec<u8>>>),
    Vector(Rc<RefCell<AmfVector>>),
    Dictionary(Rc<RefCell<AmfDictionary>>),
    Externalizable(Rc<RefCell<Box<dyn Externalizable>>>, Rc<str>),
}

impl AmfValue {
    pub fn string(s: impl Into<String>) -> Self {
        AmfValue::String(Rc::from(s.into()))
    }

    pub fn object(obj: AmfObject) -> Self {
        AmfValue::Object(Rc::new(RefCell::new(obj)))
    }

    pub fn array(arr: AmfArray) -> Self {
        AmfValue::Array(Rc::new(RefCell::new(arr)))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AmfValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            AmfValue::Integer(i) => Some(*i),
            AmfValue::Double(d) => Some(*d as i32),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AmfValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Pointer-identity aware equality used by reference-preservation tests
    /// (spec §8 property 2): two `AmfValue`s decoded from the same
    /// reference slot must point at the same heap allocation.
    pub fn same_instance(&self, other: &AmfValue) -> bool {
        match (self, other) {
            (AmfValue::Object(a), AmfValue::Object(b)) => Rc::ptr_eq(a, b),
            (AmfValue::Array(a), AmfValue::Array(b)) => Rc::ptr_eq(a, b),
            (AmfValue::ByteArray(a), AmfValue::ByteArray(b)) => Rc::ptr_eq(a, b),
            (AmfValue::Date(a), AmfValue::Date(b)) => Rc::ptr_eq(a, b),
            (AmfValue::Vector(a), AmfValue::Vector(b)) => Rc::ptr_eq(a, b),
            (AmfValue::Dictionary(a), AmfValue::Dictionary(b)) => Rc::ptr_eq(a, b),
            (AmfValue::String(a), AmfValue::String(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for AmfValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AmfValue::Undefined => write!(f, "Undefined"),
            AmfValue::Null => write!(f, "Null"),
            AmfValue::Bool(b) => write!(f, "Bool({b})"),
            AmfValue::Integer(i) => write!(f, "Integer({i})"),
            AmfValue::Double(d) => write!(f, "Double({d})"),
            AmfValue::String(s) => write!(f, "String({s:?})"),
            AmfValue::XmlDocument(s) => write!(f, "XmlDocument({s:?})"),
            AmfValue::XmlExtended(s) => write!(f, "XmlExtended({s:?})"),
            AmfValue::Date(d) => write!(f, "Date({:?})", d.millis),
            AmfValue::Array(a) => write!(f, "Array({:?})", a.borrow()),
            AmfValue::Object(o) => write!(f, "Object({:?})", o.borrow()),
            AmfValue::ByteArray(b) => write!(f, "ByteArray(len={})", b.borrow().len()),
            AmfValue::Vector(v) => write!(f, "Vector({:?})", v.borrow()),
            AmfValue::Dictionary(d) => write!(f, "Dictionary({:?})", d.borrow()),
            AmfValue::Externalizable(_, alias) => write!(f, "Externalizable({alias})"),
        }
    }
}

impl PartialEq for AmfValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (AmfValue::Undefined, AmfValue::Undefined) => true,
            (AmfValue::Null, AmfValue::Null) => true,
            (AmfValue::Bool(a), AmfValue::Bool(b)) => a == b,
            (AmfValue::Integer(a), AmfValue::Integer(b)) => a == b,
            (AmfValue::Double(a), AmfValue::Double(b)) => a == b || (a.is_nan() && b.is_nan()),
            (AmfValue::String(a), AmfValue::String(b)) => a == b,
            (AmfValue::XmlDocument(a), AmfValue::XmlDocument(b)) => a == b,
            (AmfValue::XmlExtended(a), AmfValue::XmlExtended(b)) => a == b,
            (AmfValue::Date(a), AmfValue::Date(b)) => a.millis == b.millis,
            (AmfValue::Array(a), AmfValue::Array(b)) => {
                a.borrow().dense == b.borrow().dense && a.borrow().assoc == b.borrow().assoc
            }
            (AmfValue::ByteArray(a), AmfValue::ByteArray(b)) => *a.borrow() == *b.borrow(),
            _ => false,
        }
    }
}

impl PartialEq for AmfArray {
    fn eq(&self, other: &Self) -> bool {
        self.dense == other.dense && self.assoc == other.assoc
    }
}

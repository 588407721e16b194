//! AMF3 binary codec (spec §4.1): integer/double/string/object/array/
//! vector/date/byte-array with reference tables, externalizable objects,
//! traits for sealed classes, registered class aliases.

mod error;
mod reader;
mod registry;
mod remoting;
mod traits;
mod value;
mod varint;

pub use error::CodecError;
pub use reader::{decode_value, Amf3Decoder};
pub use registry::{instantiate, is_registered, register_alias};
pub use remoting::{AmfBody, AmfHeader, AmfMessageBody, Envelope};
pub use traits::Traits;
pub use value::{
    AmfArray, AmfDate, AmfDictionary, AmfObject, AmfValue, AmfVector, Externalizable, VectorKind,
};
pub use writer::{encode_value, Amf3Encoder};

mod writer;

#[cfg(test)]
mod tests;

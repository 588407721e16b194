//! HTTP service response decoding pipeline (spec §4.8).

use crate::codec::{AmfArray, AmfObject, AmfValue};

use super::xml_transform::{transform_to_array, transform_to_object};
use super::{HttpServiceError, ResultFormat};

fn json_to_amf(value: serde_json::Value) -> AmfValue {
    match value {
        serde_json::Value::Null => AmfValue::Null,
        serde_json::Value::Bool(b) => AmfValue::Bool(b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                if let Ok(i) = i32::try_from(i) {
                    return AmfValue::Integer(i);
                }
            }
            AmfValue::Double(n.as_f64().unwrap_or(f64::NAN))
        }
        serde_json::Value::String(s) => AmfValue::string(s),
        serde_json::Value::Array(items) => AmfValue::array(AmfArray {
            dense: items.into_iter().map(json_to_amf).collect(),
            assoc: Vec::new(),
        }),
        serde_json::Value::Object(map) => {
            let mut obj = AmfObject::anonymous();
            for (k, v) in map {
                obj.set_dynamic(k, json_to_amf(v));
            }
            AmfValue::object(obj)
        }
    }
}

/// `resultFormat=flashvars` (spec §4.8): `&`-delimited `k=v` pairs,
/// URL-decoded with `+` mapped to space.
fn decode_flashvars(body: &str) -> AmfValue {
    let mut obj = AmfObject::anonymous();
    for segment in body.trim().split('&').filter(|s| !s.is_empty()) {
        let (key, value) = match segment.split_once('=') {
            Some((k, v)) => (k, v),
            None => (segment, ""),
        };
        obj.set_dynamic(url_decode_plus(key), AmfValue::string(url_decode_plus(value)));
    }
    AmfValue::object(obj)
}

fn url_decode_plus(s: &str) -> String {
    let with_spaces = s.replace('+', " ");
    percent_encoding::percent_decode_str(&with_spaces)
        .decode_utf8_lossy()
        .into_owned()
}

/// Decode a raw HTTP response body per the operation's result format
/// (spec §4.8 "Response decoding by result-format").
pub fn decode_response(format: ResultFormat, body: &[u8]) -> Result<AmfValue, HttpServiceError> {
    let text = || {
        String::from_utf8(body.to_vec())
            .map_err(|e| HttpServiceError::CouldNotDecode(e.to_string()))
    };

    match format {
        ResultFormat::Text => Ok(AmfValue::string(text()?)),
        ResultFormat::Json => {
            let value: serde_json::Value = serde_json::from_slice(body)
                .map_err(|e| HttpServiceError::CouldNotDecode(e.to_string()))?;
            Ok(json_to_amf(value))
        }
        // `xml` (native XML object) maps onto the legacy XML document
        // marker; `haxe-xml` (generic DOM) onto the E4X marker — the same
        // split the codec draws between 0x07 and 0x0B (spec §4.1).
        ResultFormat::Xml => {
            let xml = text()?;
            quick_xml::Reader::from_str(&xml)
                .read_event()
                .map_err(|e| HttpServiceError::CouldNotDecode(e.to_string()))?;
            Ok(AmfValue::XmlDocument(xml.into()))
        }
        ResultFormat::HaxeXml => {
            let xml = text()?;
            quick_xml::Reader::from_str(&xml)
                .read_event()
                .map_err(|e| HttpServiceError::CouldNotDecode(e.to_string()))?;
            Ok(AmfValue::XmlExtended(xml.into()))
        }
        ResultFormat::E4x => {
            let xml = text()?;
            Ok(AmfValue::XmlExtended(xml.into()))
        }
        ResultFormat::Object => transform_to_object(&text()?),
        ResultFormat::Array => transform_to_array(&text()?),
        ResultFormat::FlashVars => Ok(decode_flashvars(&text()?)),
        ResultFormat::Custom => Ok(AmfValue::string(text()?)),
    }
}

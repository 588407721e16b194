//! HTTP service request construction pipeline (spec §4.8 steps 1-4).

use bytes::Bytes;
use percent_encoding::{percent_encode, NON_ALPHANUMERIC};

use crate::codec::AmfValue;

use super::ResultFormat;

/// A field in the parameter record sent as the operation's body (spec
/// §4.8: "parameter record"). Array-valued fields repeat the form-encoded
/// name once per element.
#[derive(Debug, Clone)]
pub enum ParamValue {
    Scalar(AmfValue),
    Array(Vec<AmfValue>),
}

pub type ParamRecord = Vec<(String, ParamValue)>;

/// Supplies content type, final URL, and serialized body for a given
/// result format, taking precedence over the default shaping rules (spec
/// §4.8 step 1: "a serialization filter is registered for the result
/// format").
pub trait SerializationFilter {
    fn format(&self) -> ResultFormat;
    fn serialize(&self, url: &str, params: &ParamRecord) -> (String, String, Bytes);
}

#[derive(Debug, Clone)]
pub enum RequestBody {
    Record(ParamRecord),
    Xml(String),
    Raw(Bytes),
}

#[derive(Debug, Clone)]
pub struct HttpRequestSpec {
    pub url: String,
    pub method: Option<String>,
    pub content_type: Option<String>,
    pub body: RequestBody,
}

#[derive(Debug, Clone)]
pub struct BuiltRequest {
    pub url: String,
    pub method: String,
    pub content_type: String,
    pub body: Bytes,
}

fn scalar_to_string(value: &AmfValue) -> String {
    match value {
        AmfValue::String(s) => s.to_string(),
        AmfValue::Integer(i) => i.to_string(),
        AmfValue::Double(d) => d.to_string(),
        AmfValue::Bool(b) => b.to_string(),
        AmfValue::Null | AmfValue::Undefined => String::new(),
        other => format!("{other:?}"),
    }
}

fn flatten_form_encoded(params: &ParamRecord) -> String {
    let mut segments = Vec::new();
    for (name, value) in params {
        let encoded_name = percent_encode(name.as_bytes(), NON_ALPHANUMERIC).to_string();
        match value {
            ParamValue::Scalar(v) => {
                let encoded = percent_encode(scalar_to_string(v).as_bytes(), NON_ALPHANUMERIC);
                segments.push(format!("{encoded_name}={encoded}"));
            }
            ParamValue::Array(values) => {
                for v in values {
                    let encoded = percent_encode(scalar_to_string(v).as_bytes(), NON_ALPHANUMERIC);
                    segments.push(format!("{encoded_name}={encoded}"));
                }
            }
        }
    }
    segments.join("&")
}

/// Default XML encoding of a parameter record: one element per field,
/// array-valued fields repeat the element.
fn encode_record_as_xml(params: &ParamRecord) -> String {
    let mut body = String::from("<request>");
    for (name, value) in params {
        match value {
            ParamValue::Scalar(v) => {
                body.push_str(&format!("<{name}>{}</{name}>", scalar_to_string(v)));
            }
            ParamValue::Array(values) => {
                for v in values {
                    body.push_str(&format!("<{name}>{}</{name}>", scalar_to_string(v)));
                }
            }
        }
    }
    body.push_str("</request>");
    body
}

const DEFAULT_FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const DEFAULT_XML_CONTENT_TYPE: &str = "application/xml";

/// Build the final request per spec §4.8 steps 1-4.
pub fn build_request(
    spec: HttpRequestSpec,
    filter: Option<&dyn SerializationFilter>,
) -> BuiltRequest {
    if let (Some(filter), RequestBody::Record(params)) = (filter, &spec.body) {
        let (content_type, url, body) = filter.serialize(&spec.url, params);
        let method = spec.method.unwrap_or_else(|| "GET".to_string());
        return BuiltRequest {
            url,
            method,
            content_type,
            body,
        };
    }

    let is_xml_content_type = spec
        .content_type
        .as_deref()
        .map(|ct| ct.contains("xml"))
        .unwrap_or(false);

    let (content_type, body_str) = match &spec.body {
        RequestBody::Xml(xml) => (
            spec.content_type
                .clone()
                .unwrap_or_else(|| DEFAULT_XML_CONTENT_TYPE.to_string()),
            xml.clone(),
        ),
        RequestBody::Raw(bytes) => {
            let ct = spec
                .content_type
                .clone()
                .unwrap_or_else(|| DEFAULT_FORM_CONTENT_TYPE.to_string());
            return BuiltRequest {
                url: spec.url,
                method: spec.method.unwrap_or_else(|| "GET".to_string()),
                content_type: ct,
                body: bytes.clone(),
            };
        }
        RequestBody::Record(params) => {
            if is_xml_content_type {
                (DEFAULT_XML_CONTENT_TYPE.to_string(), encode_record_as_xml(params))
            } else {
                (
                    spec.content_type
                        .clone()
                        .unwrap_or_else(|| DEFAULT_FORM_CONTENT_TYPE.to_string()),
                    flatten_form_encoded(params),
                )
            }
        }
    };

    let mut method = spec.method.unwrap_or_else(|| "GET".to_string());
    if content_type.contains("xml") && method.eq_ignore_ascii_case("GET") {
        method = "POST".to_string();
    }

    BuiltRequest {
        url: spec.url,
        method,
        content_type,
        body: Bytes::from(body_str.into_bytes()),
    }
}

//! The `object`/`array` result-format XML-to-value transform (spec §4.8):
//! a minimal DOM built with `quick-xml`, then folded into [`AmfValue`]
//! records/arrays.

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::codec::{AmfArray, AmfObject, AmfValue};

use super::HttpServiceError;

#[derive(Debug, Default)]
struct XmlNode {
    name: String,
    attrs: Vec<(String, String)>,
    children: Vec<XmlNode>,
    text: Option<String>,
}

fn parse_document(xml: &str) -> Result<XmlNode, HttpServiceError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut stack: Vec<XmlNode> = Vec::new();
    let mut root: Option<XmlNode> = None;

    loop {
        match reader
            .read_event()
            .map_err(|e| HttpServiceError::CouldNotDecode(e.to_string()))?
        {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                let attrs = e
                    .attributes()
                    .filter_map(|a| a.ok())
                    .filter(|a| !a.key.as_ref().starts_with(b"xmlns"))
                    .map(|a| {
                        let key = String::from_utf8_lossy(a.key.as_ref()).into_owned();
                        let value = a.unescape_value().unwrap_or_default().into_owned();
                        (key, value)
                    })
                    .collect();
                stack.push(XmlNode {
                    name,
                    attrs,
                    children: Vec::new(),
                    text: None,
                });
            }
            Event::Empty(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                let attrs = e
                    .attributes()
                    .filter_map(|a| a.ok())
                    .filter(|a| !a.key.as_ref().starts_with(b"xmlns"))
                    .map(|a| {
                        let key = String::from_utf8_lossy(a.key.as_ref()).into_owned();
                        let value = a.unescape_value().unwrap_or_default().into_owned();
                        (key, value)
                    })
                    .collect();
                let node = XmlNode {
                    name,
                    attrs,
                    children: Vec::new(),
                    text: None,
                };
                push_finished(&mut stack, &mut root, node);
            }
            Event::Text(t) => {
                let text = t
                    .unescape()
                    .map_err(|e| HttpServiceError::CouldNotDecode(e.to_string()))?
                    .into_owned();
                if let Some(top) = stack.last_mut() {
                    top.text = Some(text);
                }
            }
            Event::End(_) => {
                let node = stack
                    .pop()
                    .ok_or_else(|| HttpServiceError::CouldNotDecode("unbalanced XML".to_string()))?;
                push_finished(&mut stack, &mut root, node);
            }
            Event::Eof => break,
            _ => {}
        }
    }
    root.ok_or_else(|| HttpServiceError::CouldNotDecode("empty XML document".to_string()))
}

fn push_finished(stack: &mut Vec<XmlNode>, root: &mut Option<XmlNode>, node: XmlNode) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
    } else {
        *root = Some(node);
    }
}

/// "number if fully numeric with no leading zero" (spec §4.8).
fn is_plain_number(s: &str) -> bool {
    let body = s.strip_prefix('-').unwrap_or(s);
    if body.is_empty() || !body.bytes().all(|b| b.is_ascii_digit() || b == b'.') {
        return false;
    }
    if body.len() > 1 && body.as_bytes()[0] == b'0' && body.as_bytes()[1] != b'.' {
        return false;
    }
    body.parse::<f64>().is_ok()
}

fn scalar_from_text(text: &str) -> AmfValue {
    let trimmed = text.trim();
    if trimmed.eq_ignore_ascii_case("true") {
        AmfValue::Bool(true)
    } else if trimmed.eq_ignore_ascii_case("false") {
        AmfValue::Bool(false)
    } else if is_plain_number(trimmed) {
        match trimmed.parse::<i32>() {
            Ok(i) if !trimmed.contains('.') => AmfValue::Integer(i),
            _ => AmfValue::Double(trimmed.parse::<f64>().unwrap_or(f64::NAN)),
        }
    } else {
        AmfValue::string(trimmed)
    }
}

fn transform_node(node: &XmlNode) -> AmfValue {
    let attr_fields: Vec<(String, AmfValue)> = node
        .attrs
        .iter()
        .map(|(k, v)| (k.clone(), scalar_from_text(v)))
        .collect();

    if node.children.is_empty() {
        let text_value = node.text.as_deref().map(scalar_from_text);
        return match (text_value, attr_fields.is_empty()) {
            (Some(scalar), true) => scalar,
            (None, true) => AmfValue::string(""),
            (text, false) => {
                let mut obj = AmfObject::anonymous();
                if let Some(scalar) = text {
                    obj.set_dynamic("value", scalar);
                }
                for (k, v) in attr_fields {
                    obj.set_dynamic(k, v);
                }
                AmfValue::object(obj)
            }
        };
    }

    let mut groups: Vec<(String, Vec<AmfValue>)> = Vec::new();
    for child in &node.children {
        let value = transform_node(child);
        match groups.iter_mut().find(|(name, _)| name == &child.name) {
            Some((_, values)) => values.push(value),
            None => groups.push((child.name.clone(), vec![value])),
        }
    }

    let mut obj = AmfObject::anonymous();
    for (k, v) in attr_fields {
        obj.set_dynamic(k, v);
    }
    for (name, mut values) in groups {
        if values.len() == 1 {
            obj.set_dynamic(name, values.pop().unwrap());
        } else {
            obj.set_dynamic(
                name,
                AmfValue::array(AmfArray {
                    dense: values,
                    assoc: Vec::new(),
                }),
            );
        }
    }
    AmfValue::object(obj)
}

/// `resultFormat=object` (spec §4.8).
pub fn transform_to_object(xml: &str) -> Result<AmfValue, HttpServiceError> {
    let root = parse_document(xml)?;
    Ok(transform_node(&root))
}

/// `resultFormat=array`: same transform, then non-array results are
/// wrapped in a one-element array (spec §4.8).
pub fn transform_to_array(xml: &str) -> Result<AmfValue, HttpServiceError> {
    let value = transform_to_object(xml)?;
    Ok(match value {
        AmfValue::Array(_) => value,
        other => AmfValue::array(AmfArray {
            dense: vec![other],
            assoc: Vec::new(),
        }),
    })
}

//! Scenario S3 (HTTP JSON) and S4 (XML-to-object transform), spec §8.

use std::cell::RefCell;
use std::rc::Rc;

use async_trait::async_trait;
use bytes::Bytes;

use flex_rpc::codec::AmfValue;
use flex_rpc::http_service::{
    HttpOperation, HttpRequestSpec, ParamValue, RequestBody, ResultFormat,
};
use flex_rpc::transport::{HttpTransport, RawHttpResponse, TransportError};

struct FakeTransport {
    response_body: Bytes,
    seen_body: Rc<RefCell<Option<Bytes>>>,
    seen_content_type: Rc<RefCell<Option<String>>>,
}

#[async_trait(?Send)]
impl HttpTransport for FakeTransport {
    async fn send(
        &self,
        _url: &str,
        _method: &str,
        content_type: &str,
        body: Bytes,
    ) -> Result<RawHttpResponse, TransportError> {
        *self.seen_body.borrow_mut() = Some(body);
        *self.seen_content_type.borrow_mut() = Some(content_type.to_string());
        Ok(RawHttpResponse {
            status: 200,
            headers: Vec::new(),
            body: self.response_body.clone(),
        })
    }
}

#[tokio::test]
async fn s3_http_json_round_trip() {
    let seen_body = Rc::new(RefCell::new(None));
    let seen_content_type = Rc::new(RefCell::new(None));
    let transport = FakeTransport {
        response_body: Bytes::from_static(br#"{"message":"hi"}"#),
        seen_body: seen_body.clone(),
        seen_content_type: seen_content_type.clone(),
    };

    let mut op = HttpOperation::new("echo", ResultFormat::Json);
    let spec = HttpRequestSpec {
        url: "http://example.invalid/echo".to_string(),
        method: Some("POST".to_string()),
        content_type: Some("application/x-www-form-urlencoded".to_string()),
        body: RequestBody::Record(vec![("name".to_string(), ParamValue::Scalar(AmfValue::string("A")))]),
    };

    let token = op.send(&transport, spec, None).await.unwrap();

    assert_eq!(
        seen_body.borrow().as_deref(),
        Some(&b"name=A"[..]),
        "form-encoded body should be name=A"
    );
    assert_eq!(
        seen_content_type.borrow().as_deref(),
        Some("application/x-www-form-urlencoded")
    );

    let settled = Rc::new(RefCell::new(None));
    let settled2 = settled.clone();
    token.add_responder(flex_rpc::agent::Responder::new(
        move |v| *settled2.borrow_mut() = Some(v.clone()),
        |_| {},
    ));

    match settled.borrow().as_ref().unwrap() {
        AmfValue::Object(obj) => {
            assert_eq!(obj.borrow().get("message"), Some(&AmfValue::string("hi")));
        }
        other => panic!("expected object, got {other:?}"),
    }
}

#[tokio::test]
async fn s4_xml_to_object_transform() {
    let transport = FakeTransport {
        response_body: Bytes::from_static(b"<root><m>hi</m><m>there</m><err>x</err></root>"),
        seen_body: Rc::new(RefCell::new(None)),
        seen_content_type: Rc::new(RefCell::new(None)),
    };

    let mut op = HttpOperation::new("echo", ResultFormat::Object);
    let spec = HttpRequestSpec {
        url: "http://example.invalid/echo".to_string(),
        method: Some("GET".to_string()),
        content_type: None,
        body: RequestBody::Raw(Bytes::new()),
    };

    let token = op.send(&transport, spec, None).await.unwrap();

    let settled = Rc::new(RefCell::new(None));
    let settled2 = settled.clone();
    token.add_responder(flex_rpc::agent::Responder::new(
        move |v| *settled2.borrow_mut() = Some(v.clone()),
        |_| {},
    ));

    match settled.borrow().as_ref().unwrap() {
        AmfValue::Object(obj) => {
            let obj = obj.borrow();
            match obj.get("m").unwrap() {
                AmfValue::Array(cell) => {
                    assert_eq!(
                        cell.borrow().dense,
                        vec![AmfValue::string("hi"), AmfValue::string("there")]
                    );
                }
                other => panic!("expected array for repeated <m>, got {other:?}"),
            }
            assert_eq!(obj.get("err"), Some(&AmfValue::string("x")));
        }
        other => panic!("expected object, got {other:?}"),
    }
}

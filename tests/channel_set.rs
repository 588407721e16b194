//! Hunting/failover and pending-send queue behavior (spec §8 properties
//! 4-6, scenario S6).

use std::cell::RefCell;
use std::rc::Rc;

use async_trait::async_trait;
use bytes::Bytes;
use uuid::Uuid;

use flex_rpc::codec::{AmfArray, AmfObject, AmfValue};
use flex_rpc::message::{CommandOperation, MessageHeader, MessageKind};
use flex_rpc::transport::{
    AmfChannel, Channel, ChannelSet, Credentials, HttpTransport, RawHttpResponse, TransportError,
};

/// Fails connect attempts to any url containing "bad", succeeds otherwise.
struct SelectiveTransport {
    sent_urls: Rc<RefCell<Vec<String>>>,
}

#[async_trait(?Send)]
impl HttpTransport for SelectiveTransport {
    async fn send(
        &self,
        url: &str,
        _method: &str,
        _content_type: &str,
        _body: Bytes,
    ) -> Result<RawHttpResponse, TransportError> {
        self.sent_urls.borrow_mut().push(url.to_string());
        if url.contains("bad") {
            Err(TransportError::ConnectFailed {
                channel_id: "x".to_string(),
                reason: "refused".to_string(),
            })
        } else {
            Ok(RawHttpResponse {
                status: 200,
                headers: Vec::new(),
                body: Bytes::new(),
            })
        }
    }
}

fn noop_ping(_channel: &Channel) -> (Bytes, String) {
    (Bytes::new(), "application/x-amf".to_string())
}

#[tokio::test]
async fn hunt_exhaustion_resets_cursor() {
    let sent = Rc::new(RefCell::new(Vec::new()));
    let transport = SelectiveTransport { sent_urls: sent.clone() };
    let channels = vec![
        AmfChannel::new_channel("c0", "http://bad-0"),
        AmfChannel::new_channel("c1", "http://bad-1"),
        AmfChannel::new_channel("c2", "http://bad-2"),
    ];
    let mut set = ChannelSet::new(channels);

    let err = set.connect(&transport, noop_ping).await.unwrap_err();
    assert!(matches!(err, TransportError::ConnectFailed { .. }));
    assert_eq!(sent.borrow().len(), 3, "exactly N connect attempts");
    assert!(set.current_channel().is_none(), "cursor resets to -1 equivalent");
}

#[tokio::test]
async fn hunt_then_recover_drains_pending_in_order() {
    let sent = Rc::new(RefCell::new(Vec::new()));
    let transport = SelectiveTransport { sent_urls: sent.clone() };
    let channels = vec![
        AmfChannel::new_channel("c0", "http://bad"),
        AmfChannel::new_channel("c1", "http://good"),
    ];
    let mut set = ChannelSet::new(channels);
    set.connect(&transport, noop_ping).await.unwrap();
    assert_eq!(set.current_channel().unwrap().id, "c1");

    let mut expected_order = Vec::new();
    for i in 0..3 {
        let mut header = MessageHeader::new("dest");
        header = header.with_header("seq", AmfValue::Integer(i));
        let msg = MessageKind::Command {
            header,
            operation: CommandOperation::Poll,
            body: AmfValue::Undefined,
        };
        expected_order.push(msg.message_id());
        assert!(set.enqueue(Uuid::new_v4(), msg, None, false));
    }
    assert_eq!(set.pending_len(), 3);

    let mut observed_order = Vec::new();
    while let Some(result) = set
        .send_next(&transport, |m| (Bytes::new(), format!("seq={:?}", m.message_id())))
        .await
    {
        let (responder, outcome) = result.unwrap();
        assert!(matches!(outcome, flex_rpc::transport::DrainOutcome::Sent(_)));
        observed_order.push(responder.message_id);
    }
    assert_eq!(observed_order, expected_order, "pending-send drain preserves insertion order");
}

#[tokio::test]
async fn heartbeat_suppressed_while_poll_outstanding() {
    use std::time::{Duration, Instant};

    let transport = SelectiveTransport {
        sent_urls: Rc::new(RefCell::new(Vec::new())),
    };
    let channels = vec![AmfChannel::new_channel("c0", "http://good")];
    let mut set = ChannelSet::new(channels).with_heartbeat(Duration::from_millis(1));
    set.connect(&transport, noop_ping).await.unwrap();

    let now = Instant::now();
    assert!(set.due_for_heartbeat(now), "due before any heartbeat has been sent");

    set.channels[0].poll_outstanding = true;
    assert!(
        !set.due_for_heartbeat(now),
        "heartbeat suppressed while a poll is outstanding on the current channel"
    );

    set.channels[0].poll_outstanding = false;
    assert!(set.due_for_heartbeat(now), "heartbeat resumes once the poll settles");
}

#[tokio::test]
async fn login_is_single_flight_and_propagates_on_ack() {
    let transport = SelectiveTransport {
        sent_urls: Rc::new(RefCell::new(Vec::new())),
    };
    let channels = vec![
        AmfChannel::new_channel("c0", "http://good"),
        AmfChannel::new_channel("c1", "http://good"),
    ];
    let mut set = ChannelSet::new(channels);
    set.connect(&transport, noop_ping).await.unwrap();

    let creds = Credentials {
        username: "alice".to_string(),
        password: "s3cr3t".to_string(),
        utf8_charset: true,
    };
    let command = set.login(creds).unwrap();
    match command {
        MessageKind::Command {
            operation, body, ..
        } => {
            assert_eq!(operation, CommandOperation::Login);
            assert_eq!(body, AmfValue::string("YWxpY2U6czNjcjN0"));
        }
        other => panic!("expected a login command, got {other:?}"),
    }

    let creds2 = Credentials {
        username: "bob".to_string(),
        password: "x".to_string(),
        utf8_charset: false,
    };
    let err = set.login(creds2).unwrap_err();
    assert!(matches!(err, TransportError::ConcurrentLogin));

    set.handle_login_ack();
    for channel in &set.channels {
        assert!(channel.authenticated);
        assert_eq!(channel.credentials.as_ref().map(|c| c.username.as_str()), Some("alice"));
    }

    // The slot is free again now that the login settled.
    let creds3 = Credentials {
        username: "carol".to_string(),
        password: "y".to_string(),
        utf8_charset: false,
    };
    assert!(set.login(creds3).is_ok());
}

#[tokio::test]
async fn duplicate_message_id_enqueues_once() {
    let transport = SelectiveTransport {
        sent_urls: Rc::new(RefCell::new(Vec::new())),
    };
    let channels = vec![AmfChannel::new_channel("c0", "http://good")];
    let mut set = ChannelSet::new(channels);
    set.connect(&transport, noop_ping).await.unwrap();

    let msg = MessageKind::command("dest", CommandOperation::Poll);
    let agent_id = Uuid::new_v4();
    assert!(set.enqueue(agent_id, msg.clone(), None, false));
    assert!(
        !set.enqueue(agent_id, msg, None, false),
        "second enqueue of same message id is a no-op"
    );
    assert_eq!(set.pending_len(), 1);
}

#[tokio::test]
async fn trigger_connect_is_acknowledged_locally_and_needs_config_ping_is_tagged() {
    let sent = Rc::new(RefCell::new(Vec::new()));
    let transport = SelectiveTransport { sent_urls: sent.clone() };
    let channels = vec![AmfChannel::new_channel("c0", "http://good")];
    let mut set = ChannelSet::new(channels);
    set.connect(&transport, noop_ping).await.unwrap();

    let trigger = MessageKind::command("dest", CommandOperation::TriggerConnect);
    assert!(set.enqueue(Uuid::new_v4(), trigger, None, false));

    let ping = MessageKind::command("dest", CommandOperation::Ping);
    let ping_id = ping.message_id();
    assert!(set.enqueue(Uuid::new_v4(), ping, None, true));

    let (responder, outcome) = set
        .send_next(&transport, |m| (Bytes::new(), format!("seq={:?}", m.message_id())))
        .await
        .unwrap()
        .unwrap();
    assert!(
        matches!(outcome, flex_rpc::transport::DrainOutcome::LocallyAcknowledged),
        "trigger-connect is acknowledged locally, not forwarded"
    );
    assert!(sent.borrow().is_empty(), "trigger-connect never reaches the transport");
    drop(responder);

    let mut observed_needs_config = false;
    let (_responder, outcome) = set
        .send_next(&transport, |m| {
            if m.message_id() == ping_id {
                if let MessageKind::Command { header, .. } = m {
                    observed_needs_config = header
                        .headers
                        .get("DSNeedsConfig")
                        .map(|v| matches!(v, AmfValue::Bool(true)))
                        .unwrap_or(false);
                }
            }
            (Bytes::new(), "application/x-amf".to_string())
        })
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(outcome, flex_rpc::transport::DrainOutcome::Sent(_)));
    assert!(observed_needs_config, "needsConfig ping gets DSNeedsConfig header before forwarding");
    assert_eq!(sent.borrow().len(), 1, "only the ping reaches the transport");
}

#[tokio::test]
async fn cluster_discovery_assigns_failover_uris_and_materializes_new_channels() {
    let transport = SelectiveTransport {
        sent_urls: Rc::new(RefCell::new(Vec::new())),
    };
    let channels = vec![AmfChannel::new_channel("c0", "http://good")];
    let mut set = ChannelSet::new(channels);
    set.connect(&transport, noop_ping).await.unwrap();

    let mut mapping_a = AmfObject::anonymous();
    mapping_a.set_dynamic("c0", AmfValue::string("http://c0-node-1"));
    mapping_a.set_dynamic("c1", AmfValue::string("http://c1-node-1"));

    let mut mapping_b = AmfObject::anonymous();
    mapping_b.set_dynamic("c0", AmfValue::string("http://c0-node-2"));

    let body = AmfValue::array(AmfArray {
        dense: vec![AmfValue::object(mapping_a), AmfValue::object(mapping_b)],
        assoc: Vec::new(),
    });

    set.apply_cluster_discovery(&body);

    let c0 = set.channels.iter().find(|c| c.id == "c0").unwrap();
    assert_eq!(c0.failover_uris, vec!["http://c0-node-1", "http://c0-node-2"]);

    let c1 = set.channels.iter().find(|c| c.id == "c1").expect("c1 lazily materialized");
    assert_eq!(c1.endpoint_uri, "http://c1-node-1");
    assert!(c1.failover_uris.is_empty());
}

//! Concurrency-policy properties (spec §8 properties 9-10).

use flex_rpc::agent::{AgentError, ConcurrencyPolicy, RemoteObject};
use flex_rpc::codec::AmfValue;

#[test]
fn concurrency_single_rejects_second_in_flight_call() {
    let mut remote = RemoteObject::new("dest", ConcurrencyPolicy::Single);
    let (_msg1, token1) = remote.invoke("op", vec![]).unwrap();
    let err = remote.invoke("op", vec![]).unwrap_err();
    assert!(matches!(err, AgentError::ConcurrencyError { .. }));

    // The first call still completes normally.
    remote.handle_result(token1.message_id, AmfValue::Integer(1));
    assert!(token1.is_settled());
}

#[test]
fn concurrency_last_drops_earlier_calls_silently() {
    let mut remote = RemoteObject::new("dest", ConcurrencyPolicy::Last);
    let (msg1, token1) = remote.invoke("op", vec![]).unwrap();
    let (msg2, token2) = remote.invoke("op", vec![]).unwrap();
    let (_msg3, token3) = remote.invoke("op", vec![]).unwrap();

    // Late results for superseded calls are dropped at pre-handle.
    remote.handle_result(msg1.message_id(), AmfValue::Integer(1));
    remote.handle_result(msg2.message_id(), AmfValue::Integer(2));
    remote.handle_result(token3.message_id, AmfValue::Integer(3));

    assert!(!token1.is_settled());
    assert!(!token2.is_settled());
    assert!(token3.is_settled());
}

#[test]
fn concurrency_multiple_allows_overlap() {
    let mut remote = RemoteObject::new("dest", ConcurrencyPolicy::Multiple);
    let (msg1, token1) = remote.invoke("op", vec![]).unwrap();
    let (msg2, token2) = remote.invoke("op", vec![]).unwrap();

    remote.handle_result(msg2.message_id(), AmfValue::Integer(2));
    remote.handle_result(msg1.message_id(), AmfValue::Integer(1));

    assert!(token1.is_settled());
    assert!(token2.is_settled());
}

//! `AsyncToken`/`Responder`: settle-once result/fault delivery (spec §5
//! "AsyncToken/Responder pattern").
//!
//! Grounded in the teacher's single-threaded reconnect/dispatch model:
//! state lives behind `Rc<RefCell<_>>`, matching how [`crate::codec::value`]
//! already represents shared, mutable, non-`Send` runtime state.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use uuid::Uuid;

use crate::codec::AmfValue;
use crate::message::FaultMessage;

/// A result/fault callback pair attached to a token (spec §5: "late
/// responder fires immediately" if the token has already settled).
pub struct Responder {
    on_result: Box<dyn FnMut(&AmfValue)>,
    on_fault: Box<dyn FnMut(&FaultMessage)>,
}

impl Responder {
    pub fn new(
        on_result: impl FnMut(&AmfValue) + 'static,
        on_fault: impl FnMut(&FaultMessage) + 'static,
    ) -> Self {
        Responder {
            on_result: Box::new(on_result),
            on_fault: Box::new(on_fault),
        }
    }
}

impl fmt::Debug for Responder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Responder").finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
enum Outcome {
    Result(AmfValue),
    Fault(FaultMessage),
}

#[derive(Default)]
struct Inner {
    outcome: Option<Outcome>,
    responders: Vec<Responder>,
}

/// Tracks the eventual result or fault of one outbound invocation. Settling
/// happens exactly once (spec §5 invariant); every [`Responder`] attached
/// before settlement is invoked then, and every one attached after is
/// invoked immediately with the already-settled outcome.
#[derive(Clone)]
pub struct AsyncToken {
    pub message_id: Uuid,
    inner: Rc<RefCell<Inner>>,
}

impl fmt::Debug for AsyncToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncToken")
            .field("message_id", &self.message_id)
            .field("settled", &self.inner.borrow().outcome.is_some())
            .finish()
    }
}

impl AsyncToken {
    pub fn new(message_id: Uuid) -> Self {
        AsyncToken {
            message_id,
            inner: Rc::new(RefCell::new(Inner::default())),
        }
    }

    pub fn is_settled(&self) -> bool {
        self.inner.borrow().outcome.is_some()
    }

    pub fn add_responder(&self, mut responder: Responder) {
        let mut inner = self.inner.borrow_mut();
        match &inner.outcome {
            Some(Outcome::Result(v)) => (responder.on_result)(v),
            Some(Outcome::Fault(f)) => (responder.on_fault)(f),
            None => inner.responders.push(responder),
        }
    }

    /// Settle with a result. A no-op if the token already settled — the
    /// first settlement wins (spec §5 "settle-once").
    pub fn settle_result(&self, value: AmfValue) {
        let mut inner = self.inner.borrow_mut();
        if inner.outcome.is_some() {
            return;
        }
        inner.outcome = Some(Outcome::Result(value.clone()));
        for responder in inner.responders.iter_mut() {
            (responder.on_result)(&value);
        }
    }

    pub fn settle_fault(&self, fault: FaultMessage) {
        let mut inner = self.inner.borrow_mut();
        if inner.outcome.is_some() {
            return;
        }
        inner.outcome = Some(Outcome::Fault(fault.clone()));
        for responder in inner.responders.iter_mut() {
            (responder.on_fault)(&fault);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn late_responder_fires_immediately_with_settled_result() {
        let token = AsyncToken::new(Uuid::new_v4());
        token.settle_result(AmfValue::Integer(7));

        let seen = Rc::new(RefCell::new(None));
        let seen2 = seen.clone();
        token.add_responder(Responder::new(
            move |v| *seen2.borrow_mut() = Some(v.clone()),
            |_| {},
        ));
        assert_eq!(*seen.borrow(), Some(AmfValue::Integer(7)));
    }

    #[test]
    fn second_settlement_is_ignored() {
        let token = AsyncToken::new(Uuid::new_v4());
        token.settle_result(AmfValue::Integer(1));
        token.settle_result(AmfValue::Integer(2));

        let seen = Rc::new(RefCell::new(None));
        let seen2 = seen.clone();
        token.add_responder(Responder::new(
            move |v| *seen2.borrow_mut() = Some(v.clone()),
            |_| {},
        ));
        assert_eq!(*seen.borrow(), Some(AmfValue::Integer(1)));
    }
}

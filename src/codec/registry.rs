//! Class-alias registry (spec §6 "Class-alias registry", design note §9:
//! "Global state is limited to the class-alias registry; treat it as a
//! process-wide mapping with explicit init ... and no teardown.").
//!
//! Encode path uses `type -> name`; decode path uses `name -> type` to
//! instantiate. This crate doesn't walk a runtime type tree (design note
//! §9), so "type" here is a factory that produces a blank
//! [`Externalizable`] instance for the decoder to call `read_external` on.

use std::collections::HashMap;
use std::sync::OnceLock;
use std::sync::Mutex;

use super::value::Externalizable;

type Factory = fn() -> Box<dyn Externalizable>;

#[derive(Default)]
struct Registry {
    factories: HashMap<String, Factory>,
}

fn registry() -> &'static Mutex<Registry> {
    static REGISTRY: OnceLock<Mutex<Registry>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(Registry::default()))
}

/// Installs a bidirectional binding between `name` and a no-arg
/// constructor for the externalizable type it names.
pub fn register_alias(name: impl Into<String>, factory: Factory) {
    registry()
        .lock()
        .expect("class alias registry poisoned")
        .factories
        .insert(name.into(), factory);
}

pub fn is_registered(name: &str) -> bool {
    registry()
        .lock()
        .expect("class alias registry poisoned")
        .factories
        .contains_key(name)
}

/// Missing bindings on decode produce an anonymous record (spec §6); this
/// is only consulted for the externalizable path, where the decoder needs
/// a concrete instance to delegate `read_external` to.
pub fn instantiate(name: &str) -> Option<Box<dyn Externalizable>> {
    registry()
        .lock()
        .expect("class alias registry poisoned")
        .factories
        .get(name)
        .map(|f| f())
}

#[cfg(test)]
pub(crate) fn clear_for_test() {
    registry()
        .lock()
        .expect("class alias registry poisoned")
        .factories
        .clear();
}

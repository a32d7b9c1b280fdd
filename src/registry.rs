//! Handler registry: maps (selector, event type) to server-side callbacks.
//!
//! The registry is the only place handlers live. Registration replaces
//! silently, lookup misses are a valid outcome, and entries are never
//! removed — a handler's lifetime is the process lifetime.

use std::sync::Arc;

use dashmap::DashMap;

use crate::dispatch::EventScope;

/// Event type produced by the bridge today. The registry itself accepts any
/// event string.
pub const CLICK: &str = "click";

/// Server-side callback invoked when a matching event arrives.
///
/// The dispatch scope is passed explicitly; handlers hold no ambient engine
/// state. Returning `Err` marks the handler as failed — the dispatch
/// boundary logs it and still returns whatever was queued before the fault.
pub type Handler = Arc<dyn Fn(&EventScope<'_>) -> anyhow::Result<()> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct HandlerKey {
    selector: String,
    event: String,
}

/// Registry keyed by (selector, event type). At most one handler per key.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: DashMap<HandlerKey, Handler>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `handler` for (selector, event), overwriting any existing entry
    /// for that exact pair. Last registration wins, no error, no warning.
    pub fn register<F>(&self, selector: impl Into<String>, event: impl Into<String>, handler: F)
    where
        F: Fn(&EventScope<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let key = HandlerKey {
            selector: selector.into(),
            event: event.into(),
        };
        self.handlers.insert(key, Arc::new(handler));
    }

    /// Handler for (selector, event), if one is registered. `None` is not an
    /// error; it means "ignore this event".
    pub fn lookup(&self, selector: &str, event: &str) -> Option<Handler> {
        let key = HandlerKey {
            selector: selector.to_owned(),
            event: event.to_owned(),
        };
        self.handlers.get(&key).map(|entry| Arc::clone(entry.value()))
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

//! Dispatch engine: one-shot matching of an incoming event to a handler,
//! snapshot-scoped execution, and draining of the queued update actions.
//!
//! The engine owns three pieces of shared state — the handler registry, the
//! active-snapshot slot, and the update queue. The HTTP server dispatches
//! from a multi-threaded runtime, so whole dispatches are serialized behind
//! a lock: two requests can never interleave their snapshot or queue.

use std::sync::{Mutex, PoisonError, RwLock};

use crate::action::{Snapshot, UpdateAction};
use crate::registry::{HandlerRegistry, CLICK};

// ---------------------------------------------------------------------------
// Dispatch Engine
// ---------------------------------------------------------------------------

/// Per-server-instance engine; create one, register handlers on it, hand it
/// to [`crate::serve`].
pub struct DispatchEngine {
    registry: HandlerRegistry,
    /// Serializes whole dispatches.
    gate: Mutex<()>,
    /// Snapshot of the event currently being dispatched, if any.
    active: RwLock<Option<Snapshot>>,
    /// Actions queued by the running handler, drained once per dispatch.
    queue: Mutex<Vec<UpdateAction>>,
}

impl DispatchEngine {
    pub fn new() -> Self {
        Self {
            registry: HandlerRegistry::new(),
            gate: Mutex::new(()),
            active: RwLock::new(None),
            queue: Mutex::new(Vec::new()),
        }
    }

    /// The handler registry.
    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Register a handler for (selector, event). Last registration wins.
    pub fn register<F>(&self, selector: impl Into<String>, event: impl Into<String>, handler: F)
    where
        F: Fn(&EventScope<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.registry.register(selector, event, handler);
    }

    /// Register a click handler.
    pub fn on_click<F>(&self, selector: impl Into<String>, handler: F)
    where
        F: Fn(&EventScope<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.registry.register(selector, CLICK, handler);
    }

    /// Latest snapshot value for `selector`.
    ///
    /// `None` outside of a dispatch and for selectors the browser never saw;
    /// the snapshot is installed for exactly one handler invocation and torn
    /// down afterwards, win or fail.
    pub fn content(&self, selector: &str) -> Option<String> {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(|snapshot| snapshot.get(selector))
            .map(str::to_owned)
    }

    /// Run one event through the engine and return the queued actions in
    /// enqueue order.
    ///
    /// No matching handler is a silent no-op yielding an empty vec. A
    /// handler returning `Err` is caught here; whatever it queued before the
    /// fault is still returned. The snapshot guard clears the active slot on
    /// every exit path, so a failing handler cannot leak event context into
    /// a later, unrelated dispatch.
    pub fn dispatch(&self, selector: &str, event: &str, snapshot: Snapshot) -> Vec<UpdateAction> {
        let _one_at_a_time = self.gate.lock().unwrap_or_else(PoisonError::into_inner);

        // An aborted earlier dispatch may have left actions behind; every
        // dispatch starts from a clean queue.
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        *self.active.write().unwrap_or_else(PoisonError::into_inner) = Some(snapshot);
        let _teardown = SnapshotGuard(self);

        match self.registry.lookup(selector, event) {
            Some(handler) => {
                let scope = EventScope { engine: self };
                if let Err(error) = handler(&scope) {
                    tracing::warn!(
                        selector,
                        event,
                        %error,
                        "handler failed, returning updates queued before the fault"
                    );
                }
            }
            None => tracing::debug!(selector, event, "no handler registered"),
        }

        std::mem::take(&mut *self.queue.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn enqueue(&self, action: UpdateAction) {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(action);
    }
}

impl Default for DispatchEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Clears the active snapshot when the dispatch ends, normally or not.
struct SnapshotGuard<'a>(&'a DispatchEngine);

impl Drop for SnapshotGuard<'_> {
    fn drop(&mut self) {
        *self.0.active.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

// ---------------------------------------------------------------------------
// Event Scope
// ---------------------------------------------------------------------------

/// Dispatch context handed to handlers: snapshot reads and action enqueuing
/// for the one event currently in flight.
pub struct EventScope<'a> {
    engine: &'a DispatchEngine,
}

impl EventScope<'_> {
    /// Snapshot value for `selector` as observed by the browser when the
    /// event fired. `None` for selectors the snapshot never saw.
    pub fn content(&self, selector: &str) -> Option<String> {
        self.engine.content(selector)
    }

    /// Queue a `set`: write `content` into every element matching `selector`.
    pub fn set(&self, selector: impl Into<String>, content: impl Into<String>) {
        self.engine.enqueue(UpdateAction::Set {
            selector: selector.into(),
            content: content.into(),
        });
    }

    /// Queue a `remove`: delete every element matching `selector`.
    pub fn remove(&self, selector: impl Into<String>) {
        self.engine.enqueue(UpdateAction::Remove {
            selector: selector.into(),
        });
    }

    /// Queue a console log in the browser.
    pub fn console(&self, message: impl Into<String>) {
        self.engine.enqueue(UpdateAction::Console {
            message: message.into(),
        });
    }

    /// Queue the full-screen image overlay.
    pub fn easteregg(&self, url: impl Into<String>) {
        self.engine.enqueue(UpdateAction::Easteregg { url: url.into() });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn snapshot(pairs: &[(&str, &str)]) -> Snapshot {
        pairs.iter().copied().collect()
    }

    #[test]
    fn unmatched_event_returns_empty() {
        let engine = DispatchEngine::new();
        let actions = engine.dispatch(".missing", CLICK, snapshot(&[("#x", "1")]));
        assert!(actions.is_empty());
        assert_eq!(engine.content("#x"), None, "snapshot must be torn down");
    }

    #[test]
    fn actions_preserve_enqueue_order() {
        let engine = DispatchEngine::new();
        engine.on_click("#btn", |scope: &EventScope| {
            scope.set("#out", "v");
            scope.remove(".row");
            scope.console("done");
            Ok(())
        });

        let actions = engine.dispatch("#btn", CLICK, Snapshot::new());
        assert_eq!(
            actions,
            vec![
                UpdateAction::Set {
                    selector: "#out".into(),
                    content: "v".into()
                },
                UpdateAction::Remove {
                    selector: ".row".into()
                },
                UpdateAction::Console {
                    message: "done".into()
                },
            ]
        );
    }

    #[test]
    fn handler_reads_installed_snapshot() {
        let engine = DispatchEngine::new();
        engine.on_click("#greet", |scope: &EventScope| {
            let name = scope.content("#name").unwrap_or_default();
            scope.set("#output", format!("Hello, {name}"));
            Ok(())
        });

        let actions = engine.dispatch("#greet", CLICK, snapshot(&[("#name", "Ada")]));
        assert_eq!(
            actions,
            vec![UpdateAction::Set {
                selector: "#output".into(),
                content: "Hello, Ada".into()
            }]
        );
    }

    #[test]
    fn content_is_none_outside_dispatch() {
        let engine = DispatchEngine::new();
        assert_eq!(engine.content("#name"), None);

        engine.on_click("#a", |_scope: &EventScope| Ok(()));
        engine.dispatch("#a", CLICK, snapshot(&[("#name", "Ada")]));

        assert_eq!(engine.content("#name"), None);
    }

    #[test]
    fn last_registration_wins() {
        let engine = DispatchEngine::new();
        engine.on_click("#btn", |scope: &EventScope| {
            scope.console("first");
            Ok(())
        });
        engine.on_click("#btn", |scope: &EventScope| {
            scope.console("second");
            Ok(())
        });

        let actions = engine.dispatch("#btn", CLICK, Snapshot::new());
        assert_eq!(
            actions,
            vec![UpdateAction::Console {
                message: "second".into()
            }]
        );
    }

    #[test]
    fn failed_handler_keeps_queued_actions() {
        let engine = DispatchEngine::new();
        engine.on_click("#btn", |scope: &EventScope| {
            scope.set("#out", "partial");
            anyhow::bail!("boom")
        });

        let actions = engine.dispatch("#btn", CLICK, snapshot(&[("#x", "1")]));
        assert_eq!(
            actions,
            vec![UpdateAction::Set {
                selector: "#out".into(),
                content: "partial".into()
            }]
        );
        assert_eq!(engine.content("#x"), None, "teardown must run on the failure path");
    }

    #[test]
    fn queue_is_empty_between_dispatches() {
        let engine = DispatchEngine::new();
        engine.on_click("#btn", |scope: &EventScope| {
            scope.console("once");
            Ok(())
        });

        assert_eq!(engine.dispatch("#btn", CLICK, Snapshot::new()).len(), 1);
        let second = engine.dispatch(".other", CLICK, Snapshot::new());
        assert!(second.is_empty(), "drained actions must not reappear");
    }

    #[test]
    fn empty_snapshot_reads_as_absent() {
        let engine = DispatchEngine::new();
        engine.on_click("#btn", |scope: &EventScope| {
            scope.set("#out", scope.content("#name").unwrap_or_else(|| "nobody".into()));
            Ok(())
        });

        let actions = engine.dispatch("#btn", CLICK, Snapshot::new());
        assert_eq!(
            actions,
            vec![UpdateAction::Set {
                selector: "#out".into(),
                content: "nobody".into()
            }]
        );
    }

    #[test]
    fn concurrent_dispatches_do_not_interleave() {
        let engine = Arc::new(DispatchEngine::new());
        engine.on_click("#a", |scope: &EventScope| {
            scope.console("a1");
            scope.console("a2");
            Ok(())
        });
        engine.on_click("#b", |scope: &EventScope| {
            scope.console("b1");
            scope.console("b2");
            Ok(())
        });

        let mut handles = Vec::new();
        for _ in 0..4 {
            let engine_a = Arc::clone(&engine);
            handles.push(std::thread::spawn(move || {
                for _ in 0..50 {
                    let actions = engine_a.dispatch("#a", CLICK, Snapshot::new());
                    assert_eq!(
                        actions,
                        vec![
                            UpdateAction::Console { message: "a1".into() },
                            UpdateAction::Console { message: "a2".into() },
                        ]
                    );
                }
            }));
            let engine_b = Arc::clone(&engine);
            handles.push(std::thread::spawn(move || {
                for _ in 0..50 {
                    let actions = engine_b.dispatch("#b", CLICK, Snapshot::new());
                    assert_eq!(
                        actions,
                        vec![
                            UpdateAction::Console { message: "b1".into() },
                            UpdateAction::Console { message: "b2".into() },
                        ]
                    );
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
    }
}

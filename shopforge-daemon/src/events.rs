//! Event notification bus.
//!
//! A minimal synchronous publish/subscribe mechanism for lifecycle events.
//! Handlers are invoked in registration order on the emitting thread; there
//! is no replay buffer, so a handler only sees events emitted after it was
//! registered.

use serde::Serialize;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, warn};

/// Emitted after a provider has been initialized and indexed.
///
/// Payload: `{"plugin": metadata}`.
pub const PLUGIN_REGISTERED: &str = "plugin:registered";

/// Emitted during teardown once a provider has been removed and its
/// `cleanup()` has settled, whether or not it succeeded.
///
/// Payload: `{"plugin": metadata, "cleaned": bool, "error": string | null}`.
pub const PLUGIN_UNREGISTERED: &str = "plugin:unregistered";

/// Emitted when a provider is enabled or disabled at runtime.
///
/// Payload: `{"plugin": metadata, "enabled": bool}`.
pub const PLUGIN_ENABLED_CHANGED: &str = "plugin:enabled_changed";

/// A named event with an opaque payload.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub name: String,
    pub payload: serde_json::Value,
}

/// Callback registered for an event name.
pub type Handler = Arc<dyn Fn(&Event) -> anyhow::Result<()> + Send + Sync>;

/// A handler that failed while processing an emission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerFailure {
    pub event: String,
    /// Position of the handler in registration order
    pub handler_index: usize,
    pub error: String,
}

/// Summary of a single emission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Number of handlers that ran to completion
    pub delivered: usize,
    pub failures: Vec<HandlerFailure>,
}

impl Delivery {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Publish/subscribe bus for lifecycle events.
#[derive(Default)]
pub struct EventBus {
    handlers: RwLock<HashMap<String, Vec<Handler>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for `event`.
    pub fn on<F>(&self, event: &str, handler: F)
    where
        F: Fn(&Event) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let mut handlers = self
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        handlers
            .entry(event.to_string())
            .or_default()
            .push(Arc::new(handler));
    }

    /// Number of handlers registered for `event`.
    pub fn handler_count(&self, event: &str) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(event)
            .map_or(0, Vec::len)
    }

    /// Invoke every handler currently registered for `event`.
    ///
    /// The handler list is snapshotted before the first call, so handlers
    /// registered during this emission only see later events. A handler that
    /// returns an error or panics does not stop the remaining handlers.
    pub fn emit(&self, event: &str, payload: serde_json::Value) -> Delivery {
        let snapshot: Vec<Handler> = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(event)
            .cloned()
            .unwrap_or_default();

        let mut delivery = Delivery::default();
        if snapshot.is_empty() {
            return delivery;
        }

        let event = Event {
            name: event.to_string(),
            payload,
        };

        for (index, handler) in snapshot.iter().enumerate() {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler(&event)));
            let error = match outcome {
                Ok(Ok(())) => {
                    delivery.delivered += 1;
                    continue;
                }
                Ok(Err(e)) => e.to_string(),
                Err(panic) => panic_message(&*panic),
            };

            warn!(event = %event.name, handler = index, error = %error, "Event handler failed");
            delivery.failures.push(HandlerFailure {
                event: event.name.clone(),
                handler_index: index,
                error,
            });
        }

        debug!(
            event = %event.name,
            delivered = delivery.delivered,
            failed = delivery.failures.len(),
            "Event emitted"
        );
        delivery
    }
}

/// Render a caught panic payload as text.
pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_emit_without_subscribers_is_noop() {
        let bus = EventBus::new();
        let delivery = bus.emit("nobody:listening", serde_json::json!({ "a": 1 }));
        assert_eq!(delivery, Delivery::default());
    }

    #[test]
    fn test_handlers_run_in_registration_order() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for i in 0..3 {
            let seen = Arc::clone(&seen);
            bus.on("tick", move |_| {
                seen.lock().unwrap().push(i);
                Ok(())
            });
        }

        let delivery = bus.emit("tick", serde_json::Value::Null);
        assert_eq!(delivery.delivered, 3);
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_failing_handler_does_not_block_next() {
        let bus = EventBus::new();
        let reached = Arc::new(Mutex::new(false));

        bus.on("tick", |_| anyhow::bail!("first handler broke"));
        {
            let reached = Arc::clone(&reached);
            bus.on("tick", move |_| {
                *reached.lock().unwrap() = true;
                Ok(())
            });
        }

        let delivery = bus.emit("tick", serde_json::Value::Null);
        assert!(*reached.lock().unwrap());
        assert_eq!(delivery.delivered, 1);
        assert_eq!(delivery.failures.len(), 1);
        assert_eq!(delivery.failures[0].handler_index, 0);
        assert!(delivery.failures[0].error.contains("first handler broke"));
    }

    #[test]
    fn test_panicking_handler_is_isolated() {
        let bus = EventBus::new();
        let reached = Arc::new(Mutex::new(false));

        bus.on("tick", |_| panic!("boom"));
        {
            let reached = Arc::clone(&reached);
            bus.on("tick", move |_| {
                *reached.lock().unwrap() = true;
                Ok(())
            });
        }

        let delivery = bus.emit("tick", serde_json::Value::Null);
        assert!(*reached.lock().unwrap());
        assert_eq!(delivery.failures.len(), 1);
        assert!(delivery.failures[0].error.contains("boom"));
    }

    #[test]
    fn test_handler_receives_payload() {
        let bus = EventBus::new();
        let received = Arc::new(Mutex::new(None));
        {
            let received = Arc::clone(&received);
            bus.on(PLUGIN_REGISTERED, move |event| {
                *received.lock().unwrap() = Some(event.payload["name"].clone());
                Ok(())
            });
        }

        bus.emit(PLUGIN_REGISTERED, serde_json::json!({ "name": "amazon_search" }));
        assert_eq!(
            *received.lock().unwrap(),
            Some(serde_json::json!("amazon_search"))
        );
    }

    #[test]
    fn test_subscribing_during_emission_sees_only_later_events() {
        let bus = Arc::new(EventBus::new());
        let late_calls = Arc::new(Mutex::new(0));

        {
            let bus_inner = Arc::clone(&bus);
            let late_calls = Arc::clone(&late_calls);
            bus.on("tick", move |_| {
                let late_calls = Arc::clone(&late_calls);
                bus_inner.on("tick", move |_| {
                    *late_calls.lock().unwrap() += 1;
                    Ok(())
                });
                Ok(())
            });
        }

        let first = bus.emit("tick", serde_json::Value::Null);
        assert_eq!(first.delivered, 1);
        assert_eq!(*late_calls.lock().unwrap(), 0);

        bus.emit("tick", serde_json::Value::Null);
        assert_eq!(*late_calls.lock().unwrap(), 1);
        assert_eq!(bus.handler_count("tick"), 3);
    }
}

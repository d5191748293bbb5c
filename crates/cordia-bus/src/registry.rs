// SPDX-FileCopyrightText: 2026 Cordia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event-type to handler mapping, built once at startup.
//!
//! The registry is immutable after `build()`; handler order is registration
//! order. There is no runtime mutation path.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use cordia_core::CordiaError;
use cordia_core::types::{Event, EventKind};

/// An async domain-event handler.
///
/// Handlers raise on failure; the orchestrator translates the first failure
/// into a failed event and skips the remaining handlers.
#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    /// Handler name used in logs and failure messages.
    fn name(&self) -> &str;

    async fn handle(&self, event: &Event) -> Result<(), CordiaError>;
}

/// Builder for the immutable [`HandlerRegistry`].
#[derive(Default)]
pub struct HandlerRegistryBuilder {
    handlers: HashMap<EventKind, Vec<Arc<dyn EventHandler>>>,
}

impl HandlerRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for an event kind. Order of registration is the
    /// order of invocation.
    pub fn register(mut self, kind: EventKind, handler: Arc<dyn EventHandler>) -> Self {
        self.handlers.entry(kind).or_default().push(handler);
        self
    }

    pub fn build(self) -> HandlerRegistry {
        HandlerRegistry {
            handlers: self.handlers,
        }
    }
}

/// Immutable map from event kind to its ordered handler list.
pub struct HandlerRegistry {
    handlers: HashMap<EventKind, Vec<Arc<dyn EventHandler>>>,
}

impl HandlerRegistry {
    pub fn builder() -> HandlerRegistryBuilder {
        HandlerRegistryBuilder::new()
    }

    /// Handlers for a kind, in registration order. Empty when none.
    pub fn handlers_for(&self, kind: EventKind) -> &[Arc<dyn EventHandler>] {
        self.handlers.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandler {
        name: &'static str,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl EventHandler for CountingHandler {
        fn name(&self) -> &str {
            self.name
        }

        async fn handle(&self, _event: &Event) -> Result<(), CordiaError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn handlers_preserve_registration_order() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = HandlerRegistry::builder()
            .register(
                EventKind::LeadCreated,
                Arc::new(CountingHandler { name: "first", calls: calls.clone() }),
            )
            .register(
                EventKind::LeadCreated,
                Arc::new(CountingHandler { name: "second", calls }),
            )
            .build();

        let names: Vec<&str> = registry
            .handlers_for(EventKind::LeadCreated)
            .iter()
            .map(|h| h.name())
            .collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[test]
    fn unregistered_kind_has_no_handlers() {
        let registry = HandlerRegistry::builder().build();
        assert!(registry.handlers_for(EventKind::MessageSent).is_empty());
    }
}

//! Lifecycle notifications. Handlers run synchronously, in subscription
//! order; a panicking handler is logged and the remaining handlers still run.

use modhost_schema::PackageId;
use std::panic::{self, AssertUnwindSafe};
use tracing::error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModEvent {
    Loaded(PackageId),
    Unloaded(PackageId),
    Reloaded(PackageId),
    LoadError { package: PackageId, error: String },
    /// One hot-reload batch finished; lists the packages reloaded in it.
    BatchReloaded(Vec<PackageId>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Loaded,
    Unloaded,
    Reloaded,
    LoadError,
    BatchReloaded,
}

impl ModEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ModEvent::Loaded(_) => EventKind::Loaded,
            ModEvent::Unloaded(_) => EventKind::Unloaded,
            ModEvent::Reloaded(_) => EventKind::Reloaded,
            ModEvent::LoadError { .. } => EventKind::LoadError,
            ModEvent::BatchReloaded(_) => EventKind::BatchReloaded,
        }
    }
}

type Handler = Box<dyn FnMut(&ModEvent)>;

#[derive(Default)]
pub struct EventBus {
    handlers: Vec<(Option<EventKind>, Handler)>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to one kind of event.
    pub fn on(&mut self, kind: EventKind, handler: impl FnMut(&ModEvent) + 'static) {
        self.handlers.push((Some(kind), Box::new(handler)));
    }

    pub fn on_any(&mut self, handler: impl FnMut(&ModEvent) + 'static) {
        self.handlers.push((None, Box::new(handler)));
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn emit(&mut self, event: &ModEvent) {
        let kind = event.kind();
        for (filter, handler) in &mut self.handlers {
            if filter.is_some_and(|k| k != kind) {
                continue;
            }
            if panic::catch_unwind(AssertUnwindSafe(|| handler(event))).is_err() {
                error!("{kind:?} handler panicked; continuing with remaining handlers");
            }
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

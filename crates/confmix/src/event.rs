//! change notifications
//!
//! A source owns an [EventSource] holding its listeners. Listeners are plain observers: they get
//! each event once, synchronously, on the thread that caused the change.
use crate::value::Value;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    AddProperty,
    SetProperty,
    ClearProperty,
    Clear,
    /// Backing data was re-read
    Reload,
    SourceAdded,
    SourceRemoved,
    CombinerChanged,
    ListNodesChanged,
    /// A combined view discarded its merged tree
    Invalidate,
}

#[derive(derive_new::new, Debug, Clone, PartialEq)]
pub struct ConfigEvent {
    pub kind: EventKind,
    pub key: Option<String>,
    pub value: Option<Value>,
    /// Fired before the change was applied
    pub before_update: bool,
}

impl ConfigEvent {
    pub(crate) fn before(kind: EventKind, key: Option<&str>, value: Option<&Value>) -> Self {
        Self::new(kind, key.map(Into::into), value.cloned(), true)
    }

    pub(crate) fn after(kind: EventKind, key: Option<&str>, value: Option<&Value>) -> Self {
        Self::new(kind, key.map(Into::into), value.cloned(), false)
    }

    pub fn is_invalidation(&self) -> bool {
        self.kind == EventKind::Invalidate
    }
}

/// Observer of configuration changes
pub trait ChangeListener {
    fn configuration_changed(&self, event: &ConfigEvent);
}

// blanket impl for Fn
impl<F> ChangeListener for F
where
    F: Fn(&ConfigEvent),
{
    fn configuration_changed(&self, event: &ConfigEvent) {
        self(event)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(usize);

/// Set of listeners of one source
///
/// Not cloneable: copies of a source start without listeners.
#[derive(Default)]
pub struct EventSource {
    listeners: RefCell<Vec<(ListenerId, Rc<dyn ChangeListener>)>>,
    next_id: Cell<usize>,
}

impl EventSource {
    pub fn add_listener(&self, listener: Rc<dyn ChangeListener>) -> ListenerId {
        let id = ListenerId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.listeners.borrow_mut().push((id, listener));
        id
    }

    /// Returns whether the listener was registered
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    pub fn fire(&self, event: ConfigEvent) {
        // listeners may add or remove listeners while being notified
        let listeners: Vec<_> = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();

        tracing::trace!(?event, listeners = listeners.len(), "fire event");
        for listener in listeners {
            listener.configuration_changed(&event);
        }
    }
}

impl std::fmt::Debug for EventSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSource")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

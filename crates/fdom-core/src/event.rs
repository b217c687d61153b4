#![forbid(unsafe_code)]

//! Event objects, listener registration, and dispatch.
//!
//! Dispatch follows the DOM bubbling model without a capture phase:
//!
//! 1. Listeners on the target run first, then (for bubbling events) the
//!    listeners on each ancestor up to the root of the target's tree.
//! 2. Listeners on one node run in registration order.
//! 3. A listener removed during dispatch is not invoked afterwards, even if
//!    it was part of the snapshot taken for its node.
//! 4. `prevent_default` only has an effect on cancelable events.
//!
//! # Invariants
//!
//! - No document borrow is held while a listener runs, so listeners may add
//!   or remove listeners, mutate the tree, or dispatch nested events.
//! - `ListenerId`s are unique for the lifetime of the document.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use ahash::AHashMap;
use bitflags::bitflags;

use crate::dom::{Document, Element, NodeId};

/// Kind of an event.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventType {
    /// Pointer activation.
    Click,
    /// Escape-equivalent request to dismiss a modal dialog.
    Cancel,
    /// A dialog finished closing.
    Close,
    /// Application-defined event, e.g. `modal:confirm`.
    Custom(String),
}

impl EventType {
    /// Map an event name onto its type.
    pub fn parse(name: &str) -> Self {
        match name {
            "click" => Self::Click,
            "cancel" => Self::Cancel,
            "close" => Self::Close,
            other => Self::Custom(other.to_owned()),
        }
    }

    /// The event name.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Click => "click",
            Self::Cancel => "cancel",
            Self::Close => "close",
            Self::Custom(name) => name,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

bitflags! {
    /// Static properties of an event, fixed at construction.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EventFlags: u8 {
        const BUBBLES = 1;
        const CANCELABLE = 1 << 1;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    struct DispatchState: u8 {
        const DEFAULT_PREVENTED = 1;
        const PROPAGATION_STOPPED = 1 << 1;
    }
}

/// An event travelling through the tree.
///
/// Listeners receive `&Event`; the mutable dispatch state lives in cells so
/// handlers can cancel or stop it without exclusive access.
pub struct Event {
    kind: EventType,
    flags: EventFlags,
    state: Cell<DispatchState>,
    target: RefCell<Option<Element>>,
    current_target: RefCell<Option<Element>>,
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("kind", &self.kind)
            .field("flags", &self.flags)
            .field("default_prevented", &self.default_prevented())
            .finish()
    }
}

impl Event {
    /// Create an event that has not been dispatched yet.
    pub fn new(kind: EventType, flags: EventFlags) -> Self {
        Self {
            kind,
            flags,
            state: Cell::new(DispatchState::empty()),
            target: RefCell::new(None),
            current_target: RefCell::new(None),
        }
    }

    /// A bubbling, cancelable click.
    pub fn click() -> Self {
        Self::new(EventType::Click, EventFlags::BUBBLES | EventFlags::CANCELABLE)
    }

    /// A cancelable, non-bubbling dialog cancel request.
    pub fn cancel() -> Self {
        Self::new(EventType::Cancel, EventFlags::CANCELABLE)
    }

    /// A bubbling, cancelable application event.
    pub fn custom(name: impl Into<String>) -> Self {
        Self::new(
            EventType::Custom(name.into()),
            EventFlags::BUBBLES | EventFlags::CANCELABLE,
        )
    }

    #[inline]
    pub fn kind(&self) -> &EventType {
        &self.kind
    }

    #[inline]
    pub fn bubbles(&self) -> bool {
        self.flags.contains(EventFlags::BUBBLES)
    }

    #[inline]
    pub fn cancelable(&self) -> bool {
        self.flags.contains(EventFlags::CANCELABLE)
    }

    /// Suppress the default action. No effect on non-cancelable events.
    pub fn prevent_default(&self) {
        if self.cancelable() {
            self.state
                .set(self.state.get() | DispatchState::DEFAULT_PREVENTED);
        }
    }

    pub fn default_prevented(&self) -> bool {
        self.state.get().contains(DispatchState::DEFAULT_PREVENTED)
    }

    /// Stop the event from reaching further nodes. Listeners on the current
    /// node still run.
    pub fn stop_propagation(&self) {
        self.state
            .set(self.state.get() | DispatchState::PROPAGATION_STOPPED);
    }

    fn propagation_stopped(&self) -> bool {
        self.state.get().contains(DispatchState::PROPAGATION_STOPPED)
    }

    /// The node the event was dispatched at.
    pub fn target(&self) -> Option<Element> {
        self.target.borrow().clone()
    }

    /// The node whose listeners are currently running.
    pub fn current_target(&self) -> Option<Element> {
        self.current_target.borrow().clone()
    }
}

/// Handle for removing a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    #[inline]
    pub const fn id(self) -> u64 {
        self.0
    }
}

/// Shared listener callback.
pub type Listener = Rc<dyn Fn(&Event)>;

struct ListenerEntry {
    id: ListenerId,
    kind: EventType,
    handler: Listener,
}

/// Per-document listener registry, keyed by node.
#[derive(Default)]
pub(crate) struct ListenerTable {
    by_node: AHashMap<NodeId, Vec<ListenerEntry>>,
    owner: AHashMap<ListenerId, NodeId>,
    next_id: u64,
}

impl ListenerTable {
    fn add(&mut self, node: NodeId, kind: EventType, handler: Listener) -> ListenerId {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.by_node
            .entry(node)
            .or_default()
            .push(ListenerEntry { id, kind, handler });
        self.owner.insert(id, node);
        id
    }

    fn remove(&mut self, id: ListenerId) -> bool {
        let Some(node) = self.owner.remove(&id) else {
            return false;
        };
        if let Some(entries) = self.by_node.get_mut(&node) {
            entries.retain(|entry| entry.id != id);
            if entries.is_empty() {
                self.by_node.remove(&node);
            }
        }
        true
    }

    fn contains(&self, id: ListenerId) -> bool {
        self.owner.contains_key(&id)
    }

    fn count(&self, node: NodeId) -> usize {
        self.by_node.get(&node).map_or(0, Vec::len)
    }

    fn snapshot(&self, node: NodeId, kind: &EventType) -> Vec<(ListenerId, Listener)> {
        self.by_node
            .get(&node)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|entry| &entry.kind == kind)
                    .map(|entry| (entry.id, Rc::clone(&entry.handler)))
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl Document {
    /// Register `handler` for events of `kind` reaching `element`.
    pub fn add_event_listener(
        &self,
        element: &Element,
        kind: EventType,
        handler: impl Fn(&Event) + 'static,
    ) -> ListenerId {
        self.inner
            .borrow_mut()
            .listeners
            .add(element.node_id(), kind, Rc::new(handler))
    }

    /// Remove a listener. Returns `false` if it was already removed.
    pub fn remove_event_listener(&self, id: ListenerId) -> bool {
        self.inner.borrow_mut().listeners.remove(id)
    }

    /// Number of listeners (of any kind) registered on `element`.
    pub fn listener_count(&self, element: &Element) -> usize {
        self.inner.borrow().listeners.count(element.node_id())
    }

    /// Dispatch `event` at `target`.
    ///
    /// Returns `false` if a listener suppressed the default action.
    pub fn dispatch_event(&self, target: &Element, event: &Event) -> bool {
        #[cfg(feature = "tracing")]
        let _span = tracing::trace_span!("dispatch_event", event = event.kind().as_str()).entered();

        *event.target.borrow_mut() = Some(target.clone());

        let path = if event.bubbles() {
            target.inclusive_ancestors()
        } else {
            vec![target.clone()]
        };

        for node in path {
            if event.propagation_stopped() {
                break;
            }
            let handlers = self
                .inner
                .borrow()
                .listeners
                .snapshot(node.node_id(), event.kind());
            if handlers.is_empty() {
                continue;
            }
            *event.current_target.borrow_mut() = Some(node);
            for (id, handler) in handlers {
                if !self.inner.borrow().listeners.contains(id) {
                    continue;
                }
                handler(event);
            }
        }

        *event.current_target.borrow_mut() = None;
        !event.default_prevented()
    }

    /// Dispatch a synthetic click at `target`.
    pub fn click(&self, target: &Element) -> bool {
        self.dispatch_event(target, &Event::click())
    }

    /// Simulate the escape key.
    ///
    /// Fires a cancelable `cancel` at the topmost modal dialog; if no
    /// listener suppresses it the dialog closes immediately. Returns `false`
    /// when no modal dialog is showing.
    pub fn press_escape(&self) -> bool {
        let Some(dialog) = self.top_modal() else {
            return false;
        };
        if self.dispatch_event(&dialog, &Event::cancel()) {
            // Closing a connected dialog cannot fail.
            let _ = dialog.close();
        }
        true
    }
}

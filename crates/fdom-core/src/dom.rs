#![forbid(unsafe_code)]

//! Element tree, attributes, focus, inertness, and `<dialog>` primitives.
//!
//! The document is an arena of nodes addressed by [`NodeId`]. [`Document`]
//! and [`Element`] are cheap `Rc` handles; every method borrows the arena
//! only for the duration of the call.
//!
//! # Invariants
//!
//! - The arena never shrinks: a removed subtree stays addressable but is no
//!   longer connected, so stale handles never dangle.
//! - `active_element()` is always connected.
//! - The top layer only contains connected, open dialogs shown as modal.
//! - While the top layer is non-empty, every node outside the topmost modal
//!   dialog is inert and cannot take focus.
//!
//! # Failure Modes
//!
//! - `append_child` returns [`DomError::HierarchyRequest`] for cycles and
//!   cross-document moves.
//! - `show_modal` on a non-dialog returns [`DomError::NotADialog`]; on a
//!   disconnected dialog it returns [`DomError::InvalidState`].

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use ahash::AHashMap;

use crate::error::DomError;
use crate::event::{Event, EventFlags, EventType, ListenerTable};

/// Arena index of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    #[inline]
    pub const fn index(self) -> u32 {
        self.0
    }
}

struct Node {
    tag: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    attributes: AHashMap<String, String>,
    classes: Vec<String>,
    open: bool,
}

impl Node {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            parent: None,
            children: Vec::new(),
            attributes: AHashMap::new(),
            classes: Vec::new(),
            open: false,
        }
    }
}

/// A structural change reported to observers.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// A subtree was connected to the document.
    Inserted(Element),
    /// A subtree was disconnected from the document.
    Removed(Element),
}

type ObserverFn = dyn Fn(&Mutation);

pub(crate) struct DocumentInner {
    nodes: Vec<Node>,
    root: NodeId,
    body: NodeId,
    active: Option<NodeId>,
    top_layer: Vec<NodeId>,
    observers: Vec<Weak<ObserverFn>>,
    pub(crate) listeners: ListenerTable,
}

impl DocumentInner {
    fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0 as usize]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0 as usize]
    }

    fn push(&mut self, tag: &str) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node::new(tag));
        id
    }

    fn is_inclusive_ancestor(&self, ancestor: NodeId, mut node: NodeId) -> bool {
        loop {
            if node == ancestor {
                return true;
            }
            match self.node(node).parent {
                Some(parent) => node = parent,
                None => return false,
            }
        }
    }

    fn is_connected(&self, id: NodeId) -> bool {
        self.is_inclusive_ancestor(self.root, id)
    }

    /// Descendants of `id` in document (pre-) order, excluding `id`.
    fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.node(id).children.iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.node(next).children.iter().rev().copied());
        }
        out
    }

    fn top_modal(&self) -> Option<NodeId> {
        self.top_layer.last().copied()
    }

    fn is_inert(&self, id: NodeId) -> bool {
        match self.top_modal() {
            Some(modal) => !self.is_inclusive_ancestor(modal, id),
            None => false,
        }
    }

    fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.node_mut(id).parent.take() {
            self.node_mut(parent).children.retain(|&child| child != id);
        }
    }
}

/// Shared handle to a document.
#[derive(Clone)]
pub struct Document {
    pub(crate) inner: Rc<RefCell<DocumentInner>>,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Document")
            .field("nodes", &inner.nodes.len())
            .field("active", &inner.active)
            .field("top_layer", &inner.top_layer)
            .finish()
    }
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create a document containing `<html><body></body></html>`.
    pub fn new() -> Self {
        let mut inner = DocumentInner {
            nodes: Vec::new(),
            root: NodeId(0),
            body: NodeId(0),
            active: None,
            top_layer: Vec::new(),
            observers: Vec::new(),
            listeners: ListenerTable::default(),
        };
        let root = inner.push("html");
        let body = inner.push("body");
        inner.node_mut(body).parent = Some(root);
        inner.node_mut(root).children.push(body);
        inner.root = root;
        inner.body = body;
        Self {
            inner: Rc::new(RefCell::new(inner)),
        }
    }

    fn element(&self, id: NodeId) -> Element {
        Element {
            doc: self.clone(),
            id,
        }
    }

    /// The `<html>` element, where page-level marker classes live.
    pub fn root(&self) -> Element {
        let root = self.inner.borrow().root;
        self.element(root)
    }

    pub fn body(&self) -> Element {
        let body = self.inner.borrow().body;
        self.element(body)
    }

    /// Create a detached element.
    pub fn create_element(&self, tag: &str) -> Element {
        let id = self.inner.borrow_mut().push(tag);
        self.element(id)
    }

    /// First connected element whose `id` attribute equals `id`.
    pub fn get_element_by_id(&self, id: &str) -> Option<Element> {
        let found = {
            let inner = self.inner.borrow();
            inner.descendants(inner.root).into_iter().find(|&node| {
                inner.node(node).attributes.get("id").map(String::as_str) == Some(id)
            })
        };
        found.map(|node| self.element(node))
    }

    /// The focused element, if any.
    pub fn active_element(&self) -> Option<Element> {
        let active = self.inner.borrow().active;
        active.map(|node| self.element(node))
    }

    /// The topmost dialog shown as modal.
    pub fn top_modal(&self) -> Option<Element> {
        let top = self.inner.borrow().top_modal();
        top.map(|node| self.element(node))
    }

    /// Register a mutation observer. Dropping the guard unregisters it.
    #[must_use = "dropping the observer unregisters it"]
    pub fn observe(&self, callback: impl Fn(&Mutation) + 'static) -> Observer {
        let callback: Rc<ObserverFn> = Rc::new(callback);
        self.inner
            .borrow_mut()
            .observers
            .push(Rc::downgrade(&callback));
        Observer {
            _callback: callback,
        }
    }

    fn notify(&self, mutation: &Mutation) {
        let live: Vec<Rc<ObserverFn>> = {
            let mut inner = self.inner.borrow_mut();
            inner.observers.retain(|weak| weak.strong_count() > 0);
            inner.observers.iter().filter_map(Weak::upgrade).collect()
        };
        for callback in live {
            callback(mutation);
        }
    }
}

/// RAII guard for a mutation observer.
#[must_use = "dropping the observer unregisters it"]
pub struct Observer {
    _callback: Rc<ObserverFn>,
}

impl fmt::Debug for Observer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer").finish_non_exhaustive()
    }
}

/// Simple element matcher used by queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// `tag`
    Tag(String),
    /// `[name]`
    Attr(String),
    /// `[name="value"]`
    AttrValue(String, String),
    /// `[name~="word"]`
    AttrWord(String, String),
    /// `.class`
    Class(String),
}

impl Selector {
    pub fn tag(tag: &str) -> Self {
        Self::Tag(tag.to_ascii_lowercase())
    }

    pub fn attr(name: &str) -> Self {
        Self::Attr(name.to_owned())
    }

    pub fn attr_value(name: &str, value: &str) -> Self {
        Self::AttrValue(name.to_owned(), value.to_owned())
    }

    pub fn attr_word(name: &str, word: &str) -> Self {
        Self::AttrWord(name.to_owned(), word.to_owned())
    }

    pub fn class(class: &str) -> Self {
        Self::Class(class.to_owned())
    }

    fn matches_node(&self, node: &Node) -> bool {
        match self {
            Self::Tag(tag) => &node.tag == tag,
            Self::Attr(name) => node.attributes.contains_key(name),
            Self::AttrValue(name, value) => node.attributes.get(name) == Some(value),
            Self::AttrWord(name, word) => node
                .attributes
                .get(name)
                .is_some_and(|v| v.split_ascii_whitespace().any(|w| w == word)),
            Self::Class(class) => node.classes.iter().any(|c| c == class),
        }
    }
}

/// Handle to one node of a document.
#[derive(Clone)]
pub struct Element {
    doc: Document,
    id: NodeId,
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.doc == other.doc
    }
}

impl Eq for Element {}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.doc.inner.borrow();
        let node = inner.node(self.id);
        write!(f, "<{}", node.tag)?;
        if let Some(id) = node.attributes.get("id") {
            write!(f, "#{id}")?;
        }
        write!(f, " @{}>", self.id.0)
    }
}

impl Element {
    #[inline]
    pub fn node_id(&self) -> NodeId {
        self.id
    }

    #[inline]
    pub fn document(&self) -> &Document {
        &self.doc
    }

    fn wrap(&self, id: NodeId) -> Element {
        self.doc.element(id)
    }

    /// Lowercase tag name.
    pub fn tag_name(&self) -> String {
        self.doc.inner.borrow().node(self.id).tag.clone()
    }

    pub fn is_tag(&self, tag: &str) -> bool {
        self.doc.inner.borrow().node(self.id).tag == tag
    }

    // --- Attributes ---

    pub fn attribute(&self, name: &str) -> Option<String> {
        let inner = self.doc.inner.borrow();
        let node = inner.node(self.id);
        if name == "class" {
            return (!node.classes.is_empty()).then(|| node.classes.join(" "));
        }
        node.attributes.get(name).cloned()
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        let inner = self.doc.inner.borrow();
        let node = inner.node(self.id);
        if name == "class" {
            return !node.classes.is_empty();
        }
        node.attributes.contains_key(name)
    }

    /// Set an attribute. `class` replaces the class list.
    pub fn set_attribute(&self, name: &str, value: &str) {
        let mut inner = self.doc.inner.borrow_mut();
        let node = inner.node_mut(self.id);
        if name == "class" {
            node.classes.clear();
            for class in value.split_ascii_whitespace() {
                if !node.classes.iter().any(|c| c == class) {
                    node.classes.push(class.to_owned());
                }
            }
            return;
        }
        node.attributes.insert(name.to_owned(), value.to_owned());
    }

    pub fn remove_attribute(&self, name: &str) -> bool {
        let mut inner = self.doc.inner.borrow_mut();
        let node = inner.node_mut(self.id);
        if name == "class" {
            let had = !node.classes.is_empty();
            node.classes.clear();
            return had;
        }
        node.attributes.remove(name).is_some()
    }

    // --- Classes ---

    /// Add a class. Returns `false` if it was already present.
    pub fn add_class(&self, class: &str) -> bool {
        let mut inner = self.doc.inner.borrow_mut();
        let classes = &mut inner.node_mut(self.id).classes;
        if classes.iter().any(|c| c == class) {
            return false;
        }
        classes.push(class.to_owned());
        true
    }

    /// Remove a class. Removing an absent class is a no-op returning `false`.
    pub fn remove_class(&self, class: &str) -> bool {
        let mut inner = self.doc.inner.borrow_mut();
        let classes = &mut inner.node_mut(self.id).classes;
        let before = classes.len();
        classes.retain(|c| c != class);
        classes.len() != before
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.doc
            .inner
            .borrow()
            .node(self.id)
            .classes
            .iter()
            .any(|c| c == class)
    }

    pub fn classes(&self) -> Vec<String> {
        self.doc.inner.borrow().node(self.id).classes.clone()
    }

    // --- Tree ---

    pub fn parent(&self) -> Option<Element> {
        let parent = self.doc.inner.borrow().node(self.id).parent;
        parent.map(|id| self.wrap(id))
    }

    pub fn children(&self) -> Vec<Element> {
        let children = self.doc.inner.borrow().node(self.id).children.clone();
        children.into_iter().map(|id| self.wrap(id)).collect()
    }

    /// `self` followed by its ancestors, nearest first.
    pub fn inclusive_ancestors(&self) -> Vec<Element> {
        let chain = {
            let inner = self.doc.inner.borrow();
            let mut chain = vec![self.id];
            let mut cursor = self.id;
            while let Some(parent) = inner.node(cursor).parent {
                chain.push(parent);
                cursor = parent;
            }
            chain
        };
        chain.into_iter().map(|id| self.wrap(id)).collect()
    }

    /// Whether `other` is `self` or one of its descendants.
    pub fn contains(&self, other: &Element) -> bool {
        self.doc == other.doc
            && self
                .doc
                .inner
                .borrow()
                .is_inclusive_ancestor(self.id, other.id)
    }

    pub fn is_connected(&self) -> bool {
        self.doc.inner.borrow().is_connected(self.id)
    }

    /// Append `child`, moving it out of its current parent first.
    pub fn append_child(&self, child: &Element) -> Result<(), DomError> {
        if self.doc != child.doc {
            return Err(DomError::HierarchyRequest);
        }
        let was_connected = child.is_connected();
        let now_connected = {
            let mut inner = self.doc.inner.borrow_mut();
            if inner.is_inclusive_ancestor(child.id, self.id) {
                return Err(DomError::HierarchyRequest);
            }
            inner.detach(child.id);
            inner.node_mut(child.id).parent = Some(self.id);
            inner.node_mut(self.id).children.push(child.id);
            let now_connected = inner.is_connected(child.id);
            if !now_connected
                && let Some(active) = inner.active
                && inner.is_inclusive_ancestor(child.id, active)
            {
                inner.active = None;
            }
            if !now_connected {
                let moved = child.id;
                let layer: Vec<NodeId> = inner
                    .top_layer
                    .iter()
                    .copied()
                    .filter(|&node| !inner.is_inclusive_ancestor(moved, node))
                    .collect();
                inner.top_layer = layer;
            }
            now_connected
        };
        if was_connected && !now_connected {
            self.doc.notify(&Mutation::Removed(child.clone()));
        } else if !was_connected && now_connected {
            self.doc.notify(&Mutation::Inserted(child.clone()));
        }
        Ok(())
    }

    /// Detach this subtree from its parent.
    ///
    /// Focus inside the subtree is dropped and any of its dialogs leave the
    /// top layer (they stay `open`).
    pub fn remove(&self) {
        let was_connected = {
            let mut inner = self.doc.inner.borrow_mut();
            let was_connected = inner.is_connected(self.id);
            inner.detach(self.id);
            if let Some(active) = inner.active
                && inner.is_inclusive_ancestor(self.id, active)
            {
                inner.active = None;
            }
            let root = self.id;
            let layer: Vec<NodeId> = inner
                .top_layer
                .iter()
                .copied()
                .filter(|&node| !inner.is_inclusive_ancestor(root, node))
                .collect();
            inner.top_layer = layer;
            was_connected
        };
        if was_connected {
            self.doc.notify(&Mutation::Removed(self.clone()));
        }
    }

    /// First descendant (document order) matching `selector`.
    pub fn query(&self, selector: &Selector) -> Option<Element> {
        let found = {
            let inner = self.doc.inner.borrow();
            inner
                .descendants(self.id)
                .into_iter()
                .find(|&id| selector.matches_node(inner.node(id)))
        };
        found.map(|id| self.wrap(id))
    }

    /// All descendants (document order) matching `selector`.
    pub fn query_all(&self, selector: &Selector) -> Vec<Element> {
        let found: Vec<NodeId> = {
            let inner = self.doc.inner.borrow();
            inner
                .descendants(self.id)
                .into_iter()
                .filter(|&id| selector.matches_node(inner.node(id)))
                .collect()
        };
        found.into_iter().map(|id| self.wrap(id)).collect()
    }

    /// First descendant (document order) satisfying `predicate`.
    pub fn find_descendant(&self, predicate: impl Fn(&Element) -> bool) -> Option<Element> {
        let ids = self.doc.inner.borrow().descendants(self.id);
        ids.into_iter()
            .map(|id| self.wrap(id))
            .find(|element| predicate(element))
    }

    pub fn matches(&self, selector: &Selector) -> bool {
        selector.matches_node(self.doc.inner.borrow().node(self.id))
    }

    // --- Focus ---

    pub fn is_inert(&self) -> bool {
        self.doc.inner.borrow().is_inert(self.id)
    }

    fn is_disabled(&self) -> bool {
        matches!(
            self.tag_name().as_str(),
            "button" | "input" | "select" | "textarea"
        ) && self.has_attribute("disabled")
    }

    fn tab_index(&self) -> Option<i32> {
        self.attribute("tabindex")
            .and_then(|v| v.trim().parse::<i32>().ok())
    }

    fn is_interactive(&self) -> bool {
        match self.tag_name().as_str() {
            "button" | "select" | "textarea" => true,
            "input" => self.attribute("type").as_deref() != Some("hidden"),
            "a" | "area" => self.has_attribute("href"),
            _ => false,
        }
    }

    /// Whether `focus()` would succeed on this element.
    pub fn is_focusable(&self) -> bool {
        self.is_connected()
            && !self.is_inert()
            && !self.is_disabled()
            && (self.is_interactive() || self.tab_index().is_some())
    }

    /// Focusable and reachable by sequential (Tab) navigation.
    pub fn is_tabbable(&self) -> bool {
        self.is_focusable() && self.tab_index().is_none_or(|index| index >= 0)
    }

    /// Move focus here. Returns `false` (leaving focus unchanged) when the
    /// element is not focusable.
    pub fn focus(&self) -> bool {
        if !self.is_focusable() {
            return false;
        }
        self.doc.inner.borrow_mut().active = Some(self.id);
        true
    }

    pub fn blur(&self) {
        let mut inner = self.doc.inner.borrow_mut();
        if inner.active == Some(self.id) {
            inner.active = None;
        }
    }

    pub fn is_focused(&self) -> bool {
        self.doc.inner.borrow().active == Some(self.id)
    }

    // --- Dialog ---

    fn require_dialog(&self) -> Result<(), DomError> {
        if self.is_tag("dialog") {
            Ok(())
        } else {
            Err(DomError::NotADialog {
                tag: self.tag_name(),
            })
        }
    }

    /// The dialog's `open` state. Always `false` for other elements.
    pub fn is_open(&self) -> bool {
        self.doc.inner.borrow().node(self.id).open
    }

    /// Whether this dialog is in the top layer.
    pub fn is_modal(&self) -> bool {
        self.doc.inner.borrow().top_layer.contains(&self.id)
    }

    /// Open as a modal: push onto the top layer, making the rest of the
    /// document inert. Focus is not moved. A dialog that is already modal
    /// is left as it is.
    ///
    /// # Errors
    ///
    /// `InvalidState` when the dialog is disconnected, or open without
    /// being in the top layer (it must be closed first).
    pub fn show_modal(&self) -> Result<(), DomError> {
        self.require_dialog()?;
        let mut inner = self.doc.inner.borrow_mut();
        if inner.node(self.id).open {
            if inner.top_layer.contains(&self.id) {
                return Ok(());
            }
            return Err(DomError::InvalidState("dialog is open but not modal"));
        }
        if !inner.is_connected(self.id) {
            return Err(DomError::InvalidState("dialog is not connected"));
        }
        inner.node_mut(self.id).open = true;
        inner.node_mut(self.id).attributes.insert("open".into(), String::new());
        inner.top_layer.push(self.id);
        Ok(())
    }

    /// Close the dialog and fire `close`. Closing a closed dialog does
    /// nothing and fires nothing.
    pub fn close(&self) -> Result<(), DomError> {
        self.require_dialog()?;
        {
            let mut inner = self.doc.inner.borrow_mut();
            if !inner.node(self.id).open {
                return Ok(());
            }
            inner.node_mut(self.id).open = false;
            inner.node_mut(self.id).attributes.remove("open");
            let id = self.id;
            inner.top_layer.retain(|&node| node != id);
        }
        self.doc.dispatch_event(
            self,
            &Event::new(EventType::Close, EventFlags::empty()),
        );
        Ok(())
    }
}

#![forbid(unsafe_code)]

//! Controller registry and binding lifecycle.
//!
//! The [`Application`] watches the document and keeps one binding per
//! `(element, identifier)` pair whose element is connected and lists a
//! registered identifier in `data-controller`.
//!
//! # Lifecycle
//!
//! 1. `start()` connects every matching element already in the document and
//!    installs a mutation observer.
//! 2. Inserted subtrees are scanned and connected. `data-action` elements
//!    inserted into an already bound element are routed to its controller.
//! 3. When a bound element stops being connected its binding is
//!    disconnected: action listeners are removed, then
//!    [`Controller::disconnect`] runs.
//! 4. `stop()` disconnects every binding and removes the observer.
//!
//! # Failure Modes
//!
//! - A factory error (e.g. a missing target) is logged and the element is
//!   left unbound; it is retried on the next insertion of that element.
//! - Malformed action descriptors are logged and skipped.
//! - An action naming a method the controller does not handle is logged
//!   when it fires.
//! - Action listeners stay registered until their binding disconnects, even
//!   if the action element is later removed from the bound element.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use ahash::AHashMap;
use fdom_core::{Element, ListenerId, Mutation, Observer, Selector, Window};

use crate::action::parse_actions;
use crate::context::Context;
use crate::controller::Controller;
use crate::error::RuntimeError;
use crate::page_lock::PageLock;

type Built = (Rc<dyn Controller>, Rc<dyn Any>);
type Factory = Rc<dyn Fn(&Context) -> Result<Built, RuntimeError>>;

const CONTROLLER_ATTR: &str = "data-controller";
const ACTION_ATTR: &str = "data-action";

struct ActionListener {
    source: Element,
    id: ListenerId,
}

struct Binding {
    element: Element,
    identifier: String,
    controller: Rc<dyn Controller>,
    any: Rc<dyn Any>,
    actions: Vec<ActionListener>,
}

struct AppShared {
    window: Window,
    page_lock: PageLock,
    registry: RefCell<AHashMap<String, Factory>>,
    bindings: RefCell<Vec<Binding>>,
    observer: RefCell<Option<Observer>>,
    started: Cell<bool>,
}

/// Shared handle to a controller application.
#[derive(Clone)]
pub struct Application {
    shared: Rc<AppShared>,
}

impl fmt::Debug for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Application")
            .field("registered", &self.shared.registry.borrow().len())
            .field("bindings", &self.shared.bindings.borrow().len())
            .field("started", &self.shared.started.get())
            .finish()
    }
}

impl Application {
    /// Create an application over `window`. One [`PageLock`] on the
    /// document root is shared by all of its controllers.
    pub fn new(window: Window) -> Self {
        let page_lock = PageLock::new(window.document().root());
        Self {
            shared: Rc::new(AppShared {
                window,
                page_lock,
                registry: RefCell::new(AHashMap::new()),
                bindings: RefCell::new(Vec::new()),
                observer: RefCell::new(None),
                started: Cell::new(false),
            }),
        }
    }

    pub fn window(&self) -> &Window {
        &self.shared.window
    }

    pub fn page_lock(&self) -> &PageLock {
        &self.shared.page_lock
    }

    pub fn is_started(&self) -> bool {
        self.shared.started.get()
    }

    /// Register a controller factory under `identifier`.
    ///
    /// Registering after `start()` connects matching elements immediately.
    pub fn register<C, F>(&self, identifier: &str, factory: F)
    where
        C: Controller,
        F: Fn(&Context) -> Result<C, RuntimeError> + 'static,
    {
        let factory: Factory = Rc::new(move |ctx: &Context| {
            let controller = Rc::new(factory(ctx)?);
            let any: Rc<dyn Any> = controller.clone();
            Ok((controller as Rc<dyn Controller>, any))
        });
        self.shared
            .registry
            .borrow_mut()
            .insert(identifier.to_owned(), factory);
        if self.is_started() {
            let root = self.shared.window.document().root();
            self.shared.connect_subtree(&root);
        }
    }

    /// Connect existing elements and start observing the document.
    pub fn start(&self) {
        if self.shared.started.replace(true) {
            return;
        }
        let weak: Weak<AppShared> = Rc::downgrade(&self.shared);
        let observer = self.shared.window.document().observe(move |mutation| {
            let Some(shared) = weak.upgrade() else {
                return;
            };
            match mutation {
                Mutation::Inserted(element) => {
                    shared.bind_inserted_actions(element);
                    shared.connect_subtree(element);
                }
                Mutation::Removed(_) => shared.disconnect_detached(),
            }
        });
        *self.shared.observer.borrow_mut() = Some(observer);
        let root = self.shared.window.document().root();
        self.shared.connect_subtree(&root);
        tracing::debug!(
            bindings = self.binding_count(),
            "application started"
        );
    }

    /// Disconnect every binding and stop observing.
    pub fn stop(&self) {
        if !self.shared.started.replace(false) {
            return;
        }
        self.shared.observer.borrow_mut().take();
        let bindings = std::mem::take(&mut *self.shared.bindings.borrow_mut());
        for binding in bindings {
            self.shared.teardown(binding);
        }
        tracing::debug!("application stopped");
    }

    pub fn binding_count(&self) -> usize {
        self.shared.bindings.borrow().len()
    }

    /// The controller bound to `element` under `identifier`, if it has
    /// concrete type `C`.
    pub fn controller<C: Controller>(&self, element: &Element, identifier: &str) -> Option<Rc<C>> {
        let any = self
            .shared
            .bindings
            .borrow()
            .iter()
            .find(|b| &b.element == element && b.identifier == identifier)
            .map(|b| Rc::clone(&b.any))?;
        any.downcast::<C>().ok()
    }
}

impl AppShared {
    fn is_bound(&self, element: &Element, identifier: &str) -> bool {
        self.bindings
            .borrow()
            .iter()
            .any(|b| &b.element == element && b.identifier == identifier)
    }

    fn connect_subtree(&self, root: &Element) {
        let mut candidates = Vec::new();
        if root.has_attribute(CONTROLLER_ATTR) {
            candidates.push(root.clone());
        }
        candidates.extend(root.query_all(&Selector::attr(CONTROLLER_ATTR)));

        for element in candidates {
            let Some(list) = element.attribute(CONTROLLER_ATTR) else {
                continue;
            };
            for identifier in list.split_ascii_whitespace() {
                let factory = self.registry.borrow().get(identifier).cloned();
                let Some(factory) = factory else {
                    continue;
                };
                if self.is_bound(&element, identifier) || !element.is_connected() {
                    continue;
                }
                self.connect(&element, identifier, &factory);
            }
        }
    }

    fn connect(&self, element: &Element, identifier: &str, factory: &Factory) {
        let ctx = Context::new(
            self.window.clone(),
            element.clone(),
            identifier,
            self.page_lock.clone(),
        );
        let (controller, any) = match factory(&ctx) {
            Ok(built) => built,
            Err(err) => {
                tracing::warn!(identifier, element = ?element, error = %err, "controller failed to bind");
                return;
            }
        };
        controller.connect();
        let actions = self.bind_actions(element, identifier, &controller, &[]);
        tracing::debug!(identifier, element = ?element, actions = actions.len(), "controller connected");
        self.bindings.borrow_mut().push(Binding {
            element: element.clone(),
            identifier: identifier.to_owned(),
            controller,
            any,
            actions,
        });
    }

    /// Route actions found in `inserted` to bindings that already contain it.
    fn bind_inserted_actions(&self, inserted: &Element) {
        type Scope = (Element, String, Rc<dyn Controller>, Vec<Element>);
        let scopes: Vec<Scope> = self
            .bindings
            .borrow()
            .iter()
            .filter(|b| &b.element != inserted && b.element.contains(inserted))
            .map(|b| {
                let known: Vec<Element> = b.actions.iter().map(|a| a.source.clone()).collect();
                (b.element.clone(), b.identifier.clone(), Rc::clone(&b.controller), known)
            })
            .collect();

        for (element, identifier, controller, known) in scopes {
            let added = self.bind_actions(inserted, &identifier, &controller, &known);
            if added.is_empty() {
                continue;
            }
            tracing::debug!(
                identifier = %identifier,
                element = ?element,
                actions = added.len(),
                "actions bound in inserted subtree"
            );
            let mut bindings = self.bindings.borrow_mut();
            if let Some(binding) = bindings
                .iter_mut()
                .find(|b| b.element == element && b.identifier == identifier)
            {
                binding.actions.extend(added);
            }
        }
    }

    /// Listen for every action under `scope` addressed to `identifier`,
    /// skipping sources in `known`.
    fn bind_actions(
        &self,
        scope: &Element,
        identifier: &str,
        controller: &Rc<dyn Controller>,
        known: &[Element],
    ) -> Vec<ActionListener> {
        let document = self.window.document();
        let mut sources = Vec::new();
        if scope.has_attribute(ACTION_ATTR) {
            sources.push(scope.clone());
        }
        sources.extend(scope.query_all(&Selector::attr(ACTION_ATTR)));

        let mut listeners = Vec::new();
        for source in sources {
            if known.contains(&source) {
                continue;
            }
            let Some(value) = source.attribute(ACTION_ATTR) else {
                continue;
            };
            for parsed in parse_actions(&value) {
                let descriptor = match parsed {
                    Ok(descriptor) => descriptor,
                    Err(err) => {
                        tracing::warn!(element = ?source, error = %err, "skipping action");
                        continue;
                    }
                };
                if descriptor.identifier != identifier {
                    continue;
                }
                let weak = Rc::downgrade(controller);
                let method = descriptor.method.clone();
                let name = identifier.to_owned();
                let id = document.add_event_listener(&source, descriptor.event.clone(), move |ev| {
                    let Some(controller) = weak.upgrade() else {
                        return;
                    };
                    if let Err(err) = controller.handle_action(&method, ev) {
                        tracing::warn!(identifier = %name, method = %method, error = %err, "action failed");
                    }
                });
                listeners.push(ActionListener {
                    source: source.clone(),
                    id,
                });
            }
        }
        listeners
    }

    fn disconnect_detached(&self) {
        let detached: Vec<Binding> = {
            let mut bindings = self.bindings.borrow_mut();
            let (gone, kept): (Vec<Binding>, Vec<Binding>) = std::mem::take(&mut *bindings)
                .into_iter()
                .partition(|b| !b.element.is_connected());
            *bindings = kept;
            gone
        };
        for binding in detached {
            self.teardown(binding);
        }
    }

    fn teardown(&self, binding: Binding) {
        let document = self.window.document();
        for action in &binding.actions {
            document.remove_event_listener(action.id);
        }
        binding.controller.disconnect();
        tracing::debug!(
            identifier = %binding.identifier,
            element = ?binding.element,
            "controller disconnected"
        );
    }
}

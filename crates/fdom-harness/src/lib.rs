#![forbid(unsafe_code)]

//! Markup fixtures for driving FrankenDOM end to end.
//!
//! [`Markup`] describes an element tree the way a page template would;
//! [`Page`] owns a window plus a started [`Application`] with the modal
//! controller registered, and advances virtual time on request or from the
//! wall clock.

use std::cell::Cell;
use std::fmt::Write as _;
use std::rc::Rc;
use std::time::Duration;

use fdom_core::{Document, DomError, Element, WallClock, Window};
use fdom_runtime::Application;
use fdom_widgets::modal::{self, DialogController, MODAL_IDENTIFIER, ModalConfig};

/// Declarative element tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Markup {
    tag: String,
    attrs: Vec<(String, String)>,
    children: Vec<Markup>,
}

/// Start a [`Markup`] node.
pub fn el(tag: &str) -> Markup {
    Markup {
        tag: tag.to_owned(),
        attrs: Vec::new(),
        children: Vec::new(),
    }
}

impl Markup {
    #[must_use]
    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.push((name.to_owned(), value.to_owned()));
        self
    }

    #[must_use]
    pub fn id(self, id: &str) -> Self {
        self.attr("id", id)
    }

    #[must_use]
    pub fn child(mut self, child: Markup) -> Self {
        self.children.push(child);
        self
    }

    #[must_use]
    pub fn children(mut self, children: impl IntoIterator<Item = Markup>) -> Self {
        self.children.extend(children);
        self
    }

    /// Create the tree in `doc` without connecting it.
    pub fn build(&self, doc: &Document) -> Result<Element, DomError> {
        let element = doc.create_element(&self.tag);
        for (name, value) in &self.attrs {
            element.set_attribute(name, value);
        }
        for child in &self.children {
            element.append_child(&child.build(doc)?)?;
        }
        Ok(element)
    }

    /// Build the tree and append it to `parent` in one insertion.
    pub fn mount(&self, parent: &Element) -> Result<Element, DomError> {
        let element = self.build(parent.document())?;
        parent.append_child(&element)?;
        tracing::trace!(tag = %self.tag, "markup mounted");
        Ok(element)
    }
}

/// The canonical modal template.
///
/// Ids: `container`, `open`, `dialog`, `header`, `content`, `confirm`,
/// `cancel`.
pub fn modal_markup() -> Markup {
    el("div")
        .id("container")
        .attr("data-controller", MODAL_IDENTIFIER)
        .child(el("button").id("open").attr("data-action", "modal#open"))
        .child(
            el("dialog")
                .id("dialog")
                .attr("data-modal-target", "dialog")
                .child(el("header").id("header"))
                .child(
                    el("article")
                        .id("content")
                        .child(el("p"))
                        .child(
                            el("button")
                                .id("confirm")
                                .attr("data-action", "modal#confirm"),
                        )
                        .child(
                            el("button")
                                .id("cancel")
                                .attr("data-action", "modal#close"),
                        ),
                ),
        )
}

/// Indented outline of a subtree: tag, id, classes and open state.
pub fn outline(element: &Element) -> String {
    let mut out = String::new();
    outline_into(element, 0, &mut out);
    out
}

fn outline_into(element: &Element, depth: usize, out: &mut String) {
    let _ = write!(out, "{:indent$}{}", "", element.tag_name(), indent = depth * 2);
    if let Some(id) = element.attribute("id") {
        let _ = write!(out, "#{id}");
    }
    for class in element.classes() {
        let _ = write!(out, ".{class}");
    }
    if element.is_open() {
        out.push_str(" [open]");
    }
    out.push('\n');
    for child in element.children() {
        outline_into(&child, depth + 1, out);
    }
}

/// A running page: window, started application, modal controller
/// registered.
#[derive(Debug, Clone)]
pub struct Page {
    window: Window,
    app: Application,
    clock: Cell<WallClock>,
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}

impl Page {
    pub fn new() -> Self {
        Self::with_config(ModalConfig::default())
    }

    pub fn with_config(config: ModalConfig) -> Self {
        let window = Window::new();
        let app = Application::new(window.clone());
        modal::register_with(&app, config);
        app.start();
        Self {
            window,
            app,
            clock: Cell::new(WallClock::new()),
        }
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn document(&self) -> &Document {
        self.window.document()
    }

    pub fn app(&self) -> &Application {
        &self.app
    }

    /// Mount `markup` under `<body>`.
    pub fn mount(&self, markup: &Markup) -> Result<Element, DomError> {
        markup.mount(&self.document().body())
    }

    pub fn by_id(&self, id: &str) -> Option<Element> {
        self.document().get_element_by_id(id)
    }

    /// Classes currently on the document root.
    pub fn root_classes(&self) -> Vec<String> {
        self.document().root().classes()
    }

    /// The modal controller bound to `container`.
    pub fn modal(&self, container: &Element) -> Option<Rc<DialogController>> {
        self.app
            .controller::<DialogController>(container, MODAL_IDENTIFIER)
    }

    pub fn advance(&self, ms: u64) -> usize {
        self.window.scheduler().advance(Duration::from_millis(ms))
    }

    pub fn settle(&self) -> usize {
        self.window.scheduler().run_until_idle()
    }

    /// Advance virtual time by the real time elapsed since the previous
    /// pump (or since the page was created).
    pub fn pump(&self) -> usize {
        let mut clock = self.clock.get();
        let ran = clock.pump(self.window.scheduler());
        self.clock.set(clock);
        ran
    }
}

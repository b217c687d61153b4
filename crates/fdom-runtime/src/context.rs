#![forbid(unsafe_code)]

//! Per-binding context: targets, typed values, and event dispatch.
//!
//! Naming follows the attribute conventions of the runtime:
//!
//! | Concept | Attribute |
//! |---------|-----------|
//! | Controller | `data-controller="modal"` |
//! | Target | `data-modal-target="dialog"` |
//! | Value | `data-modal-close-on-backdrop-value="false"` |
//! | Action | `data-action="click->modal#open"` |

use fdom_core::{Document, Element, Event, Selector, Window};

use crate::error::RuntimeError;
use crate::page_lock::PageLock;

/// Everything a controller learns about the element it is bound to.
#[derive(Debug, Clone)]
pub struct Context {
    window: Window,
    element: Element,
    identifier: String,
    page_lock: PageLock,
}

impl Context {
    pub fn new(
        window: Window,
        element: Element,
        identifier: impl Into<String>,
        page_lock: PageLock,
    ) -> Self {
        Self {
            window,
            element,
            identifier: identifier.into(),
            page_lock,
        }
    }

    #[inline]
    pub fn window(&self) -> &Window {
        &self.window
    }

    /// The container element carrying `data-controller`.
    #[inline]
    pub fn element(&self) -> &Element {
        &self.element
    }

    #[inline]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    #[inline]
    pub fn page_lock(&self) -> &PageLock {
        &self.page_lock
    }

    fn target_attribute(&self) -> String {
        format!("data-{}-target", self.identifier)
    }

    /// First descendant declaring `name` in its target attribute.
    pub fn target(&self, name: &str) -> Option<Element> {
        self.element
            .query(&Selector::attr_word(&self.target_attribute(), name))
    }

    /// Like [`Context::target`], but a missing target is an error.
    pub fn require_target(&self, name: &str) -> Result<Element, RuntimeError> {
        self.target(name).ok_or_else(|| RuntimeError::MissingTarget {
            identifier: self.identifier.clone(),
            target: name.to_owned(),
        })
    }

    fn value_attribute(&self, name: &str) -> String {
        format!("data-{}-{}-value", self.identifier, kebab_case(name))
    }

    fn raw_value(&self, name: &str) -> Option<String> {
        self.element.attribute(&self.value_attribute(name))
    }

    /// Boolean value. Present attributes are true unless `"0"` or `"false"`.
    pub fn bool_value(&self, name: &str, default: bool) -> bool {
        match self.raw_value(name) {
            Some(raw) => !matches!(raw.trim(), "0" | "false"),
            None => default,
        }
    }

    /// Numeric value; unparsable input falls back to `default`.
    pub fn number_value(&self, name: &str, default: f64) -> f64 {
        self.raw_value(name)
            .and_then(|raw| raw.trim().parse::<f64>().ok())
            .unwrap_or(default)
    }

    pub fn string_value(&self, name: &str, default: &str) -> String {
        self.raw_value(name).unwrap_or_else(|| default.to_owned())
    }

    /// Dispatch `<identifier>:<name>` from the bound element.
    ///
    /// Returns `false` if a listener suppressed the default action.
    pub fn dispatch(&self, name: &str) -> bool {
        dispatch_custom(self.window.document(), &self.element, &self.identifier, name)
    }
}

/// `modal` + `confirm` -> `modal:confirm`.
pub fn event_name(identifier: &str, name: &str) -> String {
    format!("{identifier}:{name}")
}

/// Dispatch the bubbling custom event `<identifier>:<name>` from `element`.
///
/// Controllers that outlive their [`Context`] emit through this so the
/// naming stays in one place.
pub fn dispatch_custom(
    document: &Document,
    element: &Element,
    identifier: &str,
    name: &str,
) -> bool {
    let event = Event::custom(event_name(identifier, name));
    document.dispatch_event(element, &event)
}

/// `closeOnBackdrop` -> `close-on-backdrop`.
pub fn kebab_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, ch) in name.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if i > 0 {
                out.push('-');
            }
            out.push(ch.to_ascii_lowercase());
        } else if ch == '_' {
            out.push('-');
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use fdom_core::EventType;
    use std::cell::Cell;
    use std::rc::Rc;

    fn context() -> Context {
        let window = Window::new();
        let doc = window.document().clone();
        let host = doc.create_element("div");
        host.set_attribute("data-controller", "modal");
        doc.body().append_child(&host).unwrap();
        Context::new(window, host, "modal", PageLock::new(doc.root()))
    }

    #[test]
    fn event_names_are_scoped_by_identifier() {
        assert_eq!(event_name("modal", "confirm"), "modal:confirm");
        assert_eq!(event_name("drawer", "opened"), "drawer:opened");
    }

    #[test]
    fn kebab() {
        assert_eq!(kebab_case("closeOnBackdrop"), "close-on-backdrop");
        assert_eq!(kebab_case("animation_ms"), "animation-ms");
        assert_eq!(kebab_case("open"), "open");
    }

    #[test]
    fn bool_values_follow_attribute_rules() {
        let ctx = context();
        assert!(ctx.bool_value("closeOnBackdrop", true));
        assert!(!ctx.bool_value("closeOnBackdrop", false));

        let attr = "data-modal-close-on-backdrop-value";
        ctx.element().set_attribute(attr, "false");
        assert!(!ctx.bool_value("closeOnBackdrop", true));
        ctx.element().set_attribute(attr, "0");
        assert!(!ctx.bool_value("closeOnBackdrop", true));
        ctx.element().set_attribute(attr, "");
        assert!(ctx.bool_value("closeOnBackdrop", false));
        ctx.element().set_attribute(attr, "true");
        assert!(ctx.bool_value("closeOnBackdrop", false));
    }

    #[test]
    fn number_and_string_values() {
        let ctx = context();
        ctx.element().set_attribute("data-modal-duration-value", "250");
        assert_eq!(ctx.number_value("duration", 400.0), 250.0);
        ctx.element().set_attribute("data-modal-duration-value", "fast");
        assert_eq!(ctx.number_value("duration", 400.0), 400.0);
        assert_eq!(ctx.string_value("title", "untitled"), "untitled");
    }

    #[test]
    fn targets_are_scoped_to_the_element() {
        let ctx = context();
        let doc = ctx.window().document().clone();
        let outside = doc.create_element("dialog");
        outside.set_attribute("data-modal-target", "dialog");
        doc.body().append_child(&outside).unwrap();
        assert_eq!(ctx.target("dialog"), None);
        assert_eq!(
            ctx.require_target("dialog"),
            Err(RuntimeError::MissingTarget {
                identifier: "modal".into(),
                target: "dialog".into(),
            })
        );

        let inside = doc.create_element("dialog");
        inside.set_attribute("data-modal-target", "dialog");
        ctx.element().append_child(&inside).unwrap();
        assert_eq!(ctx.target("dialog"), Some(inside));
    }

    #[test]
    fn dispatch_names_event_after_identifier() {
        let ctx = context();
        let doc = ctx.window().document().clone();
        let hits = Rc::new(Cell::new(0));
        let counter = Rc::clone(&hits);
        doc.add_event_listener(
            &doc.body(),
            EventType::Custom("modal:confirm".into()),
            move |_| counter.set(counter.get() + 1),
        );
        assert!(ctx.dispatch("confirm"));
        assert_eq!(hits.get(), 1);
    }
}

#![forbid(unsafe_code)]

//! Focus target resolution and focus memory for modal dialogs.

use fdom_core::{Document, Element, Selector};

/// Element that should receive focus when `dialog` opens.
///
/// Prefers the first `[autofocus]` descendant, then the first tabbable
/// descendant in document order.
pub fn focus_target(dialog: &Element) -> Option<Element> {
    dialog
        .query(&Selector::attr("autofocus"))
        .or_else(|| dialog.find_descendant(Element::is_tabbable))
}

/// The element focused before a dialog opened.
#[derive(Debug, Clone, Default)]
pub struct FocusMemory {
    saved: Option<Element>,
}

impl FocusMemory {
    /// Overwrite the memory with the current active element.
    pub fn record(&mut self, document: &Document) {
        self.saved = document.active_element();
    }

    pub fn saved(&self) -> Option<&Element> {
        self.saved.as_ref()
    }

    /// Focus the remembered element. Returns `false` when nothing was
    /// remembered or the element left the document.
    ///
    /// The memory is kept so it can still be inspected afterwards.
    pub fn restore(&self) -> bool {
        match &self.saved {
            Some(element) if element.is_connected() => element.focus(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dialog_with(doc: &Document, tags: &[(&str, Option<(&str, &str)>)]) -> Element {
        let dialog = doc.create_element("dialog");
        doc.body().append_child(&dialog).unwrap();
        let article = doc.create_element("article");
        dialog.append_child(&article).unwrap();
        for (tag, attr) in tags {
            let el = doc.create_element(tag);
            if let Some((name, value)) = attr {
                el.set_attribute(name, value);
            }
            article.append_child(&el).unwrap();
        }
        dialog
    }

    #[test]
    fn autofocus_wins_over_document_order() {
        let doc = Document::new();
        let dialog = dialog_with(
            &doc,
            &[("button", None), ("input", Some(("autofocus", "")))],
        );
        assert_eq!(focus_target(&dialog).unwrap().tag_name(), "input");
    }

    #[test]
    fn first_tabbable_in_document_order() {
        let doc = Document::new();
        let dialog = dialog_with(
            &doc,
            &[
                ("p", None),
                ("div", Some(("tabindex", "-1"))),
                ("a", Some(("href", "#more"))),
                ("button", None),
            ],
        );
        assert_eq!(focus_target(&dialog).unwrap().tag_name(), "a");
    }

    #[test]
    fn nothing_focusable() {
        let doc = Document::new();
        let dialog = dialog_with(&doc, &[("p", None), ("a", None)]);
        assert!(focus_target(&dialog).is_none());
    }

    #[test]
    fn restore_skips_detached_elements() {
        let doc = Document::new();
        let trigger = doc.create_element("button");
        doc.body().append_child(&trigger).unwrap();
        assert!(trigger.focus());

        let mut memory = FocusMemory::default();
        memory.record(&doc);
        assert_eq!(memory.saved(), Some(&trigger));

        trigger.remove();
        assert!(!memory.restore());
        assert!(memory.saved().is_some());
    }
}

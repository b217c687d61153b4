#![forbid(unsafe_code)]

//! End-to-end modal lifecycle through declarative markup and the runtime.

use std::cell::Cell;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use fdom_core::{Element, EventType};
use fdom_harness::{Page, el, modal_markup, outline};
use fdom_widgets::modal::{ModalConfig, ModalPhase};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

struct Mounted {
    page: Page,
    container: Element,
    open: Element,
    dialog: Element,
    header: Element,
    confirm: Element,
    cancel: Element,
}

fn mounted_with(page: Page) -> Mounted {
    let container = page.mount(&modal_markup()).unwrap();
    let by_id = |id: &str| page.by_id(id).unwrap();
    Mounted {
        open: by_id("open"),
        dialog: by_id("dialog"),
        header: by_id("header"),
        confirm: by_id("confirm"),
        cancel: by_id("cancel"),
        container,
        page,
    }
}

fn mounted() -> Mounted {
    mounted_with(Page::new())
}

fn counter(page: &Page, target: &Element, kind: EventType) -> Rc<Cell<u32>> {
    let hits = Rc::new(Cell::new(0));
    let h = Rc::clone(&hits);
    page.document()
        .add_event_listener(target, kind, move |_| h.set(h.get() + 1));
    hits
}

#[test]
fn click_to_open_then_cancel_button() {
    let m = mounted();
    m.open.focus();
    m.page.document().click(&m.open);

    assert!(m.dialog.is_open());
    assert_eq!(m.page.root_classes(), ["modal-is-open", "modal-is-opening"]);
    assert_eq!(m.page.document().active_element(), Some(m.confirm.clone()));

    m.page.advance(400);
    assert_eq!(m.page.root_classes(), ["modal-is-open"]);

    m.page.document().click(&m.cancel);
    assert_eq!(m.page.root_classes(), ["modal-is-open", "modal-is-closing"]);
    assert!(m.dialog.is_open());

    m.page.settle();
    assert!(!m.dialog.is_open());
    assert!(m.page.root_classes().is_empty());
    assert_eq!(m.page.document().active_element(), Some(m.open.clone()));
}

#[test]
fn open_click_default_is_suppressed() {
    let m = mounted();
    assert!(!m.page.document().click(&m.open));
}

#[test]
fn outline_while_open() {
    let m = mounted();
    m.page.document().click(&m.open);
    let expected = "\
div#container
  button#open
  dialog#dialog [open]
    header#header
    article#content
      p
      button#confirm
      button#cancel
";
    assert_eq!(outline(&m.container), expected);
}

#[test]
fn confirm_emits_bubbling_event_and_closes() {
    let m = mounted();
    let body = m.page.document().body();
    let confirms = counter(&m.page, &body, EventType::parse("modal:confirm"));

    m.page.document().click(&m.open);
    m.page.document().click(&m.confirm);
    assert_eq!(confirms.get(), 1);

    let modal = m.page.modal(&m.container).unwrap();
    assert_eq!(modal.phase(), ModalPhase::Closing);
    m.page.settle();
    assert_eq!(modal.phase(), ModalPhase::Closed);
}

#[test]
fn confirm_while_closing_still_emits() {
    let m = mounted();
    let confirms = counter(&m.page, &m.container, EventType::parse("modal:confirm"));
    let closes = counter(&m.page, &m.dialog, EventType::Close);
    m.page.document().click(&m.open);
    m.page.document().click(&m.confirm);
    m.page.document().click(&m.confirm);
    m.page.settle();
    assert_eq!(confirms.get(), 2);
    assert_eq!(closes.get(), 1);
}

#[test]
fn backdrop_and_escape_dismiss() {
    let m = mounted();
    let modal = m.page.modal(&m.container).unwrap();

    m.page.document().click(&m.open);
    m.page.document().click(&m.header);
    assert_eq!(modal.phase(), ModalPhase::Closing);
    m.page.settle();

    m.page.document().click(&m.open);
    assert!(m.page.document().press_escape());
    assert!(m.dialog.is_open());
    assert_eq!(modal.phase(), ModalPhase::Closing);
    m.page.settle();
    assert!(!m.page.document().press_escape());
}

#[test]
fn backdrop_override_from_markup() {
    let page = Page::new();
    let markup = modal_markup().attr("data-modal-close-on-backdrop-value", "false");
    let container = page.mount(&markup).unwrap();
    let modal = page.modal(&container).unwrap();
    assert!(!modal.config().close_on_backdrop);

    page.document().click(&page.by_id("open").unwrap());
    page.document().click(&page.by_id("header").unwrap());
    page.settle();
    assert_eq!(modal.phase(), ModalPhase::Open);
}

#[test]
fn application_config_reaches_bindings() {
    let config = ModalConfig::default()
        .animation(std::time::Duration::from_millis(100))
        .close_on_backdrop(false);
    let m = mounted_with(Page::with_config(config));
    let modal = m.page.modal(&m.container).unwrap();
    m.page.document().click(&m.open);
    m.page.advance(100);
    assert_eq!(modal.phase(), ModalPhase::Open);
}

#[test]
fn missing_dialog_target_leaves_container_unbound() {
    let page = Page::new();
    let container = page
        .mount(&el("div").attr("data-controller", "modal").child(el("dialog")))
        .unwrap();
    assert!(page.modal(&container).is_none());
    assert_eq!(page.app().binding_count(), 0);
}

#[test]
fn removing_container_mid_animation_cleans_up() {
    let m = mounted();
    let closes = counter(&m.page, &m.dialog, EventType::Close);
    m.page.document().click(&m.open);
    m.page.document().click(&m.cancel);

    m.container.remove();
    assert_eq!(m.page.app().binding_count(), 0);
    assert!(m.page.root_classes().is_empty());
    assert_eq!(m.page.document().top_modal(), None);
    assert_eq!(m.page.document().listener_count(&m.dialog), 1);

    m.page.settle();
    assert_eq!(closes.get(), 0);
    assert!(m.page.root_classes().is_empty());
}

#[test]
fn reinserted_container_gets_fresh_binding() {
    let m = mounted();
    let first = m.page.modal(&m.container).unwrap();
    m.container.remove();
    assert!(first.is_detached());

    m.page.document().body().append_child(&m.container).unwrap();
    let second = m.page.modal(&m.container).unwrap();
    assert!(!second.is_detached());
    m.page.document().click(&m.open);
    assert_eq!(second.phase(), ModalPhase::Opening);
    assert_eq!(first.phase(), ModalPhase::Closed);
}

#[test]
fn reinserting_an_open_modal_opens_it_modal_again() {
    let m = mounted();
    let outside = m.page.mount(&el("button").id("outside")).unwrap();
    m.page.document().click(&m.open);
    m.page.settle();
    assert!(m.dialog.is_modal());

    m.container.remove();
    m.page.document().body().append_child(&m.container).unwrap();
    assert!(m.dialog.is_open());
    assert!(!m.dialog.is_modal());
    assert!(m.page.root_classes().is_empty());

    m.page.document().click(&m.open);
    let modal = m.page.modal(&m.container).unwrap();
    assert_eq!(modal.phase(), ModalPhase::Opening);
    assert!(m.dialog.is_modal());
    assert!(outside.is_inert());
    assert!(m.open.is_inert());
    assert_eq!(m.page.document().top_modal(), Some(m.dialog.clone()));

    m.page.document().click(&m.cancel);
    m.page.settle();
    assert!(!m.dialog.is_open());
    assert!(m.page.root_classes().is_empty());
}

#[test]
fn actions_added_after_binding_reach_the_controller() {
    let m = mounted();
    let content = m.page.by_id("content").unwrap();
    let later = el("button")
        .id("later")
        .attr("data-action", "modal#close")
        .mount(&content)
        .unwrap();
    let modal = m.page.modal(&m.container).unwrap();

    m.page.document().click(&m.open);
    m.page.document().click(&later);
    assert_eq!(modal.phase(), ModalPhase::Closing);
}

#[test]
fn wall_clock_pump_drives_animation() {
    let config = ModalConfig::default().animation(std::time::Duration::from_millis(5));
    let m = mounted_with(Page::with_config(config));
    let modal = m.page.modal(&m.container).unwrap();
    m.page.document().click(&m.open);

    std::thread::sleep(std::time::Duration::from_millis(20));
    assert_eq!(m.page.pump(), 1);
    assert_eq!(modal.phase(), ModalPhase::Open);
}

#[test]
fn two_modals_share_the_open_marker() {
    let page = Page::new();
    let a = page.mount(&modal_markup()).unwrap();
    let b = page
        .mount(
            &el("div")
                .attr("data-controller", "modal")
                .child(
                    el("dialog")
                        .attr("data-modal-target", "dialog")
                        .child(el("article")),
                ),
        )
        .unwrap();
    let ma = page.modal(&a).unwrap();
    let mb = page.modal(&b).unwrap();

    ma.open(None);
    mb.open(None);
    ma.close(None);
    page.settle();
    assert_eq!(page.root_classes(), ["modal-is-open"]);

    mb.close(None);
    page.settle();
    assert!(page.root_classes().is_empty());
}

#[test]
fn stop_detaches_every_binding() {
    let m = mounted();
    m.page.document().click(&m.open);
    m.page.app().stop();
    assert!(m.page.root_classes().is_empty());
    assert_eq!(m.page.document().listener_count(&m.dialog), 0);
    assert_eq!(m.page.document().listener_count(&m.open), 0);
}

/// Shared buffer for a scoped `tracing` subscriber.
#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<String>>>);

impl Captured {
    fn messages(&self) -> Vec<String> {
        self.0.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

struct Capture(Captured);

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for Capture {
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        struct Message(Option<String>);
        impl tracing::field::Visit for Message {
            fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
                if field.name() == "message" {
                    self.0 = Some(format!("{value:?}"));
                }
            }
        }
        let mut visitor = Message(None);
        event.record(&mut visitor);
        if let (Some(message), Ok(mut buf)) = (visitor.0, (self.0).0.lock()) {
            buf.push(message);
        }
    }
}

#[test]
fn lifecycle_is_traced_in_order() {
    use tracing_subscriber::layer::SubscriberExt;

    let captured = Captured::default();
    let subscriber = tracing_subscriber::registry().with(Capture(captured.clone()));
    tracing::subscriber::with_default(subscriber, || {
        let m = mounted();
        m.page.document().click(&m.open);
        m.page.document().click(&m.cancel);
        m.page.settle();
    });

    let lifecycle: Vec<String> = captured
        .messages()
        .into_iter()
        .filter(|m| m.starts_with("dialog "))
        .collect();
    assert_eq!(lifecycle, ["dialog opening", "dialog closing", "dialog closed"]);
}

#[derive(Debug, Clone)]
enum Step {
    ClickOpen,
    ClickCancel,
    ClickConfirm,
    ClickBackdrop,
    Escape,
    Wait(u64),
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        Just(Step::ClickOpen),
        Just(Step::ClickCancel),
        Just(Step::ClickConfirm),
        Just(Step::ClickBackdrop),
        Just(Step::Escape),
        (0u64..500).prop_map(Step::Wait),
    ]
}

proptest! {
    #[test]
    fn markup_driven_sequences_end_clean(steps in proptest::collection::vec(step(), 0..30)) {
        let m = mounted();
        let modal = m.page.modal(&m.container).unwrap();
        let doc = m.page.document().clone();

        for step in steps {
            match step {
                Step::ClickOpen => { doc.click(&m.open); }
                Step::ClickCancel => { doc.click(&m.cancel); }
                Step::ClickConfirm => { doc.click(&m.confirm); }
                Step::ClickBackdrop => { doc.click(&m.header); }
                Step::Escape => { doc.press_escape(); }
                Step::Wait(ms) => { m.page.advance(ms); }
            }
            let listeners = doc.listener_count(&m.dialog);
            prop_assert!(listeners == 0 || listeners == 2);
            prop_assert_eq!(
                m.page.root_classes().iter().any(|c| c == "modal-is-open"),
                modal.phase() != ModalPhase::Closed
            );
        }

        doc.click(&m.cancel);
        m.page.settle();
        prop_assert_eq!(modal.phase(), ModalPhase::Closed);
        prop_assert!(m.page.root_classes().is_empty());
        prop_assert_eq!(doc.listener_count(&m.dialog), 0);
        prop_assert!(!m.dialog.is_open());
    }
}

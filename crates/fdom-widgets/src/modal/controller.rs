#![forbid(unsafe_code)]

//! Open/close lifecycle of one `<dialog>` bound to a container element.
//!
//! # Phases
//!
//! ```text
//!            open()                 +animation
//!   Closed ─────────▶ Opening ─────────────────▶ Open
//!     ▲                 │ close()                 │ close()
//!     │ +animation      ▼                         │
//!     └──────────── Closing ◀─────────────────────┘
//!                       │ open()
//!                       └──────▶ Opening
//! ```
//!
//! Each transition out of `Closed`/`Open`/`Opening`/`Closing` bumps a
//! generation counter. Deferred work (dropping the opening marker, close
//! completion) captures the generation it was scheduled under and does
//! nothing if it has since changed, so a rapid open → close → open never
//! lets a stale timer act on the newer cycle.
//!
//! # Invariants
//!
//! - The dialog carries either no controller listeners or exactly one
//!   cancel listener and one click listener.
//! - The open marker is held iff the phase is not `Closed`.
//! - The opening marker is held only in `Opening`; the closing marker only
//!   in `Closing`.
//! - After `detach()` the binding holds no listeners and no markers, and
//!   pending deferred work is inert.
//! - Focus memory is recorded on `open` from `Closed` only; re-opening
//!   during `Closing` keeps the element saved by the first open.
//! - After `open` the dialog is in the top layer. A dialog left open but
//!   non-modal (e.g. by removal from the document) is closed and shown
//!   again.
//!
//! # Failure Modes
//!
//! None of the operations fail. Redundant calls (`open` while open, `close`
//! while closed or closing) are no-ops; DOM primitive errors are logged and
//! the state machine carries on; a dialog without a content region treats
//! every click as a backdrop click.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::Duration;

use fdom_core::{DomError, Element, Event, EventType, ListenerId, Selector, Window};
use fdom_runtime::{
    Context, Controller, PageLock, PageLockGuard, RuntimeError, dispatch_custom, event_name,
};

use crate::modal::config::ModalConfig;
use crate::modal::focus::{FocusMemory, focus_target};

/// Identifier the modal controller is registered under.
pub const MODAL_IDENTIFIER: &str = "modal";

/// Where a dialog binding is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModalPhase {
    #[default]
    Closed,
    /// Shown, entry animation running.
    Opening,
    Open,
    /// Exit animation running; the dialog is still shown.
    Closing,
}

struct ListenerPair {
    cancel: ListenerId,
    backdrop: ListenerId,
}

#[derive(Default)]
struct State {
    phase: ModalPhase,
    generation: u64,
    detached: bool,
    listeners: Option<ListenerPair>,
    focus: FocusMemory,
    open_marker: Option<PageLockGuard>,
    opening_marker: Option<PageLockGuard>,
    closing_marker: Option<PageLockGuard>,
}

struct Shared {
    window: Window,
    container: Element,
    dialog: Element,
    identifier: String,
    config: ModalConfig,
    page_lock: PageLock,
    state: RefCell<State>,
}

impl Drop for Shared {
    fn drop(&mut self) {
        if let Some(pair) = self.state.get_mut().listeners.take() {
            let document = self.window.document();
            document.remove_event_listener(pair.cancel);
            document.remove_event_listener(pair.backdrop);
        }
    }
}

/// Controller for one modal dialog.
///
/// Cloning yields another handle to the same binding.
#[derive(Clone)]
pub struct DialogController {
    shared: Rc<Shared>,
}

impl fmt::Debug for DialogController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.borrow();
        f.debug_struct("DialogController")
            .field("dialog", &self.shared.dialog)
            .field("phase", &state.phase)
            .field("generation", &state.generation)
            .field("detached", &state.detached)
            .finish()
    }
}

impl DialogController {
    /// Bind a controller to `container` and its `dialog`.
    ///
    /// Nothing visible happens until [`open`](Self::open).
    pub fn attach(
        window: &Window,
        container: Element,
        dialog: Element,
        config: ModalConfig,
        page_lock: PageLock,
    ) -> Result<Self, DomError> {
        Self::bind(window, container, dialog, config, page_lock, MODAL_IDENTIFIER)
    }

    fn bind(
        window: &Window,
        container: Element,
        dialog: Element,
        config: ModalConfig,
        page_lock: PageLock,
        identifier: &str,
    ) -> Result<Self, DomError> {
        if !dialog.is_tag("dialog") {
            return Err(DomError::NotADialog {
                tag: dialog.tag_name(),
            });
        }
        Ok(Self {
            shared: Rc::new(Shared {
                window: window.clone(),
                container,
                dialog,
                identifier: identifier.to_owned(),
                config,
                page_lock,
                state: RefCell::new(State::default()),
            }),
        })
    }

    /// Build from a runtime binding: the `dialog` target is required.
    ///
    /// The container may override `closeOnBackdrop`, `animationMs` and
    /// `contentTag` through value attributes. Unusable overrides fall back
    /// to `config`.
    pub fn from_context(ctx: &Context, config: ModalConfig) -> Result<Self, RuntimeError> {
        let dialog = ctx.require_target("dialog")?;
        let config = overrides(ctx, config);
        let controller = Self::bind(
            ctx.window(),
            ctx.element().clone(),
            dialog,
            config,
            ctx.page_lock().clone(),
            ctx.identifier(),
        )?;
        Ok(controller)
    }

    fn from_weak(weak: &Weak<Shared>) -> Option<Self> {
        weak.upgrade().map(|shared| Self { shared })
    }

    // --- Queries ---

    pub fn phase(&self) -> ModalPhase {
        self.shared.state.borrow().phase
    }

    /// The dialog's own `open` state.
    pub fn is_open(&self) -> bool {
        self.shared.dialog.is_open()
    }

    pub fn generation(&self) -> u64 {
        self.shared.state.borrow().generation
    }

    pub fn is_detached(&self) -> bool {
        self.shared.state.borrow().detached
    }

    /// Element focused before the most recent `open`.
    pub fn focus_memory(&self) -> Option<Element> {
        self.shared.state.borrow().focus.saved().cloned()
    }

    /// Whether the cancel/backdrop listener pair is registered.
    pub fn has_listeners(&self) -> bool {
        self.shared.state.borrow().listeners.is_some()
    }

    pub fn dialog(&self) -> &Element {
        &self.shared.dialog
    }

    pub fn container(&self) -> &Element {
        &self.shared.container
    }

    pub fn config(&self) -> &ModalConfig {
        &self.shared.config
    }

    /// Name of the event emitted by [`confirm`](Self::confirm).
    pub fn confirm_event_name(&self) -> String {
        event_name(&self.shared.identifier, "confirm")
    }

    // --- Lifecycle ---

    /// Show the dialog as a modal and start the entry animation.
    pub fn open(&self, trigger: Option<&Event>) {
        if let Some(event) = trigger {
            event.prevent_default();
        }

        let markers = &self.shared.config.markers;
        let generation = {
            let mut state = self.shared.state.borrow_mut();
            if state.detached {
                tracing::trace!(dialog = ?self.shared.dialog, "open ignored; controller detached");
                return;
            }
            let reopening = match state.phase {
                ModalPhase::Opening | ModalPhase::Open => {
                    tracing::debug!(dialog = ?self.shared.dialog, "open ignored; already open");
                    return;
                }
                ModalPhase::Closing => true,
                ModalPhase::Closed => false,
            };
            if !reopening {
                state.focus.record(self.shared.window.document());
            }
            state.closing_marker = None;
            if state.open_marker.is_none() {
                state.open_marker = Some(self.shared.page_lock.hold(&markers.open));
            }
            state.opening_marker = Some(self.shared.page_lock.hold(&markers.opening));
            state.phase = ModalPhase::Opening;
            state.generation += 1;
            state.generation
        };

        self.remove_listeners();
        self.add_listeners();

        if self.shared.dialog.is_open() && !self.shared.dialog.is_modal() {
            tracing::debug!(
                dialog = ?self.shared.dialog,
                "dialog open but not modal; closing before show_modal"
            );
            if let Err(err) = self.shared.dialog.close() {
                tracing::warn!(dialog = ?self.shared.dialog, error = %err, "dialog close failed");
            }
        }
        if let Err(err) = self.shared.dialog.show_modal() {
            tracing::warn!(dialog = ?self.shared.dialog, error = %err, "show_modal failed");
        }

        let weak = Rc::downgrade(&self.shared);
        self.shared
            .window
            .set_timeout(self.shared.config.animation, move || {
                if let Some(controller) = Self::from_weak(&weak) {
                    controller.finish_opening(generation);
                }
            });

        if let Some(target) = focus_target(&self.shared.dialog) {
            target.focus();
        }

        tracing::debug!(dialog = ?self.shared.dialog, generation, "dialog opening");
    }

    fn finish_opening(&self, generation: u64) {
        let mut state = self.shared.state.borrow_mut();
        if state.generation != generation {
            tracing::trace!(
                dialog = ?self.shared.dialog,
                scheduled = generation,
                current = state.generation,
                "stale open timer ignored"
            );
            return;
        }
        state.opening_marker = None;
        state.phase = ModalPhase::Open;
    }

    /// Start the exit animation. The dialog closes and focus is restored
    /// only once the animation has elapsed.
    pub fn close(&self, trigger: Option<&Event>) {
        if let Some(event) = trigger {
            event.prevent_default();
        }

        let generation = {
            let mut state = self.shared.state.borrow_mut();
            if state.detached {
                tracing::trace!(dialog = ?self.shared.dialog, "close ignored; controller detached");
                return;
            }
            if matches!(state.phase, ModalPhase::Closed | ModalPhase::Closing) {
                tracing::debug!(dialog = ?self.shared.dialog, phase = ?state.phase, "close ignored");
                return;
            }
            state.opening_marker = None;
            state.closing_marker = Some(
                self.shared
                    .page_lock
                    .hold(&self.shared.config.markers.closing),
            );
            state.phase = ModalPhase::Closing;
            state.generation += 1;
            state.generation
        };

        let weak = Rc::downgrade(&self.shared);
        self.shared
            .window
            .set_timeout(self.shared.config.animation, move || {
                if let Some(controller) = Self::from_weak(&weak) {
                    controller.finish_closing(generation);
                }
            });

        tracing::debug!(dialog = ?self.shared.dialog, generation, "dialog closing");
    }

    fn finish_closing(&self, generation: u64) {
        let restore = {
            let mut state = self.shared.state.borrow_mut();
            if state.generation != generation {
                tracing::trace!(
                    dialog = ?self.shared.dialog,
                    scheduled = generation,
                    current = state.generation,
                    "stale close completion ignored"
                );
                return;
            }
            state.closing_marker = None;
            state.open_marker = None;
            state.phase = ModalPhase::Closed;
            state.focus.clone()
        };

        if let Err(err) = self.shared.dialog.close() {
            tracing::warn!(dialog = ?self.shared.dialog, error = %err, "dialog close failed");
        }
        self.remove_listeners();
        if !restore.restore() && restore.saved().is_some() {
            tracing::debug!(dialog = ?self.shared.dialog, "previous focus not restorable");
        }

        tracing::debug!(dialog = ?self.shared.dialog, generation, "dialog closed");
    }

    /// Close, then emit `<identifier>:confirm` from the container.
    ///
    /// The event is emitted on every call, even when the close itself is a
    /// no-op because the dialog is already closing.
    pub fn confirm(&self, trigger: Option<&Event>) {
        if let Some(event) = trigger {
            event.prevent_default();
        }
        self.close(None);
        dispatch_custom(
            self.shared.window.document(),
            &self.shared.container,
            &self.shared.identifier,
            "confirm",
        );
    }

    /// Tear the binding down: drop listeners and markers, and make pending
    /// deferred work inert.
    pub fn detach(&self) {
        {
            let mut state = self.shared.state.borrow_mut();
            state.detached = true;
            state.generation += 1;
            state.phase = ModalPhase::Closed;
            state.opening_marker = None;
            state.closing_marker = None;
            state.open_marker = None;
        }
        self.remove_listeners();
        tracing::debug!(dialog = ?self.shared.dialog, "dialog controller detached");
    }

    // --- Listeners ---

    fn add_listeners(&self) {
        let document = self.shared.window.document();

        let weak = Rc::downgrade(&self.shared);
        let cancel = document.add_event_listener(&self.shared.dialog, EventType::Cancel, move |ev| {
            if let Some(controller) = Self::from_weak(&weak) {
                controller.on_cancel(ev);
            }
        });

        let weak = Rc::downgrade(&self.shared);
        let backdrop = document.add_event_listener(&self.shared.dialog, EventType::Click, move |ev| {
            if let Some(controller) = Self::from_weak(&weak) {
                controller.on_click(ev);
            }
        });

        self.shared.state.borrow_mut().listeners = Some(ListenerPair { cancel, backdrop });
    }

    fn remove_listeners(&self) {
        let pair = self.shared.state.borrow_mut().listeners.take();
        if let Some(pair) = pair {
            let document = self.shared.window.document();
            document.remove_event_listener(pair.cancel);
            document.remove_event_listener(pair.backdrop);
        }
    }

    /// Escape always takes the animated path instead of the native close.
    fn on_cancel(&self, event: &Event) {
        event.prevent_default();
        self.close(None);
    }

    fn on_click(&self, event: &Event) {
        if !self.shared.config.close_on_backdrop {
            return;
        }
        let Some(target) = event.target() else {
            return;
        };
        let content = self
            .shared
            .dialog
            .query(&Selector::tag(&self.shared.config.content_tag));
        let inside = match content {
            Some(content) => content.contains(&target),
            None => {
                tracing::debug!(
                    dialog = ?self.shared.dialog,
                    content_tag = %self.shared.config.content_tag,
                    "no content region; treating click as backdrop"
                );
                false
            }
        };
        if !inside {
            self.close(None);
        }
    }
}

fn overrides(ctx: &Context, config: ModalConfig) -> ModalConfig {
    let close_on_backdrop = ctx.bool_value("closeOnBackdrop", config.close_on_backdrop);
    let default_ms = config.animation.as_secs_f64() * 1000.0;
    let animation_ms = ctx.number_value("animationMs", default_ms);
    let animation = Duration::try_from_secs_f64(animation_ms / 1000.0).unwrap_or(config.animation);
    let content_tag = ctx.string_value("contentTag", &config.content_tag);
    let content_tag = if content_tag.trim().is_empty() {
        config.content_tag.clone()
    } else {
        content_tag.trim().to_ascii_lowercase()
    };
    config
        .close_on_backdrop(close_on_backdrop)
        .animation(animation)
        .content_tag(content_tag)
}

impl Controller for DialogController {
    fn disconnect(&self) {
        self.detach();
    }

    fn handle_action(&self, method: &str, event: &Event) -> Result<(), RuntimeError> {
        match method {
            "open" => self.open(Some(event)),
            "close" => self.close(Some(event)),
            "confirm" => self.confirm(Some(event)),
            other => {
                return Err(RuntimeError::UnknownAction {
                    method: other.to_owned(),
                });
            }
        }
        Ok(())
    }
}

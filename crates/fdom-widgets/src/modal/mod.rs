#![forbid(unsafe_code)]

//! Modal dialog controller.
//!
//! A container declares the controller and its dialog target:
//!
//! ```html
//! <div data-controller="modal" data-modal-close-on-backdrop-value="true">
//!   <button data-action="modal#open">Open</button>
//!   <dialog data-modal-target="dialog">
//!     <article>
//!       <button data-action="modal#confirm">OK</button>
//!       <button data-action="modal#close">Cancel</button>
//!     </article>
//!   </dialog>
//! </div>
//! ```
//!
//! Opening shows the dialog as a modal, moves focus inside and marks the
//! document root while the entry animation runs. Closing runs the exit
//! animation before the dialog is actually closed and focus is returned.
//! Clicks outside the `<article>` and the escape key both take the animated
//! close path. `confirm` closes and emits `modal:confirm` from the
//! container.

pub mod config;
pub mod controller;
pub mod focus;

pub use config::{ConfigError, DEFAULT_ANIMATION, ModalConfig, ModalMarkers};
pub use controller::{DialogController, MODAL_IDENTIFIER, ModalPhase};
pub use focus::{FocusMemory, focus_target};

use fdom_runtime::Application;

/// Register the modal controller under [`MODAL_IDENTIFIER`] with default
/// configuration.
pub fn register(app: &Application) {
    register_with(app, ModalConfig::default());
}

/// Register the modal controller with `config` as the per-binding base
/// configuration.
pub fn register_with(app: &Application, config: ModalConfig) {
    app.register(MODAL_IDENTIFIER, move |ctx| {
        DialogController::from_context(ctx, config.clone())
    });
}

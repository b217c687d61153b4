#![forbid(unsafe_code)]

//! The controller contract.

use fdom_core::Event;

use crate::error::RuntimeError;

/// Behavior attached to an element through `data-controller`.
///
/// A controller is constructed by the factory registered for its
/// identifier, then `connect`ed. `disconnect` runs exactly once, when the
/// element leaves the document or the application stops; after it the
/// controller must hold no listeners, timers with visible effects, or page
/// lock guards.
pub trait Controller: 'static {
    /// Called once after construction.
    fn connect(&self) {}

    /// Called once when the binding is torn down.
    fn disconnect(&self) {}

    /// Route a `data-action` method call.
    fn handle_action(&self, method: &str, event: &Event) -> Result<(), RuntimeError> {
        let _ = event;
        Err(RuntimeError::UnknownAction {
            method: method.to_owned(),
        })
    }
}

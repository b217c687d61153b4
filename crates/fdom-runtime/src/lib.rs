#![forbid(unsafe_code)]

//! Controller runtime for FrankenDOM.
//!
//! Attaches [`Controller`]s to elements declared with `data-controller`,
//! resolves their targets and typed values, routes `data-action` events to
//! them, and tears them down when their element leaves the document.
//!
//! Page-level marker classes shared between controllers go through the
//! reference-counted [`PageLock`].

pub mod action;
pub mod application;
pub mod context;
pub mod controller;
pub mod error;
pub mod page_lock;

pub use action::{ActionDescriptor, parse_actions};
pub use application::Application;
pub use context::{Context, dispatch_custom, event_name, kebab_case};
pub use controller::Controller;
pub use error::RuntimeError;
pub use page_lock::{PageLock, PageLockGuard};

#![forbid(unsafe_code)]

//! Host-driven DOM model for FrankenDOM.
//!
//! Provides just enough of a browser environment to run UI controllers
//! deterministically: an element tree with attributes and classes, focus and
//! inertness, bubbling event dispatch, `<dialog>` primitives with escape
//! handling, mutation observers, and a virtual-time timer queue.

pub mod dom;
pub mod error;
pub mod event;
pub mod timer;
pub mod window;

pub use dom::{Document, Element, Mutation, NodeId, Observer, Selector};
pub use error::DomError;
pub use event::{Event, EventFlags, EventType, Listener, ListenerId};
pub use timer::{Scheduler, TimerId, WallClock};
pub use window::Window;

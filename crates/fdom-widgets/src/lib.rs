#![forbid(unsafe_code)]

//! Widget controllers for FrankenDOM.
//!
//! - [`modal`]: animated open/close lifecycle for `<dialog>` elements.

pub mod modal;

pub use modal::{DialogController, ModalConfig, ModalPhase};

#![forbid(unsafe_code)]

//! Error type for DOM primitives.

use std::fmt;

/// Failure of a DOM primitive.
///
/// Queries never fail (they return `Option`/`bool`); only structural
/// mutations and `<dialog>` primitives report errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomError {
    /// The insertion would create a cycle or cross documents.
    HierarchyRequest,
    /// A dialog primitive was invoked on an element that is not `<dialog>`.
    NotADialog {
        /// Tag name of the offending element.
        tag: String,
    },
    /// The element is in a state that does not allow the operation.
    InvalidState(&'static str),
}

impl fmt::Display for DomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HierarchyRequest => write!(f, "insertion would violate the tree hierarchy"),
            Self::NotADialog { tag } => write!(f, "<{tag}> is not a dialog element"),
            Self::InvalidState(reason) => write!(f, "invalid state: {reason}"),
        }
    }
}

impl std::error::Error for DomError {}

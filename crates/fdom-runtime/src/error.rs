#![forbid(unsafe_code)]

//! Runtime error type.

use std::fmt;

use fdom_core::DomError;

/// Failure while binding or driving a controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// A required `data-<identifier>-target` element is absent.
    MissingTarget {
        identifier: String,
        target: String,
    },
    /// A `data-action` descriptor could not be parsed.
    MalformedAction(String),
    /// The controller does not implement the requested action method.
    UnknownAction { method: String },
    /// A DOM primitive failed while binding.
    Dom(DomError),
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingTarget { identifier, target } => {
                write!(f, "missing target \"{target}\" for controller \"{identifier}\"")
            }
            Self::MalformedAction(descriptor) => {
                write!(f, "malformed action descriptor \"{descriptor}\"")
            }
            Self::UnknownAction { method } => write!(f, "unknown action method \"{method}\""),
            Self::Dom(err) => write!(f, "dom error: {err}"),
        }
    }
}

impl std::error::Error for RuntimeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Dom(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DomError> for RuntimeError {
    fn from(err: DomError) -> Self {
        Self::Dom(err)
    }
}

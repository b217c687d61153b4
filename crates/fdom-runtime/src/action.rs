#![forbid(unsafe_code)]

//! `data-action` descriptors.
//!
//! Grammar: `[event->]identifier#method`, several descriptors separated by
//! whitespace. The event defaults to `click`.

use std::fmt;
use std::str::FromStr;

use fdom_core::EventType;

use crate::error::RuntimeError;

/// One parsed `event->identifier#method` routing rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionDescriptor {
    pub event: EventType,
    pub identifier: String,
    pub method: String,
}

impl FromStr for ActionDescriptor {
    type Err = RuntimeError;

    fn from_str(descriptor: &str) -> Result<Self, Self::Err> {
        let malformed = || RuntimeError::MalformedAction(descriptor.to_owned());

        let (event, target) = match descriptor.split_once("->") {
            Some((event, target)) => (event, target),
            None => ("click", descriptor),
        };
        let (identifier, method) = target.split_once('#').ok_or_else(malformed)?;
        if event.is_empty() || identifier.is_empty() || method.is_empty() {
            return Err(malformed());
        }
        if method.contains('#') || identifier.contains("->") {
            return Err(malformed());
        }
        Ok(Self {
            event: EventType::parse(event),
            identifier: identifier.to_owned(),
            method: method.to_owned(),
        })
    }
}

impl fmt::Display for ActionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}#{}", self.event, self.identifier, self.method)
    }
}

/// Parse every whitespace-separated descriptor in a `data-action` value.
pub fn parse_actions(value: &str) -> Vec<Result<ActionDescriptor, RuntimeError>> {
    value.split_ascii_whitespace().map(str::parse).collect()
}

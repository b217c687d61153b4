#![forbid(unsafe_code)]

//! The environment a controller runs in: one document plus its timers.

use std::time::Duration;

use crate::dom::Document;
use crate::timer::{Scheduler, TimerId};

/// A document paired with the scheduler that drives its deferred work.
#[derive(Debug, Clone, Default)]
pub struct Window {
    document: Document,
    scheduler: Scheduler,
}

impl Window {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn document(&self) -> &Document {
        &self.document
    }

    #[inline]
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn set_timeout(&self, delay: Duration, callback: impl FnOnce() + 'static) -> TimerId {
        self.scheduler.set_timeout(delay, callback)
    }
}

#![forbid(unsafe_code)]

//! Reference-counted page lock markers on the document root.
//!
//! Several dialog bindings may want the same root class (`modal-is-open`)
//! at overlapping times. Each holder takes a [`PageLockGuard`]; the class is
//! added when the first guard for it is taken and removed when the last one
//! is dropped.
//!
//! # Invariants
//!
//! - A class is on the root iff `holders(class) > 0`.
//! - Dropping a guard releases exactly one hold.
//!
//! # Failure Modes
//!
//! - Anything else that edits the same root class directly breaks the
//!   first invariant; the lock does not re-sync.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use ahash::AHashMap;
use fdom_core::Element;

/// Shared handle to the root-class reference counts.
#[derive(Clone)]
pub struct PageLock {
    root: Element,
    counts: Rc<RefCell<AHashMap<String, usize>>>,
}

impl fmt::Debug for PageLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageLock")
            .field("root", &self.root)
            .field("counts", &*self.counts.borrow())
            .finish()
    }
}

impl PageLock {
    /// Create a lock managing classes on `root` (normally `<html>`).
    pub fn new(root: Element) -> Self {
        Self {
            root,
            counts: Rc::new(RefCell::new(AHashMap::new())),
        }
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    /// Take a hold on `class`.
    #[must_use = "dropping the guard releases the hold immediately"]
    pub fn hold(&self, class: &str) -> PageLockGuard {
        let first = {
            let mut counts = self.counts.borrow_mut();
            let count = counts.entry(class.to_owned()).or_insert(0);
            *count += 1;
            *count == 1
        };
        if first {
            self.root.add_class(class);
        }
        PageLockGuard {
            lock: self.clone(),
            class: class.to_owned(),
        }
    }

    /// Number of live guards for `class`.
    pub fn holders(&self, class: &str) -> usize {
        self.counts.borrow().get(class).copied().unwrap_or(0)
    }

    fn release(&self, class: &str) {
        let last = {
            let mut counts = self.counts.borrow_mut();
            match counts.get_mut(class) {
                Some(count) if *count > 1 => {
                    *count -= 1;
                    false
                }
                Some(_) => {
                    counts.remove(class);
                    true
                }
                None => false,
            }
        };
        if last {
            self.root.remove_class(class);
        }
    }
}

/// RAII hold on one root class.
#[must_use = "dropping the guard releases the hold immediately"]
pub struct PageLockGuard {
    lock: PageLock,
    class: String,
}

impl PageLockGuard {
    pub fn class(&self) -> &str {
        &self.class
    }
}

impl fmt::Debug for PageLockGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageLockGuard")
            .field("class", &self.class)
            .finish()
    }
}

impl Drop for PageLockGuard {
    fn drop(&mut self) {
        self.lock.release(&self.class);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fdom_core::Document;
    use proptest::prelude::*;

    #[test]
    fn class_lives_as_long_as_any_guard() {
        let doc = Document::new();
        let lock = PageLock::new(doc.root());

        let a = lock.hold("modal-is-open");
        let b = lock.hold("modal-is-open");
        assert!(doc.root().has_class("modal-is-open"));
        assert_eq!(lock.holders("modal-is-open"), 2);

        drop(a);
        assert!(doc.root().has_class("modal-is-open"));
        drop(b);
        assert!(!doc.root().has_class("modal-is-open"));
        assert_eq!(lock.holders("modal-is-open"), 0);
    }

    #[test]
    fn classes_are_independent() {
        let doc = Document::new();
        let lock = PageLock::new(doc.root());
        let open = lock.hold("modal-is-open");
        let opening = lock.hold("modal-is-opening");
        drop(opening);
        assert!(doc.root().has_class("modal-is-open"));
        assert!(!doc.root().has_class("modal-is-opening"));
        assert_eq!(open.class(), "modal-is-open");
    }

    proptest! {
        #[test]
        fn class_present_iff_held(ops in proptest::collection::vec(any::<bool>(), 0..64)) {
            let doc = Document::new();
            let lock = PageLock::new(doc.root());
            let mut guards = Vec::new();
            for take in ops {
                if take {
                    guards.push(lock.hold("locked"));
                } else {
                    guards.pop();
                }
                prop_assert_eq!(lock.holders("locked"), guards.len());
                prop_assert_eq!(doc.root().has_class("locked"), !guards.is_empty());
            }
        }
    }
}

//! # Lifecycle scopes
//!
//! A [`Scope`] is a cancellable unit of work. Scopes form a tree: each mount
//! owns one, each rendered value or list entry gets a child, and cancelling
//! a scope cancels every descendant and runs the registered teardown
//! callbacks. This is how subtree presence and computation lineage stay in
//! lock step — when a value is superseded or an entry leaves a list, its
//! scope goes with it and everything it started cleans up.
//!
//! ```rust
//! use tether_core::scope::Scope;
//!
//! let root = Scope::root();
//! let child = root.spawn_child();
//! child.on_cancel(|| log::debug!("child torn down"));
//!
//! root.cancel(); // cascades: child teardowns run, then root's
//! assert!(child.is_cancelled());
//! ```
//!
//! Scope nodes live in a thread-local arena keyed by generational
//! [`slotmap`] ids, so handles are plain `Copy` values and the live tree
//! holds no `Rc` cycles; a stale handle simply behaves as cancelled.

use std::cell::RefCell;
use std::panic::{AssertUnwindSafe, catch_unwind};

use slotmap::{SlotMap, new_key_type};
use smallvec::SmallVec;

use crate::diag::{self, Diagnostic};

new_key_type! {
    pub struct ScopeId;
}

struct ScopeNode {
    parent: Option<ScopeId>,
    children: SmallVec<[ScopeId; 4]>,
    teardowns: Vec<Box<dyn FnOnce()>>,
}

thread_local! {
    static ARENA: RefCell<SlotMap<ScopeId, ScopeNode>> = RefCell::new(SlotMap::with_key());
}

/// Handle to a node in the cancellation tree.
///
/// Copying the handle does not duplicate the node; all copies refer to the
/// same scope, and all observe its cancellation.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Scope {
    id: ScopeId,
}

impl Scope {
    /// A fresh scope with no parent.
    pub fn root() -> Scope {
        let id = ARENA.with(|a| {
            a.borrow_mut().insert(ScopeNode {
                parent: None,
                children: SmallVec::new(),
                teardowns: Vec::new(),
            })
        });
        Scope { id }
    }

    /// A scope that is already cancelled. Returned where no live parent
    /// exists; no work can be scheduled under it.
    pub fn already_cancelled() -> Scope {
        Scope {
            id: ScopeId::default(),
        }
    }

    /// Creates a child owned by this scope. A child of a cancelled scope is
    /// itself cancelled from birth.
    pub fn spawn_child(&self) -> Scope {
        ARENA.with(|a| {
            let mut arena = a.borrow_mut();
            if !arena.contains_key(self.id) {
                return Scope::already_cancelled();
            }
            let child = arena.insert(ScopeNode {
                parent: Some(self.id),
                children: SmallVec::new(),
                teardowns: Vec::new(),
            });
            if let Some(node) = arena.get_mut(self.id) {
                node.children.push(child);
            }
            Scope { id: child }
        })
    }

    /// Registers `f` to run when this scope is cancelled. Callbacks run in
    /// reverse registration order, mirroring nested acquisition. On an
    /// already-cancelled scope the callback runs immediately.
    pub fn on_cancel(&self, f: impl FnOnce() + 'static) {
        let boxed: Box<dyn FnOnce()> = Box::new(f);
        let rejected = ARENA.with(|a| {
            let mut arena = a.borrow_mut();
            match arena.get_mut(self.id) {
                Some(node) => {
                    node.teardowns.push(boxed);
                    None
                }
                None => Some(boxed),
            }
        });
        if let Some(cb) = rejected {
            log::debug!("on_cancel on a cancelled scope; running callback now");
            run_teardown(cb);
        }
    }

    /// Cancels this scope: children first, depth-first, then own teardowns
    /// in reverse registration order. Idempotent; a second call is a no-op.
    ///
    /// A panicking teardown is caught and reported through the diagnostics
    /// channel; it never blocks sibling callbacks or the rest of the tree.
    pub fn cancel(&self) {
        let node = ARENA.with(|a| {
            let mut arena = a.borrow_mut();
            let Some(node) = arena.remove(self.id) else {
                return None;
            };
            if let Some(pid) = node.parent
                && let Some(parent) = arena.get_mut(pid)
            {
                parent.children.retain(|c| *c != self.id);
            }
            Some(node)
        });
        let Some(node) = node else { return };
        // Arena borrow is released before any user callback runs.
        for child in node.children {
            Scope { id: child }.cancel();
        }
        for cb in node.teardowns.into_iter().rev() {
            run_teardown(cb);
        }
    }

    pub fn is_cancelled(&self) -> bool {
        ARENA.with(|a| !a.borrow().contains_key(self.id))
    }
}

fn run_teardown(cb: Box<dyn FnOnce()>) {
    if let Err(err) = catch_unwind(AssertUnwindSafe(cb)) {
        let detail = if let Some(s) = err.downcast_ref::<String>() {
            s.clone()
        } else if let Some(s) = err.downcast_ref::<&str>() {
            (*s).to_string()
        } else {
            "non-string panic payload".to_string()
        };
        diag::report(Diagnostic::TeardownPanicked { detail });
    }
}

/// Hook form of [`Scope::on_cancel`] for cleanup code that receives a scope
/// from elsewhere (animation/teardown integrations).
pub fn register_teardown(scope: Scope, f: impl FnOnce() + 'static) {
    scope.on_cancel(f);
}

//! Exit transition gating.
//!
//! A gate delays the physical removal of a deleted entry: the driver keeps
//! the entry's nodes attached, hands the gate the subtree and an
//! [`ExitHandle`], and completes the removal (detach, then scope
//! cancellation) only when the handle reports completion. Several exits can
//! be in flight at once; each gates only its own entry, and other work in
//! the same reconciliation pass proceeds immediately.

use std::cell::RefCell;
use std::rc::Rc;

/// Completion token for one entry's exit transition.
///
/// Cloneable so animation code can stash it in callbacks; the underlying
/// completion runs at most once. Calling [`done`](ExitHandle::done) after
/// the owning mount closed is a no-op — closure flushes pending exits
/// itself.
#[derive(Clone)]
pub struct ExitHandle(Rc<RefCell<Option<Box<dyn FnOnce()>>>>);

impl ExitHandle {
    pub(crate) fn new(complete: impl FnOnce() + 'static) -> Self {
        Self(Rc::new(RefCell::new(Some(Box::new(complete)))))
    }

    /// Signals that the exit transition finished and the entry's nodes may
    /// be detached.
    pub fn done(&self) {
        let f = self.0.borrow_mut().take();
        if let Some(f) = f {
            f()
        }
    }
}

/// Hook invoked for each removed entry before its nodes are detached.
pub type ExitGate<S> = Rc<dyn Fn(&S, ExitHandle)>;

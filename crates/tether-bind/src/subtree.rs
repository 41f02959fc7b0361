//! The boundary between the core and whatever actually renders.
//!
//! The core never interprets a subtree beyond "attach at a position /
//! detach": the rendering layer supplies a [`Container`] whose associated
//! `Subtree` type is opaque here — DOM nodes, widget handles, strings in a
//! test buffer, anything.

use tether_core::context::Context;
use tether_core::scope::Scope;

/// Ordered backing store for one mount point's children.
///
/// A container instance belongs to exactly one mount; the mount is the
/// single writer of its child order. Indices are physical positions in the
/// container at the moment of the call.
pub trait Container {
    type Subtree;

    /// Inserts `subtree`'s backing nodes at `index`.
    fn attach(&mut self, index: usize, subtree: &Self::Subtree);

    /// Removes the backing nodes at `index`.
    fn detach(&mut self, index: usize);

    /// Removes the node at `from` and reinserts it at `to`, where `to` is
    /// an index into the sequence after the removal.
    fn reposition(&mut self, from: usize, to: usize);
}

/// Everything a render contract receives besides the value itself: the
/// lifecycle scope owning the work this render starts, and the contextual
/// data inherited from ancestors.
pub struct BuildCx {
    scope: Scope,
    context: Context,
}

impl BuildCx {
    pub(crate) fn new(scope: Scope, context: Context) -> Self {
        Self { scope, context }
    }

    /// The scope this rendering lives under. Cancelled when the rendered
    /// value is superseded or its entry leaves the list.
    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn context(&self) -> &Context {
        &self.context
    }
}

/// Reference container: a plain ordered buffer of cloned subtree handles.
/// What the tests and headless demos render into.
#[derive(Debug)]
pub struct VecContainer<S> {
    items: Vec<S>,
}

impl<S> Default for VecContainer<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> VecContainer<S> {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn items(&self) -> &[S] {
        &self.items
    }
}

impl<S: Clone> Container for VecContainer<S> {
    type Subtree = S;

    fn attach(&mut self, index: usize, subtree: &S) {
        self.items.insert(index, subtree.clone());
    }

    fn detach(&mut self, index: usize) {
        self.items.remove(index);
    }

    fn reposition(&mut self, from: usize, to: usize) {
        let item = self.items.remove(from);
        self.items.insert(to, item);
    }
}

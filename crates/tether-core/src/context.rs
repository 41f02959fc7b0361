//! # Context propagation
//!
//! A [`Context`] carries contextual data from ancestor components down to
//! descendants they never meet directly: a theme, a density factor, a locale.
//! It is an immutable, typed key/value store — writing an entry never mutates
//! an existing store, it layers a new store on top:
//!
//! ```rust
//! use tether_core::context::Context;
//!
//! #[derive(Debug, PartialEq)]
//! struct Density(f32);
//!
//! let root = Context::new();
//! let hidpi = root.with(Density(2.0));
//!
//! assert_eq!(hidpi.get::<Density>().as_deref(), Some(&Density(2.0)));
//! assert!(root.get::<Density>().is_none()); // the parent never sees it
//! ```
//!
//! Entries are keyed by type. A descendant observes every entry added on the
//! path from the root down to it, nearest ancestor winning; sibling subtrees
//! never observe each other's additions, because each `with` call produces an
//! independent layer over the shared parent chain.
//!
//! For configuration that must be visible tree-wide but changeable at
//! runtime (the classic "current theme" global), put a
//! [`Stream`](crate::stream::Stream) in a root-level entry: descendants look
//! it up once and subscribe, instead of reading a mutable global.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::rc::Rc;

/// Immutable, copy-on-extend store of typed contextual values.
///
/// Cloning is cheap (one `Rc` bump) and a clone observes the same entries
/// forever; only [`Context::with`] produces a store with more entries.
#[derive(Clone, Default)]
pub struct Context {
    frame: Option<Rc<Frame>>,
}

struct Frame {
    parent: Option<Rc<Frame>>,
    entries: HashMap<TypeId, Rc<dyn Any>>,
}

impl Context {
    /// An empty store, used at the tree root.
    pub fn new() -> Self {
        Self { frame: None }
    }

    /// Returns a new store layered over this one with `value` added,
    /// shadowing any ancestor entry of the same type. Pure: the receiver is
    /// unchanged.
    pub fn with<T: 'static>(&self, value: T) -> Context {
        let mut entries: HashMap<TypeId, Rc<dyn Any>> = HashMap::new();
        entries.insert(TypeId::of::<T>(), Rc::new(value));
        Context {
            frame: Some(Rc::new(Frame {
                parent: self.frame.clone(),
                entries,
            })),
        }
    }

    /// Nearest entry of type `T` on the path from this store up to the root,
    /// or `None` if no ancestor added one.
    pub fn get<T: 'static>(&self) -> Option<Rc<T>> {
        let mut cur = self.frame.as_ref();
        while let Some(frame) = cur {
            if let Some(v) = frame.entries.get(&TypeId::of::<T>()) {
                return v.clone().downcast::<T>().ok();
            }
            cur = frame.parent.as_ref();
        }
        None
    }

    /// Whether an entry of type `T` is visible from this store.
    pub fn contains<T: 'static>(&self) -> bool {
        self.get::<T>().is_some()
    }
}

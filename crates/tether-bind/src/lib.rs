//! # Stream-driven mount points
//!
//! This crate binds `tether-core`'s primitives to an actual child list: a
//! [`Container`](subtree::Container) supplied by the rendering layer. Two
//! mounts exist:
//!
//! - [`mount_value`](value::mount_value) — one rendered subtree, replaced
//!   wholesale per emission.
//! - [`mount_list_keyed`](list::mount_list_keyed) /
//!   [`mount_list`](list::mount_list) — an ordered child list reconciled
//!   per emission with the keyed edit-script engine, preserving each
//!   surviving entry's subtree and lifecycle scope.
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! use tether_bind::subtree::VecContainer;
//! use tether_bind::list::mount_list_keyed;
//! use tether_core::prelude::*;
//!
//! let rows = stream(vec![(1, "alpha"), (2, "beta")]);
//! let container = Rc::new(RefCell::new(VecContainer::new()));
//! let root = Scope::root();
//!
//! let mount = mount_list_keyed(
//!     &rows,
//!     |row: &(i32, &str)| row.0,
//!     &container,
//!     root,
//!     Context::new(),
//!     |row, _cx| Ok(format!("row:{}", row.1)),
//! );
//! assert_eq!(container.borrow().items(), ["row:alpha", "row:beta"]);
//!
//! // a reorder repositions the existing subtrees; nothing re-renders
//! rows.emit(vec![(2, "beta"), (1, "alpha")]);
//! assert_eq!(container.borrow().items(), ["row:beta", "row:alpha"]);
//!
//! mount.close();
//! assert!(container.borrow().items().is_empty());
//! ```
//!
//! Removal can be gated on an exit transition: register a gate with
//! [`register_exit_gate`](list::register_exit_gate) and the driver keeps a
//! deleted entry's nodes attached until the gate's
//! [`ExitHandle`](exit::ExitHandle) reports completion, without holding up
//! anything else in the pass.
//!
//! Each mount owns its container exclusively and applies emissions strictly
//! in arrival order; failures in one entry's render or teardown are
//! reported through `tether_core::diag` and never spread to its siblings.

pub mod exit;
pub mod list;
pub mod subtree;
pub mod tests;
pub mod value;

pub use exit::*;
pub use list::*;
pub use subtree::*;
pub use value::*;

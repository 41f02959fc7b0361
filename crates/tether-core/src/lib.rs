//! # Scopes, streams, and edit scripts
//!
//! Tether's core is the machinery that keeps a rendered subtree in sync
//! with changing values while minimizing mutation work and tearing stale
//! work down correctly. It knows nothing about what a subtree *is* — the
//! binding layer (`tether-bind`) hands it opaque handles — it only manages
//! identity, ordering, and lifecycle. Four pieces:
//!
//! - [`Context`](context::Context) — immutable, copy-on-extend contextual
//!   data, inherited root-to-leaf.
//! - [`Scope`](scope::Scope) — cancellable lifecycle tree with teardown
//!   callbacks.
//! - [`Stream`](stream::Stream) — observable value streams that drive
//!   mounts.
//! - [`diff`] — the keyed edit-script engine the list reconciler replays.
//!
//! ## Streams
//!
//! A `Stream<T>` is a cloneable handle to a changing value:
//!
//! ```rust
//! use tether_core::prelude::*;
//!
//! let count = stream(0);
//! count.emit(1);
//! count.update(|v| *v += 1);
//! assert_eq!(count.latest(), Some(2));
//! ```
//!
//! Mount points subscribe and re-render per emission; emissions are
//! delivered in order, and subscribing to a stream that already carries a
//! value replays it synchronously.
//!
//! ## Scopes and teardown
//!
//! Every rendered value and every list entry owns a [`Scope`](scope::Scope);
//! long-running work started by a render registers its cleanup there:
//!
//! ```rust
//! use tether_core::prelude::*;
//!
//! let mount_scope = Scope::root();
//! let entry = mount_scope.spawn_child();
//! register_teardown(entry, || log::info!("entry unmounted"));
//!
//! mount_scope.cancel(); // cascades depth-first, teardowns run exactly once
//! ```
//!
//! ## Edit scripts
//!
//! [`diff::diff_keyed`] turns two orderings of keyed items into the minimal
//! insert/delete/move/update steps between them; [`diff::apply`] defines
//! what a script means. The list mount in `tether-bind` replays scripts
//! against live registries so unchanged entries keep their scope and their
//! rendered subtree.
//!
//! ## Failure policy
//!
//! Nothing here aborts on a misbehaving collaborator: render failures,
//! panicking teardowns, and malformed emissions are reported through
//! [`diag`] and contained to the entry that caused them.

pub mod context;
pub mod diag;
pub mod diff;
pub mod error;
pub mod prelude;
pub mod scope;
pub mod stream;

pub use context::*;
pub use diff::*;
pub use error::*;
pub use prelude::*;
pub use scope::*;
pub use stream::*;

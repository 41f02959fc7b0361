//! List mount point: the reconciler driver.
//!
//! [`mount_list_keyed`] binds a stream of ordered sequences to a container.
//! Each emission is diffed against the previously applied one
//! ([`diff_keyed`]) and the script is applied in a single pass against the
//! live registry: inserts render under fresh entry scopes, moves reposition
//! backing nodes without re-rendering, updates re-render under a child of
//! the *same* entry scope, and deletes run through the exit gate (when one
//! is registered) before nodes detach and the entry scope cancels.
//!
//! After a full pass the live registry order matches the emission, and so
//! does the backing-node order — with the exception of entries still playing
//! their exit transition, which stay physically attached (and out of the
//! logical order) until their [`ExitHandle`](crate::exit::ExitHandle)
//! reports completion.
//!
//! Failure policy: a failing insert render leaves a ghost at its logical
//! position for the rest of the pass (so later script indices stay aligned)
//! and is reported; a duplicate identity skips the whole emission; an
//! upstream failure stops the mount without detaching what is on screen.

use std::cell::RefCell;
use std::collections::{HashSet, VecDeque};
use std::hash::Hash;
use std::rc::Rc;

use tether_core::context::Context;
use tether_core::diag::{self, Diagnostic};
use tether_core::diff::{EditOp, diff_keyed};
use tether_core::error::RenderError;
use tether_core::scope::Scope;
use tether_core::stream::{Stream, SubId};

use crate::exit::{ExitGate, ExitHandle};
use crate::subtree::{BuildCx, Container};

type KeyFn<T, K> = Rc<dyn Fn(&T) -> K>;
type RenderFn<T, S> = Rc<dyn Fn(&T, &BuildCx) -> Result<S, RenderError>>;

/// One live registry entry.
struct Slot<T, K, C: Container> {
    id: u64,
    key: K,
    value: T,
    subtree: Rc<C::Subtree>,
    /// Entry scope; survives moves and updates, cancelled on removal.
    scope: Scope,
    /// Child of `scope` the render ran under; replaced on update.
    render_scope: Scope,
    /// Out of the logical order, still attached, waiting on its exit gate.
    exiting: bool,
}

/// Logical position during one pass: a live slot, or the hole left by an
/// insert whose render failed.
#[derive(Clone, Copy)]
enum LogEntry {
    Live(u64),
    Ghost,
}

struct ListInner<T: 'static, K, C: Container> {
    container: Rc<RefCell<C>>,
    context: Context,
    scope: Scope,
    key_fn: KeyFn<T, K>,
    render: RenderFn<T, C::Subtree>,
    exit_gate: Option<ExitGate<C::Subtree>>,
    /// Physical order, including exiting slots.
    slots: Vec<Slot<T, K, C>>,
    /// Baseline for the next diff: live values in logical order.
    prev: Vec<T>,
    next_id: u64,
    stream: Stream<Vec<T>>,
    sub: Option<SubId>,
    queue: VecDeque<Vec<T>>,
    applying: bool,
    stopped: bool,
    /// Exit completions that landed mid-pass; drained once the driver is idle.
    exits_done: Rc<RefCell<Vec<u64>>>,
}

/// Live binding between a stream of sequences and a reconciled child list.
pub struct ListMount<T: 'static, K: 'static, C: Container + 'static> {
    inner: Rc<RefCell<ListInner<T, K, C>>>,
}

/// Mounts `render` over a stream of sequences, recognizing items across
/// emissions by `key_fn`. Identities must be unique within one emission.
pub fn mount_list_keyed<T, K, C>(
    stream: &Stream<Vec<T>>,
    key_fn: impl Fn(&T) -> K + 'static,
    container: &Rc<RefCell<C>>,
    parent: Scope,
    context: Context,
    render: impl Fn(&T, &BuildCx) -> Result<C::Subtree, RenderError> + 'static,
) -> ListMount<T, K, C>
where
    T: Clone + PartialEq + 'static,
    K: Eq + Hash + Clone + 'static,
    C: Container + 'static,
{
    let scope = parent.spawn_child();
    let inner = Rc::new(RefCell::new(ListInner {
        container: container.clone(),
        context,
        scope,
        key_fn: Rc::new(key_fn),
        render: Rc::new(render),
        exit_gate: None,
        slots: Vec::new(),
        prev: Vec::new(),
        next_id: 1,
        stream: stream.clone(),
        sub: None,
        queue: VecDeque::new(),
        applying: false,
        stopped: false,
        exits_done: Rc::new(RefCell::new(Vec::new())),
    }));

    {
        let weak = Rc::downgrade(&inner);
        scope.on_cancel(move || {
            if let Some(inner) = weak.upgrade() {
                teardown(&inner);
            }
        });
    }

    let sub = {
        let on_value = {
            let weak = Rc::downgrade(&inner);
            move |value: &Vec<T>| {
                if let Some(inner) = weak.upgrade() {
                    enqueue(&inner, value.clone());
                }
            }
        };
        let on_error = {
            let weak = Rc::downgrade(&inner);
            move |err: &tether_core::error::StreamError| {
                if let Some(inner) = weak.upgrade() {
                    inner.borrow_mut().stopped = true;
                    diag::report(Diagnostic::UpstreamFailed {
                        detail: err.message.clone(),
                    });
                }
            }
        };
        stream.subscribe_full(on_value, on_error)
    };
    inner.borrow_mut().sub = Some(sub);

    ListMount { inner }
}

/// [`mount_list_keyed`] with the item's own value as its identity.
///
/// Known limitation, inherited from `tether_core::diff::diff_by_value`: a
/// content change at a slot is indistinguishable from delete+insert, so
/// edited items lose their scope on edit.
pub fn mount_list<T, C>(
    stream: &Stream<Vec<T>>,
    container: &Rc<RefCell<C>>,
    parent: Scope,
    context: Context,
    render: impl Fn(&T, &BuildCx) -> Result<C::Subtree, RenderError> + 'static,
) -> ListMount<T, T, C>
where
    T: Clone + Eq + Hash + 'static,
    C: Container + 'static,
{
    mount_list_keyed(stream, |v: &T| v.clone(), container, parent, context, render)
}

impl<T, K, C> ListMount<T, K, C>
where
    T: Clone + PartialEq + 'static,
    K: Eq + Hash + Clone + 'static,
    C: Container + 'static,
{
    /// The mount's own scope; entry scopes are its children.
    pub fn scope(&self) -> Scope {
        self.inner.borrow().scope
    }

    /// Registers the exit gate applied to every subsequently removed entry.
    pub fn set_exit_gate(&self, gate: impl Fn(&C::Subtree, ExitHandle) + 'static) {
        self.inner.borrow_mut().exit_gate = Some(Rc::new(gate));
    }

    /// Number of live entries (exiting entries excluded).
    pub fn len(&self) -> usize {
        self.inner
            .borrow()
            .slots
            .iter()
            .filter(|s| !s.exiting)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lifecycle scope of the live entry with `key`, if present.
    pub fn entry_scope(&self, key: &K) -> Option<Scope> {
        self.inner
            .borrow()
            .slots
            .iter()
            .find(|s| !s.exiting && s.key == *key)
            .map(|s| s.scope)
    }

    /// Cancels the mount's scope: entry scopes cascade, every backing node
    /// (pending exits included) detaches, the subscription drops.
    pub fn close(&self) {
        let scope = self.inner.borrow().scope;
        scope.cancel();
    }
}

/// Hook form of [`ListMount::set_exit_gate`] for out-of-tree animation code.
pub fn register_exit_gate<T, K, C>(
    mount: &ListMount<T, K, C>,
    gate: impl Fn(&C::Subtree, ExitHandle) + 'static,
) where
    T: Clone + PartialEq + 'static,
    K: Eq + Hash + Clone + 'static,
    C: Container + 'static,
{
    mount.set_exit_gate(gate);
}

fn enqueue<T, K, C>(inner_rc: &Rc<RefCell<ListInner<T, K, C>>>, new: Vec<T>)
where
    T: Clone + PartialEq + 'static,
    K: Eq + Hash + Clone + 'static,
    C: Container + 'static,
{
    {
        let mut inner = inner_rc.borrow_mut();
        if inner.stopped {
            return;
        }
        inner.queue.push_back(new);
        if inner.applying {
            // reconciliation in progress; passes never overlap
            return;
        }
        inner.applying = true;
    }
    pump(inner_rc);
}

fn pump<T, K, C>(inner_rc: &Rc<RefCell<ListInner<T, K, C>>>)
where
    T: Clone + PartialEq + 'static,
    K: Eq + Hash + Clone + 'static,
    C: Container + 'static,
{
    loop {
        let next = {
            let mut inner = inner_rc.borrow_mut();
            if inner.stopped {
                inner.applying = false;
                return;
            }
            match inner.queue.pop_front() {
                Some(n) => n,
                None => {
                    inner.applying = false;
                    break;
                }
            }
        };
        apply_emission(inner_rc, next);
    }
    flush_exits(inner_rc);
}

fn apply_emission<T, K, C>(inner_rc: &Rc<RefCell<ListInner<T, K, C>>>, new: Vec<T>)
where
    T: Clone + PartialEq + 'static,
    K: Eq + Hash + Clone + 'static,
    C: Container + 'static,
{
    let (key_fn, render, context, container, mount_scope, gate, prev) = {
        let inner = inner_rc.borrow();
        (
            inner.key_fn.clone(),
            inner.render.clone(),
            inner.context.clone(),
            inner.container.clone(),
            inner.scope,
            inner.exit_gate.clone(),
            inner.prev.clone(),
        )
    };

    // Identity uniqueness is a registry invariant; a violating emission is a
    // usage error and is skipped whole.
    {
        let mut seen: HashSet<K> = HashSet::with_capacity(new.len());
        for item in &new {
            if !seen.insert((key_fn)(item)) {
                diag::report(Diagnostic::DuplicateIdentity {
                    detail: format!(
                        "emission with {} items repeats an identity; emission skipped",
                        new.len()
                    ),
                });
                return;
            }
        }
    }

    let script = diff_keyed(&prev, &new, |v| (key_fn)(v));

    // Logical order for this pass: live slots only. Exiting slots keep their
    // physical position but no longer take part in reconciliation.
    let mut logical: Vec<LogEntry> = inner_rc
        .borrow()
        .slots
        .iter()
        .filter(|s| !s.exiting)
        .map(|s| LogEntry::Live(s.id))
        .collect();

    let mut pending_gates: Vec<(u64, Rc<C::Subtree>, ExitGate<C::Subtree>)> = Vec::new();

    for op in script {
        match op {
            EditOp::Delete { index } => {
                let id = match logical.get(index) {
                    Some(LogEntry::Live(id)) => *id,
                    _ => continue,
                };
                logical.remove(index);
                if let Some(gate) = gate.clone() {
                    let subtree = {
                        let mut inner = inner_rc.borrow_mut();
                        match phys_index_of(&inner.slots, id) {
                            Some(p) => {
                                let slot = &mut inner.slots[p];
                                slot.exiting = true;
                                Some(slot.subtree.clone())
                            }
                            None => None,
                        }
                    };
                    if let Some(subtree) = subtree {
                        pending_gates.push((id, subtree, gate));
                    }
                } else {
                    remove_now(inner_rc, id);
                }
            }
            EditOp::Insert { index, value } => {
                let entry_scope = mount_scope.spawn_child();
                let render_scope = entry_scope.spawn_child();
                let cx = BuildCx::new(render_scope, context.clone());
                match (render)(&value, &cx) {
                    Ok(subtree) => {
                        let subtree = Rc::new(subtree);
                        let (id, phys) = {
                            let mut inner = inner_rc.borrow_mut();
                            let phys = phys_target(&inner.slots, &logical, index);
                            let id = inner.next_id;
                            inner.next_id += 1;
                            let key = (key_fn)(&value);
                            inner.slots.insert(
                                phys,
                                Slot {
                                    id,
                                    key,
                                    value,
                                    subtree: subtree.clone(),
                                    scope: entry_scope,
                                    render_scope,
                                    exiting: false,
                                },
                            );
                            (id, phys)
                        };
                        container.borrow_mut().attach(phys, &subtree);
                        logical.insert(index, LogEntry::Live(id));
                    }
                    Err(err) => {
                        entry_scope.cancel();
                        diag::report(Diagnostic::RenderFailed {
                            detail: err.message,
                        });
                        logical.insert(index, LogEntry::Ghost);
                    }
                }
            }
            EditOp::Move { from, to, value } => {
                let id = match logical.get(from) {
                    Some(LogEntry::Live(id)) => *id,
                    _ => continue,
                };
                logical.remove(from);
                let repositioned = {
                    let mut inner = inner_rc.borrow_mut();
                    match phys_index_of(&inner.slots, id) {
                        Some(pf) => {
                            let mut slot = inner.slots.remove(pf);
                            // content refresh travels with the move; no re-render
                            slot.value = value;
                            let pt = phys_target(&inner.slots, &logical, to);
                            inner.slots.insert(pt, slot);
                            Some((pf, pt))
                        }
                        None => None,
                    }
                };
                if let Some((pf, pt)) = repositioned {
                    container.borrow_mut().reposition(pf, pt);
                }
                logical.insert(to, LogEntry::Live(id));
            }
            EditOp::Update { index, value } => {
                let id = match logical.get(index) {
                    Some(LogEntry::Live(id)) => *id,
                    _ => continue,
                };
                let entry_scope = {
                    let inner = inner_rc.borrow();
                    match phys_index_of(&inner.slots, id) {
                        Some(p) => inner.slots[p].scope,
                        None => continue,
                    }
                };
                // Re-render under a fresh child of the same entry scope; the
                // old render child is replaced only once the new one built.
                let render_scope = entry_scope.spawn_child();
                let cx = BuildCx::new(render_scope, context.clone());
                match (render)(&value, &cx) {
                    Ok(subtree) => {
                        let subtree = Rc::new(subtree);
                        let swapped = {
                            let mut inner = inner_rc.borrow_mut();
                            match phys_index_of(&inner.slots, id) {
                                Some(p) => {
                                    let slot = &mut inner.slots[p];
                                    let old_render = slot.render_scope;
                                    slot.render_scope = render_scope;
                                    slot.subtree = subtree.clone();
                                    slot.value = value;
                                    Some((p, old_render))
                                }
                                None => None,
                            }
                        };
                        if let Some((p, old_render)) = swapped {
                            old_render.cancel();
                            let mut c = container.borrow_mut();
                            c.detach(p);
                            c.attach(p, &subtree);
                        }
                    }
                    Err(err) => {
                        render_scope.cancel();
                        diag::report(Diagnostic::RenderFailed {
                            detail: err.message,
                        });
                        // previous rendering and value stay in place
                    }
                }
            }
        }
    }

    // New diff baseline: live values in logical order, ghosts dropped — a
    // failed insert simply reappears as an Insert next emission.
    {
        let mut inner = inner_rc.borrow_mut();
        let mut prev = Vec::with_capacity(logical.len());
        for entry in &logical {
            if let LogEntry::Live(id) = entry
                && let Some(p) = phys_index_of(&inner.slots, *id)
            {
                prev.push(inner.slots[p].value.clone());
            }
        }
        inner.prev = prev;
    }

    // Gates run with no registry borrow held; a gate completing
    // synchronously defers through `exits_done` and flushes after the pass.
    for (id, subtree, gate) in pending_gates {
        let handle = make_exit_handle(inner_rc, id);
        gate(&subtree, handle);
    }
}

fn make_exit_handle<T, K, C>(inner_rc: &Rc<RefCell<ListInner<T, K, C>>>, id: u64) -> ExitHandle
where
    T: Clone + PartialEq + 'static,
    K: Eq + Hash + Clone + 'static,
    C: Container + 'static,
{
    let weak = Rc::downgrade(inner_rc);
    let exits = inner_rc.borrow().exits_done.clone();
    ExitHandle::new(move || {
        exits.borrow_mut().push(id);
        if let Some(inner_rc) = weak.upgrade() {
            maybe_flush(&inner_rc);
        }
    })
}

fn maybe_flush<T, K, C>(inner_rc: &Rc<RefCell<ListInner<T, K, C>>>)
where
    T: Clone + PartialEq + 'static,
    K: Eq + Hash + Clone + 'static,
    C: Container + 'static,
{
    let idle = match inner_rc.try_borrow() {
        Ok(inner) => !inner.applying && !inner.stopped,
        // mid-pass; the driver flushes once the pass settles
        Err(_) => false,
    };
    if idle {
        flush_exits(inner_rc);
    }
}

fn flush_exits<T, K, C>(inner_rc: &Rc<RefCell<ListInner<T, K, C>>>)
where
    T: Clone + PartialEq + 'static,
    K: Eq + Hash + Clone + 'static,
    C: Container + 'static,
{
    loop {
        let ids: Vec<u64> = {
            let inner = inner_rc.borrow();
            let mut done = inner.exits_done.borrow_mut();
            std::mem::take(&mut *done)
        };
        if ids.is_empty() {
            return;
        }
        for id in ids {
            let removed = {
                let mut inner = inner_rc.borrow_mut();
                match inner.slots.iter().position(|s| s.id == id && s.exiting) {
                    Some(p) => {
                        let slot = inner.slots.remove(p);
                        Some((p, slot.scope, inner.container.clone()))
                    }
                    None => None,
                }
            };
            if let Some((p, scope, container)) = removed {
                container.borrow_mut().detach(p);
                scope.cancel();
            }
        }
    }
}

fn remove_now<T, K, C>(inner_rc: &Rc<RefCell<ListInner<T, K, C>>>, id: u64)
where
    T: Clone + PartialEq + 'static,
    K: Eq + Hash + Clone + 'static,
    C: Container + 'static,
{
    let removed = {
        let mut inner = inner_rc.borrow_mut();
        match phys_index_of(&inner.slots, id) {
            Some(p) => {
                let slot = inner.slots.remove(p);
                Some((p, slot.scope, inner.container.clone()))
            }
            None => None,
        }
    };
    if let Some((p, scope, container)) = removed {
        container.borrow_mut().detach(p);
        scope.cancel();
    }
}

fn teardown<T, K, C>(inner_rc: &Rc<RefCell<ListInner<T, K, C>>>)
where
    T: Clone + PartialEq + 'static,
    K: Eq + Hash + Clone + 'static,
    C: Container + 'static,
{
    let (sub, stream, container, slots) = {
        let mut inner = inner_rc.borrow_mut();
        inner.stopped = true;
        inner.queue.clear();
        inner.prev.clear();
        (
            inner.sub.take(),
            inner.stream.clone(),
            inner.container.clone(),
            std::mem::take(&mut inner.slots),
        )
    };
    if let Some(sub) = sub {
        stream.unsubscribe(sub);
    }
    {
        let mut c = container.borrow_mut();
        for i in (0..slots.len()).rev() {
            c.detach(i);
        }
    }
    for slot in slots {
        // no-ops for entries the cascade already reached
        slot.scope.cancel();
    }
}

fn phys_index_of<T, K, C: Container>(slots: &[Slot<T, K, C>], id: u64) -> Option<usize> {
    slots.iter().position(|s| s.id == id)
}

/// Physical position for the logical position `at`: directly before the
/// first live entry at or past `at`, or after everything (trailing exiting
/// slots included) when none exists.
fn phys_target<T, K, C: Container>(
    slots: &[Slot<T, K, C>],
    logical: &[LogEntry],
    at: usize,
) -> usize {
    for entry in logical.iter().skip(at) {
        if let LogEntry::Live(id) = entry
            && let Some(p) = phys_index_of(slots, *id)
        {
            return p;
        }
    }
    slots.len()
}

//! Single-value mount point.
//!
//! [`mount_value`] binds a [`Stream`] to a container: each emission tears
//! down the previous rendering (scope first, then nodes) and renders the new
//! value under a fresh child scope. Emissions apply strictly in arrival
//! order; one that lands while a render is still attaching is queued, never
//! interleaved.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use tether_core::context::Context;
use tether_core::diag::{self, Diagnostic};
use tether_core::error::RenderError;
use tether_core::scope::Scope;
use tether_core::stream::{Stream, SubId};

use crate::subtree::{BuildCx, Container};

type RenderFn<T, S> = Rc<dyn Fn(&T, &BuildCx) -> Result<S, RenderError>>;

struct ValueInner<T: 'static, C: Container> {
    container: Rc<RefCell<C>>,
    context: Context,
    scope: Scope,
    render: RenderFn<T, C::Subtree>,
    current: Option<(Scope, Rc<C::Subtree>)>,
    stream: Stream<T>,
    sub: Option<SubId>,
    queue: VecDeque<T>,
    applying: bool,
    stopped: bool,
}

/// Live binding between a value stream and a rendered subtree.
pub struct ValueMount<T: 'static, C: Container + 'static> {
    inner: Rc<RefCell<ValueInner<T, C>>>,
}

/// Mounts `render` over `stream` into `container`, under a child of
/// `parent`. If the stream already carries a value it renders before this
/// call returns.
pub fn mount_value<T, C>(
    stream: &Stream<T>,
    container: &Rc<RefCell<C>>,
    parent: Scope,
    context: Context,
    render: impl Fn(&T, &BuildCx) -> Result<C::Subtree, RenderError> + 'static,
) -> ValueMount<T, C>
where
    T: Clone + 'static,
    C: Container + 'static,
{
    let scope = parent.spawn_child();
    let inner = Rc::new(RefCell::new(ValueInner {
        container: container.clone(),
        context,
        scope,
        render: Rc::new(render),
        current: None,
        stream: stream.clone(),
        sub: None,
        queue: VecDeque::new(),
        applying: false,
        stopped: false,
    }));

    // Cancelling the mount's scope (directly or via an ancestor) tears the
    // binding down: current subtree detached, subscription dropped.
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
            move |value: &T| {
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

    ValueMount { inner }
}

impl<T: Clone + 'static, C: Container + 'static> ValueMount<T, C> {
    /// The mount's own scope; per-value scopes are its children.
    pub fn scope(&self) -> Scope {
        self.inner.borrow().scope
    }

    /// Cancels the mount's scope, cascading to the current value's scope,
    /// then detaches the current subtree and unsubscribes.
    pub fn close(&self) {
        let scope = self.inner.borrow().scope;
        scope.cancel();
    }
}

fn enqueue<T, C>(inner_rc: &Rc<RefCell<ValueInner<T, C>>>, value: T)
where
    T: Clone + 'static,
    C: Container + 'static,
{
    {
        let mut inner = inner_rc.borrow_mut();
        if inner.stopped {
            return;
        }
        inner.queue.push_back(value);
        if inner.applying {
            // an emission is mid-application; strictly ordered, never nested
            return;
        }
        inner.applying = true;
    }
    pump(inner_rc);
}

fn pump<T, C>(inner_rc: &Rc<RefCell<ValueInner<T, C>>>)
where
    T: Clone + 'static,
    C: Container + 'static,
{
    loop {
        let (value, prev, mount_scope, render, context, container) = {
            let mut inner = inner_rc.borrow_mut();
            if inner.stopped {
                inner.applying = false;
                return;
            }
            let Some(value) = inner.queue.pop_front() else {
                inner.applying = false;
                return;
            };
            (
                value,
                inner.current.take(),
                inner.scope,
                inner.render.clone(),
                inner.context.clone(),
                inner.container.clone(),
            )
        };

        // Cancel the superseded rendering's scope, then detach its nodes.
        if let Some((prev_scope, _subtree)) = prev {
            prev_scope.cancel();
            container.borrow_mut().detach(0);
        }

        let value_scope = mount_scope.spawn_child();
        let cx = BuildCx::new(value_scope, context);
        match (render)(&value, &cx) {
            Ok(subtree) => {
                let subtree = Rc::new(subtree);
                let still_open = !inner_rc.borrow().stopped;
                if still_open {
                    container.borrow_mut().attach(0, &subtree);
                    inner_rc.borrow_mut().current = Some((value_scope, subtree));
                } else {
                    value_scope.cancel();
                }
            }
            Err(err) => {
                value_scope.cancel();
                diag::report(Diagnostic::RenderFailed {
                    detail: err.message,
                });
            }
        }
    }
}

fn teardown<T, C>(inner_rc: &Rc<RefCell<ValueInner<T, C>>>)
where
    T: Clone + 'static,
    C: Container + 'static,
{
    let (current, sub, stream, container) = {
        let mut inner = inner_rc.borrow_mut();
        inner.stopped = true;
        inner.queue.clear();
        (
            inner.current.take(),
            inner.sub.take(),
            inner.stream.clone(),
            inner.container.clone(),
        )
    };
    if let Some(sub) = sub {
        stream.unsubscribe(sub);
    }
    if let Some((value_scope, _subtree)) = current {
        container.borrow_mut().detach(0);
        // already cancelled when the cascade reached it; harmless otherwise
        value_scope.cancel();
    }
}

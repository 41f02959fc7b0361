//! # Value streams
//!
//! A [`Stream`] is a cloneable handle to an asynchronously changing value:
//! whoever holds a clone may [`emit`](Stream::emit) new values, and any
//! number of subscribers observe every emission in order. Mount points
//! subscribe to streams; application code emits into them.
//!
//! ```rust
//! use tether_core::stream::stream;
//!
//! let count = stream(0);
//! count.emit(1);
//! count.update(|v| *v += 1);
//! assert_eq!(count.latest(), Some(2));
//! ```
//!
//! Subscription replays the latest value (when one exists) synchronously, so
//! a mount bound to a stream that already carries a value renders at once.
//!
//! A stream can terminate with [`fail`](Stream::fail): error subscribers are
//! notified once, all subscriptions are dropped, and later emissions are
//! discarded with a warning. Failure of one stream never affects mounts
//! bound to other streams.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::StreamError;

pub type SubId = usize;

struct Subscriber<T> {
    id: SubId,
    on_value: Rc<dyn Fn(&T)>,
    on_error: Option<Rc<dyn Fn(&StreamError)>>,
}

struct Inner<T> {
    latest: Option<T>,
    failed: Option<StreamError>,
    subs: Vec<Subscriber<T>>,
    next_sub: SubId,
}

pub struct Stream<T: 'static> {
    inner: Rc<RefCell<Inner<T>>>,
}

impl<T> Clone for Stream<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Default for Stream<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> Stream<T> {
    /// An empty stream; subscribers see nothing until the first emission.
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                latest: None,
                failed: None,
                subs: Vec::new(),
                next_sub: 0,
            })),
        }
    }

    /// A stream that already carries `value`.
    pub fn with_value(value: T) -> Self {
        let s = Self::new();
        s.inner.borrow_mut().latest = Some(value);
        s
    }

    /// Pushes `value` to every subscriber in subscription order. Dropped
    /// with a warning if the stream has failed.
    pub fn emit(&self, value: T)
    where
        T: Clone,
    {
        let subs: Vec<Rc<dyn Fn(&T)>> = {
            let mut inner = self.inner.borrow_mut();
            if inner.failed.is_some() {
                log::warn!("emit on a failed stream; value dropped");
                return;
            }
            inner.latest = Some(value.clone());
            inner.subs.iter().map(|s| s.on_value.clone()).collect()
        };
        // Borrow released: a subscriber may emit again (deliveries nest) or
        // subscribe/unsubscribe without deadlocking.
        for on_value in subs {
            on_value(&value);
        }
    }

    /// Mutates the current value in place and re-emits it. Ignored with a
    /// warning when no value has been emitted yet.
    pub fn update(&self, f: impl FnOnce(&mut T))
    where
        T: Clone,
    {
        let current = self.inner.borrow().latest.clone();
        let Some(mut v) = current else {
            log::warn!("update on a stream with no value yet; ignored");
            return;
        };
        f(&mut v);
        self.emit(v);
    }

    /// The most recently emitted value, if any.
    pub fn latest(&self) -> Option<T>
    where
        T: Clone,
    {
        self.inner.borrow().latest.clone()
    }

    pub fn has_failed(&self) -> bool {
        self.inner.borrow().failed.is_some()
    }

    /// Subscribes to future emissions; the latest value, when present, is
    /// replayed to `on_value` before this call returns.
    pub fn subscribe(&self, on_value: impl Fn(&T) + 'static) -> SubId
    where
        T: Clone,
    {
        self.add_subscriber(Rc::new(on_value), None)
    }

    /// Like [`subscribe`](Stream::subscribe), with an error callback that
    /// fires once if the stream fails.
    pub fn subscribe_full(
        &self,
        on_value: impl Fn(&T) + 'static,
        on_error: impl Fn(&StreamError) + 'static,
    ) -> SubId
    where
        T: Clone,
    {
        self.add_subscriber(Rc::new(on_value), Some(Rc::new(on_error)))
    }

    fn add_subscriber(
        &self,
        on_value: Rc<dyn Fn(&T)>,
        on_error: Option<Rc<dyn Fn(&StreamError)>>,
    ) -> SubId
    where
        T: Clone,
    {
        let (id, replay, failure) = {
            let mut inner = self.inner.borrow_mut();
            let id = inner.next_sub;
            inner.next_sub += 1;
            let failure = inner.failed.clone();
            let replay = if failure.is_none() {
                inner.latest.clone()
            } else {
                None
            };
            if failure.is_none() {
                inner.subs.push(Subscriber {
                    id,
                    on_value: on_value.clone(),
                    on_error: on_error.clone(),
                });
            }
            (id, replay, failure)
        };
        if let Some(v) = replay {
            on_value(&v);
        }
        if let Some(err) = failure
            && let Some(cb) = on_error
        {
            cb(&err);
        }
        id
    }

    pub fn unsubscribe(&self, id: SubId) {
        self.inner.borrow_mut().subs.retain(|s| s.id != id);
    }

    /// Terminates the stream. Error subscribers are notified once; every
    /// subscription is dropped; later emissions are discarded.
    pub fn fail(&self, error: StreamError) {
        let subs = {
            let mut inner = self.inner.borrow_mut();
            if inner.failed.is_some() {
                return;
            }
            inner.failed = Some(error.clone());
            std::mem::take(&mut inner.subs)
        };
        for s in subs {
            if let Some(cb) = s.on_error {
                cb(&error);
            }
        }
    }
}

/// Shorthand constructor mirroring the shape of the mount APIs.
pub fn stream<T: 'static>(value: T) -> Stream<T> {
    Stream::with_value(value)
}

use crate::{runtime::with_runtime, watcher::WatcherInner};
use std::{
    cell::RefCell,
    rc::{Rc, Weak},
};

/// A publish point: one piece of observed state, tracking the computations
/// that have read it.
///
/// A dependency holds its subscribers strongly; a watcher holds only weak
/// handles back to its dependencies. Teardown removes the strong edges, so a
/// watcher (and everything its getter captures) is released as soon as it is
/// torn down or its dependencies are dropped.
#[derive(Clone)]
pub(crate) struct Dep {
    inner: Rc<DepInner>,
}

struct DepInner {
    /// Monotonically increasing, never reused. Watchers key their
    /// seen-dependency sets on it.
    id: u64,
    /// Subscribe order.
    subs: RefCell<Vec<Rc<WatcherInner>>>,
}

impl Dep {
    pub fn new() -> Self {
        let id = with_runtime(|runtime| runtime.next_dep_id());
        Dep {
            inner: Rc::new(DepInner {
                id,
                subs: RefCell::new(Vec::new()),
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// The caller guarantees no duplicates, via the watcher's own
    /// seen-id bookkeeping.
    pub fn add_sub(&self, sub: Rc<WatcherInner>) {
        self.inner.subs.borrow_mut().push(sub);
    }

    pub fn remove_sub(&self, sub: &Rc<WatcherInner>) {
        let mut subs = self.inner.subs.borrow_mut();
        if let Some(pos) = subs.iter().position(|s| Rc::ptr_eq(s, sub)) {
            subs.remove(pos);
        }
    }

    /// Subscribes the active computation, if any, to this dependency.
    pub fn depend(&self) {
        if let Some(target) = with_runtime(|runtime| runtime.current_target()) {
            WatcherInner::add_dep(&target, self);
        }
    }

    /// Notifies every subscriber, in subscribe order. Iterates a snapshot:
    /// a subscriber's update may subscribe or unsubscribe against this same
    /// dependency mid-notification, and iteration must not observe that.
    pub fn notify(&self) {
        let subs = self.inner.subs.borrow().clone();
        for sub in subs {
            WatcherInner::update(&sub);
        }
    }

    pub fn downgrade(&self) -> WeakDep {
        WeakDep {
            id: self.inner.id,
            inner: Rc::downgrade(&self.inner),
        }
    }
}

/// A watcher-held back-reference to a dependency. Keeps the id available for
/// reconciliation even after the dependency's owner has been dropped.
#[derive(Clone)]
pub(crate) struct WeakDep {
    pub id: u64,
    inner: Weak<DepInner>,
}

impl WeakDep {
    pub fn upgrade(&self) -> Option<Dep> {
        self.inner.upgrade().map(|inner| Dep { inner })
    }
}

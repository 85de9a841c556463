use crate::{
    observer::{observe_root, release_root},
    runtime::{with_runtime, ObserverId, ScopeId},
    value::Value,
    watcher::Watcher,
};
use std::cell::{Cell, RefCell};

#[derive(Default)]
pub(crate) struct ScopeState {
    pub watchers: RefCell<Vec<Watcher>>,
    /// Set while the scope is tearing down, so individual watcher teardowns
    /// skip the per-watcher list removal.
    pub being_destroyed: Cell<bool>,
    /// State bound with [`Scope::bind_state`]; dot-path watchers resolve
    /// against it.
    pub root_state: RefCell<Option<Value>>,
    pub root_observer: Cell<Option<ObserverId>>,
}

/// Owner of a group of watchers, one per component instance in the layers
/// above this crate. Watchers register with the scope that created them and
/// are torn down together when it is disposed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Scope {
    pub(crate) id: ScopeId,
}

/// Creates a scope, hands it to `f`, and returns the disposer that tears it
/// down.
pub fn create_scope(f: impl FnOnce(Scope)) -> ScopeDisposer {
    let id = with_runtime(|runtime| runtime.scopes.borrow_mut().insert(ScopeState::default()));
    f(Scope { id });
    ScopeDisposer(id)
}

impl Scope {
    /// Binds `state` as this scope's root state: observes it as root data
    /// (protecting it from structural mutation through
    /// [`set`](crate::set)/[`del`](crate::del)) and makes it the resolution
    /// target for [`watch_path`](crate::watch_path). Released on dispose.
    pub fn bind_state(&self, state: &Value) {
        let ob = observe_root(state);
        with_runtime(|runtime| {
            let scopes = runtime.scopes.borrow();
            match scopes.get(self.id) {
                Some(scope) => {
                    if let Some(prev) = scope.root_observer.take() {
                        release_root(prev);
                    }
                    *scope.root_state.borrow_mut() = Some(state.clone());
                    scope.root_observer.set(ob.map(|ob| ob.id));
                }
                None => {
                    if let Some(ob) = ob {
                        release_root(ob.id);
                    }
                    tracing::warn!("cannot bind root state to a disposed scope");
                }
            }
        });
    }

    /// The state bound with [`Scope::bind_state`], if any.
    pub fn root_state(&self) -> Option<Value> {
        with_runtime(|runtime| {
            runtime
                .scopes
                .borrow()
                .get(self.id)
                .and_then(|scope| scope.root_state.borrow().clone())
        })
    }
}

/// Handle that tears down a [`Scope`]: every watcher it owns is torn down,
/// and its root-state protection is released.
#[must_use = "a Scope will leak its watchers until its disposer is called"]
pub struct ScopeDisposer(pub(crate) ScopeId);

impl ScopeDisposer {
    pub fn dispose(self) {
        let watchers = with_runtime(|runtime| {
            let scopes = runtime.scopes.borrow();
            match scopes.get(self.0) {
                Some(scope) => {
                    scope.being_destroyed.set(true);
                    scope.watchers.borrow().clone()
                }
                None => Vec::new(),
            }
        });
        for watcher in &watchers {
            watcher.teardown();
        }
        if let Some(state) = with_runtime(|runtime| runtime.scopes.borrow_mut().remove(self.0)) {
            if let Some(ob) = state.root_observer.get() {
                release_root(ob);
            }
        }
    }
}

use crate::{
    dep::{Dep, WeakDep},
    error::{CallbackError, WatcherError},
    observer::observer_dep_id,
    runtime::{with_runtime, ScopeId},
    scheduler,
    scope::Scope,
    value::Value,
};
use rustc_hash::FxHashSet;
use std::{
    cell::{Cell, RefCell},
    fmt,
    rc::Rc,
};

/// Mode flags for a [`Watcher`].
///
/// - `deep`: touch every nested value on evaluation, so mutations anywhere
///   under the produced value re-run the watcher.
/// - `user`: contain callback errors at this watcher's boundary instead of
///   letting them escape the flush.
/// - `lazy`: do not evaluate until demanded; upstream changes only mark the
///   watcher dirty.
/// - `sync`: re-run immediately on notification instead of scheduling.
#[derive(Clone, Copy, Default)]
pub struct WatcherOptions {
    pub deep: bool,
    pub user: bool,
    pub lazy: bool,
    pub sync: bool,
}

pub(crate) enum Getter {
    Closure(Box<dyn Fn() -> Value>),
    /// Dot-path resolved against a root value by tracked reads.
    Path { root: Value, segments: Vec<String> },
    /// Fallback for unparsable paths: always `Null`, never subscribes.
    Noop,
}

pub(crate) enum WatcherCallback {
    None,
    Plain(Box<dyn Fn(&Value, &Value)>),
    /// Fallible form used by the user-level watch API; errors are contained
    /// per-watcher and routed to the configured handler.
    Contained(Box<dyn Fn(&Value, &Value) -> Result<(), CallbackError>>),
}

pub(crate) struct WatcherInner {
    /// Flush ordering key: ascending creation order, which makes parents
    /// run before children and user watchers before render watchers.
    pub id: u64,
    pub scope: ScopeId,
    pub getter: Getter,
    pub cb: WatcherCallback,
    pub value: RefCell<Value>,
    /// Dependencies confirmed by the previous evaluation.
    pub deps: RefCell<Vec<WeakDep>>,
    /// Dependencies accumulating during the current evaluation.
    pub new_deps: RefCell<Vec<WeakDep>>,
    pub dep_ids: RefCell<FxHashSet<u64>>,
    pub new_dep_ids: RefCell<FxHashSet<u64>>,
    pub deep: bool,
    pub user: bool,
    pub lazy: bool,
    pub sync: bool,
    pub dirty: Cell<bool>,
    pub active: Cell<bool>,
    /// The watched path, when the getter came from one. Used in
    /// diagnostics.
    pub expression: Option<String>,
    #[cfg(debug_assertions)]
    pub defined_at: &'static std::panic::Location<'static>,
}

/// A reactive computation: a getter, its last produced value, and the exact
/// set of dependencies the most recent evaluation read.
///
/// State machine: constructed → (evaluating ⇄ idle) → torn down. A watcher
/// re-collects its dependencies on every evaluation, so conditional reads
/// subscribe to exactly what the current control flow touches.
#[derive(Clone)]
pub struct Watcher {
    pub(crate) inner: Rc<WatcherInner>,
}

impl Watcher {
    /// Creates a watcher over `getter` with no callback, the render-layer
    /// form, where the side effect happens inside the getter itself.
    ///
    /// Evaluates once immediately unless `lazy` is set.
    #[track_caller]
    pub fn new(cx: Scope, getter: impl Fn() -> Value + 'static, options: WatcherOptions) -> Watcher {
        Self::create(
            cx,
            Getter::Closure(Box::new(getter)),
            WatcherCallback::None,
            options,
            None,
        )
    }

    /// Creates a watcher that invokes `callback` with `(new, old)` whenever
    /// the produced value changes.
    #[track_caller]
    pub fn with_callback(
        cx: Scope,
        getter: impl Fn() -> Value + 'static,
        callback: impl Fn(&Value, &Value) + 'static,
        options: WatcherOptions,
    ) -> Watcher {
        Self::create(
            cx,
            Getter::Closure(Box::new(getter)),
            WatcherCallback::Plain(Box::new(callback)),
            options,
            None,
        )
    }

    #[track_caller]
    pub(crate) fn create(
        cx: Scope,
        getter: Getter,
        cb: WatcherCallback,
        options: WatcherOptions,
        expression: Option<String>,
    ) -> Watcher {
        let id = with_runtime(|runtime| runtime.next_watcher_id());
        let inner = Rc::new(WatcherInner {
            id,
            scope: cx.id,
            getter,
            cb,
            value: RefCell::new(Value::Null),
            deps: RefCell::new(Vec::new()),
            new_deps: RefCell::new(Vec::new()),
            dep_ids: RefCell::new(FxHashSet::default()),
            new_dep_ids: RefCell::new(FxHashSet::default()),
            deep: options.deep,
            user: options.user,
            lazy: options.lazy,
            sync: options.sync,
            dirty: Cell::new(options.lazy),
            active: Cell::new(true),
            expression,
            #[cfg(debug_assertions)]
            defined_at: std::panic::Location::caller(),
        });
        crate::macros::debug_warn!("created watcher {id}");
        let watcher = Watcher { inner };
        with_runtime(|runtime| {
            let scopes = runtime.scopes.borrow();
            match scopes.get(cx.id) {
                Some(scope) => scope.watchers.borrow_mut().push(watcher.clone()),
                None => tracing::warn!("created a watcher in a scope that has been disposed"),
            }
        });
        if !watcher.inner.lazy {
            let value = WatcherInner::get(&watcher.inner);
            *watcher.inner.value.borrow_mut() = value;
        }
        watcher
    }

    /// The value produced by the most recent evaluation (`Null` for a lazy
    /// watcher that has never been demanded).
    pub fn value(&self) -> Value {
        self.inner.value.borrow().clone()
    }

    /// Whether an upstream change has invalidated a lazy watcher's value.
    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.get()
    }

    /// Forces evaluation and clears the dirty flag. Only meaningful for
    /// `lazy` watchers; the demand path of derived values.
    pub fn evaluate(&self) {
        let value = WatcherInner::get(&self.inner);
        *self.inner.value.borrow_mut() = value;
        self.inner.dirty.set(false);
    }

    /// Forwards a subscribe to every dependency this watcher currently
    /// holds, so a computation reading a lazy watcher's value becomes
    /// reactive to everything the last evaluation touched, without
    /// re-running the getter.
    pub fn depend(&self) {
        let deps = self.inner.deps.borrow().clone();
        for dep in deps {
            if let Some(dep) = dep.upgrade() {
                dep.depend();
            }
        }
    }

    /// Number of distinct dependencies held after the last evaluation.
    pub fn dep_count(&self) -> usize {
        self.inner.deps.borrow().len()
    }

    /// Unsubscribes from every dependency and marks the watcher inactive:
    /// it will never evaluate or receive a notification again. Idempotent.
    pub fn teardown(&self) {
        let this = &self.inner;
        if !this.active.get() {
            return;
        }
        this.active.set(false);
        // removing from the owning scope's list is O(n); skip it when the
        // whole scope is being torn down anyway
        with_runtime(|runtime| {
            let scopes = runtime.scopes.borrow();
            if let Some(scope) = scopes.get(this.scope) {
                if !scope.being_destroyed.get() {
                    let mut watchers = scope.watchers.borrow_mut();
                    if let Some(pos) = watchers.iter().position(|w| Rc::ptr_eq(&w.inner, this)) {
                        watchers.remove(pos);
                    }
                }
            }
        });
        let deps = std::mem::take(&mut *this.deps.borrow_mut());
        for dep in deps {
            if let Some(dep) = dep.upgrade() {
                dep.remove_sub(this);
            }
        }
        this.dep_ids.borrow_mut().clear();
    }

    pub(crate) fn call_callback(&self, value: &Value, old: &Value) {
        WatcherInner::invoke_callback(&self.inner, value, old);
    }
}

impl WatcherInner {
    /// Evaluates the getter, re-collecting dependencies: pushes this
    /// watcher as the active computation, runs the getter (touching every
    /// nested value in `deep` mode), pops, and reconciles the dependency
    /// sets.
    pub(crate) fn get(this: &Rc<WatcherInner>) -> Value {
        with_runtime(|runtime| runtime.push_target(Some(Rc::clone(this))));
        let value = this.run_getter();
        if this.deep {
            traverse(&value);
        }
        with_runtime(|runtime| runtime.pop_target());
        Self::cleanup_deps(this);
        value
    }

    fn run_getter(&self) -> Value {
        match &self.getter {
            Getter::Closure(f) => f(),
            Getter::Path { root, segments } => {
                let mut current = root.clone();
                for segment in segments {
                    current = match current {
                        Value::Record(record) => record.get(segment),
                        _ => return Value::Null,
                    };
                }
                current
            }
            Getter::Noop => Value::Null,
        }
    }

    /// Called by a dependency being read during evaluation. Idempotent per
    /// evaluation, and skips re-subscribing to a dependency confirmed by
    /// the previous run.
    pub(crate) fn add_dep(this: &Rc<WatcherInner>, dep: &Dep) {
        let id = dep.id();
        let mut new_ids = this.new_dep_ids.borrow_mut();
        if !new_ids.contains(&id) {
            new_ids.insert(id);
            this.new_deps.borrow_mut().push(dep.downgrade());
            if !this.dep_ids.borrow().contains(&id) {
                dep.add_sub(Rc::clone(this));
            }
        }
    }

    /// Unsubscribes from dependencies the evaluation no longer read, then
    /// swaps the confirmed and accumulating buffers (reusing them rather
    /// than reallocating) and clears the accumulator for the next run.
    fn cleanup_deps(this: &Rc<WatcherInner>) {
        {
            let deps = this.deps.borrow();
            let new_ids = this.new_dep_ids.borrow();
            for dep in deps.iter() {
                if !new_ids.contains(&dep.id) {
                    if let Some(dep) = dep.upgrade() {
                        dep.remove_sub(this);
                    }
                }
            }
        }
        std::mem::swap(
            &mut *this.dep_ids.borrow_mut(),
            &mut *this.new_dep_ids.borrow_mut(),
        );
        this.new_dep_ids.borrow_mut().clear();
        std::mem::swap(&mut *this.deps.borrow_mut(), &mut *this.new_deps.borrow_mut());
        this.new_deps.borrow_mut().clear();
    }

    /// Notification entry point, called by a dependency.
    pub(crate) fn update(this: &Rc<WatcherInner>) {
        if this.lazy {
            this.dirty.set(true);
        } else if this.sync {
            Self::run(this);
        } else {
            scheduler::queue_watcher(&Watcher {
                inner: Rc::clone(this),
            });
        }
    }

    /// Re-evaluates and fires the callback if the value changed, or might
    /// have: compound values mutate without changing identity, and deep
    /// watchers fire on nested changes invisible at the root, so both are
    /// always treated as changed.
    pub(crate) fn run(this: &Rc<WatcherInner>) {
        if !this.active.get() {
            return;
        }
        let value = Self::get(this);
        let old = this.value.borrow().clone();
        if !value.same(&old) || value.is_compound() || this.deep {
            *this.value.borrow_mut() = value.clone();
            Self::invoke_callback(this, &value, &old);
        }
    }

    fn invoke_callback(this: &Rc<WatcherInner>, value: &Value, old: &Value) {
        match &this.cb {
            WatcherCallback::None => {}
            WatcherCallback::Plain(cb) => cb(value, old),
            WatcherCallback::Contained(cb) => {
                if let Err(source) = cb(value, old) {
                    let error = WatcherError {
                        expression: this.description(),
                        scope: Scope { id: this.scope },
                        source,
                    };
                    let handler = with_runtime(|runtime| runtime.error_handler.borrow().clone());
                    match handler {
                        Some(handler) => handler(error),
                        None => tracing::error!("{error}"),
                    }
                }
            }
        }
    }

    fn description(&self) -> String {
        if let Some(expr) = &self.expression {
            return format!("watcher with expression \"{expr}\"");
        }
        #[cfg(debug_assertions)]
        return format!("watcher defined at {}", self.defined_at);
        #[cfg(not(debug_assertions))]
        return String::from("watcher");
    }

    #[cfg(debug_assertions)]
    pub(crate) fn loop_context(&self) -> String {
        if self.user {
            match &self.expression {
                Some(expr) => format!("in watcher with expression \"{expr}\""),
                None => format!("in watcher defined at {}", self.defined_at),
            }
        } else {
            String::from("in a component render function")
        }
    }
}

impl fmt::Debug for Watcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watcher")
            .field("id", &self.inner.id)
            .field("deps", &self.inner.deps.borrow().len())
            .field("user", &self.inner.user)
            .field("active", &self.inner.active.get())
            .finish()
    }
}

/// Recursively touches every nested property of `value`, forcing tracked
/// reads (and therefore subscriptions) on every nested field and every
/// nested container's identity dependency. The seen set is keyed by
/// observer dependency id, so cyclic observed structures terminate.
fn traverse(value: &Value) {
    let mut seen = FxHashSet::default();
    traverse_value(value, &mut seen);
}

fn traverse_value(value: &Value, seen: &mut FxHashSet<u64>) {
    match value {
        Value::Record(record) => {
            if !record.is_extensible() {
                return;
            }
            if let Some(dep_id) = record.observer_id().and_then(observer_dep_id) {
                if !seen.insert(dep_id) {
                    return;
                }
            }
            for key in record.keys() {
                let child = record.get(&key);
                traverse_value(&child, seen);
            }
        }
        Value::Seq(seq) => {
            if !seq.is_extensible() {
                return;
            }
            if let Some(dep_id) = seq.observer_id().and_then(observer_dep_id) {
                if !seen.insert(dep_id) {
                    return;
                }
            }
            for index in 0..seq.len() {
                let child = seq.get(index);
                traverse_value(&child, seen);
            }
        }
        _ => {}
    }
}

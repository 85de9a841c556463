use crate::{
    dep::Dep, error::WatcherError, scheduler::SchedulerState, scope::ScopeState,
    tick::TickState, watcher::WatcherInner,
};
use slotmap::SlotMap;
use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

slotmap::new_key_type! {
    /// Unique ID assigned to a [Scope](crate::Scope).
    pub(crate) struct ScopeId;

    /// Unique ID assigned to an [Observer](crate::Observer).
    pub(crate) struct ObserverId;
}

/// Per-value instrumentation record: the identity dependency for a record or
/// sequence, plus the number of scopes using the value as their root state.
pub(crate) struct ObserverState {
    pub dep: Dep,
    pub root_count: Cell<usize>,
}

/// The reactive system is single-threaded and cooperative, so all of its
/// shared state lives in one thread-local runtime. Everything in the crate
/// reaches it through [`with_runtime`].
pub(crate) struct Runtime {
    next_dep_id: Cell<u64>,
    next_watcher_id: Cell<u64>,
    /// The computation currently being evaluated, if any. Reads of reactive
    /// fields are attributed to it.
    target: RefCell<Option<Rc<WatcherInner>>>,
    /// Previous targets, for nested evaluation (a derived value read from
    /// inside another computation). `None` entries mark untracked zones.
    target_stack: RefCell<Vec<Option<Rc<WatcherInner>>>>,
    pub scopes: RefCell<SlotMap<ScopeId, ScopeState>>,
    pub observers: RefCell<SlotMap<ObserverId, ObserverState>>,
    /// Whether `observe` may convert new values at all. Disabled while
    /// initializing state that must not be made reactive (e.g. props passed
    /// down from a frozen tree).
    pub convert_enabled: Cell<bool>,
    /// Server rendering needs no reactivity; conversion is skipped entirely.
    pub server_rendering: Cell<bool>,
    pub error_handler: RefCell<Option<Rc<dyn Fn(WatcherError)>>>,
    pub scheduler: SchedulerState,
    pub ticks: TickState,
}

impl Default for Runtime {
    fn default() -> Self {
        Self {
            next_dep_id: Cell::new(0),
            next_watcher_id: Cell::new(0),
            target: RefCell::new(None),
            target_stack: RefCell::new(Vec::new()),
            scopes: RefCell::new(SlotMap::with_key()),
            observers: RefCell::new(SlotMap::with_key()),
            convert_enabled: Cell::new(true),
            server_rendering: Cell::new(false),
            error_handler: RefCell::new(None),
            scheduler: SchedulerState::default(),
            ticks: TickState::default(),
        }
    }
}

thread_local! {
    static RUNTIME: Runtime = Runtime::default();
}

pub(crate) fn with_runtime<T>(f: impl FnOnce(&Runtime) -> T) -> T {
    RUNTIME.with(f)
}

impl Runtime {
    pub fn next_dep_id(&self) -> u64 {
        let id = self.next_dep_id.get();
        self.next_dep_id.set(id + 1);
        id
    }

    pub fn next_watcher_id(&self) -> u64 {
        let id = self.next_watcher_id.get();
        self.next_watcher_id.set(id + 1);
        id
    }

    /// Makes `target` the active computation, stacking whatever was active
    /// before it. `None` suspends tracking until the matching pop.
    pub fn push_target(&self, target: Option<Rc<WatcherInner>>) {
        let prev = self.target.borrow_mut().take();
        self.target_stack.borrow_mut().push(prev);
        *self.target.borrow_mut() = target;
    }

    pub fn pop_target(&self) {
        let prev = self.target_stack.borrow_mut().pop().flatten();
        *self.target.borrow_mut() = prev;
    }

    pub fn current_target(&self) -> Option<Rc<WatcherInner>> {
        self.target.borrow().clone()
    }

    pub fn has_target(&self) -> bool {
        self.target.borrow().is_some()
    }
}

/// Runs `f` with dependency tracking suspended: reactive reads inside it are
/// not attributed to the computation that is currently evaluating.
///
/// ```
/// # use vine_reactive::*;
/// # use std::{cell::Cell, rc::Rc};
/// # let disposer = create_scope(|cx| {
/// let state = record! { "a" => 1, "b" => 2 };
/// observe(&Value::from(state.clone()));
///
/// let runs = Rc::new(Cell::new(0));
/// let counter = Rc::clone(&runs);
/// let getter = state.clone();
/// Watcher::new(
///     cx,
///     move || {
///         counter.set(counter.get() + 1);
///         // `b` is read untracked, so changing it never re-runs us
///         let _ = untrack(|| getter.get("b"));
///         getter.get("a")
///     },
///     WatcherOptions { sync: true, ..Default::default() },
/// );
/// assert_eq!(runs.get(), 1);
///
/// state.insert("b", 20);
/// assert_eq!(runs.get(), 1);
///
/// state.insert("a", 10);
/// assert_eq!(runs.get(), 2);
/// # });
/// # disposer.dispose();
/// ```
pub fn untrack<T>(f: impl FnOnce() -> T) -> T {
    with_runtime(|runtime| runtime.push_target(None));
    let value = f();
    with_runtime(|runtime| runtime.pop_target());
    value
}

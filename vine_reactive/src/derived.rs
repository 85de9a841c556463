use crate::{
    runtime::with_runtime,
    scope::Scope,
    value::Value,
    watcher::{Getter, Watcher, WatcherCallback, WatcherOptions},
};

/// A lazily recomputed reactive value.
///
/// The getter does not run at construction, and an upstream change only
/// marks the value dirty; recomputation happens on the next
/// [`get`](Derived::get), however many changes accumulated before it.
/// Reading a `Derived` from
/// inside another computation subscribes that computation to everything the
/// derivation reads, so derived values compose transitively without
/// re-running their getters.
///
/// ```
/// # use vine_reactive::*;
/// # use std::{cell::Cell, rc::Rc};
/// # let disposer = create_scope(|cx| {
/// let state = record! { "n" => 2 };
/// observe(&Value::from(state.clone()));
///
/// let runs = Rc::new(Cell::new(0));
/// let counter = Rc::clone(&runs);
/// let source = state.clone();
/// let doubled = Derived::new(cx, move || {
///     counter.set(counter.get() + 1);
///     Value::from(source.get("n").as_i64().unwrap_or(0) * 2)
/// });
/// assert_eq!(runs.get(), 0); // lazy: nothing ran yet
///
/// assert_eq!(doubled.get(), Value::from(4));
/// assert_eq!(doubled.get(), Value::from(4));
/// assert_eq!(runs.get(), 1); // cached while clean
///
/// state.insert("n", 5);
/// assert_eq!(runs.get(), 1); // dirty, but not recomputed yet
/// assert_eq!(doubled.get(), Value::from(10));
/// assert_eq!(runs.get(), 2);
/// # });
/// # disposer.dispose();
/// ```
#[derive(Clone, Debug)]
pub struct Derived {
    watcher: Watcher,
}

impl Derived {
    #[track_caller]
    pub fn new(cx: Scope, getter: impl Fn() -> Value + 'static) -> Derived {
        Derived {
            watcher: Watcher::create(
                cx,
                Getter::Closure(Box::new(getter)),
                WatcherCallback::None,
                WatcherOptions {
                    lazy: true,
                    ..Default::default()
                },
                None,
            ),
        }
    }

    /// The current value, recomputing only if an upstream dependency has
    /// changed since the last read. Subscribes the active computation, if
    /// any, to the derivation's own dependencies.
    pub fn get(&self) -> Value {
        if self.watcher.is_dirty() {
            self.watcher.evaluate();
        }
        if with_runtime(|runtime| runtime.has_target()) {
            self.watcher.depend();
        }
        self.watcher.value()
    }

    pub fn teardown(&self) {
        self.watcher.teardown();
    }
}

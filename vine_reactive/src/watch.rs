use crate::{
    error::CallbackError,
    path::parse_path,
    scope::Scope,
    value::Value,
    watcher::{Getter, Watcher, WatcherCallback, WatcherOptions},
};

/// Options for [`watch`] and [`watch_path`].
///
/// - `deep`: re-run when anything nested under the watched value changes,
///   even though the value's own identity does not.
/// - `immediate`: invoke the callback once, synchronously, with the initial
///   value instead of waiting for the first change.
/// - `sync`: run on the notifying call stack instead of the next tick's
///   flush.
#[derive(Clone, Copy, Default)]
pub struct WatchOptions {
    pub deep: bool,
    pub immediate: bool,
    pub sync: bool,
}

/// Watches the value produced by `getter` and invokes `callback` with
/// `(new, old)` when it changes.
///
/// The callback itself runs untracked: reactive reads inside it subscribe
/// nothing. Errors it returns are contained at this watcher's boundary:
/// routed to the handler installed with
/// [`set_error_handler`](crate::set_error_handler) if there is one, logged
/// otherwise, and never allowed to starve other watchers queued in the same
/// flush.
///
/// Returns the watcher; call [`Watcher::teardown`] to stop watching early
/// (disposing the owning scope also stops it).
///
/// ```
/// # use vine_reactive::*;
/// # use std::{cell::RefCell, rc::Rc};
/// # let disposer = create_scope(|cx| {
/// let state = record! { "count" => 0 };
/// observe(&Value::from(state.clone()));
///
/// let log = Rc::new(RefCell::new(Vec::new()));
/// let seen = Rc::clone(&log);
/// let source = state.clone();
/// watch(
///     cx,
///     move || source.get("count"),
///     move |value, old| {
///         seen.borrow_mut().push((value.clone(), old.clone()));
///         Ok(())
///     },
///     WatchOptions::default(),
/// );
///
/// state.insert("count", 1);
/// assert!(log.borrow().is_empty()); // deferred to the next tick
///
/// run_ticks();
/// assert_eq!(log.borrow().as_slice(), &[(Value::from(1), Value::from(0))]);
/// # });
/// # disposer.dispose();
/// ```
#[cfg_attr(debug_assertions, tracing::instrument(level = "trace", skip_all))]
#[track_caller]
pub fn watch(
    cx: Scope,
    getter: impl Fn() -> Value + 'static,
    callback: impl Fn(&Value, &Value) -> Result<(), CallbackError> + 'static,
    options: WatchOptions,
) -> Watcher {
    let watcher = Watcher::create(
        cx,
        Getter::Closure(Box::new(getter)),
        WatcherCallback::Contained(Box::new(callback)),
        WatcherOptions {
            deep: options.deep,
            user: true,
            lazy: false,
            sync: options.sync,
        },
        None,
    );
    if options.immediate {
        let value = watcher.value();
        watcher.call_callback(&value, &Value::Null);
    }
    watcher
}

/// [`watch`], with the source given as a dot-delimited path resolved
/// against the scope's [bound root state](Scope::bind_state).
///
/// Paths accept only simple identifier segments joined by `.`; anything
/// else is a usage error: it is logged, and the watcher degrades to a
/// no-op getter rather than failing. Use a closure getter for full control.
#[cfg_attr(
    debug_assertions,
    tracing::instrument(level = "trace", skip_all, fields(path = %path))
)]
#[track_caller]
pub fn watch_path(
    cx: Scope,
    path: &str,
    callback: impl Fn(&Value, &Value) -> Result<(), CallbackError> + 'static,
    options: WatchOptions,
) -> Watcher {
    let getter = match cx.root_state() {
        Some(root) => match parse_path(path) {
            Ok(segments) => Getter::Path { root, segments },
            Err(error) => {
                tracing::warn!(
                    "failed watching path \"{path}\": {error}; \
                     watchers only accept simple dot-delimited paths"
                );
                Getter::Noop
            }
        },
        None => {
            tracing::warn!("cannot watch path \"{path}\" on a scope with no bound root state");
            Getter::Noop
        }
    };
    let watcher = Watcher::create(
        cx,
        getter,
        WatcherCallback::Contained(Box::new(callback)),
        WatcherOptions {
            deep: options.deep,
            user: true,
            lazy: false,
            sync: options.sync,
        },
        Some(path.to_string()),
    );
    if options.immediate {
        let value = watcher.value();
        watcher.call_callback(&value, &Value::Null);
    }
    watcher
}

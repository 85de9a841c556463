#![forbid(unsafe_code)]

//! The reactive system for the Vine UI framework.
//!
//! ## Observed State, Watched Computations
//!
//! Vine is built on transparent dependency tracking: application state is a
//! dynamic tree of [`Record`]s, [`Seq`]s, and primitives, and once a tree
//! has been [`observe`]d, every field read and write passes through
//! instrumented accessors. A [`Watcher`] evaluates a getter over that
//! state, and the accessors do the bookkeeping: whatever the getter read,
//! the watcher is now subscribed to, with no dependency declarations
//! anywhere. When a field changes, exactly the affected watchers re-run:
//! batched, deduplicated, and ordered by creation, once per tick.
//!
//! The pieces, bottom up:
//!
//! 1. *Dependencies*: each reactive field (and each observed value's own
//!    identity) owns a publish point tracking its subscribers.
//! 2. *Observation:* [`observe`] instruments a value tree; [`set`] and
//!    [`del`] add and remove keys reactively after the fact.
//! 3. *Watchers:* [`Watcher`] for raw computations, [`watch`] and
//!    [`watch_path`] for user-level watching with contained callback
//!    errors, [`Derived`] for lazily recomputed values.
//! 4. *Scheduling:* non-`sync` watchers run on the next tick, via a host
//!    microtask via [`set_tick_driver`], or a manual [`run_ticks`] pump.
//!
//! ### Example
//!
//! ```
//! use vine_reactive::*;
//! use std::{cell::RefCell, rc::Rc};
//!
//! let disposer = create_scope(|cx| {
//!     let state = record! { "count" => 0 };
//!     observe(&Value::from(state.clone()));
//!
//!     let log = Rc::new(RefCell::new(Vec::new()));
//!     let seen = Rc::clone(&log);
//!     let source = state.clone();
//!     watch(
//!         cx,
//!         move || source.get("count"),
//!         move |value, _old| {
//!             seen.borrow_mut().push(value.clone());
//!             Ok(())
//!         },
//!         WatchOptions::default(),
//!     );
//!
//!     // writes batch: two writes, one flush, one run
//!     state.insert("count", 1);
//!     state.insert("count", 2);
//!     assert!(log.borrow().is_empty());
//!
//!     run_ticks();
//!     assert_eq!(log.borrow().as_slice(), &[Value::from(2)]);
//! });
//! disposer.dispose();
//! ```

mod dep;
mod derived;
mod error;
mod macros;
mod observer;
mod path;
mod runtime;
mod scheduler;
mod scope;
mod seq;
#[cfg(feature = "serde")]
mod serde;
mod tick;
mod value;
mod watch;
mod watcher;

pub use derived::Derived;
pub use error::{set_error_handler, CallbackError, PathError, TickError, WatcherError};
pub use observer::{
    define_reactive, del, observe, observe_root, set, set_server_rendering, without_conversion,
    FieldKey, Observer,
};
pub use runtime::untrack;
pub use scope::{create_scope, Scope, ScopeDisposer};
pub use tick::{next_tick, run_ticks, set_tick_driver, tick};
pub use value::{Record, Seq, Value};
pub use watch::{watch, watch_path, WatchOptions};
pub use watcher::{Watcher, WatcherOptions};

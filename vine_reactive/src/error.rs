use crate::{runtime::with_runtime, scope::Scope};
use std::rc::Rc;
use thiserror::Error;

/// Error returned by a user watch callback. Contained at the watcher that
/// invoked the callback; never unwinds through the scheduler.
pub type CallbackError = Box<dyn std::error::Error>;

/// A contained user-callback error, as delivered to the handler installed
/// with [`set_error_handler`].
#[derive(Error, Debug)]
#[error("error in {expression}")]
pub struct WatcherError {
    /// Human-readable identification of the failing watcher: its watched
    /// path, or where it was defined.
    pub expression: String,
    /// The scope that owns the failing watcher.
    pub scope: Scope,
    #[source]
    pub source: CallbackError,
}

/// Why a watch path was rejected. Rejected paths degrade to a no-op getter
/// after a warning; they never fail the watch call itself.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PathError {
    #[error("path is empty")]
    Empty,
    #[error("segment \"{segment}\" is not a simple identifier")]
    InvalidSegment { segment: String },
}

/// Errors installing the tick driver.
#[derive(Error, Debug)]
pub enum TickError {
    /// The driver is set once for the life of the thread.
    #[error("tick driver has already been set")]
    AlreadySet,
}

/// Installs the process-wide handler for contained user-callback errors.
/// With no handler installed, contained errors are logged instead. Either
/// way the flush that contained them keeps running.
pub fn set_error_handler(handler: impl Fn(WatcherError) + 'static) {
    with_runtime(|runtime| {
        *runtime.error_handler.borrow_mut() = Some(Rc::new(handler));
    });
}

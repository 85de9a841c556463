//! The "next tick" primitive: the smallest unit of deferred, ordered,
//! run-to-completion callback execution.
//!
//! The scheduler batches all work behind one flush per tick, but what a
//! tick *is* belongs to the host: a browser microtask, a `spawn_local` on
//! an async runtime, a frame callback. Hosts with such a primitive install
//! it once with [`set_tick_driver`]; hosts without one (including tests)
//! leave the default in place: a thread-local FIFO drained manually with
//! [`run_ticks`].

use crate::{error::TickError, runtime::with_runtime};
use futures::channel::oneshot;
use std::{cell::RefCell, collections::VecDeque, future::Future, rc::Rc};

type Task = Box<dyn FnOnce()>;

#[derive(Default)]
pub(crate) struct TickState {
    pending: RefCell<VecDeque<Task>>,
    driver: RefCell<Option<Rc<dyn Fn(Task)>>>,
}

/// Schedules `task` to run on the next tick: through the installed driver,
/// or onto the pending queue for the next [`run_ticks`] pump.
pub fn next_tick(task: impl FnOnce() + 'static) {
    let driver = with_runtime(|runtime| runtime.ticks.driver.borrow().clone());
    match driver {
        Some(drive) => drive(Box::new(task)),
        None => with_runtime(|runtime| {
            runtime.ticks.pending.borrow_mut().push_back(Box::new(task))
        }),
    }
}

/// Installs the host's deferred-execution primitive. One-time: a second
/// call returns [`TickError::AlreadySet`].
///
/// The driver must invoke tasks in submission order, run-to-completion,
/// without interleaving. Any tasks already pending are handed to it.
pub fn set_tick_driver(driver: impl Fn(Box<dyn FnOnce()>) + 'static) -> Result<(), TickError> {
    let pending = with_runtime(|runtime| {
        let mut slot = runtime.ticks.driver.borrow_mut();
        if slot.is_some() {
            return None;
        }
        *slot = Some(Rc::new(driver));
        Some(std::mem::take(&mut *runtime.ticks.pending.borrow_mut()))
    });
    let Some(pending) = pending else {
        return Err(TickError::AlreadySet);
    };
    let driver = with_runtime(|runtime| runtime.ticks.driver.borrow().clone());
    if let Some(drive) = driver {
        for task in pending {
            drive(task);
        }
    }
    Ok(())
}

/// Drains the pending tick queue, including tasks enqueued by the tasks it
/// runs. Returns how many ran. The manual pump for hosts with no driver.
pub fn run_ticks() -> usize {
    let mut ran = 0;
    loop {
        let task = with_runtime(|runtime| runtime.ticks.pending.borrow_mut().pop_front());
        match task {
            Some(task) => {
                task();
                ran += 1;
            }
            None => break,
        }
    }
    ran
}

/// Resolves once the next tick has been processed. Only useful under an
/// installed driver (or a host that pumps [`run_ticks`]); with neither, the
/// future never resolves.
pub fn tick() -> impl Future<Output = ()> {
    let (tx, rx) = oneshot::channel();
    next_tick(move || {
        _ = tx.send(());
    });
    async move {
        _ = rx.await;
    }
}

use crate::{
    runtime::with_runtime,
    tick::next_tick,
    watcher::{Watcher, WatcherInner},
};
use rustc_hash::FxHashSet;
use std::cell::{Cell, RefCell};

#[cfg(debug_assertions)]
use rustc_hash::FxHashMap;

/// How many times a watcher may re-enqueue itself from its own run, per
/// flush, before the flush is declared a runaway loop and aborted. Generous
/// enough to tolerate legitimate multi-step convergence.
#[cfg(debug_assertions)]
const MAX_UPDATE_COUNT: usize = 100;

/// Process-wide flush queue. One flush runs per tick, no matter how many
/// notifications arrive before it; a watcher notified many times in that
/// window still runs at most once per pass.
#[derive(Default)]
pub(crate) struct SchedulerState {
    queue: RefCell<Vec<Watcher>>,
    /// Ids currently enqueued; the dedup set.
    has: RefCell<FxHashSet<u64>>,
    /// A flush has been scheduled on the next tick.
    waiting: Cell<bool>,
    /// A flush is running right now.
    flushing: Cell<bool>,
    /// Index of the queue entry currently running.
    index: Cell<usize>,
    /// Per-id self-re-enqueue counts, for runaway-loop detection.
    #[cfg(debug_assertions)]
    circular: RefCell<FxHashMap<u64, usize>>,
}

/// Enqueues a watcher for the next flush, deduplicating by id.
///
/// Mid-flush, the watcher is inserted in id order among the entries that
/// have not yet run (never before the run cursor), so work enqueued as a
/// side effect of an earlier watcher still runs in this same flush, in its
/// proper position.
pub(crate) fn queue_watcher(watcher: &Watcher) {
    with_runtime(|runtime| {
        let scheduler = &runtime.scheduler;
        let id = watcher.inner.id;
        if scheduler.has.borrow().contains(&id) {
            return;
        }
        scheduler.has.borrow_mut().insert(id);
        if !scheduler.flushing.get() {
            scheduler.queue.borrow_mut().push(watcher.clone());
        } else {
            let mut queue = scheduler.queue.borrow_mut();
            let cursor = scheduler.index.get();
            let mut pos = queue.len();
            while pos > cursor + 1 && queue[pos - 1].inner.id > id {
                pos -= 1;
            }
            queue.insert(pos, watcher.clone());
        }
        if !scheduler.waiting.get() {
            scheduler.waiting.set(true);
            next_tick(flush_scheduler_queue);
        }
    });
}

/// Runs every queued watcher in ascending id order.
///
/// Id order is creation order, which means parents before children (a
/// parent's computations exist before its children's, and a parent's run
/// may destroy a child, whose queued watcher is then skipped by `run`'s
/// inactive check) and user watchers before the render watcher of the same
/// instance.
pub(crate) fn flush_scheduler_queue() {
    with_runtime(|runtime| {
        runtime.scheduler.flushing.set(true);
        runtime
            .scheduler
            .queue
            .borrow_mut()
            .sort_by_key(|watcher| watcher.inner.id);
    });

    // index iteration, not a snapshot: running a watcher can grow the queue
    loop {
        let watcher = match with_runtime(|runtime| {
            let scheduler = &runtime.scheduler;
            let queue = scheduler.queue.borrow();
            queue.get(scheduler.index.get()).cloned()
        }) {
            Some(watcher) => watcher,
            None => break,
        };
        let id = watcher.inner.id;
        // clear the membership flag before running, so a notification for
        // this same id arriving from within its own run re-enqueues it for
        // a later pass of this flush instead of being dropped
        with_runtime(|runtime| {
            runtime.scheduler.has.borrow_mut().remove(&id);
        });
        WatcherInner::run(&watcher.inner);
        #[cfg(debug_assertions)]
        {
            let aborted = with_runtime(|runtime| {
                let scheduler = &runtime.scheduler;
                if !scheduler.has.borrow().contains(&id) {
                    return false;
                }
                let mut circular = scheduler.circular.borrow_mut();
                let count = circular.entry(id).or_insert(0);
                *count += 1;
                if *count > MAX_UPDATE_COUNT {
                    tracing::warn!(
                        "you may have an infinite update loop {}",
                        watcher.inner.loop_context()
                    );
                    true
                } else {
                    false
                }
            });
            if aborted {
                break;
            }
        }
        with_runtime(|runtime| {
            let scheduler = &runtime.scheduler;
            scheduler.index.set(scheduler.index.get() + 1);
        });
    }

    reset_scheduler_state();
}

fn reset_scheduler_state() {
    with_runtime(|runtime| {
        let scheduler = &runtime.scheduler;
        scheduler.queue.borrow_mut().clear();
        scheduler.has.borrow_mut().clear();
        scheduler.index.set(0);
        scheduler.waiting.set(false);
        scheduler.flushing.set(false);
        #[cfg(debug_assertions)]
        scheduler.circular.borrow_mut().clear();
    });
}

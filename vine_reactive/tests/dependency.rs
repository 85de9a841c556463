use std::{cell::Cell, rc::Rc};
use vine_reactive::{create_scope, observe, record, watch, Value, WatchOptions};

fn sync() -> WatchOptions {
    WatchOptions {
        sync: true,
        ..Default::default()
    }
}

#[test]
fn reading_a_field_twice_subscribes_once() {
    create_scope(|cx| {
        let state = record! { "a" => 1 };
        observe(&Value::from(state.clone()));

        let runs = Rc::new(Cell::new(0));
        let counter = Rc::clone(&runs);
        let source = state.clone();
        let watcher = watch(
            cx,
            move || {
                source.get("a");
                source.get("a")
            },
            move |_, _| {
                counter.set(counter.get() + 1);
                Ok(())
            },
            sync(),
        );
        assert_eq!(watcher.dep_count(), 1);

        // one subscription means exactly one run per notification
        state.insert("a", 2);
        assert_eq!(runs.get(), 1);
        state.insert("a", 3);
        assert_eq!(runs.get(), 2);
        assert_eq!(watcher.dep_count(), 1);
    })
    .dispose()
}

#[test]
fn stale_dependencies_are_pruned() {
    create_scope(|cx| {
        let state = record! { "cond" => true, "a" => 1, "b" => 2 };
        observe(&Value::from(state.clone()));

        let runs = Rc::new(Cell::new(0));
        let counter = Rc::clone(&runs);
        let source = state.clone();
        let watcher = watch(
            cx,
            move || {
                if source.get("cond").as_bool().unwrap_or(false) {
                    source.get("a")
                } else {
                    source.get("b")
                }
            },
            move |_, _| {
                counter.set(counter.get() + 1);
                Ok(())
            },
            sync(),
        );
        assert_eq!(watcher.dep_count(), 2); // cond + a

        // flip the branch: the watcher now reads cond + b
        state.insert("cond", false);
        assert_eq!(runs.get(), 1);
        assert_eq!(watcher.dep_count(), 2);

        // the dropped branch no longer triggers anything
        state.insert("a", 99);
        assert_eq!(runs.get(), 1);

        state.insert("b", 3);
        assert_eq!(runs.get(), 2);
    })
    .dispose()
}

// A dependency dropped for exactly one evaluation and read again on the
// next must be re-subscribed: the buffer swap that follows the pruning
// evaluation also clears the dropped id from the seen set.
#[test]
fn redropped_dep_resubscribes_after_swap() {
    create_scope(|cx| {
        let state = record! { "cond" => true, "a" => 1 };
        observe(&Value::from(state.clone()));

        let runs = Rc::new(Cell::new(0));
        let counter = Rc::clone(&runs);
        let source = state.clone();
        watch(
            cx,
            move || {
                if source.get("cond").as_bool().unwrap_or(false) {
                    source.get("a")
                } else {
                    Value::Null
                }
            },
            move |_, _| {
                counter.set(counter.get() + 1);
                Ok(())
            },
            sync(),
        );

        state.insert("cond", false); // evaluation 2 drops `a`
        assert_eq!(runs.get(), 1);

        state.insert("a", 5); // no longer subscribed
        assert_eq!(runs.get(), 1);

        state.insert("cond", true); // evaluation 3 reads `a` again
        assert_eq!(runs.get(), 2);

        state.insert("a", 6); // re-subscribed
        assert_eq!(runs.get(), 3);
    })
    .dispose()
}

#[test]
fn callback_reads_are_untracked() {
    create_scope(|cx| {
        let state = record! { "a" => 1, "b" => 10 };
        observe(&Value::from(state.clone()));

        let runs = Rc::new(Cell::new(0));
        let counter = Rc::clone(&runs);
        let source = state.clone();
        let cb_source = state.clone();
        watch(
            cx,
            move || source.get("a"),
            move |_, _| {
                counter.set(counter.get() + 1);
                let _ = cb_source.get("b"); // read inside the callback
                Ok(())
            },
            sync(),
        );

        state.insert("a", 2);
        assert_eq!(runs.get(), 1);

        // the callback's read of `b` subscribed nothing
        state.insert("b", 20);
        assert_eq!(runs.get(), 1);
    })
    .dispose()
}

use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};
use vine_reactive::{
    create_scope, observe, record, run_ticks, set_tick_driver, watch, Value, WatchOptions,
};

#[test]
fn writes_batch_into_one_flush() {
    create_scope(|cx| {
        let state = record! { "a" => 1, "b" => 2 };
        observe(&Value::from(state.clone()));

        let runs = Rc::new(Cell::new(0));
        let counter = Rc::clone(&runs);
        let source = state.clone();
        watch(
            cx,
            move || {
                source.get("a");
                source.get("b")
            },
            move |_, _| {
                counter.set(counter.get() + 1);
                Ok(())
            },
            WatchOptions::default(),
        );

        // three writes to two fields, one flush, one run
        state.insert("a", 10);
        state.insert("b", 20);
        state.insert("a", 11);
        assert_eq!(runs.get(), 0);

        run_ticks();
        assert_eq!(runs.get(), 1);

        // the scheduler resets in full after each flush
        state.insert("b", 21);
        run_ticks();
        assert_eq!(runs.get(), 2);
    })
    .dispose()
}

#[test]
fn watchers_run_in_creation_order() {
    create_scope(|cx| {
        let state = record! { "x" => 1, "y" => 2 };
        observe(&Value::from(state.clone()));

        let order = Rc::new(RefCell::new(Vec::new()));

        let first_log = Rc::clone(&order);
        let first_source = state.clone();
        watch(
            cx,
            move || first_source.get("x"),
            move |_, _| {
                first_log.borrow_mut().push("first");
                Ok(())
            },
            WatchOptions::default(),
        );

        let second_log = Rc::clone(&order);
        let second_source = state.clone();
        watch(
            cx,
            move || second_source.get("y"),
            move |_, _| {
                second_log.borrow_mut().push("second");
                Ok(())
            },
            WatchOptions::default(),
        );

        // notify in reverse order; the flush still sorts by creation
        state.insert("y", 20);
        state.insert("x", 10);
        run_ticks();
        assert_eq!(*order.borrow(), vec!["first", "second"]);
    })
    .dispose()
}

#[test]
fn side_effect_enqueues_run_in_the_same_flush() {
    create_scope(|cx| {
        let state = record! { "a" => 1, "b" => 1 };
        observe(&Value::from(state.clone()));

        let order = Rc::new(RefCell::new(Vec::new()));

        // the first (lower-id) watcher writes `b` from its callback
        let a_log = Rc::clone(&order);
        let a_source = state.clone();
        let a_writer = state.clone();
        watch(
            cx,
            move || a_source.get("a"),
            move |value, _| {
                a_log.borrow_mut().push("a".to_string());
                a_writer.insert("b", value.clone());
                Ok(())
            },
            WatchOptions::default(),
        );

        let b_log = Rc::clone(&order);
        let b_source = state.clone();
        watch(
            cx,
            move || b_source.get("b"),
            move |_, _| {
                b_log.borrow_mut().push("b".to_string());
                Ok(())
            },
            WatchOptions::default(),
        );

        state.insert("a", 5);
        // a single scheduled flush covers the watcher enqueued mid-flush
        assert_eq!(run_ticks(), 1);
        assert_eq!(*order.borrow(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(state.get_untracked("b"), Value::from(5));
    })
    .dispose()
}

#[test]
fn queued_watchers_torn_down_before_the_flush_are_skipped() {
    create_scope(|cx| {
        let state = record! { "a" => 1 };
        observe(&Value::from(state.clone()));

        let runs = Rc::new(Cell::new(0));
        let counter = Rc::clone(&runs);
        let source = state.clone();
        let watcher = watch(
            cx,
            move || source.get("a"),
            move |_, _| {
                counter.set(counter.get() + 1);
                Ok(())
            },
            WatchOptions::default(),
        );

        state.insert("a", 2);
        watcher.teardown();
        run_ticks();
        assert_eq!(runs.get(), 0);
    })
    .dispose()
}

#[test]
fn tick_driver_replaces_the_manual_pump() {
    // an immediate driver: the flush runs on the mutating call stack
    set_tick_driver(|task| task()).expect("first install succeeds");
    assert!(set_tick_driver(|task| task()).is_err());

    create_scope(|cx| {
        let state = record! { "a" => 1 };
        observe(&Value::from(state.clone()));

        let runs = Rc::new(Cell::new(0));
        let counter = Rc::clone(&runs);
        let source = state.clone();
        watch(
            cx,
            move || source.get("a"),
            move |_, _| {
                counter.set(counter.get() + 1);
                Ok(())
            },
            WatchOptions::default(),
        );

        state.insert("a", 2);
        assert_eq!(runs.get(), 1);
    })
    .dispose()
}

#[cfg(debug_assertions)]
#[test]
fn runaway_update_loops_abort_the_flush() {
    create_scope(|cx| {
        let state = record! { "n" => 0 };
        observe(&Value::from(state.clone()));

        let runs = Rc::new(Cell::new(0));
        let counter = Rc::clone(&runs);
        let source = state.clone();
        let writer = state.clone();
        watch(
            cx,
            move || source.get("n"),
            move |value, _| {
                counter.set(counter.get() + 1);
                writer.insert("n", value.as_i64().unwrap_or(0) + 1);
                Ok(())
            },
            WatchOptions::default(),
        );

        state.insert("n", 1);
        run_ticks();

        // a bounded number of re-triggers is tolerated, then the flush is
        // aborted instead of hanging
        assert!(runs.get() > 100);
        assert!(runs.get() < 110);
    })
    .dispose()
}

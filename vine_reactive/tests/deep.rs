use std::{cell::Cell, rc::Rc};
use vine_reactive::{create_scope, observe, record, run_ticks, seq, watch, Value, WatchOptions};

fn deep() -> WatchOptions {
    WatchOptions {
        deep: true,
        ..Default::default()
    }
}

#[test]
fn deep_watchers_see_nested_mutations() {
    create_scope(|cx| {
        let leaf = record! { "c" => 1 };
        let mid = record! { "b" => leaf.clone() };
        let state = record! { "a" => mid.clone() };
        observe(&Value::from(state.clone()));

        let shallow_runs = Rc::new(Cell::new(0));
        let shallow_counter = Rc::clone(&shallow_runs);
        let shallow_source = state.clone();
        watch(
            cx,
            move || shallow_source.get("a"),
            move |_, _| {
                shallow_counter.set(shallow_counter.get() + 1);
                Ok(())
            },
            WatchOptions::default(),
        );

        let deep_runs = Rc::new(Cell::new(0));
        let deep_counter = Rc::clone(&deep_runs);
        let deep_source = state.clone();
        watch(
            cx,
            move || deep_source.get("a"),
            move |_, _| {
                deep_counter.set(deep_counter.get() + 1);
                Ok(())
            },
            deep(),
        );

        // the root reference never changes, but the deep watcher fires
        leaf.insert("c", 2);
        run_ticks();
        assert_eq!(deep_runs.get(), 1);
        assert_eq!(shallow_runs.get(), 0);

        leaf.insert("c", 3);
        run_ticks();
        assert_eq!(deep_runs.get(), 2);
    })
    .dispose()
}

#[test]
fn deep_watch_descends_into_sequences() {
    create_scope(|cx| {
        let item = record! { "done" => false };
        let state = record! { "todos" => seq![item.clone()] };
        observe(&Value::from(state.clone()));

        let runs = Rc::new(Cell::new(0));
        let counter = Rc::clone(&runs);
        let source = state.clone();
        watch(
            cx,
            move || source.get("todos"),
            move |_, _| {
                counter.set(counter.get() + 1);
                Ok(())
            },
            deep(),
        );

        item.insert("done", true);
        run_ticks();
        assert_eq!(runs.get(), 1);
    })
    .dispose()
}

#[test]
fn deep_watch_terminates_on_cycles() {
    create_scope(|cx| {
        let node = record! { "value" => 1 };
        node.insert("me", node.clone()); // the record refers to itself
        let state = record! { "root" => node.clone() };
        observe(&Value::from(state.clone()));

        let runs = Rc::new(Cell::new(0));
        let counter = Rc::clone(&runs);
        let source = state.clone();
        watch(
            cx,
            move || source.get("root"),
            move |_, _| {
                counter.set(counter.get() + 1);
                Ok(())
            },
            deep(),
        );

        node.insert("value", 2);
        run_ticks();
        assert_eq!(runs.get(), 1);
    })
    .dispose()
}

use std::{cell::Cell, rc::Rc};
use vine_reactive::{
    create_scope, del, observe, record, set, set_server_rendering, watch, without_conversion,
    Value, WatchOptions,
};

fn sync() -> WatchOptions {
    WatchOptions {
        sync: true,
        ..Default::default()
    }
}

#[test]
fn observe_is_idempotent() {
    let state = Value::from(record! { "a" => 1 });
    let first = observe(&state).expect("records are observable");
    let second = observe(&state).expect("re-observing returns the existing observer");
    assert_eq!(first, second);
}

#[test]
fn primitives_are_not_observable() {
    assert!(observe(&Value::Null).is_none());
    assert!(observe(&Value::from(true)).is_none());
    assert!(observe(&Value::from(1)).is_none());
    assert!(observe(&Value::from(1.5)).is_none());
    assert!(observe(&Value::from("text")).is_none());
}

#[test]
fn frozen_values_stay_plain() {
    let state = record! { "a" => 1 };
    state.freeze();
    assert!(observe(&Value::from(state)).is_none());
}

#[test]
fn owner_records_are_exempt_and_protected() {
    let state = record! { "a" => 1 };
    state.mark_owner();
    let value = Value::from(state.clone());
    assert!(observe(&value).is_none());

    set(&value, "b", 2);
    assert!(!state.contains_key("b"));
}

#[test]
fn conversion_can_be_disabled() {
    let state = Value::from(record! { "a" => 1 });
    assert!(without_conversion(|| observe(&state)).is_none());
    assert!(observe(&state).is_some());
}

#[test]
fn server_rendering_skips_conversion() {
    set_server_rendering(true);
    let state = Value::from(record! { "a" => 1 });
    assert!(observe(&state).is_none());

    set_server_rendering(false);
    assert!(observe(&state).is_some());
}

#[test]
fn equal_writes_do_not_notify() {
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
            sync(),
        );

        state.insert("a", 1);
        assert_eq!(runs.get(), 0);

        // numerically equal across int/float is still equal
        state.insert("a", 1.0);
        assert_eq!(runs.get(), 0);

        state.insert("a", 2);
        assert_eq!(runs.get(), 1);
    })
    .dispose()
}

#[test]
fn structural_set_notifies_and_instruments() {
    create_scope(|cx| {
        let nested = record! { "x" => 1 };
        let state = record! { "nested" => nested.clone() };
        observe(&Value::from(state.clone()));

        let runs = Rc::new(Cell::new(0));
        let counter = Rc::clone(&runs);
        let source = state.clone();
        watch(
            cx,
            move || source.get("nested"),
            move |_, _| {
                counter.set(counter.get() + 1);
                Ok(())
            },
            sync(),
        );

        // a brand-new key cannot be made reactive by plain assignment,
        // but `set` installs it and fires the record's identity dependency
        set(&Value::from(nested.clone()), "y", 2);
        assert_eq!(runs.get(), 1);
        assert_eq!(nested.get_untracked("y"), Value::from(2));

        // and the installed key is itself reactive
        let y_runs = Rc::new(Cell::new(0));
        let y_counter = Rc::clone(&y_runs);
        let y_source = nested.clone();
        watch(
            cx,
            move || y_source.get("y"),
            move |_, _| {
                y_counter.set(y_counter.get() + 1);
                Ok(())
            },
            sync(),
        );
        nested.insert("y", 3);
        assert_eq!(y_runs.get(), 1);
    })
    .dispose()
}

#[test]
fn set_on_an_existing_key_is_plain_assignment() {
    create_scope(|cx| {
        let state = record! { "a" => 1 };
        let root = Value::from(state.clone());
        observe(&root);

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
            sync(),
        );

        set(&root, "a", 5);
        assert_eq!(runs.get(), 1);
        assert_eq!(state.get_untracked("a"), Value::from(5));
    })
    .dispose()
}

#[test]
fn set_on_an_unobserved_record_stays_plain() {
    let state = record! {};
    set(&Value::from(state.clone()), "k", 1);
    assert_eq!(state.get_untracked("k"), Value::from(1));
}

#[test]
fn root_state_refuses_new_keys_until_released() {
    let state = record! { "a" => 1 };
    let root = Value::from(state.clone());

    let disposer = create_scope(|cx| {
        cx.bind_state(&root);

        set(&root, "b", 2);
        assert!(!state.contains_key("b"));

        // existing keys still assign fine
        set(&root, "a", 3);
        assert_eq!(state.get_untracked("a"), Value::from(3));
    });
    disposer.dispose();

    // disposal released the root-owner count
    set(&root, "b", 2);
    assert!(state.contains_key("b"));
}

#[test]
fn del_notifies_structural_watchers() {
    create_scope(|cx| {
        let nested = record! { "x" => 1 };
        let state = record! { "nested" => nested.clone() };
        observe(&Value::from(state.clone()));

        let runs = Rc::new(Cell::new(0));
        let counter = Rc::clone(&runs);
        let source = state.clone();
        watch(
            cx,
            move || source.get("nested"),
            move |_, _| {
                counter.set(counter.get() + 1);
                Ok(())
            },
            sync(),
        );

        del(&Value::from(nested.clone()), "x");
        assert_eq!(runs.get(), 1);
        assert!(!nested.contains_key("x"));

        // deleting a key that is not there is a no-op
        del(&Value::from(nested.clone()), "x");
        assert_eq!(runs.get(), 1);
    })
    .dispose()
}

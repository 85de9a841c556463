use crate::{
    dep::Dep,
    runtime::{with_runtime, ObserverId, ObserverState},
    value::{FieldSlot, Record, Seq, Value},
};
use std::cell::Cell;

/// Handle to the instrumentation record attached to an observed value.
///
/// Exactly one observer exists per distinct record or sequence; it carries
/// the value's identity dependency, which fires when the value's *structure*
/// changes (a key added through [`set`], an element spliced in, …).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Observer {
    pub(crate) id: ObserverId,
}

impl Observer {
    /// Subscribes the active computation to this value's identity
    /// dependency.
    pub fn track(&self) {
        if let Some(dep) = observer_dep(self.id) {
            dep.depend();
        }
    }
}

pub(crate) fn observer_dep(id: ObserverId) -> Option<Dep> {
    with_runtime(|runtime| runtime.observers.borrow().get(id).map(|ob| ob.dep.clone()))
}

pub(crate) fn observer_dep_id(id: ObserverId) -> Option<u64> {
    with_runtime(|runtime| runtime.observers.borrow().get(id).map(|ob| ob.dep.id()))
}

fn observer_root_count(id: ObserverId) -> usize {
    with_runtime(|runtime| {
        runtime
            .observers
            .borrow()
            .get(id)
            .map(|ob| ob.root_count.get())
            .unwrap_or(0)
    })
}

fn new_observer() -> ObserverId {
    let dep = Dep::new();
    with_runtime(|runtime| {
        runtime.observers.borrow_mut().insert(ObserverState {
            dep,
            root_count: Cell::new(0),
        })
    })
}

fn conversion_allowed() -> bool {
    with_runtime(|runtime| runtime.convert_enabled.get() && !runtime.server_rendering.get())
}

/// Attempts to instrument `value`, returning its [`Observer`].
///
/// Idempotent: a value that already carries an observer returns the existing
/// one. Primitives are not observable and return `None`, as do frozen
/// values, framework-owner records, and anything encountered while
/// conversion is disabled (see [`without_conversion`] and
/// [`set_server_rendering`]).
///
/// Observing a record turns every current key into a reactive field;
/// observing a sequence observes each current element. Either way the value
/// itself gains an identity dependency for structural changes.
pub fn observe(value: &Value) -> Option<Observer> {
    match value {
        Value::Record(record) => observe_record(record),
        Value::Seq(seq) => observe_seq(seq),
        _ => None,
    }
}

fn observe_record(record: &Record) -> Option<Observer> {
    if let Some(id) = record.observer_id() {
        return Some(Observer { id });
    }
    if !conversion_allowed() || !record.is_extensible() || record.is_owner() {
        return None;
    }
    let id = new_observer();
    crate::macros::debug_warn!("attached observer {id:?}");
    // tag before walking, so cyclic structures terminate
    record.inner.ob.set(Some(id));
    let snapshot: Vec<(String, Value)> = record
        .inner
        .fields
        .borrow()
        .iter()
        .map(|(key, slot)| (key.clone(), slot.value.clone()))
        .collect();
    for (key, value) in snapshot {
        define_reactive(record, &key, value);
    }
    Some(Observer { id })
}

fn observe_seq(seq: &Seq) -> Option<Observer> {
    if let Some(id) = seq.observer_id() {
        return Some(Observer { id });
    }
    if !conversion_allowed() || !seq.is_extensible() {
        return None;
    }
    let id = new_observer();
    seq.inner.ob.set(Some(id));
    let items = seq.inner.items.borrow().clone();
    for item in &items {
        observe(item);
    }
    Some(Observer { id })
}

/// Observes `value` as the root of a scope's state, incrementing the
/// root-owner count that protects it from structural mutation through
/// [`set`]/[`del`]. Released when the owning scope is disposed.
pub fn observe_root(value: &Value) -> Option<Observer> {
    let ob = observe(value)?;
    with_runtime(|runtime| {
        if let Some(state) = runtime.observers.borrow().get(ob.id) {
            state.root_count.set(state.root_count.get() + 1);
        }
    });
    Some(ob)
}

pub(crate) fn release_root(id: ObserverId) {
    with_runtime(|runtime| {
        if let Some(state) = runtime.observers.borrow().get(id) {
            state.root_count.set(state.root_count.get().saturating_sub(1));
        }
    });
}

/// Installs `key` as a reactive field on `record`, eagerly observing its
/// initial value. This is what [`observe`] calls for every existing key;
/// the state-initialization layer uses it directly to instrument fields one
/// at a time. Frozen records cannot be instrumented; the call is a silent
/// no-op.
pub fn define_reactive(record: &Record, key: &str, value: impl Into<Value>) {
    let value = value.into();
    if !record.is_extensible() {
        return;
    }
    let dep = Dep::new();
    let child_ob = observe(&value).map(|ob| ob.id);
    record.inner.fields.borrow_mut().insert(
        key.to_string(),
        FieldSlot {
            value,
            dep: Some(dep),
            child_ob,
        },
    );
}

impl Record {
    /// Reads a field, or `Null` if the key is absent.
    ///
    /// If the field is reactive and a computation is currently evaluating,
    /// the computation subscribes to the field's dependency, to the value's
    /// own identity dependency (if the value is observed), and, for
    /// sequence values, to each element's identity dependency, one level
    /// deep.
    pub fn get(&self, key: &str) -> Value {
        let (value, dep, child_ob) = {
            let fields = self.inner.fields.borrow();
            match fields.get(key) {
                Some(slot) => (slot.value.clone(), slot.dep.clone(), slot.child_ob),
                None => return Value::Null,
            }
        };
        if let Some(dep) = dep {
            if with_runtime(|runtime| runtime.has_target()) {
                dep.depend();
                if let Some(child) = child_ob {
                    if let Some(child_dep) = observer_dep(child) {
                        child_dep.depend();
                    }
                }
                if let Value::Seq(seq) = &value {
                    depend_seq_elements(seq);
                }
            }
        }
        value
    }

    /// Writes a field.
    ///
    /// On a reactive field this is the instrumented setter: a write that is
    /// reference-or-primitive equal to the current value is a no-op; any
    /// other write stores the value, re-observes it, and notifies the
    /// field's dependency. On a plain field (or a new key) it is a plain
    /// write; new keys do *not* become reactive this way, use [`set`] for
    /// that.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        let dep = {
            let mut fields = self.inner.fields.borrow_mut();
            match fields.get_mut(&key) {
                Some(slot) => {
                    if slot.value.same(&value) {
                        return;
                    }
                    slot.value = value.clone();
                    slot.dep.clone()
                }
                None => {
                    fields.insert(key.clone(), FieldSlot::plain(value.clone()));
                    None
                }
            }
        };
        if let Some(dep) = dep {
            // refresh the cached observer for the new value
            let child_ob = observe(&value).map(|ob| ob.id);
            if let Some(slot) = self.inner.fields.borrow_mut().get_mut(&key) {
                slot.child_ob = child_ob;
            }
            dep.notify();
        }
    }

    /// Subscribes the active computation to this record's identity
    /// dependency, for consumers that hold the record directly rather than
    /// reading it out of a parent field.
    pub fn track(&self) {
        if let Some(id) = self.observer_id() {
            Observer { id }.track();
        }
    }
}

impl Seq {
    /// See [`Record::track`].
    pub fn track(&self) {
        if let Some(id) = self.observer_id() {
            Observer { id }.track();
        }
    }
}

fn depend_seq_elements(seq: &Seq) {
    let items = seq.inner.items.borrow().clone();
    for item in &items {
        let ob = match item {
            Value::Record(record) => record.observer_id(),
            Value::Seq(seq) => seq.observer_id(),
            _ => None,
        };
        if let Some(id) = ob {
            if let Some(dep) = observer_dep(id) {
                dep.depend();
            }
        }
    }
}

/// A record key or sequence index, for the structural mutation API.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldKey {
    Name(String),
    Index(usize),
}

impl From<&str> for FieldKey {
    fn from(key: &str) -> Self {
        FieldKey::Name(key.to_string())
    }
}

impl From<String> for FieldKey {
    fn from(key: String) -> Self {
        FieldKey::Name(key)
    }
}

impl From<usize> for FieldKey {
    fn from(index: usize) -> Self {
        FieldKey::Index(index)
    }
}

/// Sets a key on a record or an index on a sequence *reactively*.
///
/// Plain assignment cannot make a key added after observation reactive,
/// because instrumentation happens at definition time; this is the
/// escape hatch. On a sequence it delegates to the intercepted splice. On a
/// record: an existing key is plain assignment (already reactive if
/// instrumented); a new key on an unobserved record stays plain; a new key
/// on an observed record is installed as a reactive field and the record's
/// identity dependency is notified, so deep and structural watchers fire.
///
/// Mutating protected root state is refused with a warning.
pub fn set(target: &Value, key: impl Into<FieldKey>, value: impl Into<Value>) {
    let value = value.into();
    match (target, key.into()) {
        (Value::Seq(seq), FieldKey::Index(index)) => {
            seq.splice(index, 1, [value]);
        }
        (Value::Record(record), FieldKey::Name(key)) => set_record_key(record, &key, value),
        (_, key) => {
            tracing::warn!("cannot set {key:?} on a primitive or mismatched target");
        }
    }
}

fn set_record_key(record: &Record, key: &str, value: Value) {
    if record.contains_key(key) {
        record.insert(key, value);
        return;
    }
    let ob = record.observer_id();
    let protected =
        record.is_owner() || ob.map(|id| observer_root_count(id) > 0).unwrap_or(false);
    if protected {
        tracing::warn!(
            "avoid adding reactive key \"{key}\" to root state at runtime; declare it up front"
        );
        return;
    }
    let Some(ob) = ob else {
        // never observed: stays a plain record
        record.insert(key, value);
        return;
    };
    define_reactive(record, key, value);
    if let Some(dep) = observer_dep(ob) {
        dep.notify();
    }
}

/// Deletes a key from a record (or removes an index from a sequence)
/// *reactively*: structural watchers of an observed record are notified.
/// Mirrors [`set`], including the protected-root-state refusal.
pub fn del(target: &Value, key: impl Into<FieldKey>) {
    match (target, key.into()) {
        (Value::Seq(seq), FieldKey::Index(index)) => {
            seq.splice(index, 1, Vec::new());
        }
        (Value::Record(record), FieldKey::Name(key)) => del_record_key(record, &key),
        (_, key) => {
            tracing::warn!("cannot delete {key:?} from a primitive or mismatched target");
        }
    }
}

fn del_record_key(record: &Record, key: &str) {
    let ob = record.observer_id();
    let protected =
        record.is_owner() || ob.map(|id| observer_root_count(id) > 0).unwrap_or(false);
    if protected {
        tracing::warn!("avoid deleting key \"{key}\" from root state; set it to null instead");
        return;
    }
    if !record.contains_key(key) {
        return;
    }
    record.remove(key);
    let Some(ob) = ob else {
        return;
    };
    if let Some(dep) = observer_dep(ob) {
        dep.notify();
    }
}

/// Runs `f` with reactive conversion disabled: values first observed inside
/// it stay plain. Used when initializing state that must not be converted,
/// e.g. values passed down from a tree another owner already instruments.
pub fn without_conversion<T>(f: impl FnOnce() -> T) -> T {
    let prev = with_runtime(|runtime| {
        let prev = runtime.convert_enabled.get();
        runtime.convert_enabled.set(false);
        prev
    });
    let value = f();
    with_runtime(|runtime| runtime.convert_enabled.set(prev));
    value
}

/// Server rendering produces a string once and throws the state away, so
/// conversion is skipped entirely while this is set.
pub fn set_server_rendering(on: bool) {
    with_runtime(|runtime| runtime.server_rendering.set(on));
}

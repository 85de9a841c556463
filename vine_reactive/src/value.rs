use crate::{dep::Dep, runtime::ObserverId};
use indexmap::IndexMap;
use std::{
    cell::{Cell, RefCell},
    fmt,
    rc::Rc,
};

/// A dynamic value in an observed state tree.
///
/// Records and sequences are reference types: cloning a [`Value`] clones a
/// handle, not the data, and equality between two records or sequences is
/// pointer identity, mirroring how mutable values behave in the view layer
/// that consumes this crate. Primitives compare by value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    Record(Record),
    Seq(Seq),
}

impl Value {
    /// Reference-or-primitive equality: the comparison used to decide
    /// whether a write actually changed a field.
    ///
    /// Floats use `==`, so `NaN` never equals itself and a `NaN`-over-`NaN`
    /// write still notifies.
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                *a as f64 == *b
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Record(a), Value::Record(b)) => Record::ptr_eq(a, b),
            (Value::Seq(a), Value::Seq(b)) => Seq::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Records and sequences can mutate internally without changing
    /// identity, so they are always treated as possibly-changed.
    pub fn is_compound(&self) -> bool {
        matches!(self, Value::Record(_) | Value::Seq(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_seq(&self) -> Option<&Seq> {
        match self {
            Value::Seq(s) => Some(s),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.same(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Int(n) => write!(f, "Int({n})"),
            Value::Float(n) => write!(f, "Float({n})"),
            Value::Str(s) => write!(f, "Str({s:?})"),
            Value::Record(r) => r.fmt(f),
            Value::Seq(s) => s.fmt(f),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value.into())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(Rc::from(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(Rc::from(value))
    }
}

impl From<Record> for Value {
    fn from(value: Record) -> Self {
        Value::Record(value)
    }
}

impl From<Seq> for Value {
    fn from(value: Seq) -> Self {
        Value::Seq(value)
    }
}

/// One named property on a record. Before observation (and for keys added by
/// plain assignment afterwards) the slot is plain; observation gives it a
/// dedicated dependency and a cached observer for its current value.
pub(crate) struct FieldSlot {
    pub value: Value,
    pub dep: Option<Dep>,
    pub child_ob: Option<ObserverId>,
}

impl FieldSlot {
    pub fn plain(value: Value) -> Self {
        FieldSlot {
            value,
            dep: None,
            child_ob: None,
        }
    }
}

pub(crate) struct RecordInner {
    /// Insertion-ordered, like the object literals this models.
    pub fields: RefCell<IndexMap<String, FieldSlot>>,
    /// Hidden back-reference into the observer registry. Not part of the
    /// record's own enumerable shape.
    pub ob: Cell<Option<ObserverId>>,
    pub extensible: Cell<bool>,
    /// Set on records that *own* root state (not on the state itself);
    /// such records are never converted and refuse structural mutation.
    pub owner: Cell<bool>,
}

/// A shared, string-keyed mutable record.
///
/// Reads and writes go through [`Record::get`] and [`Record::insert`]; once
/// the record has been [observed](crate::observe), those accessors track and
/// notify the computations that use it.
#[derive(Clone, Default)]
pub struct Record {
    pub(crate) inner: Rc<RecordInner>,
}

impl Default for RecordInner {
    fn default() -> Self {
        RecordInner {
            fields: RefCell::new(IndexMap::new()),
            ob: Cell::new(None),
            extensible: Cell::new(true),
            owner: Cell::new(false),
        }
    }
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ptr_eq(a: &Record, b: &Record) -> bool {
        Rc::ptr_eq(&a.inner, &b.inner)
    }

    pub fn len(&self) -> usize {
        self.inner.fields.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.fields.borrow().is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.fields.borrow().contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.inner.fields.borrow().keys().cloned().collect()
    }

    /// Reads a field without subscribing anything, even mid-evaluation.
    pub fn get_untracked(&self, key: &str) -> Value {
        self.inner
            .fields
            .borrow()
            .get(key)
            .map(|slot| slot.value.clone())
            .unwrap_or(Value::Null)
    }

    /// Removes a key in place. This is the plain-deletion form: no watcher
    /// is notified, whether or not the record is observed. Use
    /// [`del`](crate::del) for tracked removal.
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.inner
            .fields
            .borrow_mut()
            .shift_remove(key)
            .map(|slot| slot.value)
    }

    /// Marks the record non-extensible: it will no longer be converted by
    /// [`observe`](crate::observe), and no new reactive fields can be
    /// installed on it.
    pub fn freeze(&self) {
        self.inner.extensible.set(false);
    }

    pub fn is_extensible(&self) -> bool {
        self.inner.extensible.get()
    }

    /// Marks the record as a framework owner of root state. Owners are
    /// exempt from conversion and protected from structural mutation; the
    /// composition layer sets this on its instance containers.
    pub fn mark_owner(&self) {
        self.inner.owner.set(true);
    }

    pub fn is_owner(&self) -> bool {
        self.inner.owner.get()
    }

    pub(crate) fn observer_id(&self) -> Option<ObserverId> {
        self.inner.ob.get()
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("fields", &self.len())
            .finish()
    }
}

pub(crate) struct SeqInner {
    pub items: RefCell<Vec<Value>>,
    pub ob: Cell<Option<ObserverId>>,
    pub extensible: Cell<bool>,
}

/// A shared, mutable sequence.
///
/// Structural changes must go through the in-place mutators (`push`, `pop`,
/// `splice`, …), which notify the sequence's identity dependency once it has
/// been observed. Indexed reads do not subscribe: index-level tracking is
/// unsupported, and any structural mutation notifies every subscriber of the
/// whole sequence.
#[derive(Clone, Default)]
pub struct Seq {
    pub(crate) inner: Rc<SeqInner>,
}

impl Default for SeqInner {
    fn default() -> Self {
        SeqInner {
            items: RefCell::new(Vec::new()),
            ob: Cell::new(None),
            extensible: Cell::new(true),
        }
    }
}

impl Seq {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ptr_eq(a: &Seq, b: &Seq) -> bool {
        Rc::ptr_eq(&a.inner, &b.inner)
    }

    pub fn len(&self) -> usize {
        self.inner.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.items.borrow().is_empty()
    }

    /// Reads one element, or `Null` out of range.
    pub fn get(&self, index: usize) -> Value {
        self.inner
            .items
            .borrow()
            .get(index)
            .cloned()
            .unwrap_or(Value::Null)
    }

    /// Snapshot of the current elements.
    pub fn to_vec(&self) -> Vec<Value> {
        self.inner.items.borrow().clone()
    }

    pub fn freeze(&self) {
        self.inner.extensible.set(false);
    }

    pub fn is_extensible(&self) -> bool {
        self.inner.extensible.get()
    }

    pub(crate) fn observer_id(&self) -> Option<ObserverId> {
        self.inner.ob.get()
    }
}

impl FromIterator<Value> for Seq {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Seq {
            inner: Rc::new(SeqInner {
                items: RefCell::new(iter.into_iter().collect()),
                ob: Cell::new(None),
                extensible: Cell::new(true),
            }),
        }
    }
}

impl fmt::Debug for Seq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Seq").field("len", &self.len()).finish()
    }
}

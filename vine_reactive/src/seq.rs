//! In-place sequence mutators.
//!
//! `Seq` is itself the interception layer: each mutator performs the plain
//! operation, observes any newly inserted elements, and notifies the
//! sequence's identity dependency. Non-mutating behavior (indexed reads,
//! length, iteration) is untouched; see `value.rs`.

use crate::{
    observer::{observe, observer_dep},
    value::{Seq, Value},
};
use std::cmp::Ordering;

impl Seq {
    /// Appends one element.
    pub fn push(&self, value: impl Into<Value>) {
        let value = value.into();
        self.inner.items.borrow_mut().push(value.clone());
        self.after_mutation(&[value]);
    }

    /// Appends any number of elements, notifying once.
    pub fn extend(&self, values: impl IntoIterator<Item = Value>) {
        let inserted: Vec<Value> = values.into_iter().collect();
        self.inner
            .items
            .borrow_mut()
            .extend(inserted.iter().cloned());
        self.after_mutation(&inserted);
    }

    /// Removes and returns the last element.
    pub fn pop(&self) -> Option<Value> {
        let removed = self.inner.items.borrow_mut().pop();
        self.after_mutation(&[]);
        removed
    }

    /// Removes and returns the first element.
    pub fn pop_front(&self) -> Option<Value> {
        let removed = {
            let mut items = self.inner.items.borrow_mut();
            if items.is_empty() {
                None
            } else {
                Some(items.remove(0))
            }
        };
        self.after_mutation(&[]);
        removed
    }

    /// Inserts one element at the front.
    pub fn push_front(&self, value: impl Into<Value>) {
        let value = value.into();
        self.inner.items.borrow_mut().insert(0, value.clone());
        self.after_mutation(&[value]);
    }

    /// Removes `delete_count` elements starting at `start` (both clamped to
    /// the current length) and inserts `items` in their place. Returns the
    /// removed elements.
    pub fn splice(
        &self,
        start: usize,
        delete_count: usize,
        items: impl IntoIterator<Item = Value>,
    ) -> Vec<Value> {
        let inserted: Vec<Value> = items.into_iter().collect();
        let removed: Vec<Value> = {
            let mut vec = self.inner.items.borrow_mut();
            let start = start.min(vec.len());
            let end = (start + delete_count).min(vec.len());
            vec.splice(start..end, inserted.iter().cloned()).collect()
        };
        self.after_mutation(&inserted);
        removed
    }

    /// Sorts in place with the given comparator. `Value` has no total
    /// order, so there is no comparator-less form.
    pub fn sort_by(&self, compare: impl FnMut(&Value, &Value) -> Ordering) {
        // sort on a snapshot, so a comparator that reads reactive state
        // cannot collide with the items borrow
        let mut items = self.inner.items.borrow().clone();
        items.sort_by(compare);
        *self.inner.items.borrow_mut() = items;
        self.after_mutation(&[]);
    }

    /// Reverses in place.
    pub fn reverse(&self) {
        self.inner.items.borrow_mut().reverse();
        self.after_mutation(&[]);
    }

    fn after_mutation(&self, inserted: &[Value]) {
        let Some(ob) = self.observer_id() else {
            return;
        };
        for value in inserted {
            observe(value);
        }
        if let Some(dep) = observer_dep(ob) {
            dep.notify();
        }
    }
}

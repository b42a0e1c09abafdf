//! Records - Observable keyed objects
//!
//! A record is a shared, ordered map of keys to values. Once bound, every
//! `set` on a bound key reconciles the output before returning.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use tether_dom::NodeId;

use crate::reconcile::{self, Binding, Slot};
use crate::{BindResult, Surface, Value};

/// Shared record handle; clones refer to the same record
#[derive(Clone, Default)]
pub struct Record(pub(crate) Rc<RecordCell>);

#[derive(Default)]
pub(crate) struct RecordCell {
    fields: RefCell<Vec<(Rc<str>, Value)>>,
    pub(crate) binding: RefCell<Option<Rc<Binding>>>,
}

impl Record {
    /// Create an empty, unbound record
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field assignment for data that has not been bound yet.
    ///
    /// This does not reconcile; use [`Record::set`] on bound records.
    pub fn with(self, key: &str, value: impl Into<Value>) -> Self {
        self.store(key, value.into());
        self
    }

    /// Read a field (null when absent)
    pub fn get(&self, key: &str) -> Value {
        self.0
            .fields
            .borrow()
            .iter()
            .find(|(k, _)| &**k == key)
            .map(|(_, v)| v.clone())
            .unwrap_or_default()
    }

    /// Whether a field exists
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.fields.borrow().iter().any(|(k, _)| &**k == key)
    }

    /// Field names in insertion order
    pub fn keys(&self) -> Vec<String> {
        self.0.fields.borrow().iter().map(|(k, _)| k.to_string()).collect()
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.0.fields.borrow().len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.0.fields.borrow().is_empty()
    }

    /// Assign a field, reconciling the output when the key is bound.
    ///
    /// The value is stored before reconciliation starts, so it stays
    /// assigned even if a callback fails.
    pub fn set(&self, surface: &mut dyn Surface, key: &str, value: impl Into<Value>) -> BindResult<()> {
        let value = value.into();
        let slot = self.slot(key);
        if let Some(slot) = &slot {
            reconcile::check_value(surface, slot, &value)?;
        }
        self.store(key, value.clone());
        match slot {
            Some(slot) => reconcile::apply(surface, &slot, value),
            None => Ok(()),
        }
    }

    /// Whether this record carries reconciliation state
    pub fn is_bound(&self) -> bool {
        self.0.binding.borrow().is_some()
    }

    /// Output node this record is bound to
    pub fn host(&self) -> Option<NodeId> {
        self.binding().map(|b| b.host)
    }

    /// Identity comparison
    pub fn ptr_eq(&self, other: &Record) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn store(&self, key: &str, value: Value) {
        let mut fields = self.0.fields.borrow_mut();
        match fields.iter_mut().find(|(k, _)| &**k == key) {
            Some((_, existing)) => *existing = value,
            None => fields.push((Rc::from(key), value)),
        }
    }

    pub(crate) fn binding(&self) -> Option<Rc<Binding>> {
        self.0.binding.borrow().clone()
    }

    pub(crate) fn slot(&self, key: &str) -> Option<Rc<Slot>> {
        let binding = self.binding()?;
        binding.slots.iter().find(|s| &*s.key() == key).cloned()
    }

    /// Whether this record was bound by `slot` (as a nested value)
    pub(crate) fn bound_by(&self, slot: &Rc<Slot>) -> bool {
        self.binding()
            .and_then(|b| b.origin.as_ref().and_then(Weak::upgrade))
            .is_some_and(|origin| Rc::ptr_eq(&origin, slot))
    }

    /// Whether this record was bound by `slot` onto `node`
    pub(crate) fn hosted_at(&self, slot: &Rc<Slot>, node: NodeId) -> bool {
        self.bound_by(slot) && self.host() == Some(node)
    }

    pub(crate) fn downgrade(&self) -> Weak<RecordCell> {
        Rc::downgrade(&self.0)
    }

    pub(crate) fn upgrade(cell: &Weak<RecordCell>) -> Option<Record> {
        cell.upgrade().map(Record)
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields = self.0.fields.borrow();
        let mut map = f.debug_map();
        for (key, value) in fields.iter() {
            map.entry(key, value);
        }
        map.finish()
    }
}

impl<K: AsRef<str>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let record = Record::new();
        for (key, value) in iter {
            record.store(key.as_ref(), value.into());
        }
        record
    }
}

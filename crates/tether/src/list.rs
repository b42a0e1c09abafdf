//! Lists - Observable sequences
//!
//! Once a list is assigned to a bound key, every mutation reconciles only
//! the indices it touches: `push`/`unshift`/`splice` build the inserted
//! items, `pop`/`shift` remove the boundary item, and the reordering
//! operations (`sort_by`, `reverse`, `fill`, `copy_within`) re-run the full
//! index-wise comparison.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Bound, Range, RangeBounds};
use std::rc::{Rc, Weak};

use crate::reconcile::{self, Slot};
use crate::{BindError, BindResult, Surface, Value};

/// Shared list handle; clones refer to the same list
#[derive(Clone, Default)]
pub struct List(pub(crate) Rc<ListCell>);

#[derive(Default)]
pub(crate) struct ListCell {
    items: RefCell<Vec<Value>>,
    slot: RefCell<Option<Weak<Slot>>>,
}

impl List {
    /// Create an empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of items
    pub fn len(&self) -> usize {
        self.0.items.borrow().len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.0.items.borrow().is_empty()
    }

    /// Item at `index`
    pub fn get(&self, index: usize) -> Option<Value> {
        self.0.items.borrow().get(index).cloned()
    }

    /// Snapshot of the items
    pub fn to_vec(&self) -> Vec<Value> {
        self.0.items.borrow().clone()
    }

    /// Whether this list is assigned to a bound key
    pub fn is_bound(&self) -> bool {
        self.owner().is_some()
    }

    /// Identity comparison
    pub fn ptr_eq(&self, other: &List) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Append an item; returns the new length
    pub fn push(&self, surface: &mut dyn Surface, value: impl Into<Value>) -> BindResult<usize> {
        let value: Value = value.into();
        self.splice(surface, self.len(), 0, [value])?;
        Ok(self.len())
    }

    /// Append several items; returns the new length
    pub fn extend(
        &self,
        surface: &mut dyn Surface,
        values: impl IntoIterator<Item = Value>,
    ) -> BindResult<usize> {
        self.splice(surface, self.len(), 0, values)?;
        Ok(self.len())
    }

    /// Remove the last item
    pub fn pop(&self, surface: &mut dyn Surface) -> BindResult<Option<Value>> {
        let len = self.len();
        if len == 0 {
            return Ok(None);
        }
        Ok(self.splice(surface, len - 1, 1, Vec::<Value>::new())?.pop())
    }

    /// Remove the first item
    pub fn shift(&self, surface: &mut dyn Surface) -> BindResult<Option<Value>> {
        if self.is_empty() {
            return Ok(None);
        }
        Ok(self.splice(surface, 0, 1, Vec::<Value>::new())?.pop())
    }

    /// Prepend an item; returns the new length
    pub fn unshift(&self, surface: &mut dyn Surface, value: impl Into<Value>) -> BindResult<usize> {
        let value: Value = value.into();
        self.splice(surface, 0, 0, [value])?;
        Ok(self.len())
    }

    /// Insert an item before `index` (`index == len` appends)
    pub fn insert_at(&self, surface: &mut dyn Surface, index: usize, value: impl Into<Value>) -> BindResult<()> {
        let len = self.len();
        if index > len {
            return Err(BindError::IndexOutOfRange { index, len });
        }
        let value: Value = value.into();
        self.splice(surface, index, 0, [value])?;
        Ok(())
    }

    /// Remove the item at `index`
    pub fn remove_at(&self, surface: &mut dyn Surface, index: usize) -> BindResult<Value> {
        let len = self.len();
        if index >= len {
            return Err(BindError::IndexOutOfRange { index, len });
        }
        Ok(self.splice(surface, index, 1, Vec::<Value>::new())?.pop().unwrap_or_default())
    }

    /// Assign one index, reconciling only that position; returns the old item
    pub fn replace_at(&self, surface: &mut dyn Surface, index: usize, value: impl Into<Value>) -> BindResult<Value> {
        let value: Value = value.into();
        let len = self.len();
        if index >= len {
            return Err(BindError::IndexOutOfRange { index, len });
        }
        let owner = self.owner();
        if let Some(slot) = &owner {
            reconcile::check_items(surface, slot, std::slice::from_ref(&value))?;
        }
        let old = std::mem::replace(&mut self.0.items.borrow_mut()[index], value);
        if let Some(slot) = owner {
            reconcile::write_index(surface, &slot, index)?;
        }
        Ok(old)
    }

    /// Remove `delete_count` items at `start` and insert `values` there.
    ///
    /// Out-of-range bounds are clamped. Returns the removed items.
    pub fn splice(
        &self,
        surface: &mut dyn Surface,
        start: usize,
        delete_count: usize,
        values: impl IntoIterator<Item = Value>,
    ) -> BindResult<Vec<Value>> {
        let values: Vec<Value> = values.into_iter().collect();
        let owner = self.owner();
        if let Some(slot) = &owner {
            reconcile::check_items(surface, slot, &values)?;
        }

        let inserted = values.len();
        let (start, removed) = {
            let mut items = self.0.items.borrow_mut();
            let start = start.min(items.len());
            let end = start + delete_count.min(items.len() - start);
            let removed: Vec<Value> = items.splice(start..end, values).collect();
            (start, removed)
        };

        if let Some(slot) = owner {
            tracing::trace!("splice at {}: -{} +{}", start, removed.len(), inserted);
            reconcile::splice(surface, &slot, start, removed.len(), inserted)?;
        }
        Ok(removed)
    }

    /// Shorten the list to `len` items
    pub fn truncate(&self, surface: &mut dyn Surface, len: usize) -> BindResult<()> {
        let current = self.len();
        if len < current {
            self.splice(surface, len, current - len, Vec::<Value>::new())?;
        }
        Ok(())
    }

    /// Sort in place, then re-run the full comparison
    pub fn sort_by(
        &self,
        surface: &mut dyn Surface,
        compare: impl FnMut(&Value, &Value) -> Ordering,
    ) -> BindResult<()> {
        self.reorder(surface, |items| items.sort_by(compare))
    }

    /// Reverse in place, then re-run the full comparison
    pub fn reverse(&self, surface: &mut dyn Surface) -> BindResult<()> {
        self.reorder(surface, |items| items.reverse())
    }

    /// Overwrite `range` with copies of `value`
    pub fn fill(
        &self,
        surface: &mut dyn Surface,
        value: impl Into<Value>,
        range: impl RangeBounds<usize>,
    ) -> BindResult<()> {
        let value: Value = value.into();
        if let Some(slot) = self.owner() {
            reconcile::check_items(surface, &slot, std::slice::from_ref(&value))?;
        }
        let range = clamp(range, self.len());
        self.reorder(surface, |items| {
            for item in &mut items[range] {
                *item = value.clone();
            }
        })
    }

    /// Copy the items in `source` to the position starting at `dest`,
    /// stopping at the end of the list
    pub fn copy_within(
        &self,
        surface: &mut dyn Surface,
        source: impl RangeBounds<usize>,
        dest: usize,
    ) -> BindResult<()> {
        let source = clamp(source, self.len());
        self.reorder(surface, |items| {
            let dest = dest.min(items.len());
            let chunk: Vec<Value> = items[source].to_vec();
            let count = chunk.len().min(items.len() - dest);
            items[dest..dest + count].clone_from_slice(&chunk[..count]);
        })
    }

    fn reorder(&self, surface: &mut dyn Surface, op: impl FnOnce(&mut Vec<Value>)) -> BindResult<()> {
        let owner = self.owner();
        if let Some(slot) = &owner {
            reconcile::check_surface(surface, slot)?;
        }
        op(&mut self.0.items.borrow_mut());
        match owner {
            Some(slot) => reconcile::rewrite(surface, &slot),
            None => Ok(()),
        }
    }

    /// The bound key this list is assigned to, if it is still alive
    pub(crate) fn owner(&self) -> Option<Rc<Slot>> {
        self.0.slot.borrow().as_ref().and_then(Weak::upgrade)
    }

    pub(crate) fn attach(&self, slot: &Rc<Slot>) {
        *self.0.slot.borrow_mut() = Some(Rc::downgrade(slot));
    }

    /// Forget `slot` if it is the current owner
    pub(crate) fn detach(&self, slot: &Rc<Slot>) {
        let mut current = self.0.slot.borrow_mut();
        if current
            .as_ref()
            .and_then(Weak::upgrade)
            .is_some_and(|owner| Rc::ptr_eq(&owner, slot))
        {
            *current = None;
        }
    }
}

fn clamp(range: impl RangeBounds<usize>, len: usize) -> Range<usize> {
    let start = match range.start_bound() {
        Bound::Included(&s) => s,
        Bound::Excluded(&s) => s.saturating_add(1),
        Bound::Unbounded => 0,
    };
    let end = match range.end_bound() {
        Bound::Included(&e) => e.saturating_add(1),
        Bound::Excluded(&e) => e,
        Bound::Unbounded => len,
    };
    let end = end.min(len);
    start.min(end)..end
}

impl From<Vec<Value>> for List {
    fn from(items: Vec<Value>) -> Self {
        let list = List::new();
        *list.0.items.borrow_mut() = items;
        list
    }
}

impl<V: Into<Value>> FromIterator<V> for List {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        List::from(iter.into_iter().map(Into::into).collect::<Vec<_>>())
    }
}

impl fmt::Debug for List {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.items.borrow().iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_dom::DomTree;

    fn letters(list: &List) -> String {
        list.to_vec().iter().map(Value::to_text).collect()
    }

    #[test]
    fn test_unbound_operations() {
        let mut tree = DomTree::new();
        let list: List = ["a", "b", "c"].into_iter().collect();
        assert_eq!(list.push(&mut tree, "d").unwrap(), 4);
        assert_eq!(list.shift(&mut tree).unwrap(), Some(Value::from("a")));
        assert_eq!(list.unshift(&mut tree, "z").unwrap(), 4);
        assert_eq!(letters(&list), "zbcd");
        assert_eq!(list.pop(&mut tree).unwrap(), Some(Value::from("d")));
        list.insert_at(&mut tree, 1, "y").unwrap();
        assert_eq!(letters(&list), "zybc");
        assert_eq!(list.remove_at(&mut tree, 0).unwrap(), Value::from("z"));
        assert!(!list.is_bound());
    }

    #[test]
    fn test_splice_clamps() {
        let mut tree = DomTree::new();
        let list: List = ["a", "b", "c"].into_iter().collect();
        let removed = list.splice(&mut tree, 1, 10, [Value::from("x")]).unwrap();
        assert_eq!(removed.len(), 2);
        assert_eq!(letters(&list), "ax");
        let removed = list.splice(&mut tree, 10, 1, [Value::from("y")]).unwrap();
        assert!(removed.is_empty());
        assert_eq!(letters(&list), "axy");
    }

    #[test]
    fn test_range_bounds_at_usize_max() {
        let mut tree = DomTree::new();
        let list: List = ["a", "b", "c"].into_iter().collect();
        list.fill(&mut tree, "x", 1..=usize::MAX).unwrap();
        assert_eq!(letters(&list), "axx");
        list.fill(&mut tree, "y", (Bound::Excluded(usize::MAX), Bound::Unbounded)).unwrap();
        assert_eq!(letters(&list), "axx");
        list.copy_within(&mut tree, ..=usize::MAX, 2).unwrap();
        assert_eq!(letters(&list), "axa");
        assert_eq!(clamp(..=usize::MAX, 3), 0..3);
        assert_eq!(clamp((Bound::Excluded(usize::MAX), Bound::Unbounded), 3), 3..3);
    }

    #[test]
    fn test_reordering() {
        let mut tree = DomTree::new();
        let list: List = ["c", "a", "b"].into_iter().collect();
        list.sort_by(&mut tree, |a, b| a.to_text().cmp(&b.to_text())).unwrap();
        assert_eq!(letters(&list), "abc");
        list.reverse(&mut tree).unwrap();
        assert_eq!(letters(&list), "cba");
        list.fill(&mut tree, "z", 1..).unwrap();
        assert_eq!(letters(&list), "czz");
    }

    #[test]
    fn test_copy_within() {
        let mut tree = DomTree::new();
        let list: List = ["a", "b", "c", "d", "e"].into_iter().collect();
        list.copy_within(&mut tree, 0..2, 3).unwrap();
        assert_eq!(letters(&list), "abcab");
        list.copy_within(&mut tree, 3.., 4).unwrap();
        assert_eq!(letters(&list), "abcaa");
    }

    #[test]
    fn test_index_errors() {
        let mut tree = DomTree::new();
        let list: List = ["a"].into_iter().collect();
        assert!(matches!(
            list.replace_at(&mut tree, 1, "b"),
            Err(BindError::IndexOutOfRange { index: 1, len: 1 })
        ));
        assert!(matches!(
            list.insert_at(&mut tree, 2, "b"),
            Err(BindError::IndexOutOfRange { index: 2, len: 1 })
        ));
        assert!(list.truncate(&mut tree, 5).is_ok());
        assert_eq!(list.len(), 1);
    }
}

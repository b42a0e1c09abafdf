//! Reconciliation Engine
//!
//! Every bound key of a record gets a [`Slot`]: the compiled plan for the
//! key, the instance it writes into and the per-index state (active nodes
//! and the values they were built from). A write normalizes the new value
//! to a list and compares it index by index against the previous values:
//!
//! - new null, previous set: remove (callback with null, detach unless
//!   retained)
//! - new set and different: replace (leaf nodes are reused in place,
//!   composite nodes are rebuilt)
//! - identical: nothing
//!
//! Nodes built during a pass are inserted afterwards, one run of
//! contiguous indices at a time, before the nearest surviving node at a
//! higher index or before the marker.
//!
//! No `RefCell` borrow is held while a callback runs, so callbacks may
//! write to other bound keys and those writes reconcile fully first.

use std::cell::RefCell;
use std::ops::Range;
use std::rc::{Rc, Weak};

use tether_dom::{DomError, NodeId};
use tracing::trace;

use crate::compile::{KeyPlan, Site, locate};
use crate::record::RecordCell;
use crate::{
    BindError, BindResult, Callback, Change, Compiled, List, Outcome, Path, Record, Segment, Surface, Value,
    apply_default,
};

/// Reconciliation state attached to a bound record
pub(crate) struct Binding {
    pub(crate) host: NodeId,
    pub(crate) slots: Vec<Rc<Slot>>,
    /// Slot that bound this record as a nested value
    pub(crate) origin: Option<Weak<Slot>>,
}

/// One bound key of one record
pub(crate) struct Slot {
    surface: u64,
    compiled: Rc<Compiled>,
    plan: usize,
    host: NodeId,
    anchors: Rc<[NodeId]>,
    owner: Weak<RecordCell>,
    root: Weak<RecordCell>,
    segments: Rc<[Segment]>,
    state: RefCell<SlotState>,
}

#[derive(Default)]
struct SlotState {
    active: Vec<Option<NodeId>>,
    previous: Vec<Value>,
    /// List currently assigned to the key
    list: Option<List>,
}

impl SlotState {
    fn ensure(&mut self, len: usize) {
        if self.active.len() < len {
            self.active.resize(len, None);
        }
        if self.previous.len() < len {
            self.previous.resize(len, Value::Null);
        }
    }
}

impl Slot {
    pub(crate) fn key(&self) -> Rc<str> {
        Rc::clone(&self.plan().key)
    }

    pub(crate) fn plan(&self) -> &KeyPlan {
        &self.compiled.plans()[self.plan]
    }

    pub(crate) fn anchors(&self) -> &Rc<[NodeId]> {
        &self.anchors
    }

    pub(crate) fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Nodes currently owned, by index
    pub(crate) fn active(&self) -> Vec<Option<NodeId>> {
        self.state.borrow().active.clone()
    }

    pub(crate) fn path(&self, index: Option<usize>) -> Path {
        let mut path = Path::new(self.root.clone(), self.owner.clone(), Rc::clone(&self.segments));
        path.set_index(index);
        path
    }

    /// Index reported in paths: only list values have one
    pub(crate) fn index(&self, i: usize) -> Option<usize> {
        self.state.borrow().list.is_some().then_some(i)
    }

    fn marker(&self) -> BindResult<NodeId> {
        match self.plan().site {
            Site::Marker { anchor, .. } => self
                .anchors
                .get(anchor)
                .copied()
                .ok_or_else(|| DomError::NotFound(self.host).into()),
            Site::Parent => Ok(self.host),
        }
    }
}

// ----------------------------------------------------------------------------
// Validation
// ----------------------------------------------------------------------------

pub(crate) fn check_surface(surface: &dyn Surface, slot: &Slot) -> BindResult<()> {
    if surface.id() != slot.surface {
        return Err(BindError::SurfaceMismatch);
    }
    Ok(())
}

/// Check a value about to be assigned to a bound key
pub(crate) fn check_value(surface: &dyn Surface, slot: &Rc<Slot>, value: &Value) -> BindResult<()> {
    check_surface(surface, slot)?;
    match value {
        Value::List(list) => {
            if list.owner().is_some_and(|owner| !Rc::ptr_eq(&owner, slot)) {
                return Err(BindError::Rebind { what: "list" });
            }
            let plan = slot.plan();
            if plan.nested.is_some() && plan.site == Site::Parent {
                return Err(BindError::TypeMismatch {
                    expected: "record",
                    found: "list",
                });
            }
            list.to_vec().iter().try_for_each(|item| check_item(slot, item))
        }
        other => check_item(slot, other),
    }
}

/// Check items about to be stored in the list assigned to `slot`
pub(crate) fn check_items(surface: &dyn Surface, slot: &Rc<Slot>, items: &[Value]) -> BindResult<()> {
    check_surface(surface, slot)?;
    items.iter().try_for_each(|item| check_item(slot, item))
}

fn check_item(slot: &Rc<Slot>, item: &Value) -> BindResult<()> {
    let Some(nested) = &slot.plan().nested else {
        return Ok(());
    };
    match item {
        Value::Null => Ok(()),
        // A record this key already holds may move to another index
        Value::Record(record) if record.is_bound() => {
            if record.bound_by(slot) {
                Ok(())
            } else {
                Err(BindError::Rebind { what: "record" })
            }
        }
        Value::Record(record) => validate_record(record, nested),
        other => Err(BindError::TypeMismatch {
            expected: "record",
            found: other.kind(),
        }),
    }
}

/// Check that an unbound record (and everything it will bind) can be bound
/// against `compiled`
pub(crate) fn validate_record(record: &Record, compiled: &Compiled) -> BindResult<()> {
    for plan in compiled.plans() {
        match record.get(&plan.key) {
            Value::List(list) => {
                if list.is_bound() {
                    return Err(BindError::Rebind { what: "list" });
                }
                if plan.nested.is_some() && plan.site == Site::Parent {
                    return Err(BindError::TypeMismatch {
                        expected: "record",
                        found: "list",
                    });
                }
                for item in list.to_vec() {
                    validate_fresh(plan, &item)?;
                }
            }
            other => validate_fresh(plan, &other)?,
        }
    }
    Ok(())
}

fn validate_fresh(plan: &KeyPlan, item: &Value) -> BindResult<()> {
    let Some(nested) = &plan.nested else {
        return Ok(());
    };
    match item {
        Value::Null => Ok(()),
        Value::Record(record) if record.is_bound() => Err(BindError::Rebind { what: "record" }),
        Value::Record(record) => validate_record(record, nested),
        other => Err(BindError::TypeMismatch {
            expected: "record",
            found: other.kind(),
        }),
    }
}

// ----------------------------------------------------------------------------
// Binding and teardown
// ----------------------------------------------------------------------------

/// Attach reconciliation state to `record` and write every bound field
#[allow(clippy::too_many_arguments)]
pub(crate) fn bind_record(
    surface: &mut dyn Surface,
    record: &Record,
    compiled: &Rc<Compiled>,
    host: NodeId,
    anchors: Rc<[NodeId]>,
    origin: Option<Weak<Slot>>,
    root: Weak<RecordCell>,
    base: &[Segment],
) -> BindResult<()> {
    let slots = install(surface.id(), record, compiled, host, anchors, origin, root, base);
    for slot in &slots {
        let value = record.get(&slot.plan().key);
        apply(surface, slot, value)?;
    }
    Ok(())
}

/// Give `record` empty slots for every key of `compiled`
#[allow(clippy::too_many_arguments)]
pub(crate) fn install(
    surface: u64,
    record: &Record,
    compiled: &Rc<Compiled>,
    host: NodeId,
    anchors: Rc<[NodeId]>,
    origin: Option<Weak<Slot>>,
    root: Weak<RecordCell>,
    base: &[Segment],
) -> Vec<Rc<Slot>> {
    let slots: Vec<Rc<Slot>> = compiled
        .plans()
        .iter()
        .enumerate()
        .map(|(index, plan)| {
            let mut segments = base.to_vec();
            segments.push(Segment::Key(Rc::clone(&plan.key)));
            Rc::new(Slot {
                surface,
                compiled: Rc::clone(compiled),
                plan: index,
                host,
                anchors: Rc::clone(&anchors),
                owner: record.downgrade(),
                root: root.clone(),
                segments: segments.into(),
                state: RefCell::new(SlotState::default()),
            })
        })
        .collect();

    *record.0.binding.borrow_mut() = Some(Rc::new(Binding {
        host,
        slots: slots.clone(),
        origin,
    }));
    slots
}

/// Take over nodes that are already in the output: `active[i]` holds the
/// node built from `previous[i]`
pub(crate) fn adopt(slot: &Rc<Slot>, active: Vec<Option<NodeId>>, previous: Vec<Value>, list: Option<List>) {
    if let Some(list) = &list {
        list.attach(slot);
    }
    let mut state = slot.state.borrow_mut();
    state.active = active;
    state.previous = previous;
    state.list = list;
}

/// Remove everything a bound record put into the output, then release it
pub(crate) fn teardown(surface: &mut dyn Surface, record: &Record) -> BindResult<()> {
    let Some(binding) = record.binding() else {
        return Ok(());
    };
    for slot in &binding.slots {
        let plan = slot.plan();
        match (plan.site, &plan.nested) {
            (Site::Marker { .. }, _) => {
                let len = slot.state.borrow().active.len();
                for i in 0..len {
                    remove_index(surface, slot, i)?;
                }
            }
            (Site::Parent, Some(_)) => {
                let previous = slot.state.borrow().previous.first().cloned();
                if let Some(Value::Record(nested)) = previous {
                    if nested.bound_by(slot) {
                        teardown(surface, &nested)?;
                    }
                }
            }
            (Site::Parent, None) => {
                let previous = slot.state.borrow().previous.first().cloned().unwrap_or_default();
                if !previous.is_null() {
                    if let Some(change) = plan.branch.change_fn() {
                        let path = slot.path(None);
                        invoke(change, surface, slot.host, &Value::Null, &previous, &path)?;
                    }
                }
            }
        }
    }
    release(record);
    Ok(())
}

/// Drop the reconciliation state of `record` and of every record it bound
pub(crate) fn release(record: &Record) {
    let Some(binding) = record.0.binding.borrow_mut().take() else {
        return;
    };
    for slot in &binding.slots {
        let (list, values) = {
            let mut state = slot.state.borrow_mut();
            state.active.clear();
            (state.list.take(), std::mem::take(&mut state.previous))
        };
        if let Some(list) = list {
            list.detach(slot);
        }
        for value in values {
            if let Value::Record(nested) = value {
                if nested.bound_by(slot) {
                    release(&nested);
                }
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Writes
// ----------------------------------------------------------------------------

/// Reconcile a new value for the key of `slot`
pub(crate) fn apply(surface: &mut dyn Surface, slot: &Rc<Slot>, value: Value) -> BindResult<()> {
    if slot.plan().site == Site::Parent {
        return write_parent(surface, slot, value);
    }

    let new_list = match &value {
        Value::List(list) => Some(list.clone()),
        _ => None,
    };
    let old_list = slot.state.borrow_mut().list.take();
    if let Some(old) = old_list {
        old.detach(slot);
    }
    if let Some(list) = &new_list {
        list.attach(slot);
    }
    slot.state.borrow_mut().list = new_list;

    let items = match value {
        Value::Null => Vec::new(),
        Value::List(list) => list.to_vec(),
        other => vec![other],
    };
    write_full(surface, slot, &items)
}

/// Bound-to-parent write: mutates the host, never inserts or removes nodes
fn write_parent(surface: &mut dyn Surface, slot: &Rc<Slot>, value: Value) -> BindResult<()> {
    let previous = {
        let mut state = slot.state.borrow_mut();
        let previous = state.previous.first().cloned().unwrap_or_default();
        if previous.same(&value) {
            return Ok(());
        }
        state.previous = vec![value.clone()];
        previous
    };

    let plan = slot.plan();
    let path = slot.path(None);
    match &plan.nested {
        Some(nested) => {
            if let Value::Record(old) = &previous {
                if old.bound_by(slot) {
                    teardown(surface, old)?;
                }
            }
            if let Value::Record(record) = &value {
                release(record);
                bind_record(
                    surface,
                    record,
                    nested,
                    slot.host,
                    Rc::clone(&slot.anchors),
                    Some(Rc::downgrade(slot)),
                    slot.root.clone(),
                    &slot.segments,
                )?;
            }
            if let Some(mount) = plan.branch.mount_fn() {
                invoke(mount, surface, slot.host, &value, &previous, &path)?;
            }
        }
        None => {
            if let Some(change) = plan.branch.change_fn() {
                invoke(change, surface, slot.host, &value, &previous, &path)?;
            }
        }
    }
    Ok(())
}

/// Full index-wise comparison against `items`
fn write_full(surface: &mut dyn Surface, slot: &Rc<Slot>, items: &[Value]) -> BindResult<()> {
    let len = {
        let mut state = slot.state.borrow_mut();
        let len = state.previous.len().max(items.len());
        state.ensure(len);
        len
    };

    let result = reconcile_range(surface, slot, 0..len, items);

    // Indices past the new end have been removed; on error keep whatever
    // still holds a node
    let mut state = slot.state.borrow_mut();
    let keep = state
        .active
        .iter()
        .rposition(Option::is_some)
        .map_or(0, |last| last + 1)
        .max(items.len())
        .min(state.active.len());
    state.active.truncate(keep);
    state.previous.truncate(keep);
    result
}

/// Reconcile a splice of the list assigned to `slot`: `removed` items at
/// `start` were replaced by `inserted` new ones
pub(crate) fn splice(
    surface: &mut dyn Surface,
    slot: &Rc<Slot>,
    start: usize,
    removed: usize,
    inserted: usize,
) -> BindResult<()> {
    let len = slot.state.borrow().active.len();
    let start = start.min(len);
    let end = (start + removed).min(len);

    let mut result = Ok(());
    for i in start..end {
        if let Err(err) = remove_index(surface, slot, i) {
            result = Err(err);
            break;
        }
    }
    {
        let mut state = slot.state.borrow_mut();
        let start = start.min(state.active.len());
        let end = end.min(state.active.len());
        state.active.splice(start..end, std::iter::repeat_n(None, inserted));
        state.previous.splice(start..end, std::iter::repeat_n(Value::Null, inserted));
    }
    result?;

    let items = slot.state.borrow().list.as_ref().map(List::to_vec).unwrap_or_default();
    reconcile_range(surface, slot, start..start + inserted, &items)
}

/// Reconcile a single index of the list assigned to `slot`
pub(crate) fn write_index(surface: &mut dyn Surface, slot: &Rc<Slot>, index: usize) -> BindResult<()> {
    let items = slot.state.borrow().list.as_ref().map(List::to_vec).unwrap_or_default();
    slot.state.borrow_mut().ensure(index + 1);
    reconcile_range(surface, slot, index..index + 1, &items)
}

/// Re-run the full comparison after an in-place reorder
pub(crate) fn rewrite(surface: &mut dyn Surface, slot: &Rc<Slot>) -> BindResult<()> {
    let items = slot.state.borrow().list.as_ref().map(List::to_vec).unwrap_or_default();
    write_full(surface, slot, &items)
}

/// Work collected during one pass
#[derive(Default)]
struct Pass {
    /// Indices whose node was built in this pass, ascending
    fresh: Vec<usize>,
    mounts: Vec<Mount>,
    removed: usize,
    updated: usize,
}

struct Mount {
    index: usize,
    node: NodeId,
    value: Value,
    previous: Value,
}

fn reconcile_range(surface: &mut dyn Surface, slot: &Rc<Slot>, range: Range<usize>, items: &[Value]) -> BindResult<()> {
    let mut pass = Pass::default();
    let mut result = Ok(());
    for i in range {
        let value = items.get(i).cloned().unwrap_or_default();
        let previous = {
            let mut state = slot.state.borrow_mut();
            state.ensure(i + 1);
            state.previous[i].clone()
        };
        if value.same(&previous) {
            continue;
        }
        let step = if value.is_null() {
            pass.removed += 1;
            remove_index(surface, slot, i)
        } else {
            update_index(surface, slot, i, value, &mut pass)
        };
        if let Err(err) = step {
            result = Err(err);
            break;
        }
    }

    // Nodes already built are inserted even when the pass stopped early
    let attached = attach(surface, slot, &pass.fresh);
    trace!(
        key = %slot.key(),
        inserted = pass.fresh.len(),
        removed = pass.removed,
        updated = pass.updated,
        "reconciled"
    );
    result?;
    attached?;

    if let Some(mount) = slot.plan().branch.mount_fn().filter(|_| slot.plan().nested.is_some()) {
        for m in &pass.mounts {
            let path = slot.path(slot.index(m.index));
            invoke(mount, surface, m.node, &m.value, &m.previous, &path)?;
        }
    }
    Ok(())
}

/// Remove the node at index `i`, giving its callback a chance to retain it
fn remove_index(surface: &mut dyn Surface, slot: &Rc<Slot>, i: usize) -> BindResult<()> {
    let (node, previous) = {
        let mut state = slot.state.borrow_mut();
        state.ensure(i + 1);
        (state.active[i].take(), std::mem::take(&mut state.previous[i]))
    };
    let Some(node) = node else {
        return Ok(());
    };

    let plan = slot.plan();
    let callback = match plan.nested {
        Some(_) => plan.branch.mount_fn(),
        None => plan.branch.change_fn(),
    };
    let path = slot.path(slot.index(i));
    let outcome = match callback {
        Some(callback) => invoke(callback, surface, node, &Value::Null, &previous, &path),
        None => Ok(Outcome::Done),
    };

    if let Value::Record(record) = &previous {
        if record.hosted_at(slot, node) {
            release(record);
        }
    }
    if !matches!(outcome, Ok(Outcome::Retain)) {
        if let Some(parent) = surface.parent(node) {
            surface.remove_child(parent, node)?;
        }
    }
    outcome.map(|_| ())
}

/// Write a non-null value at index `i`
fn update_index(surface: &mut dyn Surface, slot: &Rc<Slot>, i: usize, value: Value, pass: &mut Pass) -> BindResult<()> {
    let plan = slot.plan();
    let Site::Marker { prototype, .. } = plan.site else {
        return Err(DomError::InvalidNodeType.into());
    };
    let path = slot.path(slot.index(i));

    let Some(nested) = &plan.nested else {
        // Leaf: reuse the node in place or build it from the prototype
        let (active, previous) = {
            let state = slot.state.borrow();
            (state.active[i], state.previous[i].clone())
        };
        let node = match active {
            Some(node) => node,
            None => {
                let node = surface.clone_template(slot.compiled.skeleton(), prototype)?;
                pass.fresh.push(i);
                node
            }
        };
        {
            let mut state = slot.state.borrow_mut();
            state.ensure(i + 1);
            state.active[i] = Some(node);
            state.previous[i] = value.clone();
        }
        if active.is_some() {
            pass.updated += 1;
        }
        return apply_change(surface, plan, node, &value, &previous, &path);
    };

    // Composite: always rebuilt
    let previous = slot.state.borrow().previous[i].clone();
    remove_index(surface, slot, i)?;

    let host = surface.clone_template(nested.skeleton(), nested.host())?;
    let anchors: Rc<[NodeId]> = locate(surface, host, nested.ordinals())?.into();
    {
        let mut state = slot.state.borrow_mut();
        state.ensure(i + 1);
        state.active[i] = Some(host);
        state.previous[i] = value.clone();
    }
    pass.fresh.push(i);

    if let Value::Record(record) = &value {
        // Moving within the same list: drop the old binding first
        release(record);
        let mut base = slot.segments.to_vec();
        if let Some(index) = path.index() {
            base.push(Segment::Index(index));
        }
        bind_record(
            surface,
            record,
            nested,
            host,
            anchors,
            Some(Rc::downgrade(slot)),
            slot.root.clone(),
            &base,
        )?;
    }
    pass.mounts.push(Mount {
        index: i,
        node: host,
        value,
        previous,
    });
    Ok(())
}

pub(crate) fn apply_change(
    surface: &mut dyn Surface,
    plan: &KeyPlan,
    node: NodeId,
    value: &Value,
    previous: &Value,
    path: &Path,
) -> BindResult<()> {
    let Some(change) = plan.branch.change_fn() else {
        apply_default(surface, node, value)?;
        return Ok(());
    };
    if let Outcome::Replace(replacement) = invoke(change, surface, node, value, previous, path)? {
        apply_default(surface, node, &replacement)?;
    }
    Ok(())
}

pub(crate) fn invoke(
    callback: &Callback,
    surface: &mut dyn Surface,
    node: NodeId,
    value: &Value,
    previous: &Value,
    path: &Path,
) -> BindResult<Outcome> {
    let callback = Rc::clone(callback);
    let mut change = Change {
        surface,
        node,
        value,
        previous,
        path,
    };
    callback(&mut change)
}

/// Insert the nodes built in this pass, highest run first, so every run
/// can use a node that is already in place as its reference
fn attach(surface: &mut dyn Surface, slot: &Rc<Slot>, fresh: &[usize]) -> BindResult<()> {
    if fresh.is_empty() {
        return Ok(());
    }
    let Site::Marker { last_in_parent, .. } = slot.plan().site else {
        return Ok(());
    };
    let marker = slot.marker()?;
    let parent = surface.parent(marker).ok_or(DomError::NotFound(marker))?;
    let config = slot.compiled.config();

    let mut end = fresh.len();
    while end > 0 {
        let mut start = end - 1;
        while start > 0 && fresh[start - 1] + 1 == fresh[start] {
            start -= 1;
        }
        let run = &fresh[start..end];
        let (nodes, reference) = {
            let state = slot.state.borrow();
            let nodes: Vec<NodeId> = run.iter().filter_map(|&i| state.active.get(i).copied().flatten()).collect();
            let after = run[run.len() - 1] + 1;
            let reference = state.active.get(after..).and_then(|rest| rest.iter().flatten().next().copied());
            (nodes, reference)
        };

        let at_end = reference.is_none()
            && last_in_parent
            && config.append_at_end
            && surface.next_sibling(marker).is_none();
        let reference = reference.unwrap_or(marker);

        let batch = if nodes.len() > 1 && config.batch_insertions {
            surface.create_fragment()
        } else {
            None
        };
        let pieces = match batch {
            Some(fragment) => {
                for &node in &nodes {
                    surface.append_child(fragment, node)?;
                }
                vec![fragment]
            }
            None => nodes,
        };
        for piece in pieces {
            if at_end {
                surface.append_child(parent, piece)?;
            } else {
                surface.insert_before(parent, piece, Some(reference))?;
            }
        }
        if at_end {
            surface.append_child(parent, marker)?;
        }
        end = start;
    }
    Ok(())
}

//! Rehydration - Binding records onto markup that is already there
//!
//! Markup produced by [`Engine::render`](crate::Engine::render), once parsed
//! into a live tree, can be taken over instead of rebuilt. The record is
//! first bound to a scratch instance of the skeleton, which shows the nodes
//! every key owns. Those nodes are matched key by key, in document order,
//! against the existing markup, and the record's state is rebuilt around
//! the matches. Existing nodes are reused; only markers are inserted.

use std::rc::{Rc, Weak};

use tether_dom::{DomError, DomTree, NodeId};

use crate::compile::{Compiled, Site};
use crate::reconcile::{Slot, adopt, apply_change, install, invoke};
use crate::record::RecordCell;
use crate::{BindError, BindResult, Record, Segment, Value};

/// One level of the scratch binding the existing markup is matched against
#[derive(Clone, Copy)]
pub(crate) struct Expected<'a> {
    pub(crate) tree: &'a DomTree,
    pub(crate) host: NodeId,
    pub(crate) record: &'a Record,
}

/// Rebuild the state of `record` on the existing nodes below `host`
#[allow(clippy::too_many_arguments)]
pub(crate) fn hydrate_record(
    tree: &mut DomTree,
    expected: Expected<'_>,
    record: &Record,
    compiled: &Rc<Compiled>,
    host: NodeId,
    shared: Option<Rc<[NodeId]>>,
    origin: Option<Weak<Slot>>,
    root: Weak<RecordCell>,
    base: &[Segment],
) -> BindResult<()> {
    let expected_slots = expected.record.binding().map(|b| b.slots.clone()).unwrap_or_default();

    // Parent-nested levels share their owner's markers
    let anchors = match shared {
        Some(anchors) => anchors,
        None => {
            let markers = expected_slots
                .first()
                .map(|slot| Rc::clone(slot.anchors()))
                .unwrap_or_else(|| Rc::from(Vec::new()));
            let mut anchors = Vec::with_capacity(markers.len());
            for (i, &marker) in markers.iter().enumerate() {
                let key = anchor_key(compiled, i).unwrap_or_else(|| Rc::from(""));
                anchors.push(place_marker(tree, expected, host, marker, &key)?);
            }
            anchors.into()
        }
    };

    let slots = install(tree.id(), record, compiled, host, Rc::clone(&anchors), origin, root.clone(), base);
    for (slot, expected_slot) in slots.iter().zip(&expected_slots) {
        let plan = slot.plan();
        let value = record.get(&plan.key);

        if plan.site == Site::Parent {
            adopt(slot, Vec::new(), vec![value.clone()], None);
            if value.is_null() {
                continue;
            }
            let path = slot.path(None);
            match (&plan.nested, &value, expected.record.get(&plan.key)) {
                (Some(nested), Value::Record(inner), Value::Record(expected_inner)) => {
                    let level = Expected {
                        record: &expected_inner,
                        ..expected
                    };
                    hydrate_record(
                        tree,
                        level,
                        inner,
                        nested,
                        host,
                        Some(Rc::clone(&anchors)),
                        Some(Rc::downgrade(slot)),
                        root.clone(),
                        slot.segments(),
                    )?;
                    if let Some(mount) = plan.branch.mount_fn() {
                        invoke(mount, tree, host, &value, &Value::Null, &path)?;
                    }
                }
                (Some(_), _, _) => {}
                (None, _, _) => {
                    if let Some(change) = plan.branch.change_fn() {
                        invoke(change, tree, host, &value, &Value::Null, &path)?;
                    }
                }
            }
            continue;
        }

        let expected_active = expected_slot.active();
        let active = match_nodes(tree, expected.tree, host, &plan.key, &expected_active)?;
        let items = items_of(&value);
        let previous = active
            .iter()
            .enumerate()
            .map(|(i, node)| match node {
                Some(_) => items.get(i).cloned().unwrap_or_default(),
                None => Value::Null,
            })
            .collect();
        adopt(slot, active.clone(), previous, value.as_list().cloned());

        let expected_items = items_of(&expected.record.get(&plan.key));
        for (i, node) in active.iter().enumerate() {
            let Some(node) = *node else {
                continue;
            };
            let item = items.get(i).cloned().unwrap_or_default();
            let path = slot.path(slot.index(i));
            let Some(nested) = &plan.nested else {
                apply_change(tree, plan, node, &item, &Value::Null, &path)?;
                continue;
            };

            let expected_node = expected_active.get(i).copied().flatten();
            if let (Value::Record(inner), Some(Value::Record(expected_inner)), Some(expected_node)) =
                (&item, expected_items.get(i), expected_node)
            {
                let mut segments = slot.segments().to_vec();
                if let Some(index) = path.index() {
                    segments.push(Segment::Index(index));
                }
                let level = Expected {
                    tree: expected.tree,
                    host: expected_node,
                    record: expected_inner,
                };
                hydrate_record(
                    tree,
                    level,
                    inner,
                    nested,
                    node,
                    None,
                    Some(Rc::downgrade(slot)),
                    root.clone(),
                    &segments,
                )?;
            }
            if let Some(mount) = plan.branch.mount_fn() {
                invoke(mount, tree, node, &item, &Value::Null, &path)?;
            }
        }
    }
    Ok(())
}

/// Find, in document order below `host`, a node equal to each expected one
fn match_nodes(
    tree: &DomTree,
    scratch: &DomTree,
    host: NodeId,
    key: &str,
    expected: &[Option<NodeId>],
) -> BindResult<Vec<Option<NodeId>>> {
    let wanted = expected.iter().flatten().count();
    let candidates: Vec<NodeId> = elements(tree, host).collect();
    let mut active = vec![None; expected.len()];
    let mut cursor = 0;
    let mut found = 0;
    for (i, node) in expected.iter().enumerate() {
        let Some(node) = *node else {
            continue;
        };
        let Some(offset) = candidates[cursor..]
            .iter()
            .position(|&candidate| tree.is_equal_node(candidate, scratch, node))
        else {
            return Err(BindError::Hydration {
                key: key.to_string(),
                expected: wanted,
                found,
            });
        };
        active[i] = Some(candidates[cursor + offset]);
        cursor += offset + 1;
        found += 1;
    }
    Ok(active)
}

/// Put a marker into the existing markup where `marker` sits in the scratch
/// instance, reusing a comment marker that survived serialization
fn place_marker(tree: &mut DomTree, expected: Expected<'_>, host: NodeId, marker: NodeId, key: &str) -> BindResult<NodeId> {
    let layout = || BindError::HydrationLayout { key: key.to_string() };
    let scratch = expected.tree;
    let scratch_parent = scratch.parent(marker).ok_or(DomError::NotFound(marker))?;
    let parent = counterpart(tree, expected, host, scratch_parent).ok_or_else(layout)?;

    if let Some(text) = scratch.comment_text(marker) {
        let existing = tree
            .child_ids(parent)
            .into_iter()
            .find(|&child| tree.comment_text(child) == Some(text));
        if let Some(existing) = existing {
            return Ok(existing);
        }
    }

    let reference = match sibling_element(scratch, marker, DomTree::prev_sibling) {
        Some(before) => {
            let before = counterpart(tree, expected, host, before).ok_or_else(layout)?;
            tree.next_sibling(before)
        }
        None => match sibling_element(scratch, marker, DomTree::next_sibling) {
            Some(after) => Some(counterpart(tree, expected, host, after).ok_or_else(layout)?),
            None => None,
        },
    };
    let created = match scratch.comment_text(marker) {
        Some(text) => tree.create_comment(text),
        None => tree.create_text(""),
    };
    tree.insert_before(parent, created, reference)?;
    Ok(created)
}

/// The existing node at the same element position as scratch `node`
fn counterpart(tree: &DomTree, expected: Expected<'_>, host: NodeId, node: NodeId) -> Option<NodeId> {
    if node == expected.host {
        return Some(host);
    }
    let index = elements(expected.tree, expected.host).position(|n| n == node)?;
    let found = elements(tree, host).nth(index)?;
    (tree.tag_name(found) == expected.tree.tag_name(node)).then_some(found)
}

fn sibling_element(tree: &DomTree, node: NodeId, step: fn(&DomTree, NodeId) -> Option<NodeId>) -> Option<NodeId> {
    let mut current = step(tree, node);
    while let Some(id) = current {
        if tree.tag_name(id).is_some() {
            return Some(id);
        }
        current = step(tree, id);
    }
    None
}

fn elements(tree: &DomTree, root: NodeId) -> impl Iterator<Item = NodeId> + '_ {
    tree.descendants(root).filter(move |&id| tree.tag_name(id).is_some())
}

fn items_of(value: &Value) -> Vec<Value> {
    match value {
        Value::Null => Vec::new(),
        Value::List(list) => list.to_vec(),
        other => vec![other.clone()],
    }
}

/// Key whose marker is anchor `anchor` of `compiled`'s instance
fn anchor_key(compiled: &Compiled, anchor: usize) -> Option<Rc<str>> {
    compiled.plans().iter().find_map(|plan| match plan.site {
        Site::Marker { anchor: a, .. } if a == anchor => Some(Rc::clone(&plan.key)),
        Site::Marker { .. } => None,
        Site::Parent => plan.nested.as_deref().and_then(|nested| anchor_key(nested, anchor)),
    })
}

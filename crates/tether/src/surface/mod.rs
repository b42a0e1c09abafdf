//! Surfaces - Where reconciled output lives
//!
//! Every mutation the reconciler performs goes through [`Surface`], so the
//! same compiled descriptor drives a live [`DomTree`](tether_dom::DomTree)
//! or a [`StringSurface`] that serializes on demand.

mod string;
mod tree;

pub use string::StringSurface;

use tether_dom::{DomResult, NodeId};

use crate::{Skeleton, Value};

/// Tree-construction capabilities used by the reconciler
pub trait Surface {
    /// Process-unique identity; a record only accepts writes through the
    /// surface it was bound on
    fn id(&self) -> u64;

    /// Deep-copy a skeleton node into this surface. The copy is detached.
    fn clone_template(&mut self, skeleton: &Skeleton, node: NodeId) -> DomResult<NodeId>;

    /// Create an empty fragment, if this surface supports them
    fn create_fragment(&mut self) -> Option<NodeId>;

    /// Insert `node` before `reference` (append when `None`); inserting a
    /// fragment moves its children
    fn insert_before(&mut self, parent: NodeId, node: NodeId, reference: Option<NodeId>) -> DomResult<()>;

    fn append_child(&mut self, parent: NodeId, node: NodeId) -> DomResult<()> {
        self.insert_before(parent, node, None)
    }

    fn remove_child(&mut self, parent: NodeId, node: NodeId) -> DomResult<()>;

    fn set_text_content(&mut self, node: NodeId, text: &str) -> DomResult<()>;

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) -> DomResult<()>;

    fn remove_attribute(&mut self, node: NodeId, name: &str) -> DomResult<()>;

    /// Set the value of a form control (`<textarea>` holds it as text)
    fn set_form_value(&mut self, node: NodeId, value: &str) -> DomResult<()> {
        if self.tag_name(node) == Some("textarea") {
            self.set_text_content(node, value)
        } else {
            self.set_attribute(node, "value", value)
        }
    }

    /// Set or clear the `checked` state
    fn set_checked(&mut self, node: NodeId, checked: bool) -> DomResult<()> {
        if checked {
            self.set_attribute(node, "checked", "")
        } else {
            self.remove_attribute(node, "checked")
        }
    }

    fn parent(&self, node: NodeId) -> Option<NodeId>;

    fn first_child(&self, node: NodeId) -> Option<NodeId>;

    fn next_sibling(&self, node: NodeId) -> Option<NodeId>;

    /// Number of skeleton nodes this node stands for in a pre-order walk.
    /// Opaque pre-serialized chunks stand for their whole subtree.
    fn span(&self, _node: NodeId) -> usize {
        1
    }

    /// Lowercase tag name of an element
    fn tag_name(&self, node: NodeId) -> Option<&str>;

    fn attribute(&self, node: NodeId, name: &str) -> Option<&str>;

    fn text_content(&self, node: NodeId) -> String;

    fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.attribute(node, "class")
            .is_some_and(|list| list.split_ascii_whitespace().any(|c| c == class))
    }

    fn add_class(&mut self, node: NodeId, class: &str) -> DomResult<()> {
        if self.has_class(node, class) {
            return Ok(());
        }
        let list = match self.attribute(node, "class") {
            Some(existing) if !existing.trim().is_empty() => format!("{} {}", existing.trim_end(), class),
            _ => class.to_string(),
        };
        self.set_attribute(node, "class", &list)
    }

    fn remove_class(&mut self, node: NodeId, class: &str) -> DomResult<()> {
        let Some(existing) = self.attribute(node, "class") else {
            return Ok(());
        };
        let list = existing
            .split_ascii_whitespace()
            .filter(|c| *c != class)
            .collect::<Vec<_>>()
            .join(" ");
        self.set_attribute(node, "class", &list)
    }
}

/// The default rule: form controls get their value or checked state, every
/// other node gets its text content
pub fn apply_default(surface: &mut dyn Surface, node: NodeId, value: &Value) -> DomResult<()> {
    let is_control = matches!(
        surface.tag_name(node),
        Some("input" | "select" | "textarea" | "progress")
    );
    if !is_control {
        return surface.set_text_content(node, &value.to_text());
    }

    let is_toggle = surface
        .attribute(node, "type")
        .is_some_and(|t| t.eq_ignore_ascii_case("checkbox") || t.eq_ignore_ascii_case("radio"));
    if is_toggle {
        surface.set_checked(node, value.truthy())
    } else {
        surface.set_form_value(node, &value.to_text())
    }
}

/// Pre-order successor of `node` that stays within `scope`, skipping the
/// children of `node`
pub(crate) fn following(surface: &dyn Surface, node: NodeId, scope: NodeId) -> Option<NodeId> {
    let mut current = node;
    loop {
        if current == scope {
            return None;
        }
        if let Some(next) = surface.next_sibling(current) {
            return Some(next);
        }
        current = surface.parent(current)?;
    }
}

//! String surface - Render bindings to markup without a live tree
//!
//! Nodes live in a flat arena like [`DomTree`](tether_dom::DomTree), but
//! static template content is kept as pre-serialized chunks: a chunk
//! stands for a whole subtree that no binding ever touches, so cloning a
//! template copies one string instead of every node below it.

use std::rc::Rc;

use tether_dom::{DomError, DomResult, NodeData, NodeId, allocate_tree_id};
use tether_html::{escape_text, is_raw_text, is_void, write_attribute};

use super::Surface;
use crate::Skeleton;

#[derive(Debug, Clone)]
enum Kind {
    Fragment,
    Element { tag: String, attrs: Vec<(String, String)> },
    Text(String),
    Comment(String),
    /// Pre-serialized static subtree
    Chunk { html: Rc<str>, span: usize },
}

/// Arena node with sibling links, so appends and removals stay O(1)
#[derive(Debug, Clone)]
struct VNode {
    parent: Option<NodeId>,
    first_child: Option<NodeId>,
    last_child: Option<NodeId>,
    prev_sibling: Option<NodeId>,
    next_sibling: Option<NodeId>,
    kind: Kind,
}

/// Output surface that builds markup strings
#[derive(Debug)]
pub struct StringSurface {
    id: u64,
    nodes: Vec<VNode>,
}

impl StringSurface {
    pub fn new() -> Self {
        Self {
            id: allocate_tree_id(),
            nodes: Vec::new(),
        }
    }

    /// Serialize a node including itself
    pub fn serialize(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_node(node, &mut out);
        out
    }

    /// Serialize the children of a node
    pub fn serialize_inner(&self, node: NodeId) -> String {
        let mut out = String::new();
        for child in self.children(node) {
            self.write_node(child, &mut out);
        }
        out
    }

    /// Create a detached element
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(Kind::Element {
            tag: tag.to_ascii_lowercase(),
            attrs: Vec::new(),
        })
    }

    /// Create a detached text node
    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push(Kind::Text(text.to_string()))
    }

    fn push(&mut self, kind: Kind) -> NodeId {
        let id = NodeId::from_index(self.nodes.len());
        self.nodes.push(VNode {
            parent: None,
            first_child: None,
            last_child: None,
            prev_sibling: None,
            next_sibling: None,
            kind,
        });
        id
    }

    fn node(&self, id: NodeId) -> DomResult<&VNode> {
        self.nodes.get(id.index()).ok_or(DomError::NotFound(id))
    }

    fn node_mut(&mut self, id: NodeId) -> DomResult<&mut VNode> {
        self.nodes.get_mut(id.index()).ok_or(DomError::NotFound(id))
    }

    fn is_ancestor_or_self(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.nodes.get(id.index()).and_then(|n| n.parent);
        }
        false
    }

    /// Children of `node` in order
    fn children(&self, node: NodeId) -> Children<'_> {
        Children {
            surface: self,
            next: self.nodes.get(node.index()).and_then(|n| n.first_child),
        }
    }

    fn unlink(&mut self, child: NodeId) {
        let Some(node) = self.nodes.get(child.index()) else {
            return;
        };
        let Some(parent) = node.parent else {
            return;
        };
        let (prev, next) = (node.prev_sibling, node.next_sibling);
        match prev {
            Some(prev) => self.nodes[prev.index()].next_sibling = next,
            None => self.nodes[parent.index()].first_child = next,
        }
        match next {
            Some(next) => self.nodes[next.index()].prev_sibling = prev,
            None => self.nodes[parent.index()].last_child = prev,
        }
        let node = &mut self.nodes[child.index()];
        node.parent = None;
        node.prev_sibling = None;
        node.next_sibling = None;
    }

    /// Link a detached `child` before `reference` (or last)
    fn link_before(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>) {
        let prev = match reference {
            Some(r) => self.nodes[r.index()].prev_sibling,
            None => self.nodes[parent.index()].last_child,
        };
        {
            let node = &mut self.nodes[child.index()];
            node.parent = Some(parent);
            node.prev_sibling = prev;
            node.next_sibling = reference;
        }
        match prev {
            Some(prev) => self.nodes[prev.index()].next_sibling = Some(child),
            None => self.nodes[parent.index()].first_child = Some(child),
        }
        match reference {
            Some(r) => self.nodes[r.index()].prev_sibling = Some(child),
            None => self.nodes[parent.index()].last_child = Some(child),
        }
    }

    /// Detach every child of `node`
    fn clear_children(&mut self, node: NodeId) {
        while let Some(child) = self.nodes.get(node.index()).and_then(|n| n.first_child) {
            self.unlink(child);
        }
    }

    fn copy_from(&mut self, skeleton: &Skeleton, node: NodeId) -> DomResult<NodeId> {
        if let Some(chunk) = skeleton.chunk(node) {
            return Ok(self.push(Kind::Chunk {
                html: Rc::clone(chunk.html()),
                span: chunk.span(),
            }));
        }

        let tree = skeleton.tree();
        let source = tree.get(node).ok_or(DomError::NotFound(node))?;
        let kind = match &source.data {
            NodeData::Document | NodeData::Fragment => Kind::Fragment,
            NodeData::Element(elem) => Kind::Element {
                tag: tree.resolve(elem.name).to_string(),
                attrs: elem
                    .attrs
                    .iter()
                    .map(|a| (tree.resolve(a.name).to_string(), a.value.clone()))
                    .collect(),
            },
            NodeData::Text(text) => Kind::Text(text.clone()),
            NodeData::Comment(text) => Kind::Comment(text.clone()),
        };
        let copy = self.push(kind);
        for child in tree.child_ids(node) {
            let child_copy = self.copy_from(skeleton, child)?;
            self.link_before(copy, child_copy, None);
        }
        Ok(copy)
    }

    fn write_node(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.nodes.get(id.index()) else {
            return;
        };
        match &node.kind {
            Kind::Fragment => {
                for child in self.children(id) {
                    self.write_node(child, out);
                }
            }
            Kind::Element { tag, attrs } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attrs {
                    write_attribute(name, value, out);
                }
                out.push('>');
                if is_void(tag) {
                    return;
                }
                if is_raw_text(tag) {
                    for child in self.children(id) {
                        if let Kind::Text(text) = &self.nodes[child.index()].kind {
                            out.push_str(text);
                        }
                    }
                } else {
                    for child in self.children(id) {
                        self.write_node(child, out);
                    }
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
            Kind::Text(text) => escape_text(text, out),
            Kind::Comment(text) => {
                out.push_str("<!--");
                out.push_str(text);
                out.push_str("-->");
            }
            Kind::Chunk { html, .. } => out.push_str(html),
        }
    }
}

/// Iterator over the children of a string surface node
struct Children<'a> {
    surface: &'a StringSurface,
    next: Option<NodeId>,
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.surface.nodes.get(current.index()).and_then(|n| n.next_sibling);
        Some(current)
    }
}

impl Default for StringSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl Surface for StringSurface {
    fn id(&self) -> u64 {
        self.id
    }

    fn clone_template(&mut self, skeleton: &Skeleton, node: NodeId) -> DomResult<NodeId> {
        self.copy_from(skeleton, node)
    }

    fn create_fragment(&mut self) -> Option<NodeId> {
        Some(self.push(Kind::Fragment))
    }

    fn insert_before(&mut self, parent: NodeId, node: NodeId, reference: Option<NodeId>) -> DomResult<()> {
        if !matches!(self.node(parent)?.kind, Kind::Fragment | Kind::Element { .. }) {
            return Err(DomError::HierarchyRequest);
        }
        let child = self.node(node)?;
        if self.is_ancestor_or_self(node, parent) {
            return Err(DomError::HierarchyRequest);
        }
        let is_fragment = matches!(child.kind, Kind::Fragment);

        let mut reference = reference;
        if reference == Some(node) {
            reference = self.next_sibling(node);
        }
        if let Some(r) = reference {
            if self.node(r)?.parent != Some(parent) {
                return Err(DomError::NotAChild(r));
            }
        }

        if is_fragment {
            while let Some(grandchild) = self.nodes[node.index()].first_child {
                self.unlink(grandchild);
                self.link_before(parent, grandchild, reference);
            }
            return Ok(());
        }

        self.unlink(node);
        self.link_before(parent, node, reference);
        Ok(())
    }

    fn remove_child(&mut self, parent: NodeId, node: NodeId) -> DomResult<()> {
        if self.node(node)?.parent != Some(parent) {
            return Err(DomError::NotAChild(node));
        }
        self.unlink(node);
        Ok(())
    }

    fn set_text_content(&mut self, node: NodeId, text: &str) -> DomResult<()> {
        match &mut self.node_mut(node)?.kind {
            Kind::Text(content) | Kind::Comment(content) => {
                *content = text.to_string();
                return Ok(());
            }
            Kind::Chunk { .. } => return Err(DomError::InvalidNodeType),
            Kind::Fragment | Kind::Element { .. } => {}
        }
        self.clear_children(node);
        if !text.is_empty() {
            let text_node = self.create_text(text);
            self.link_before(node, text_node, None);
        }
        Ok(())
    }

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) -> DomResult<()> {
        let Kind::Element { attrs, .. } = &mut self.node_mut(node)?.kind else {
            return Err(DomError::InvalidNodeType);
        };
        let name = name.to_ascii_lowercase();
        match attrs.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = value.to_string(),
            None => attrs.push((name, value.to_string())),
        }
        Ok(())
    }

    fn remove_attribute(&mut self, node: NodeId, name: &str) -> DomResult<()> {
        let Kind::Element { attrs, .. } = &mut self.node_mut(node)?.kind else {
            return Err(DomError::InvalidNodeType);
        };
        attrs.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        Ok(())
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node.index())?.parent
    }

    fn first_child(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node.index())?.first_child
    }

    fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node.index())?.next_sibling
    }

    fn span(&self, node: NodeId) -> usize {
        match self.nodes.get(node.index()).map(|n| &n.kind) {
            Some(Kind::Chunk { span, .. }) => *span,
            _ => 1,
        }
    }

    fn tag_name(&self, node: NodeId) -> Option<&str> {
        match &self.nodes.get(node.index())?.kind {
            Kind::Element { tag, .. } => Some(tag),
            _ => None,
        }
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        match &self.nodes.get(node.index())?.kind {
            Kind::Element { attrs, .. } => attrs
                .iter()
                .find(|(n, _)| n.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }

    fn text_content(&self, node: NodeId) -> String {
        let Some(v) = self.nodes.get(node.index()) else {
            return String::new();
        };
        match &v.kind {
            Kind::Text(text) | Kind::Comment(text) => text.clone(),
            // Opaque: a chunk's text is not tracked
            Kind::Chunk { .. } => String::new(),
            Kind::Fragment | Kind::Element { .. } => {
                let mut out = String::new();
                for child in self.children(node) {
                    if !matches!(self.nodes[child.index()].kind, Kind::Comment(_)) {
                        out.push_str(&self.text_content(child));
                    }
                }
                out
            }
        }
    }
}

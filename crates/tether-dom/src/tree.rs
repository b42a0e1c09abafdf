//! DOM Tree (arena-based allocation)
//!
//! Nodes are never freed: detaching a node only unlinks it, so a `NodeId`
//! stays valid (and keeps its identity) for the lifetime of the tree.

use crate::{
    allocate_tree_id, DomError, DomResult, InternedString, Node, NodeData, NodeId, Selector,
    StringInterner,
};

/// Arena-based DOM tree
#[derive(Debug)]
pub struct DomTree {
    id: u64,
    nodes: Vec<Node>,
    interner: StringInterner,
}

impl DomTree {
    /// Create a new tree holding only a document root
    pub fn new() -> Self {
        Self {
            id: allocate_tree_id(),
            nodes: vec![Node::document()],
            interner: StringInterner::new(),
        }
    }

    /// Process-unique identifier of this tree
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The document root
    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    /// Get a node by ID
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    /// Get a mutable node by ID
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.index())
    }

    fn node(&self, id: NodeId) -> DomResult<&Node> {
        self.get(id).ok_or(DomError::NotFound(id))
    }

    fn node_mut(&mut self, id: NodeId) -> DomResult<&mut Node> {
        self.nodes.get_mut(id.index()).ok_or(DomError::NotFound(id))
    }

    /// Number of nodes in the arena (attached or not)
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if tree is empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Access the string interner
    pub fn interner(&self) -> &StringInterner {
        &self.interner
    }

    /// Access the string interner mutably
    pub fn interner_mut(&mut self) -> &mut StringInterner {
        &mut self.interner
    }

    /// Resolve an interned name
    pub fn resolve(&self, name: InternedString) -> &str {
        self.interner.get(name)
    }

    fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    /// Create a detached element
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        let name = self.interner.intern(&tag.to_ascii_lowercase());
        self.push(Node::element(name))
    }

    /// Create a detached text node
    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push(Node::text(text))
    }

    /// Create a detached comment
    pub fn create_comment(&mut self, text: &str) -> NodeId {
        self.push(Node::comment(text))
    }

    /// Create an empty fragment
    pub fn create_fragment(&mut self) -> NodeId {
        self.push(Node::fragment())
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    /// Parent of a node
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.parent.to_option())
    }

    /// First child of a node
    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.first_child.to_option())
    }

    /// Last child of a node
    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.last_child.to_option())
    }

    /// Next sibling of a node
    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.next_sibling.to_option())
    }

    /// Previous sibling of a node
    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.prev_sibling.to_option())
    }

    /// Iterate over direct children
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = (NodeId, &Node)> {
        let mut next = self.get(id).map_or(NodeId::NONE, |n| n.first_child);
        std::iter::from_fn(move || {
            let current = next.to_option()?;
            let node = self.get(current)?;
            next = node.next_sibling;
            Some((current, node))
        })
    }

    /// Collect the IDs of direct children
    pub fn child_ids(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id).map(|(child, _)| child).collect()
    }

    /// Pre-order walk of every node below `root` (root excluded)
    pub fn descendants(&self, root: NodeId) -> Descendants<'_> {
        Descendants {
            tree: self,
            root,
            next: self.get(root).map_or(NodeId::NONE, |n| n.first_child),
        }
    }

    /// Whether `node` is `ancestor` or lies inside it
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Append a child node
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> DomResult<NodeId> {
        self.insert_before(parent, child, None)
    }

    /// Insert `child` before `reference` (or at the end when `None`).
    ///
    /// Inserting a fragment moves its children and leaves it empty.
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> DomResult<NodeId> {
        if !self.node(parent)?.is_container() {
            return Err(DomError::HierarchyRequest);
        }
        let child_node = self.node(child)?;
        if matches!(child_node.data, NodeData::Document) {
            return Err(DomError::InvalidNodeType);
        }
        if self.contains(child, parent) {
            return Err(DomError::HierarchyRequest);
        }
        let mut reference = reference;
        if reference == Some(child) {
            reference = self.next_sibling(child);
        }
        if let Some(r) = reference {
            if self.node(r)?.parent != parent {
                return Err(DomError::NotAChild(r));
            }
        }

        if child_node.is_fragment() {
            for grandchild in self.child_ids(child) {
                self.unlink(grandchild);
                self.link_before(parent, grandchild, reference);
            }
            return Ok(child);
        }

        self.unlink(child);
        self.link_before(parent, child, reference);
        Ok(child)
    }

    /// Remove a child node
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> DomResult<NodeId> {
        if self.node(child)?.parent != parent {
            return Err(DomError::NotAChild(child));
        }
        self.unlink(child);
        Ok(child)
    }

    /// Unlink a node from wherever it is attached
    pub fn detach(&mut self, child: NodeId) {
        self.unlink(child);
    }

    fn unlink(&mut self, child: NodeId) {
        let Some(node) = self.get(child) else {
            return;
        };
        let (parent, prev, next) = (node.parent, node.prev_sibling, node.next_sibling);
        if !parent.is_valid() {
            return;
        }

        if prev.is_valid() {
            self.nodes[prev.index()].next_sibling = next;
        } else {
            self.nodes[parent.index()].first_child = next;
        }
        if next.is_valid() {
            self.nodes[next.index()].prev_sibling = prev;
        } else {
            self.nodes[parent.index()].last_child = prev;
        }

        let node = &mut self.nodes[child.index()];
        node.parent = NodeId::NONE;
        node.prev_sibling = NodeId::NONE;
        node.next_sibling = NodeId::NONE;
    }

    fn link_before(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>) {
        let (prev, next) = match reference {
            Some(r) => (self.nodes[r.index()].prev_sibling, r),
            None => (self.nodes[parent.index()].last_child, NodeId::NONE),
        };

        {
            let node = &mut self.nodes[child.index()];
            node.parent = parent;
            node.prev_sibling = prev;
            node.next_sibling = next;
        }

        if prev.is_valid() {
            self.nodes[prev.index()].next_sibling = child;
        } else {
            self.nodes[parent.index()].first_child = child;
        }
        if next.is_valid() {
            self.nodes[next.index()].prev_sibling = child;
        } else {
            self.nodes[parent.index()].last_child = child;
        }
    }

    /// Deep-clone a subtree inside this tree. The clone is detached.
    pub fn clone_subtree(&mut self, node: NodeId) -> DomResult<NodeId> {
        let data = self.node(node)?.data.clone();
        let copy = self.push(Node { data, ..Node::fragment() });
        for child in self.child_ids(node) {
            let child_copy = self.clone_subtree(child)?;
            self.link_before(copy, child_copy, None);
        }
        Ok(copy)
    }

    /// Deep-copy a subtree from another tree into this one. The copy is
    /// detached; names are re-interned into this tree's interner.
    pub fn import_subtree(&mut self, source: &DomTree, node: NodeId) -> DomResult<NodeId> {
        let data = match &source.node(node)?.data {
            NodeData::Element(elem) => {
                let mut copy = elem.clone();
                copy.name = self.interner.intern(source.resolve(elem.name));
                for attr in copy.attrs.iter_mut() {
                    attr.name = self.interner.intern(source.resolve(attr.name));
                }
                NodeData::Element(copy)
            }
            // A document cannot be nested, so it comes across as a fragment
            NodeData::Document => NodeData::Fragment,
            other => other.clone(),
        };
        let copy = self.push(Node { data, ..Node::fragment() });
        for (child, _) in source.children(node) {
            let child_copy = self.import_subtree(source, child)?;
            self.link_before(copy, child_copy, None);
        }
        Ok(copy)
    }

    // ------------------------------------------------------------------
    // Element accessors
    // ------------------------------------------------------------------

    /// Lowercase tag name of an element
    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        let elem = self.get(id)?.as_element()?;
        Some(self.resolve(elem.name))
    }

    /// Read an attribute
    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        let name = self.interner.lookup(name)?;
        self.get(id)?.as_element()?.get_attr(name)
    }

    /// Set an attribute
    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) -> DomResult<()> {
        let name = self.interner.intern(name);
        let elem = self
            .node_mut(id)?
            .as_element_mut()
            .ok_or(DomError::InvalidNodeType)?;
        elem.set_attr(name, value.to_string());
        Ok(())
    }

    /// Remove an attribute (no-op when absent)
    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> DomResult<()> {
        let Some(name) = self.interner.lookup(name) else {
            return Ok(());
        };
        let elem = self
            .node_mut(id)?
            .as_element_mut()
            .ok_or(DomError::InvalidNodeType)?;
        elem.remove_attr(name);
        Ok(())
    }

    /// Whether the element's class list contains `class`
    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.attribute(id, "class")
            .is_some_and(|list| list.split_ascii_whitespace().any(|c| c == class))
    }

    /// Concatenated text of all descendant text nodes
    pub fn text_content(&self, id: NodeId) -> String {
        if let Some(text) = self.get(id).and_then(Node::as_text) {
            return text.to_string();
        }
        let mut out = String::new();
        for node in self.descendants(id) {
            if let Some(text) = self.get(node).and_then(Node::as_text) {
                out.push_str(text);
            }
        }
        out
    }

    /// Replace all children with a single text node
    pub fn set_text_content(&mut self, id: NodeId, text: &str) -> DomResult<()> {
        match &mut self.node_mut(id)?.data {
            NodeData::Text(content) | NodeData::Comment(content) => {
                *content = text.to_string();
                return Ok(());
            }
            _ => {}
        }

        // Reuse a lone text child instead of allocating a new one
        let children = self.child_ids(id);
        if let [only] = children.as_slice() {
            if let NodeData::Text(content) = &mut self.nodes[only.index()].data {
                if text.is_empty() {
                    self.unlink(*only);
                } else {
                    *content = text.to_string();
                }
                return Ok(());
            }
        }

        for child in children {
            self.unlink(child);
        }
        if !text.is_empty() {
            let text_node = self.create_text(text);
            self.link_before(id, text_node, None);
        }
        Ok(())
    }

    /// Text of a comment node
    pub fn comment_text(&self, id: NodeId) -> Option<&str> {
        match &self.get(id)?.data {
            NodeData::Comment(text) => Some(text),
            _ => None,
        }
    }

    // ------------------------------------------------------------------
    // Comparison
    // ------------------------------------------------------------------

    /// Structural equality with `other_id` in `other` (which may be this
    /// tree). Attribute order is ignored; empty text nodes are skipped and
    /// adjacent text compares as one run, so a subtree still equals itself
    /// after being serialized and parsed again.
    pub fn is_equal_node(&self, id: NodeId, other: &DomTree, other_id: NodeId) -> bool {
        let (Some(a), Some(b)) = (self.get(id), other.get(other_id)) else {
            return false;
        };
        match (&a.data, &b.data) {
            (NodeData::Element(x), NodeData::Element(y)) => {
                self.resolve(x.name) == other.resolve(y.name)
                    && x.attrs.len() == y.attrs.len()
                    && x.attrs.iter().all(|attr| {
                        let name = self.resolve(attr.name);
                        y.attrs
                            .iter()
                            .any(|o| other.resolve(o.name) == name && o.value == attr.value)
                    })
                    && self.children_equal(id, other, other_id)
            }
            (
                NodeData::Document | NodeData::Fragment,
                NodeData::Document | NodeData::Fragment,
            ) => self.children_equal(id, other, other_id),
            (NodeData::Text(x), NodeData::Text(y)) | (NodeData::Comment(x), NodeData::Comment(y)) => x == y,
            _ => false,
        }
    }

    fn children_equal(&self, id: NodeId, other: &DomTree, other_id: NodeId) -> bool {
        let ours = self.normalized_children(id);
        let theirs = other.normalized_children(other_id);
        ours.len() == theirs.len()
            && ours.iter().zip(&theirs).all(|pair| match pair {
                (Piece::Text(x), Piece::Text(y)) => x == y,
                (Piece::Node(x), Piece::Node(y)) => self.is_equal_node(*x, other, *y),
                _ => false,
            })
    }

    fn normalized_children(&self, id: NodeId) -> Vec<Piece> {
        let mut pieces = Vec::new();
        for (child, node) in self.children(id) {
            match &node.data {
                NodeData::Text(text) if text.is_empty() => {}
                NodeData::Text(text) => match pieces.last_mut() {
                    Some(Piece::Text(run)) => run.push_str(text),
                    _ => pieces.push(Piece::Text(text.clone())),
                },
                _ => pieces.push(Piece::Node(child)),
            }
        }
        pieces
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// First element below `scope` (pre-order) matching the selector
    pub fn query_selector(&self, scope: NodeId, selector: &Selector) -> Option<NodeId> {
        self.descendants(scope).find(|&id| selector.matches(self, id))
    }

    /// Every element below `scope` (pre-order) matching the selector
    pub fn query_selector_all(&self, scope: NodeId, selector: &Selector) -> Vec<NodeId> {
        self.descendants(scope)
            .filter(|&id| selector.matches(self, id))
            .collect()
    }
}

/// Child as seen by structural comparison
enum Piece {
    Text(String),
    Node(NodeId),
}

impl Default for DomTree {
    fn default() -> Self {
        Self::new()
    }
}

/// Pre-order iterator over the descendants of a node
pub struct Descendants<'a> {
    tree: &'a DomTree,
    root: NodeId,
    next: NodeId,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next.to_option()?;
        let node = self.tree.get(current)?;

        self.next = if node.first_child.is_valid() {
            node.first_child
        } else {
            let mut cursor = current;
            loop {
                if cursor == self.root {
                    break NodeId::NONE;
                }
                let Some(n) = self.tree.get(cursor) else {
                    break NodeId::NONE;
                };
                if n.next_sibling.is_valid() {
                    break n.next_sibling;
                }
                cursor = n.parent;
                if !cursor.is_valid() {
                    break NodeId::NONE;
                }
            }
        };

        Some(current)
    }
}

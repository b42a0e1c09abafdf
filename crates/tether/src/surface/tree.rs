//! Live tree surface

use tether_dom::{DomResult, DomTree, NodeId};

use super::Surface;
use crate::Skeleton;

impl Surface for DomTree {
    fn id(&self) -> u64 {
        DomTree::id(self)
    }

    fn clone_template(&mut self, skeleton: &Skeleton, node: NodeId) -> DomResult<NodeId> {
        self.import_subtree(skeleton.tree(), node)
    }

    fn create_fragment(&mut self) -> Option<NodeId> {
        Some(DomTree::create_fragment(self))
    }

    fn insert_before(&mut self, parent: NodeId, node: NodeId, reference: Option<NodeId>) -> DomResult<()> {
        DomTree::insert_before(self, parent, node, reference).map(|_| ())
    }

    fn remove_child(&mut self, parent: NodeId, node: NodeId) -> DomResult<()> {
        DomTree::remove_child(self, parent, node).map(|_| ())
    }

    fn set_text_content(&mut self, node: NodeId, text: &str) -> DomResult<()> {
        DomTree::set_text_content(self, node, text)
    }

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) -> DomResult<()> {
        DomTree::set_attribute(self, node, name, value)
    }

    fn remove_attribute(&mut self, node: NodeId, name: &str) -> DomResult<()> {
        DomTree::remove_attribute(self, node, name)
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        DomTree::parent(self, node)
    }

    fn first_child(&self, node: NodeId) -> Option<NodeId> {
        DomTree::first_child(self, node)
    }

    fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        DomTree::next_sibling(self, node)
    }

    fn tag_name(&self, node: NodeId) -> Option<&str> {
        DomTree::tag_name(self, node)
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        DomTree::attribute(self, node, name)
    }

    fn text_content(&self, node: NodeId) -> String {
        DomTree::text_content(self, node)
    }

    fn has_class(&self, node: NodeId, class: &str) -> bool {
        DomTree::has_class(self, node, class)
    }
}

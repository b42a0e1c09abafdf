//! Templates - Read-only source trees for compilation

use tether_dom::{DomTree, NodeId, Selector};
use tether_html::HtmlParser;

use crate::{BindError, BindResult};

/// A template: a private copy of the markup a descriptor is compiled
/// against. Compilation works on its own copy, so a template can be
/// compiled any number of times.
#[derive(Debug)]
pub struct Template {
    tree: DomTree,
    root: NodeId,
}

impl Template {
    /// Parse markup; the root is a fragment holding the top-level nodes
    pub fn parse(html: &str) -> BindResult<Self> {
        let (tree, root) = HtmlParser::new().parse_fragment(html)?;
        Ok(Self { tree, root })
    }

    /// Copy a subtree of an existing tree
    pub fn from_node(source: &DomTree, node: NodeId) -> BindResult<Self> {
        let mut tree = DomTree::new();
        let root = tree.import_subtree(source, node)?;
        Ok(Self { tree, root })
    }

    /// Copy the first element of the document `source` matching `selector`
    pub fn select(source: &DomTree, selector: &str) -> BindResult<Self> {
        let parsed = Selector::parse(selector)?;
        let node = source
            .query_selector(source.root(), &parsed)
            .ok_or_else(|| BindError::Resolution {
                key: String::new(),
                selector: selector.to_string(),
            })?;
        Self::from_node(source, node)
    }

    pub fn tree(&self) -> &DomTree {
        &self.tree
    }

    pub fn root(&self) -> NodeId {
        self.root
    }
}

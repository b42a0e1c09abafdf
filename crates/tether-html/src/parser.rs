//! HTML5 Parser implementation
//!
//! Uses html5ever's fragment parser with a `<template>` context element, so
//! any content a template may hold parses as written: table rows and cells,
//! options, columns. The RcDom result is converted into a detached fragment
//! of our tree, text nodes included.

use html5ever::tendril::TendrilSink;
use html5ever::{QualName, local_name, ns, parse_fragment};
use markup5ever_rcdom::{Handle, NodeData as RcNodeData, RcDom};
use tether_dom::{DomTree, NodeId};

use crate::ParseError;

/// HTML5 template parser
pub struct HtmlParser;

impl HtmlParser {
    /// Create a new HTML parser
    pub fn new() -> Self {
        Self
    }

    /// Parse markup into a new tree, returning it with its fragment root
    pub fn parse_fragment(&self, html: &str) -> Result<(DomTree, NodeId), ParseError> {
        let mut tree = DomTree::new();
        let root = self.parse_into(html, &mut tree)?;
        Ok((tree, root))
    }

    /// Parse markup into a detached fragment of an existing tree
    pub fn parse_into(&self, html: &str, tree: &mut DomTree) -> Result<NodeId, ParseError> {
        tracing::debug!("Parsing template ({} bytes)", html.len());

        let context = QualName::new(None, ns!(html), local_name!("template"));
        let dom = parse_fragment(RcDom::default(), Default::default(), context, Vec::new(), false)
            .from_utf8()
            .read_from(&mut html.as_bytes())?;

        let fragment = tree.create_fragment();
        for root in fragment_roots(&dom.document) {
            for child in root.children.borrow().iter() {
                self.convert_node(child, tree, fragment)?;
            }
        }

        if tree.first_child(fragment).is_none() {
            return Err(ParseError::Empty);
        }

        tracing::debug!("Parsed template into {} nodes", tree.descendants(fragment).count());
        Ok(fragment)
    }

    /// Convert an RcDom node into our tree
    fn convert_node(&self, handle: &Handle, tree: &mut DomTree, parent: NodeId) -> Result<(), ParseError> {
        match &handle.data {
            RcNodeData::Document => {
                for child in handle.children.borrow().iter() {
                    self.convert_node(child, tree, parent)?;
                }
            }
            RcNodeData::Text { contents } => {
                let id = tree.create_text(&contents.borrow());
                tree.append_child(parent, id)?;
            }
            RcNodeData::Comment { contents } => {
                let id = tree.create_comment(contents);
                tree.append_child(parent, id)?;
            }
            RcNodeData::Element {
                name,
                attrs,
                template_contents,
                ..
            } => {
                let id = tree.create_element(name.local.as_ref());
                for attr in attrs.borrow().iter() {
                    tree.set_attribute(id, attr.name.local.as_ref(), &attr.value)?;
                }
                tree.append_child(parent, id)?;

                // Nested <template> elements keep their content out of line
                let contents = template_contents.borrow();
                let children = contents.as_ref().unwrap_or(handle);
                for child in children.children.borrow().iter() {
                    self.convert_node(child, tree, id)?;
                }
            }
            RcNodeData::Doctype { .. } | RcNodeData::ProcessingInstruction { .. } => {}
        }
        Ok(())
    }
}

impl Default for HtmlParser {
    fn default() -> Self {
        Self::new()
    }
}

/// The `<html>` element html5ever places the fragment's nodes under
fn fragment_roots(document: &Handle) -> Vec<Handle> {
    document
        .children
        .borrow()
        .iter()
        .filter(|child| matches!(&child.data, RcNodeData::Element { name, .. } if name.local.as_ref() == "html"))
        .cloned()
        .collect()
}

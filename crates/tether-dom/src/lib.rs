//! Tether DOM - Document Object Model
//!
//! Arena-allocated node tree used both as the template store for compiled
//! descriptors and as the live output surface.

use std::sync::atomic::{AtomicU64, Ordering};

mod interner;
mod node;
mod selector;
mod tree;

pub use interner::{InternedString, StringInterner};
pub use node::{Attribute, ElementData, Node, NodeData};
pub use selector::{Selector, SelectorError};
pub use tree::{Descendants, DomTree};

static NEXT_TREE_ID: AtomicU64 = AtomicU64::new(1);

/// Allocate a process-unique tree identifier.
///
/// Every node arena (including output surfaces defined elsewhere) draws from
/// this one sequence, so a `NodeId` can be checked against its owner.
pub fn allocate_tree_id() -> u64 {
    NEXT_TREE_ID.fetch_add(1, Ordering::Relaxed)
}

/// Node identifier (index into arena)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Root node ID
    pub const ROOT: NodeId = NodeId(0);

    /// Sentinel for "no node"
    pub const NONE: NodeId = NodeId(u32::MAX);

    /// Build an identifier from an arena index.
    ///
    /// Other arenas (such as the string surface) reuse this handle type.
    pub fn from_index(index: usize) -> Self {
        NodeId(index as u32)
    }

    /// Arena index of this node
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Whether this is a real node rather than [`NodeId::NONE`]
    #[inline]
    pub fn is_valid(self) -> bool {
        self != Self::NONE
    }

    /// Convert the sentinel into an `Option`
    #[inline]
    pub fn to_option(self) -> Option<NodeId> {
        self.is_valid().then_some(self)
    }
}

/// Result type for DOM operations
pub type DomResult<T> = Result<T, DomError>;

/// DOM operation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomError {
    /// Node not found
    #[error("node {0:?} not found")]
    NotFound(NodeId),
    /// Hierarchy error (e.g., inserting an ancestor into its descendant)
    #[error("hierarchy request error")]
    HierarchyRequest,
    /// Reference node is not a child of the given parent
    #[error("node {0:?} is not a child of the given parent")]
    NotAChild(NodeId),
    /// Operation not valid for this kind of node
    #[error("invalid node type for this operation")]
    InvalidNodeType,
}

//! Descriptor Compiler
//!
//! Resolves every key of a descriptor to a node in a private copy of the
//! template, validates the map, replaces bound nodes with markers and
//! records the pre-order ordinal of each marker. The result is cached in a
//! [`Registry`] by descriptor identity.
//!
//! Compilation runs in two passes. Drafting walks the descriptor tree,
//! resolving selectors and swapping bound nodes for markers; nested
//! descriptors are drafted before their own node is detached so their
//! selectors still see the surrounding markup. Finalizing turns the drafts
//! into immutable [`Compiled`] entries once the skeleton tree is complete.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

use tether_dom::{DomError, DomTree, NodeId, Selector};
use tether_html::HtmlSerializer;
use tracing::{debug, warn};

use crate::surface::following;
use crate::{BindError, BindResult, Branch, Config, Descriptor, DescriptorId, MarkerStyle, Surface, Target, Template};

/// Pre-serialized subtree that no binding touches
#[derive(Debug, Clone)]
pub struct StaticChunk {
    html: Rc<str>,
    span: usize,
}

impl StaticChunk {
    pub fn html(&self) -> &Rc<str> {
        &self.html
    }

    /// Number of skeleton nodes the chunk stands for
    pub fn span(&self) -> usize {
        self.span
    }
}

/// Compiled template tree: markers in place of bound nodes, bound nodes
/// kept as detached prototypes
#[derive(Debug)]
pub struct Skeleton {
    tree: DomTree,
    chunks: HashMap<NodeId, StaticChunk>,
}

impl Skeleton {
    pub fn tree(&self) -> &DomTree {
        &self.tree
    }

    /// Static chunk rooted at `node`, if any
    pub fn chunk(&self, node: NodeId) -> Option<&StaticChunk> {
        self.chunks.get(&node)
    }
}

/// Where a key's values are written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Site {
    /// The host node itself
    Parent,
    /// Before a marker; `anchor` indexes the located markers of the owning
    /// instance
    Marker {
        anchor: usize,
        prototype: NodeId,
        last_in_parent: bool,
    },
}

#[derive(Debug)]
pub(crate) struct KeyPlan {
    pub(crate) key: Rc<str>,
    pub(crate) branch: Branch,
    pub(crate) site: Site,
    pub(crate) nested: Option<Rc<Compiled>>,
}

/// A descriptor compiled against a template
pub struct Compiled {
    descriptor: Descriptor,
    skeleton: Rc<Skeleton>,
    host: NodeId,
    ordinals: Vec<usize>,
    plans: Vec<KeyPlan>,
    config: Config,
}

impl Compiled {
    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    pub fn skeleton(&self) -> &Rc<Skeleton> {
        &self.skeleton
    }

    /// Skeleton node cloned for every instance
    pub fn host(&self) -> NodeId {
        self.host
    }

    /// Pre-order ordinals (below the host) of the markers this instance
    /// owns, in anchor order
    pub fn ordinals(&self) -> &[usize] {
        &self.ordinals
    }

    /// Bound keys in declaration order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.plans.iter().map(|p| &*p.key)
    }

    pub(crate) fn plans(&self) -> &[KeyPlan] {
        &self.plans
    }

    pub(crate) fn config(&self) -> &Config {
        &self.config
    }
}

impl fmt::Debug for Compiled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Compiled")
            .field("descriptor", &self.descriptor.id())
            .field("host", &self.host)
            .field("ordinals", &self.ordinals)
            .field("plans", &self.plans)
            .finish()
    }
}

/// Arena of compiled descriptors indexed by descriptor identity
#[derive(Debug, Default)]
pub struct Registry {
    entries: Vec<Rc<Compiled>>,
    by_descriptor: HashMap<DescriptorId, usize>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of compiled entries, nested ones included
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cached compilation of a top-level descriptor
    pub fn get(&self, id: DescriptorId) -> Option<Rc<Compiled>> {
        self.by_descriptor.get(&id).map(|&i| Rc::clone(&self.entries[i]))
    }

    /// Compile `descriptor` against `template`, or return the cached result.
    ///
    /// The template is never modified.
    pub fn compile(&mut self, template: &Template, descriptor: &Descriptor, config: &Config) -> BindResult<Rc<Compiled>> {
        if let Some(cached) = self.get(descriptor.id()) {
            debug!(descriptor = %descriptor.id(), "compile cache hit");
            return Ok(cached);
        }

        let mut tree = DomTree::new();
        let host = tree.import_subtree(template.tree(), template.root())?;

        let mut compiler = Compiler {
            tree,
            marker: config.marker,
            claimed: HashMap::new(),
        };
        let draft = compiler.draft_owner(descriptor, host)?;
        let skeleton = Rc::new(compiler.into_skeleton(&draft));

        let mut built = Vec::new();
        let compiled = finalize(&skeleton, draft, config, &mut built)?;

        let first = self.entries.len();
        self.entries.extend(built);
        self.by_descriptor
            .insert(descriptor.id(), self.entries.len() - 1);
        debug!(
            descriptor = %descriptor.id(),
            branches = descriptor.len(),
            marker = ?config.marker,
            entries = self.entries.len() - first,
            "compiled descriptor"
        );
        Ok(compiled)
    }
}

struct Draft {
    descriptor: Descriptor,
    host: NodeId,
    /// Markers located when this draft's host is instantiated; `None` when
    /// the draft shares its parent's host
    anchors: Option<Vec<NodeId>>,
    plans: Vec<DraftPlan>,
}

struct DraftPlan {
    key: Rc<str>,
    branch: Branch,
    site: DraftSite,
    nested: Option<Draft>,
}

enum DraftSite {
    Parent,
    Marker { anchor: usize, marker: NodeId, prototype: NodeId },
}

struct Compiler {
    tree: DomTree,
    marker: MarkerStyle,
    /// Bound nodes of enclosing levels, by key
    claimed: HashMap<NodeId, Rc<str>>,
}

impl Compiler {
    fn draft_owner(&mut self, descriptor: &Descriptor, host: NodeId) -> BindResult<Draft> {
        let mut anchors = Vec::new();
        let mut draft = self.draft(descriptor, host, &mut anchors)?;
        draft.anchors = Some(anchors);
        Ok(draft)
    }

    fn draft(&mut self, descriptor: &Descriptor, host: NodeId, anchors: &mut Vec<NodeId>) -> BindResult<Draft> {
        let mut resolved = Vec::with_capacity(descriptor.len());
        for (key, branch) in descriptor.branches() {
            let node = match branch.target() {
                Target::Parent => host,
                Target::Selector(selector) => self.resolve(key, selector, host)?,
            };
            resolved.push((Rc::clone(key), branch.clone(), node));
        }

        // Sibling positions must not overlap
        for (i, (key, _, node)) in resolved.iter().enumerate() {
            if *node == host {
                continue;
            }
            if let Some(other) = self.claimed.get(node) {
                return Err(BindError::Containment {
                    key: key.to_string(),
                    adjacent: other.to_string(),
                });
            }
            for (adjacent, _, other) in resolved[..i].iter().filter(|(_, _, n)| *n != host) {
                if self.tree.contains(*other, *node) || self.tree.contains(*node, *other) {
                    return Err(BindError::Containment {
                        key: key.to_string(),
                        adjacent: adjacent.to_string(),
                    });
                }
            }
        }
        for (key, _, node) in &resolved {
            if *node != host {
                self.claimed.insert(*node, Rc::clone(key));
            }
        }

        let mut plans = Vec::with_capacity(resolved.len());
        for (key, branch, node) in resolved {
            let nested = match branch.nested_descriptor() {
                Some(inner) if node == host => Some(self.draft(inner, host, anchors)?),
                Some(inner) => Some(self.draft_owner(inner, node)?),
                None => None,
            };
            if node == host && nested.is_none() && branch.change_fn().is_none() {
                warn!("no change function for key {key:?}");
            }
            plans.push((key, branch, node, nested));
        }

        let mut drafted = Vec::with_capacity(plans.len());
        for (key, branch, node, nested) in plans {
            let site = if node == host {
                DraftSite::Parent
            } else {
                let marker = self.place_marker(&key, node)?;
                anchors.push(marker);
                DraftSite::Marker {
                    anchor: anchors.len() - 1,
                    marker,
                    prototype: node,
                }
            };
            drafted.push(DraftPlan { key, branch, site, nested });
        }

        Ok(Draft {
            descriptor: descriptor.clone(),
            host,
            anchors: None,
            plans: drafted,
        })
    }

    /// First node matching `selector`, searched from the host's parent so the
    /// host itself can match; it must lie within the host
    fn resolve(&self, key: &str, selector: &str, host: NodeId) -> BindResult<NodeId> {
        let parsed = Selector::parse(selector)?;
        let candidates = match self.tree.parent(host) {
            Some(scope) => self.tree.query_selector_all(scope, &parsed),
            None => {
                let mut all = Vec::new();
                if parsed.matches(&self.tree, host) {
                    all.push(host);
                }
                all.extend(self.tree.query_selector_all(host, &parsed));
                all
            }
        };
        if candidates.is_empty() {
            return Err(BindError::Resolution {
                key: key.to_string(),
                selector: selector.to_string(),
            });
        }
        candidates
            .into_iter()
            .find(|&node| self.tree.contains(host, node))
            .ok_or_else(|| BindError::OutsideParent { key: key.to_string() })
    }

    /// Put a marker where `node` was and detach `node`; returns the marker
    /// new content is inserted before
    fn place_marker(&mut self, key: &str, node: NodeId) -> BindResult<NodeId> {
        let parent = self.tree.parent(node).ok_or(DomError::NotFound(node))?;
        let marker = match self.marker {
            MarkerStyle::Text => {
                let marker = self.tree.create_text("");
                self.tree.insert_before(parent, marker, Some(node))?;
                marker
            }
            MarkerStyle::Comment => {
                let begin = self.tree.create_comment(&format!(" begin {key:?} "));
                let end = self.tree.create_comment(&format!(" end {key:?} "));
                self.tree.insert_before(parent, begin, Some(node))?;
                self.tree.insert_before(parent, end, Some(node))?;
                end
            }
        };
        self.tree.remove_child(parent, node)?;
        Ok(marker)
    }

    fn into_skeleton(self, root: &Draft) -> Skeleton {
        let mut chunks = HashMap::new();
        let mut pending = vec![root];
        while let Some(draft) = pending.pop() {
            if let Some(anchors) = &draft.anchors {
                let markers: HashSet<NodeId> = anchors.iter().copied().collect();
                self.collect_chunks(draft.host, &markers, &mut chunks);
            }
            pending.extend(draft.plans.iter().filter_map(|p| p.nested.as_ref()));
        }
        Skeleton {
            tree: self.tree,
            chunks,
        }
    }

    fn collect_chunks(&self, node: NodeId, markers: &HashSet<NodeId>, chunks: &mut HashMap<NodeId, StaticChunk>) {
        let serializer = HtmlSerializer::new();
        for child in self.tree.child_ids(node) {
            if markers.contains(&child) {
                continue;
            }
            if markers.iter().any(|&m| self.tree.contains(child, m)) {
                self.collect_chunks(child, markers, chunks);
                continue;
            }
            let chunk = StaticChunk {
                html: Rc::from(serializer.serialize_outer(&self.tree, child)),
                span: 1 + self.tree.descendants(child).count(),
            };
            chunks.insert(child, chunk);
        }
    }
}

fn finalize(skeleton: &Rc<Skeleton>, draft: Draft, config: &Config, built: &mut Vec<Rc<Compiled>>) -> BindResult<Rc<Compiled>> {
    let tree = skeleton.tree();
    let ordinals = match &draft.anchors {
        Some(anchors) => {
            let order: HashMap<NodeId, usize> = tree
                .descendants(draft.host)
                .enumerate()
                .map(|(i, node)| (node, i))
                .collect();
            anchors
                .iter()
                .map(|a| order.get(a).copied().ok_or(DomError::NotFound(*a)))
                .collect::<Result<Vec<_>, _>>()?
        }
        None => Vec::new(),
    };

    let mut plans = Vec::with_capacity(draft.plans.len());
    for plan in draft.plans {
        let nested = match plan.nested {
            Some(inner) => Some(finalize(skeleton, inner, config, built)?),
            None => None,
        };
        let site = match plan.site {
            DraftSite::Parent => Site::Parent,
            DraftSite::Marker { anchor, marker, prototype } => Site::Marker {
                anchor,
                prototype,
                last_in_parent: tree.next_sibling(marker).is_none(),
            },
        };
        plans.push(KeyPlan {
            key: plan.key,
            branch: plan.branch,
            site,
            nested,
        });
    }

    let compiled = Rc::new(Compiled {
        descriptor: draft.descriptor,
        skeleton: Rc::clone(skeleton),
        host: draft.host,
        ordinals,
        plans,
        config: config.clone(),
    });
    built.push(Rc::clone(&compiled));
    Ok(compiled)
}

/// Find the markers of a freshly cloned instance in one pre-order walk
pub(crate) fn locate(surface: &dyn Surface, host: NodeId, ordinals: &[usize]) -> BindResult<Vec<NodeId>> {
    let mut wanted: Vec<(usize, usize)> = ordinals.iter().enumerate().map(|(slot, &o)| (o, slot)).collect();
    wanted.sort_unstable();

    let mut found = vec![NodeId::NONE; ordinals.len()];
    let mut next = 0;
    let mut position = 0;
    let mut current = surface.first_child(host);
    while let Some(node) = current {
        if next == wanted.len() {
            break;
        }
        while next < wanted.len() && wanted[next].0 == position {
            found[wanted[next].1] = node;
            next += 1;
        }
        position += surface.span(node);
        current = surface
            .first_child(node)
            .or_else(|| following(surface, node, host));
    }

    if next < wanted.len() {
        return Err(DomError::NotFound(host).into());
    }
    Ok(found)
}

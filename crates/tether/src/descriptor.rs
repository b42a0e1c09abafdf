//! Descriptors - Which keys bind where
//!
//! A descriptor is an ordered map from data keys to branches. Each branch
//! names a position inside the template (a selector, or the parent binding
//! itself) plus what happens on a write: a change callback, a nested
//! descriptor, and for nested descriptors an optional mount hook.

use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use tether_dom::NodeId;

use crate::{BindResult, Path, Surface, Value};

static NEXT_DESCRIPTOR_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identity of a descriptor, used as the compile cache key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DescriptorId(u64);

impl DescriptorId {
    fn next() -> Self {
        DescriptorId(NEXT_DESCRIPTOR_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for DescriptorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Arguments passed to change and mount callbacks
pub struct Change<'a> {
    /// Surface to express mutations through
    pub surface: &'a mut dyn Surface,
    /// The bound node (the host itself for parent bindings)
    pub node: NodeId,
    /// New value; null on removal
    pub value: &'a Value,
    /// Value previously held at this position
    pub previous: &'a Value,
    pub path: &'a Path,
}

/// What a callback asks the reconciler to do next
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Outcome {
    /// Nothing further
    #[default]
    Done,
    /// Apply this value with the default rule (text, form value or checked)
    Replace(Value),
    /// On removal: leave the node attached; the callback now owns its removal
    Retain,
}

/// Change or mount callback
pub type Callback = Rc<dyn Fn(&mut Change<'_>) -> BindResult<Outcome>>;

/// Wrap a closure as a [`Callback`]
pub fn callback(f: impl Fn(&mut Change<'_>) -> BindResult<Outcome> + 'static) -> Callback {
    Rc::new(f)
}

/// Where a branch binds
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// First match of a selector, searched from the parent binding's parent
    Selector(String),
    /// The parent binding's own node
    Parent,
}

/// One key's binding
#[derive(Clone)]
pub struct Branch {
    target: Target,
    change: Option<Callback>,
    nested: Option<Descriptor>,
    mount: Option<Callback>,
}

impl Branch {
    /// Bind to the first node matching `selector`
    pub fn select(selector: &str) -> Self {
        Self {
            target: Target::Selector(selector.to_string()),
            change: None,
            nested: None,
            mount: None,
        }
    }

    /// Bind to the parent binding's own node
    pub fn parent() -> Self {
        Self {
            target: Target::Parent,
            change: None,
            nested: None,
            mount: None,
        }
    }

    /// Shorthand for a parent binding with a change callback
    pub fn on_parent(f: impl Fn(&mut Change<'_>) -> BindResult<Outcome> + 'static) -> Self {
        Self::parent().change(f)
    }

    /// Set the change callback
    pub fn change(self, f: impl Fn(&mut Change<'_>) -> BindResult<Outcome> + 'static) -> Self {
        self.change_with(Rc::new(f))
    }

    /// Set the change callback from a shared [`Callback`]
    pub fn change_with(mut self, callback: Callback) -> Self {
        self.change = Some(callback);
        self
    }

    /// Bind values as records against a nested descriptor
    pub fn nested(mut self, descriptor: Descriptor) -> Self {
        self.nested = Some(descriptor);
        self
    }

    /// Hook called after a nested subtree is attached and before it is
    /// detached (with a null value)
    pub fn mount(self, f: impl Fn(&mut Change<'_>) -> BindResult<Outcome> + 'static) -> Self {
        self.mount_with(Rc::new(f))
    }

    /// Set the mount hook from a shared [`Callback`]
    pub fn mount_with(mut self, callback: Callback) -> Self {
        self.mount = Some(callback);
        self
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn nested_descriptor(&self) -> Option<&Descriptor> {
        self.nested.as_ref()
    }

    pub(crate) fn change_fn(&self) -> Option<&Callback> {
        self.change.as_ref()
    }

    /// Mount hook of a nested branch; a change callback given alongside a
    /// nested descriptor acts as the mount hook
    pub(crate) fn mount_fn(&self) -> Option<&Callback> {
        self.mount.as_ref().or(self.change.as_ref())
    }
}

impl From<&str> for Branch {
    fn from(selector: &str) -> Self {
        Branch::select(selector)
    }
}

impl fmt::Debug for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Branch")
            .field("target", &self.target)
            .field("change", &self.change.is_some())
            .field("nested", &self.nested.as_ref().map(Descriptor::id))
            .field("mount", &self.mount.is_some())
            .finish()
    }
}

/// Ordered key to branch map
#[derive(Clone)]
pub struct Descriptor {
    id: DescriptorId,
    branches: Rc<Vec<(Rc<str>, Branch)>>,
}

impl Descriptor {
    /// Create an empty descriptor
    pub fn new() -> Self {
        Self {
            id: DescriptorId::next(),
            branches: Rc::new(Vec::new()),
        }
    }

    /// Add (or replace) the branch for `key`.
    ///
    /// Every addition yields a new identity, so a descriptor is never
    /// confused with an earlier, smaller version of itself.
    pub fn key(mut self, key: &str, branch: impl Into<Branch>) -> Self {
        let branch = branch.into();
        let branches = Rc::make_mut(&mut self.branches);
        match branches.iter_mut().find(|(k, _)| &**k == key) {
            Some((_, existing)) => *existing = branch,
            None => branches.push((Rc::from(key), branch)),
        }
        self.id = DescriptorId::next();
        self
    }

    pub fn id(&self) -> DescriptorId {
        self.id
    }

    /// Branches in declaration order
    pub fn branches(&self) -> impl Iterator<Item = (&Rc<str>, &Branch)> {
        self.branches.iter().map(|(k, b)| (k, b))
    }

    pub fn len(&self) -> usize {
        self.branches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }
}

impl Default for Descriptor {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Descriptor")
            .field("id", &self.id)
            .field("branches", &self.branches)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_order_and_replace() {
        let d = Descriptor::new()
            .key("b", ".b")
            .key("a", ".a")
            .key("b", Branch::select(".other"));
        let keys: Vec<_> = d.branches().map(|(k, _)| k.to_string()).collect();
        assert_eq!(keys, vec!["b", "a"]);
        let (_, first) = d.branches().next().unwrap();
        assert_eq!(first.target(), &Target::Selector(".other".into()));
    }

    #[test]
    fn test_identity_changes_on_extension() {
        let base = Descriptor::new().key("a", ".a");
        let extended = base.clone().key("b", ".b");
        assert_ne!(base.id(), extended.id());
        assert_eq!(base.len(), 1);
        assert_eq!(extended.len(), 2);
        assert_eq!(base.clone().id(), base.id());
    }

    #[test]
    fn test_mount_falls_back_to_change() {
        let branch = Branch::select(".x")
            .nested(Descriptor::new())
            .change(|_| Ok(Outcome::Done));
        assert!(branch.mount_fn().is_some());
        assert!(Branch::select(".x").mount_fn().is_none());
        assert_eq!(Branch::on_parent(|_| Ok(Outcome::Done)).target(), &Target::Parent);
    }
}

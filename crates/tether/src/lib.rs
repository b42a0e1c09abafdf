//! Tether - Data binding reconciliation engine
//!
//! Keeps records and lists in sync with a rendered tree without ever
//! rebuilding it:
//!
//! - a [`Descriptor`] maps data keys to positions in a [`Template`];
//! - the compiler turns the pair into a reusable skeleton with markers in
//!   place of bound positions ([`Registry`], [`Compiled`]);
//! - binding a [`Record`] instantiates the skeleton on a [`Surface`], and
//!   every later write or list mutation applies the smallest set of node
//!   insertions, removals and in-place updates;
//! - [`Engine::rehydrate`] takes over markup rendered earlier, reusing its
//!   nodes instead of building new ones.
//!
//! ```ignore
//! let descriptor = Descriptor::new().key("items", ".item");
//! let template = Template::parse("<ul><li class=\"item\"></li></ul>")?;
//! let items: List = ["a", "b", "c"].into_iter().collect();
//! let record = Record::new().with("items", items.clone());
//!
//! let mut engine = Engine::default();
//! let mut tree = DomTree::new();
//! let host = engine.bind(&mut tree, &record, &template, &descriptor)?;
//! items.truncate(&mut tree, 1)?;
//! ```

mod compile;
mod config;
mod descriptor;
mod engine;
mod error;
pub mod helpers;
mod hydrate;
mod list;
mod path;
mod reconcile;
mod record;
mod surface;
mod template;
mod value;

pub use compile::{Compiled, Registry, Skeleton, StaticChunk};
pub use config::{Config, MarkerStyle};
pub use descriptor::{Branch, Callback, Change, Descriptor, DescriptorId, Outcome, Target, callback};
pub use engine::Engine;
pub use error::{BindError, BindResult};
pub use list::List;
pub use path::{Path, Segment};
pub use record::Record;
pub use surface::{StringSurface, Surface, apply_default};
pub use template::Template;
pub use value::Value;

pub use tether_dom::{DomTree, NodeId};

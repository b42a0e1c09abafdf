//! Engine - Entry points
//!
//! `compile`, `bind` and `render` are separate operations: compile a
//! descriptor against a template once, bind any number of records against
//! the result, or render a value straight to markup.

use std::rc::Rc;

use tether_dom::{DomTree, NodeId};
use tracing::debug;

use crate::compile::locate;
use crate::hydrate::{Expected, hydrate_record};
use crate::reconcile::{bind_record, release, validate_record};
use crate::{BindError, BindResult, Compiled, Config, Descriptor, Record, Registry, StringSurface, Surface, Template, Value};

/// Owns the configuration and the compiled descriptor registry
#[derive(Debug, Default)]
pub struct Engine {
    config: Config,
    registry: Registry,
}

impl Engine {
    /// Create an engine with the given configuration
    pub fn new(config: Config) -> Self {
        Self {
            config,
            registry: Registry::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Compile `descriptor` against `template` (cached by descriptor identity)
    pub fn compile(&mut self, template: &Template, descriptor: &Descriptor) -> BindResult<Rc<Compiled>> {
        self.registry.compile(template, descriptor, &self.config)
    }

    /// Bind `record` to a new instance of the compiled template.
    ///
    /// Returns the detached output node; insert it wherever it belongs.
    /// Every later [`Record::set`] (and every mutation of a list the record
    /// holds) goes through the same surface.
    pub fn bind(
        &mut self,
        surface: &mut dyn Surface,
        record: &Record,
        template: &Template,
        descriptor: &Descriptor,
    ) -> BindResult<NodeId> {
        let compiled = self.compile(template, descriptor)?;
        self.bind_compiled(surface, record, &compiled)
    }

    /// Bind against a descriptor compiled earlier
    pub fn bind_compiled(&self, surface: &mut dyn Surface, record: &Record, compiled: &Rc<Compiled>) -> BindResult<NodeId> {
        if record.is_bound() {
            return Err(BindError::Rebind { what: "record" });
        }
        validate_record(record, compiled)?;

        let host = surface.clone_template(compiled.skeleton(), compiled.host())?;
        let anchors = locate(surface, host, compiled.ordinals())?;
        bind_record(
            surface,
            record,
            compiled,
            host,
            anchors.into(),
            None,
            record.downgrade(),
            &[],
        )?;
        debug!(descriptor = %compiled.descriptor().id(), host = ?host, "bound record");
        Ok(host)
    }

    /// Take over markup rendered earlier instead of building it again.
    ///
    /// `existing` is the root the rendered markup was parsed into. Every
    /// key's nodes are matched in document order and reused; only markers
    /// are added. When the markup does not hold the nodes `record` would
    /// produce, the record is left unbound.
    pub fn rehydrate(
        &self,
        tree: &mut DomTree,
        record: &Record,
        compiled: &Rc<Compiled>,
        existing: NodeId,
    ) -> BindResult<NodeId> {
        if record.is_bound() {
            return Err(BindError::Rebind { what: "record" });
        }
        validate_record(record, compiled)?;

        let copy = match Value::from(record.clone()).deep_copy() {
            Value::Record(copy) => copy,
            other => {
                return Err(BindError::TypeMismatch {
                    expected: "record",
                    found: other.kind(),
                });
            }
        };
        let mut scratch = DomTree::new();
        let scratch_host = self.bind_compiled(&mut scratch, &copy, compiled)?;

        let expected = Expected {
            tree: &scratch,
            host: scratch_host,
            record: &copy,
        };
        let hydrated = hydrate_record(tree, expected, record, compiled, existing, None, None, record.downgrade(), &[]);
        if let Err(err) = hydrated {
            release(record);
            return Err(err);
        }
        debug!(descriptor = %compiled.descriptor().id(), host = ?existing, "rehydrated record");
        Ok(existing)
    }

    /// Render `value` to markup.
    ///
    /// The template is only needed the first time a descriptor is rendered.
    /// The value is copied first, so the caller's data never carries
    /// reconciliation state afterwards.
    pub fn render(&mut self, value: &Value, descriptor: &Descriptor, template: Option<&str>) -> BindResult<String> {
        let record = match value.deep_copy() {
            Value::Record(record) => record,
            other => {
                return Err(BindError::TypeMismatch {
                    expected: "record",
                    found: other.kind(),
                });
            }
        };

        let compiled = match (self.registry.get(descriptor.id()), template) {
            (Some(compiled), _) => compiled,
            (None, Some(html)) => self.compile(&Template::parse(html)?, descriptor)?,
            (None, None) => return Err(BindError::MissingTemplate(descriptor.id())),
        };

        let mut surface = StringSurface::new();
        let host = self.bind_compiled(&mut surface, &record, &compiled)?;
        Ok(surface.serialize(host))
    }
}

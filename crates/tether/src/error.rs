//! Binding errors

use tether_dom::{DomError, SelectorError};
use tether_html::ParseError;

use crate::DescriptorId;

/// Result type for compile, bind and write operations
pub type BindResult<T> = Result<T, BindError>;

/// Errors raised while compiling descriptors or reconciling writes
#[derive(Debug, thiserror::Error)]
pub enum BindError {
    #[error("invalid type of value: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("no node matches selector {selector:?} for key {key:?}")]
    Resolution { key: String, selector: String },

    #[error("node for key {key:?} is contained in the node for adjacent key {adjacent:?}")]
    Containment { key: String, adjacent: String },

    #[error("node for key {key:?} must be equal to or inside its parent binding")]
    OutsideParent { key: String },

    #[error("{what} is already bound")]
    Rebind { what: &'static str },

    #[error("index {index} out of range for list of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("write goes through a different surface than the record was bound to")]
    SurfaceMismatch,

    #[error("matching nodes could not be found on key {key:?}, expected {expected}, found {found}")]
    Hydration {
        key: String,
        expected: usize,
        found: usize,
    },

    #[error("existing markup does not have the template's structure around key {key:?}")]
    HydrationLayout { key: String },

    #[error("descriptor {0} has not been compiled and no template was given")]
    MissingTemplate(DescriptorId),

    #[error(transparent)]
    Dom(#[from] DomError),

    #[error(transparent)]
    Selector(#[from] SelectorError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Error returned by a change or mount callback
    #[error(transparent)]
    Callback(#[from] anyhow::Error),
}

impl BindError {
    /// Wrap a message as a callback error
    pub fn callback(message: impl std::fmt::Display) -> Self {
        BindError::Callback(anyhow::anyhow!("{message}"))
    }
}

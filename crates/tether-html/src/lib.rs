//! Tether HTML - Template parsing and serialization
//!
//! Parses template markup with html5ever into a [`DomTree`] fragment and
//! serializes trees back to HTML.

mod parser;
mod serializer;

pub use parser::HtmlParser;
pub use serializer::{escape_attribute, escape_text, is_raw_text, is_void, write_attribute, HtmlSerializer};

use tether_dom::{DomError, DomTree, NodeId};

/// Parse template markup into a fresh tree, returning the fragment root
pub fn parse_fragment(html: &str) -> Result<(DomTree, NodeId), ParseError> {
    HtmlParser::new().parse_fragment(html)
}

/// Template parse errors
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("failed to read template: {0}")]
    Io(#[from] std::io::Error),

    #[error("template contains no nodes")]
    Empty,

    #[error(transparent)]
    Dom(#[from] DomError),
}

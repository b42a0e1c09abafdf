//! Selectors - Small CSS selector subset
//!
//! Supports compound selectors built from `tag`, `*`, `.class`, `#id`,
//! `[attr]` and `[attr=value]`, joined by descendant (whitespace) or child
//! (`>`) combinators, with `,` separating alternatives.

use crate::{DomTree, NodeId};

/// Selector parse errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectorError {
    #[error("empty selector")]
    Empty,
    #[error("unexpected {found:?} at offset {offset} in selector {input:?}")]
    Unexpected {
        input: String,
        found: char,
        offset: usize,
    },
    #[error("unexpected end of selector {0:?}")]
    UnexpectedEnd(String),
}

/// Simple selector
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimpleSelector {
    Universal,
    Tag(String),
    Class(String),
    Id(String),
    Attribute { name: String, value: Option<String> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Compound(Vec<SimpleSelector>);

#[derive(Debug, Clone, PartialEq, Eq)]
struct Complex {
    /// Left to right; the combinator links a part to the one before it
    parts: Vec<(Combinator, Compound)>,
}

/// Parsed selector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    source: String,
    alternatives: Vec<Complex>,
}

impl Selector {
    /// Parse a selector string
    pub fn parse(input: &str) -> Result<Self, SelectorError> {
        let alternatives = input
            .split(',')
            .map(|part| Parser::new(input, part).complex())
            .collect::<Result<Vec<_>, _>>()?;
        tracing::trace!("parsed selector {:?}", input);
        Ok(Self {
            source: input.to_string(),
            alternatives,
        })
    }

    /// The source text this selector was parsed from
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether `node` matches this selector
    pub fn matches(&self, tree: &DomTree, node: NodeId) -> bool {
        self.alternatives.iter().any(|complex| {
            let last = complex.parts.len() - 1;
            complex.matches_at(tree, node, last)
        })
    }
}

impl std::str::FromStr for Selector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

impl Complex {
    fn matches_at(&self, tree: &DomTree, node: NodeId, idx: usize) -> bool {
        let (combinator, compound) = &self.parts[idx];
        if !compound.matches(tree, node) {
            return false;
        }
        if idx == 0 {
            return true;
        }
        match combinator {
            Combinator::Child => tree
                .parent(node)
                .is_some_and(|parent| self.matches_at(tree, parent, idx - 1)),
            Combinator::Descendant => {
                let mut current = tree.parent(node);
                while let Some(ancestor) = current {
                    if self.matches_at(tree, ancestor, idx - 1) {
                        return true;
                    }
                    current = tree.parent(ancestor);
                }
                false
            }
        }
    }
}

impl Compound {
    fn matches(&self, tree: &DomTree, node: NodeId) -> bool {
        let Some(tag) = tree.tag_name(node) else {
            return false;
        };
        self.0.iter().all(|simple| match simple {
            SimpleSelector::Universal => true,
            SimpleSelector::Tag(name) => tag.eq_ignore_ascii_case(name),
            SimpleSelector::Class(class) => tree.has_class(node, class),
            SimpleSelector::Id(id) => tree.attribute(node, "id") == Some(id.as_str()),
            SimpleSelector::Attribute { name, value } => match (tree.attribute(node, name), value) {
                (Some(actual), Some(expected)) => actual == expected,
                (Some(_), None) => true,
                (None, _) => false,
            },
        })
    }
}

struct Parser<'a> {
    input: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str, part: &str) -> Self {
        Self {
            input,
            chars: part.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn skip_whitespace(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn unexpected(&self, found: char) -> SelectorError {
        SelectorError::Unexpected {
            input: self.input.to_string(),
            found,
            offset: self.pos,
        }
    }

    fn end(&self) -> SelectorError {
        SelectorError::UnexpectedEnd(self.input.to_string())
    }

    fn complex(mut self) -> Result<Complex, SelectorError> {
        let mut parts = Vec::new();
        let mut pending: Option<Combinator> = None;

        self.skip_whitespace();
        loop {
            match self.peek() {
                None => break,
                Some('>') => {
                    if parts.is_empty() {
                        return Err(self.unexpected('>'));
                    }
                    self.pos += 1;
                    pending = Some(Combinator::Child);
                    self.skip_whitespace();
                }
                Some(_) => {
                    let combinator = pending.take().unwrap_or(Combinator::Descendant);
                    let compound = self.compound()?;
                    parts.push((combinator, compound));
                    if self.skip_whitespace() && pending.is_none() {
                        pending = Some(Combinator::Descendant);
                    }
                }
            }
        }

        if parts.is_empty() {
            return Err(SelectorError::Empty);
        }
        if pending == Some(Combinator::Child) {
            return Err(self.end());
        }
        Ok(Complex { parts })
    }

    fn compound(&mut self) -> Result<Compound, SelectorError> {
        let mut simple = Vec::new();
        while let Some(c) = self.peek() {
            match c {
                '*' => {
                    self.pos += 1;
                    simple.push(SimpleSelector::Universal);
                }
                '.' => {
                    self.pos += 1;
                    simple.push(SimpleSelector::Class(self.ident()?));
                }
                '#' => {
                    self.pos += 1;
                    simple.push(SimpleSelector::Id(self.ident()?));
                }
                '[' => {
                    self.pos += 1;
                    simple.push(self.attribute()?);
                }
                c if is_ident_char(c) && simple.is_empty() => {
                    simple.push(SimpleSelector::Tag(self.ident()?.to_ascii_lowercase()));
                }
                c if c.is_whitespace() || c == '>' => break,
                other => return Err(self.unexpected(other)),
            }
        }
        if simple.is_empty() {
            return Err(self.end());
        }
        Ok(Compound(simple))
    }

    fn ident(&mut self) -> Result<String, SelectorError> {
        let start = self.pos;
        while self.peek().is_some_and(is_ident_char) {
            self.pos += 1;
        }
        if self.pos == start {
            return match self.peek() {
                Some(c) => Err(self.unexpected(c)),
                None => Err(self.end()),
            };
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn attribute(&mut self) -> Result<SimpleSelector, SelectorError> {
        self.skip_whitespace();
        let name = self.ident()?.to_ascii_lowercase();
        self.skip_whitespace();
        match self.bump() {
            Some(']') => Ok(SimpleSelector::Attribute { name, value: None }),
            Some('=') => {
                self.skip_whitespace();
                let value = match self.peek() {
                    Some(quote @ ('"' | '\'')) => {
                        self.pos += 1;
                        let start = self.pos;
                        while self.peek().is_some_and(|c| c != quote) {
                            self.pos += 1;
                        }
                        if self.bump().is_none() {
                            return Err(self.end());
                        }
                        self.chars[start..self.pos - 1].iter().collect()
                    }
                    _ => self.ident()?,
                };
                self.skip_whitespace();
                match self.bump() {
                    Some(']') => Ok(SimpleSelector::Attribute {
                        name,
                        value: Some(value),
                    }),
                    Some(c) => {
                        self.pos -= 1;
                        Err(self.unexpected(c))
                    }
                    None => Err(self.end()),
                }
            }
            Some(c) => {
                self.pos -= 1;
                Err(self.unexpected(c))
            }
            None => Err(self.end()),
        }
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_' || !c.is_ascii()
}

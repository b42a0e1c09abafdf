//! String Interner - Deduplicate tag and attribute names
//!
//! Templates repeat a small vocabulary of tag names ("li", "span", "input")
//! and attribute names ("class", "type", "value"). Each is stored once and
//! referenced by a 4-byte ID.

use std::collections::HashMap;

/// Interned string ID - just 4 bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct InternedString(pub u32);

impl InternedString {
    /// Empty string
    pub const EMPTY: InternedString = InternedString(0);
}

/// String interner for deduplicating names
///
/// All strings live in one contiguous buffer; each ID maps to a
/// `(start, len)` span so arbitrary content (including NUL) round-trips.
#[derive(Debug, Clone)]
pub struct StringInterner {
    buffer: String,
    spans: Vec<(u32, u32)>,
    map: HashMap<Box<str>, u32>,
}

impl StringInterner {
    /// Create a new interner with common template names pre-interned
    pub fn new() -> Self {
        let mut interner = Self {
            buffer: String::with_capacity(1024),
            spans: Vec::with_capacity(64),
            map: HashMap::with_capacity(64),
        };

        // Index 0 is always the empty string
        interner.intern("");

        const COMMON_NAMES: &[&str] = &[
            "div", "span", "p", "a", "ul", "ol", "li", "table", "tr", "td",
            "h1", "h2", "h3", "h4", "input", "select", "option", "textarea",
            "button", "form", "label", "progress",
            "id", "class", "type", "value", "checked", "name", "href",
        ];

        for name in COMMON_NAMES {
            interner.intern(name);
        }

        interner
    }

    /// Intern a string, returning its ID
    pub fn intern(&mut self, s: &str) -> InternedString {
        if let Some(&idx) = self.map.get(s) {
            return InternedString(idx);
        }

        let idx = self.spans.len() as u32;
        let start = self.buffer.len() as u32;
        self.buffer.push_str(s);
        self.spans.push((start, s.len() as u32));
        self.map.insert(s.into(), idx);

        InternedString(idx)
    }

    /// Look up a string without interning it
    pub fn lookup(&self, s: &str) -> Option<InternedString> {
        self.map.get(s).map(|&idx| InternedString(idx))
    }

    /// Get the string for an interned ID
    #[inline]
    pub fn get(&self, id: InternedString) -> &str {
        match self.spans.get(id.0 as usize) {
            Some(&(start, len)) => &self.buffer[start as usize..(start + len) as usize],
            None => "",
        }
    }

    /// Number of interned strings
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }
}

impl Default for StringInterner {
    fn default() -> Self {
        Self::new()
    }
}

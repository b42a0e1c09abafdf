//! Paths - Where a callback was invoked from

use std::fmt;
use std::rc::{Rc, Weak};

use crate::record::RecordCell;
use crate::Record;

/// One step from the root record to a bound position
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Key(Rc<str>),
    Index(usize),
}

/// Location handed to change and mount callbacks.
///
/// Holds the root record, the record that owns the key (`target`), the key
/// segments leading to it and, inside a list, the item index.
#[derive(Clone)]
pub struct Path {
    root: Weak<RecordCell>,
    target: Weak<RecordCell>,
    segments: Rc<[Segment]>,
    index: Option<usize>,
}

impl Path {
    pub(crate) fn new(root: Weak<RecordCell>, target: Weak<RecordCell>, segments: Rc<[Segment]>) -> Self {
        Self {
            root,
            target,
            segments,
            index: None,
        }
    }

    pub(crate) fn set_index(&mut self, index: Option<usize>) {
        self.index = index;
    }

    /// The record passed to the top-level bind
    pub fn root(&self) -> Option<Record> {
        Record::upgrade(&self.root)
    }

    /// The record that owns the key being written
    pub fn target(&self) -> Option<Record> {
        Record::upgrade(&self.target)
    }

    /// Segments from the root to the key, excluding the item index
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// The key being written
    pub fn key(&self) -> &str {
        self.segments
            .iter()
            .rev()
            .find_map(|s| match s {
                Segment::Key(k) => Some(&**k),
                Segment::Index(_) => None,
            })
            .unwrap_or("")
    }

    /// Item index when the key holds a list
    pub fn index(&self) -> Option<usize> {
        self.index
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for segment in self.segments.iter() {
            match segment {
                Segment::Key(key) if first => write!(f, "{key}")?,
                Segment::Key(key) => write!(f, ".{key}")?,
                Segment::Index(i) => write!(f, "[{i}]")?,
            }
            first = false;
        }
        if let Some(i) = self.index {
            write!(f, "[{i}]")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Path")
            .field("segments", &self.segments)
            .field("index", &self.index)
            .finish()
    }
}

//! Path addressing into the state tree
//!
//! A path is an ordered sequence of string segments naming a descent from
//! the root of the state tree. Array indices appear as decimal-string
//! segments, exactly as they do on the wire.
//!
//! # Why a Newtype?
//!
//! `Vec<String>` alone would work, but wrapping it lets us attach the
//! prefix-matching rule (`spec.md` §3: "L is a prefix of Q") as a method
//! rather than re-deriving it at every call site, and gives us a cheap
//! `Display` impl for log lines.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An ordered sequence of string segments from the root of the state tree.
///
/// The empty path denotes the root. Equality and prefix comparisons are
/// segment-by-segment string comparisons; there is no notion of a
/// separator character since segments never contain one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Path(pub Vec<String>);

impl Path {
    /// The empty path, denoting the root of the tree.
    pub fn root() -> Self {
        Path(Vec::new())
    }

    /// Build a path from segments.
    pub fn new(segments: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Path(segments.into_iter().map(Into::into).collect())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns a new path with `segment` appended.
    pub fn child(&self, segment: impl Into<String>) -> Path {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Path(segments)
    }

    /// True iff `self` is a prefix of `other`, with the empty path matching
    /// everything (`spec.md` §3, invariant: "L is a prefix of Q").
    pub fn is_prefix_of(&self, other: &Path) -> bool {
        self.0.len() <= other.0.len() && self.0.iter().zip(other.0.iter()).all(|(a, b)| a == b)
    }

    /// Stringify an array index the way the wire protocol does: as a
    /// decimal segment.
    pub fn index_segment(index: usize) -> String {
        index.to_string()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.0.join("/"))
    }
}

impl From<Vec<String>> for Path {
    fn from(segments: Vec<String>) -> Self {
        Path(segments)
    }
}

impl<'a> From<&'a [&'a str]> for Path {
    fn from(segments: &'a [&'a str]) -> Self {
        Path(segments.iter().map(|s| s.to_string()).collect())
    }
}

//! Semantic labels: the namespaced type tags carried by every value.
//!
//! A label has the shape `"<vessel>.<TypeName>"`.  The vessel part is the
//! namespace that owns the label (and its conversion rules); the rest is the
//! type name inside that namespace.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Suffix that marks a label as a control signal.
pub const SIGNAL_SUFFIX: &str = ".Signal";

/// Label used when a value's type could not be resolved.
pub const UNKNOWN_LABEL: &str = "unknown";

/// A fully-qualified semantic label such as `basic.String`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SemanticLabel(String);

impl SemanticLabel {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    /// Build a label from its vessel namespace and type name.
    pub fn qualified(vessel: &str, type_name: &str) -> Self {
        Self(format!("{vessel}.{type_name}"))
    }

    /// The `"unknown"` sentinel.
    pub fn unknown() -> Self {
        Self(UNKNOWN_LABEL.to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Namespace before the first `.` (the whole label if there is none).
    pub fn vessel(&self) -> &str {
        self.0.split_once('.').map_or(self.0.as_str(), |(v, _)| v)
    }

    /// Everything after the first `.`, or `""` for an unqualified label.
    pub fn type_name(&self) -> &str {
        self.0.split_once('.').map_or("", |(_, t)| t)
    }

    pub fn is_unknown(&self) -> bool {
        self.0 == UNKNOWN_LABEL
    }

    /// `true` for labels ending in `.Signal`.
    pub fn is_signal(&self) -> bool {
        self.0.ends_with(SIGNAL_SUFFIX)
    }

    /// Wildcard match against `pattern`.
    ///
    /// Patterns are compared segment by segment on `.`; a `*` inside a
    /// segment matches any run of characters within that segment, so
    /// `basic.*` matches every label in the `basic` namespace.  A bare `*`
    /// matches everything.
    pub fn matches(&self, pattern: &str) -> bool {
        if pattern == "*" {
            return true;
        }

        let mut labels = self.0.split('.');
        let mut patterns = pattern.split('.');
        loop {
            match (labels.next(), patterns.next()) {
                (None, None) => return true,
                (Some(l), Some(p)) if segment_matches(l, p) => continue,
                _ => return false,
            }
        }
    }
}

/// Glob match of a single segment where `*` matches any substring.
fn segment_matches(segment: &str, pattern: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return segment == pattern;
    }

    let (first, last) = (parts[0], parts[parts.len() - 1]);
    if !segment.starts_with(first) || segment.len() < first.len() + last.len() {
        return false;
    }
    if !segment[first.len()..].ends_with(last) {
        return false;
    }

    // Middle pieces must appear in order between the anchored ends.
    let mut rest = &segment[first.len()..segment.len() - last.len()];
    for middle in &parts[1..parts.len() - 1] {
        match rest.find(middle) {
            Some(at) => rest = &rest[at + middle.len()..],
            None => return false,
        }
    }
    true
}

impl fmt::Display for SemanticLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SemanticLabel {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for SemanticLabel {
    fn from(s: String) -> Self {
        Self(s)
    }
}

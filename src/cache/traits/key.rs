//! Query keys addressing cache slots

use std::fmt;

use serde::{Deserialize, Serialize};

/// Ordered sequence of string segments identifying one cache slot,
/// e.g. `["property", "42"]`.
///
/// Two keys address the same slot exactly when their segments are equal in
/// order, which is the same relation as comparing their JSON serializations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct QueryKey(Vec<String>);

impl QueryKey {
    /// Build a key from any sequence of string-like segments
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// Key segments in order
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Number of segments
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True for the empty key
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether `prefix` addresses this slot or one of its ancestors
    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(&self.0) {
            Ok(json) => f.write_str(&json),
            Err(_) => write!(f, "{:?}", self.0),
        }
    }
}

impl<S: Into<String>, const N: usize> From<[S; N]> for QueryKey {
    fn from(segments: [S; N]) -> Self {
        Self::new(segments)
    }
}

impl From<Vec<String>> for QueryKey {
    fn from(segments: Vec<String>) -> Self {
        Self(segments)
    }
}

impl From<&[&str]> for QueryKey {
    fn from(segments: &[&str]) -> Self {
        Self::new(segments.iter().copied())
    }
}

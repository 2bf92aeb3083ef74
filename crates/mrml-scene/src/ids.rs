//! Node identifiers
//!
//! Provides [`NodeId`], the string key under which a [`crate::SceneGraph`]
//! stores its nodes.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt::{self, Display, Formatter};

/// Identifier of a node inside one scene
///
/// Ids are assigned by [`crate::SceneGraph::add_node`] as the node's type name
/// followed by a per-type counter (`Model1`, `ModelDisplay3`, ...).
/// Cross-references between nodes are plain ids, never owning pointers.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Wrap an existing id string
    #[inline]
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Id string
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the inner string
    #[inline]
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NodeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl PartialEq<str> for NodeId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for NodeId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn display_matches_inner() {
        let id = NodeId::new("Model1");
        assert_eq!(id.to_string(), "Model1");
        assert_eq!(id, "Model1");
    }

    #[test]
    fn borrow_allows_str_lookup() {
        let mut map = HashMap::new();
        map.insert(NodeId::new("ModelDisplay2"), 7);
        assert_eq!(map.get("ModelDisplay2"), Some(&7));
    }
}

//! Scene nodes
//!
//! Provides [`Node`] and its [`NodeKind`] classification.

use crate::ids::NodeId;
use std::collections::BTreeMap;

/// Node kind classification
///
/// Only [`NodeKind::Displayable`] nodes own display/storage dependents for
/// the purpose of cascade removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NodeKind {
    /// Data node that can be shown (model, volume, fiducial list)
    Displayable,

    /// Display configuration dependent
    Display,

    /// Persistence dependent
    Storage,

    /// Hierarchy/folder node
    Hierarchy,

    /// Transform node
    Transform,

    /// Anything else (selection, color tables, ...)
    #[default]
    Other,
}

impl NodeKind {
    /// Whether removing a node of this kind may cascade to its dependents
    #[inline]
    #[must_use]
    pub fn owns_dependents(self) -> bool {
        matches!(self, Self::Displayable)
    }
}

/// A scene entity
///
/// Nodes reference each other by [`NodeId`] only. A node built with
/// [`Node::new`] has no id until it is inserted into a scene.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    id: Option<NodeId>,
    type_name: String,
    kind: NodeKind,
    name: Option<String>,
    display_node_ids: Vec<NodeId>,
    storage_node_ids: Vec<NodeId>,
    parent_node_id: Option<NodeId>,
    hide_from_editors: bool,
    attributes: BTreeMap<String, String>,
}

impl Node {
    /// Create a detached node
    #[must_use]
    pub fn new(type_name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: None,
            type_name: type_name.into(),
            kind,
            name: None,
            display_node_ids: Vec::new(),
            storage_node_ids: Vec::new(),
            parent_node_id: None,
            hide_from_editors: false,
            attributes: BTreeMap::new(),
        }
    }

    /// Displayable data node (`Model`, `ScalarVolume`, ...)
    #[inline]
    #[must_use]
    pub fn displayable(type_name: impl Into<String>) -> Self {
        Self::new(type_name, NodeKind::Displayable)
    }

    /// Display dependent
    #[inline]
    #[must_use]
    pub fn display(type_name: impl Into<String>) -> Self {
        Self::new(type_name, NodeKind::Display)
    }

    /// Storage dependent
    #[inline]
    #[must_use]
    pub fn storage(type_name: impl Into<String>) -> Self {
        Self::new(type_name, NodeKind::Storage)
    }

    /// With a human readable name
    #[inline]
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// With a display dependent reference
    #[inline]
    #[must_use]
    pub fn with_display_node(mut self, id: NodeId) -> Self {
        self.display_node_ids.push(id);
        self
    }

    /// With a storage dependent reference
    #[inline]
    #[must_use]
    pub fn with_storage_node(mut self, id: NodeId) -> Self {
        self.storage_node_ids.push(id);
        self
    }

    /// With a parent reference
    #[inline]
    #[must_use]
    pub fn with_parent(mut self, id: NodeId) -> Self {
        self.parent_node_id = Some(id);
        self
    }

    /// Hidden from editors
    #[inline]
    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.hide_from_editors = true;
        self
    }

    /// With a free-form attribute
    #[inline]
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Assigned id, `None` while detached
    #[inline]
    #[must_use]
    pub fn id(&self) -> Option<&NodeId> {
        self.id.as_ref()
    }

    pub(crate) fn assign_id(&mut self, id: NodeId) {
        self.id = Some(id);
    }

    /// Concrete type name
    #[inline]
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Kind classification
    #[inline]
    #[must_use]
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Human readable name
    #[inline]
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Set or clear the name
    pub fn set_name(&mut self, name: Option<String>) {
        self.name = name;
    }

    /// Display dependents, in insertion order
    #[inline]
    #[must_use]
    pub fn display_node_ids(&self) -> &[NodeId] {
        &self.display_node_ids
    }

    /// Storage dependents, in insertion order
    #[inline]
    #[must_use]
    pub fn storage_node_ids(&self) -> &[NodeId] {
        &self.storage_node_ids
    }

    /// First display dependent
    #[inline]
    #[must_use]
    pub fn display_node_id(&self) -> Option<&NodeId> {
        self.display_node_ids.first()
    }

    /// First storage dependent
    #[inline]
    #[must_use]
    pub fn storage_node_id(&self) -> Option<&NodeId> {
        self.storage_node_ids.first()
    }

    /// Parent reference
    #[inline]
    #[must_use]
    pub fn parent_node_id(&self) -> Option<&NodeId> {
        self.parent_node_id.as_ref()
    }

    /// Whether editors should hide this node
    #[inline]
    #[must_use]
    pub fn hide_from_editors(&self) -> bool {
        self.hide_from_editors
    }

    /// Set the hidden flag
    pub fn set_hide_from_editors(&mut self, hidden: bool) {
        self.hide_from_editors = hidden;
    }

    /// Attribute lookup
    #[inline]
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// All attributes, sorted by key
    #[inline]
    #[must_use]
    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    /// Set an attribute, returning the previous value
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.attributes.insert(key.into(), value.into())
    }

    /// Whether this node references `target` in any role
    #[must_use]
    pub fn references(&self, target: &NodeId) -> bool {
        self.display_node_ids.contains(target)
            || self.storage_node_ids.contains(target)
            || self.parent_node_id.as_ref() == Some(target)
    }

    pub(crate) fn push_display_node(&mut self, id: NodeId) {
        if !self.display_node_ids.contains(&id) {
            self.display_node_ids.push(id);
        }
    }

    pub(crate) fn push_storage_node(&mut self, id: NodeId) {
        if !self.storage_node_ids.contains(&id) {
            self.storage_node_ids.push(id);
        }
    }

    pub(crate) fn set_parent_node_id(&mut self, id: Option<NodeId>) {
        self.parent_node_id = id;
    }

    /// Drop every reference to `target`; returns whether anything changed
    pub(crate) fn strip_reference(&mut self, target: &NodeId) -> bool {
        let before = self.display_node_ids.len() + self.storage_node_ids.len();
        self.display_node_ids.retain(|id| id != target);
        self.storage_node_ids.retain(|id| id != target);
        let mut changed = before != self.display_node_ids.len() + self.storage_node_ids.len();
        if self.parent_node_id.as_ref() == Some(target) {
            self.parent_node_id = None;
            changed = true;
        }
        changed
    }
}

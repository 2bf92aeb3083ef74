//! Scene graph arena
//!
//! Provides [`SceneGraph`], the owner of every [`Node`] of one open document.
//! Nodes live in an insertion-ordered arena keyed by [`NodeId`]; all
//! cross-references are id lookups.

use crate::config::SceneConfig;
use crate::error::SceneError;
use crate::events::{SceneEvent, SceneObserver};
use crate::ids::NodeId;
use crate::lifecycle::NodeLifecycleManager;
use crate::node::Node;
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Scene graph for one open document
///
/// Removing a node strips every reference to it from the remaining nodes and
/// then runs the [`NodeLifecycleManager`] synchronously, so by the time
/// [`SceneGraph::remove_node`] returns all orphaned dependents are gone.
pub struct SceneGraph {
    /// Node arena, insertion ordered
    nodes: IndexMap<NodeId, Node>,

    /// Per-type id counters; never reset while the scene exists
    counters: HashMap<String, u64>,

    /// Every id handed out, including those of removed nodes
    issued: HashSet<NodeId>,

    lifecycle: NodeLifecycleManager,
    observers: Vec<Arc<dyn SceneObserver>>,
    closing: bool,
    batch_depth: usize,
}

impl SceneGraph {
    /// Create empty scene with default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(SceneConfig::default())
    }

    /// Create empty scene
    #[must_use]
    pub fn with_config(config: SceneConfig) -> Self {
        Self {
            nodes: IndexMap::new(),
            counters: HashMap::new(),
            issued: HashSet::new(),
            lifecycle: NodeLifecycleManager::new(config),
            observers: Vec::new(),
            closing: false,
            batch_depth: 0,
        }
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> SceneConfig {
        self.lifecycle.config()
    }

    /// Lifecycle manager bound to this scene
    #[inline]
    #[must_use]
    pub fn lifecycle(&self) -> &NodeLifecycleManager {
        &self.lifecycle
    }

    /// Enable or disable display/storage auto-removal
    pub fn set_auto_remove(&mut self, enabled: bool) {
        self.lifecycle.set_auto_remove(enabled);
    }

    /// Register an observer
    pub fn add_observer(&mut self, observer: Arc<dyn SceneObserver>) {
        self.observers.push(observer);
    }

    /// Insert a node, assigning a fresh id
    pub fn add_node(&mut self, mut node: Node) -> NodeId {
        let id = self.next_id(node.type_name());
        node.assign_id(id.clone());
        self.nodes.insert(id.clone(), node);
        tracing::trace!("added node {}", id);
        self.notify(&SceneEvent::NodeAdded(id.clone()));
        id
    }

    fn next_id(&mut self, type_name: &str) -> NodeId {
        let counter = self.counters.entry(type_name.to_string()).or_insert(0);
        loop {
            *counter += 1;
            let candidate = NodeId::new(format!("{type_name}{counter}"));
            // `Model1` + 1 and `Model` + 11 spell the same id
            if self.issued.insert(candidate.clone()) {
                return candidate;
            }
        }
    }

    /// Lookup node
    #[inline]
    #[must_use]
    pub fn get_node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Lookup node for mutation
    ///
    /// Reference lists are not editable through this handle; use
    /// [`SceneGraph::add_display_node`] and friends.
    #[inline]
    pub fn get_node_mut(&mut self, id: &NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    /// Check presence
    #[inline]
    #[must_use]
    pub fn is_present(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Number of nodes
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if scene is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate nodes in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Node ids in insertion order
    #[must_use]
    pub fn ids(&self) -> Vec<NodeId> {
        self.nodes.keys().cloned().collect()
    }

    /// Nodes with the given type name
    #[must_use]
    pub fn nodes_by_type(&self, type_name: &str) -> Vec<&Node> {
        self.nodes
            .values()
            .filter(|n| n.type_name() == type_name)
            .collect()
    }

    /// Nodes referencing `target` as display, storage or parent
    #[must_use]
    pub fn referencing_nodes(&self, target: &NodeId) -> Vec<&Node> {
        self.nodes
            .values()
            .filter(|n| n.references(target))
            .collect()
    }

    /// Attach a display dependent to `owner`
    ///
    /// # Errors
    /// Returns [`SceneError::NodeNotFound`] if either node is absent
    pub fn add_display_node(&mut self, owner: &NodeId, display: &NodeId) -> Result<(), SceneError> {
        self.require(display)?;
        self.owner_mut(owner)?.push_display_node(display.clone());
        Ok(())
    }

    /// Attach a storage dependent to `owner`
    ///
    /// # Errors
    /// Returns [`SceneError::NodeNotFound`] if either node is absent
    pub fn add_storage_node(&mut self, owner: &NodeId, storage: &NodeId) -> Result<(), SceneError> {
        self.require(storage)?;
        self.owner_mut(owner)?.push_storage_node(storage.clone());
        Ok(())
    }

    /// Set or clear the parent reference of `child`
    ///
    /// # Errors
    /// Returns [`SceneError::NodeNotFound`] if `child` or a given parent is absent
    pub fn set_parent(&mut self, child: &NodeId, parent: Option<&NodeId>) -> Result<(), SceneError> {
        if let Some(parent) = parent {
            self.require(parent)?;
        }
        self.owner_mut(child)?.set_parent_node_id(parent.cloned());
        Ok(())
    }

    fn require(&self, id: &NodeId) -> Result<(), SceneError> {
        if self.is_present(id) {
            Ok(())
        } else {
            Err(SceneError::NodeNotFound(id.clone()))
        }
    }

    fn owner_mut(&mut self, id: &NodeId) -> Result<&mut Node, SceneError> {
        self.nodes
            .get_mut(id)
            .ok_or_else(|| SceneError::NodeNotFound(id.clone()))
    }

    /// Remove a node and cascade to orphaned dependents
    ///
    /// No-op returning `None` when the id is absent. The returned node is the
    /// snapshot taken at removal, references intact.
    pub fn remove_node(&mut self, id: &NodeId) -> Option<Node> {
        let removed = self.nodes.shift_remove(id)?;

        for node in self.nodes.values_mut() {
            node.strip_reference(id);
        }

        tracing::trace!("removed node {}", id);
        self.notify(&SceneEvent::NodeRemoved(id.clone()));

        let lifecycle = self.lifecycle;
        lifecycle.on_node_removed(self, &removed);

        Some(removed)
    }

    /// Close the scene, removing every node without cascade cleanup
    ///
    /// Id counters survive, so ids issued afterwards are never reused.
    pub fn clear(&mut self) {
        self.closing = true;
        let removed: Vec<NodeId> = self.nodes.drain(..).map(|(id, _)| id).collect();
        for id in removed {
            self.notify(&SceneEvent::NodeRemoved(id));
        }
        self.closing = false;
        tracing::debug!("scene cleared");
        self.notify(&SceneEvent::SceneCleared);
    }

    /// Whether the scene is being closed
    #[inline]
    #[must_use]
    pub fn is_closing(&self) -> bool {
        self.closing
    }

    /// Enter batch state
    pub fn start_batch(&mut self, total: usize) {
        self.batch_depth += 1;
        self.notify(&SceneEvent::BatchStarted { total });
    }

    /// Report batch progress
    pub fn report_batch_progress(&self, done: usize, total: usize) {
        self.notify(&SceneEvent::BatchProgress { done, total });
    }

    /// Leave batch state; unmatched calls are ignored
    pub fn end_batch(&mut self) {
        if self.batch_depth == 0 {
            return;
        }
        self.batch_depth -= 1;
        self.notify(&SceneEvent::BatchEnded);
    }

    /// Whether a batch is in progress
    #[inline]
    #[must_use]
    pub fn is_batch_processing(&self) -> bool {
        self.batch_depth > 0
    }

    fn notify(&self, event: &SceneEvent) {
        for observer in &self.observers {
            observer.on_event(event);
        }
    }
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SceneGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SceneGraph")
            .field("node_count", &self.nodes.len())
            .field("observer_count", &self.observers.len())
            .field("closing", &self.closing)
            .field("batch_depth", &self.batch_depth)
            .finish()
    }
}

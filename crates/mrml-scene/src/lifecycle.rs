//! Display/storage node auto-removal
//!
//! Provides [`NodeLifecycleManager`], which removes the display and storage
//! dependents of a removed node once nothing else references them.
//!
//! # Algorithm
//!
//! 1. Skip while the scene is closing or when auto-removal is disabled
//! 2. Skip unless the removed node is displayable and visible to editors
//! 3. Candidates are its display and storage ids still present in the scene
//! 4. A candidate is orphaned when no remaining node references it
//! 5. Orphans are removed; more than `batch_threshold` removals are wrapped
//!    in a batch envelope with progress after each removal

use crate::config::SceneConfig;
use crate::graph::SceneGraph;
use crate::ids::NodeId;
use crate::node::Node;
use smallvec::SmallVec;

/// Orphan list; owners rarely have more than a handful of dependents
pub type Orphans = SmallVec<[NodeId; 4]>;

/// Cascade-removal service for display and storage dependents
///
/// Stateless apart from its configuration. [`SceneGraph::remove_node`]
/// invokes it synchronously after every removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeLifecycleManager {
    config: SceneConfig,
}

impl NodeLifecycleManager {
    /// Create manager
    #[inline]
    #[must_use]
    pub fn new(config: SceneConfig) -> Self {
        Self { config }
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> SceneConfig {
        self.config
    }

    /// Whether auto-removal is enabled
    #[inline]
    #[must_use]
    pub fn is_auto_remove_enabled(&self) -> bool {
        self.config.auto_remove_display_and_storage_nodes
    }

    pub(crate) fn set_auto_remove(&mut self, enabled: bool) {
        self.config.auto_remove_display_and_storage_nodes = enabled;
    }

    /// Dependents of `removed` that no remaining node references
    ///
    /// `removed` must already be out of `scene`. Returns nothing when the
    /// removed node does not trigger a cascade.
    #[must_use]
    pub fn orphaned_dependents(&self, scene: &SceneGraph, removed: &Node) -> Orphans {
        let mut orphans = Orphans::new();

        if !removed.kind().owns_dependents() || removed.hide_from_editors() {
            return orphans;
        }

        let candidates = removed
            .display_node_ids()
            .iter()
            .chain(removed.storage_node_ids());

        for candidate in candidates {
            if orphans.contains(candidate) || !scene.is_present(candidate) {
                continue;
            }
            if scene.referencing_nodes(candidate).is_empty() {
                orphans.push(candidate.clone());
            }
        }

        orphans
    }

    /// Remove the orphaned dependents of `removed`
    ///
    /// Best effort: dependents that disappear before their turn are skipped.
    /// Returns the number of nodes removed.
    pub fn on_node_removed(&self, scene: &mut SceneGraph, removed: &Node) -> usize {
        if scene.is_closing() || !self.is_auto_remove_enabled() {
            return 0;
        }

        let orphans = self.orphaned_dependents(scene, removed);
        if orphans.is_empty() {
            return 0;
        }

        tracing::debug!(
            "removing {} orphaned dependents of {}",
            orphans.len(),
            removed.id().map_or("<detached>", NodeId::as_str)
        );
        self.remove_orphans(scene, &orphans)
    }

    /// Remove `orphans` in order, batching above the threshold
    ///
    /// Ids already gone by their turn are skipped but still count towards
    /// batch progress. Returns the number of nodes removed.
    pub(crate) fn remove_orphans(&self, scene: &mut SceneGraph, orphans: &[NodeId]) -> usize {
        let total = orphans.len();
        let batched = total > self.config.batch_threshold;
        if batched {
            scene.start_batch(total);
        }

        let mut count = 0;
        for (index, id) in orphans.iter().enumerate() {
            if scene.is_present(id) {
                scene.remove_node(id);
                count += 1;
            } else {
                tracing::trace!("orphan {} already removed", id);
            }
            if batched {
                scene.report_batch_progress(index + 1, total);
            }
        }

        if batched {
            scene.end_batch();
        }

        count
    }
}

impl Default for NodeLifecycleManager {
    fn default() -> Self {
        Self::new(SceneConfig::default())
    }
}

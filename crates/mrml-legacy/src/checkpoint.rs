//! Undo for imports that fail part way

use mrml_scene::{NodeId, SceneGraph};
use std::collections::HashSet;

/// Node ids present before an import started
pub(crate) struct SceneCheckpoint {
    existing: HashSet<NodeId>,
}

impl SceneCheckpoint {
    pub(crate) fn take(scene: &SceneGraph) -> Self {
        Self {
            existing: scene.ids().into_iter().collect(),
        }
    }

    /// Remove every node added since the checkpoint, newest first
    ///
    /// Returns the number of nodes removed; dependents swept up by an earlier
    /// removal are skipped.
    pub(crate) fn restore(self, scene: &mut SceneGraph) -> usize {
        let added: Vec<NodeId> = scene
            .ids()
            .into_iter()
            .filter(|id| !self.existing.contains(id))
            .collect();

        let mut removed = 0;
        for id in added.iter().rev() {
            if scene.remove_node(id).is_some() {
                removed += 1;
            }
        }
        tracing::debug!(added = added.len(), removed, "Rolled back partial import");
        removed
    }
}

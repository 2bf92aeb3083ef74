//! Scene notifications
//!
//! Observers registered on a [`crate::SceneGraph`] receive every
//! [`SceneEvent`] synchronously, in emission order.

use crate::ids::NodeId;

/// Notification emitted by a scene
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SceneEvent {
    /// Node inserted
    NodeAdded(NodeId),

    /// Node removed (emitted before cascade cleanup runs)
    NodeRemoved(NodeId),

    /// Bulk mutation started; observers may suppress per-node refresh
    BatchStarted {
        /// Number of items the batch will process
        total: usize,
    },

    /// Bulk mutation progress
    BatchProgress {
        /// Items processed so far
        done: usize,
        /// Items in the batch
        total: usize,
    },

    /// Bulk mutation finished
    BatchEnded,

    /// Scene closed and emptied
    SceneCleared,
}

impl SceneEvent {
    /// Whether this event belongs to the batch envelope
    #[inline]
    #[must_use]
    pub fn is_batch(&self) -> bool {
        matches!(
            self,
            Self::BatchStarted { .. } | Self::BatchProgress { .. } | Self::BatchEnded
        )
    }
}

/// Receiver of scene notifications
pub trait SceneObserver: Send + Sync {
    /// Handle one event
    fn on_event(&self, event: &SceneEvent);
}

impl<F> SceneObserver for F
where
    F: Fn(&SceneEvent) + Send + Sync,
{
    fn on_event(&self, event: &SceneEvent) {
        self(event);
    }
}

//! MRML Scene
//!
//! In-memory scene graph for medical imaging documents.
//!
//! # Core Concepts
//!
//! - [`SceneGraph`]: Arena owning every [`Node`] of one open document
//! - [`Node`]: Typed entity with display/storage dependents and a parent reference
//! - [`NodeLifecycleManager`]: Cascade removal of orphaned display/storage nodes
//! - [`SceneEvent`]: Synchronous notifications, including the batch envelope
//!
//! # Example
//!
//! ```rust
//! use mrml_scene::{Node, SceneGraph};
//!
//! let mut scene = SceneGraph::new();
//! let display = scene.add_node(Node::display("ModelDisplay"));
//! let model = scene.add_node(Node::displayable("Model"));
//! scene.add_display_node(&model, &display).unwrap();
//!
//! // Removing the model removes its now unreferenced display node
//! scene.remove_node(&model);
//! assert!(!scene.is_present(&display));
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod config;
pub mod error;
pub mod events;
pub mod graph;
pub mod ids;
pub mod lifecycle;
pub mod node;

// Re-exports
pub use config::{SceneConfig, DEFAULT_BATCH_THRESHOLD};
pub use error::SceneError;
pub use events::{SceneEvent, SceneObserver};
pub use graph::SceneGraph;
pub use ids::NodeId;
pub use lifecycle::{NodeLifecycleManager, Orphans};
pub use node::{Node, NodeKind};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for scene operations
    pub use crate::{
        Node, NodeId, NodeKind, NodeLifecycleManager, SceneConfig, SceneError, SceneEvent,
        SceneGraph, SceneObserver,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

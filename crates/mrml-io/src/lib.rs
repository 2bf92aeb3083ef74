//! MRML IO
//!
//! Reader/writer registry for [`mrml_scene::SceneGraph`] documents.
//!
//! # Core Concepts
//!
//! - [`IoHandler`]: Reader or writer for one [`FileType`] tag
//! - [`IoRegistry`]: Append-only handler list with confidence-scored selection
//!   and ordered load/save fallback
//! - [`IoProperties`]: Property bag passed to handlers (`fileName`, `nodeID`, ...)
//! - [`IoOutcome`]: Success flag, loaded node ids and [`UserMessage`]s
//!
//! # Example
//!
//! ```rust
//! use mrml_io::{FileType, IoContext, IoError, IoHandler, IoProperties, IoRegistry};
//! use mrml_scene::{Node, NodeId, SceneGraph};
//!
//! struct TextReader;
//!
//! impl IoHandler for TextReader {
//!     fn file_type(&self) -> FileType {
//!         FileType::new("TextFile")
//!     }
//!     fn description(&self) -> String {
//!         "Text".to_string()
//!     }
//!     fn extensions(&self) -> Vec<String> {
//!         vec!["*.txt".to_string()]
//!     }
//!     fn load(&self, ctx: &mut IoContext<'_>, _: &IoProperties) -> Result<Vec<NodeId>, IoError> {
//!         Ok(vec![ctx.scene_mut().add_node(Node::displayable("Text"))])
//!     }
//! }
//!
//! let mut registry = IoRegistry::new();
//! registry.register_handler(TextReader);
//! assert_eq!(registry.file_type_for("notes.txt"), "TextFile");
//!
//! let mut scene = SceneGraph::new();
//! let outcome = registry
//!     .load(&mut scene, "TextFile", &IoProperties::for_file("notes.txt"))
//!     .unwrap();
//! assert!(outcome.success);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod confidence;
pub mod error;
pub mod file_type;
pub mod handler;
pub mod message;
pub mod properties;
pub mod registry;
pub mod version;

// Re-exports
pub use confidence::{
    extension_confidence, header_adjusted_confidence, sniff_header, ExtensionPattern,
};
pub use error::IoError;
pub use file_type::{FileType, IoDirection};
pub use handler::{ArchetypeSelection, IoContext, IoHandler};
pub use message::{Severity, UserMessage};
pub use properties::{keys, IoProperties};
pub use registry::{IoOutcome, IoRegistry};
pub use version::SceneVersion;

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for IO handlers
    pub use crate::{
        ArchetypeSelection, FileType, IoContext, IoDirection, IoError, IoHandler, IoOutcome,
        IoProperties, IoRegistry, UserMessage,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

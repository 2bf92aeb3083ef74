//! MRML Legacy
//!
//! Import of legacy scene catalogs into [`mrml_scene::SceneGraph`].
//!
//! [`Slicer2SceneReader`] (`*.xml`) and [`XcedeCatalogReader`] (`*.xcat`) are
//! ordinary [`mrml_io::IoHandler`]s for the `SceneFile` tag. Register them
//! next to volume, model and overlay readers: they load the data files a
//! catalog references through those readers.
//!
//! # Example
//!
//! ```rust
//! use mrml_io::{FileType, IoRegistry};
//! use mrml_legacy::{Slicer2SceneReader, XcedeCatalogReader};
//!
//! let mut registry = IoRegistry::new();
//! registry.register_handler(Slicer2SceneReader::new());
//! registry.register_handler(XcedeCatalogReader::new());
//! assert_eq!(registry.file_type_for("case1.xml"), FileType::SCENE);
//! assert_eq!(registry.file_type_for("bert.xcat"), FileType::SCENE);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod catalog;
mod checkpoint;
pub mod error;
pub mod matrix;
pub mod slicer2;
pub mod xcede;

// Re-exports
pub use catalog::{CatalogElement, CatalogParser, JsonCatalogParser, XmlCatalogParser};
pub use error::CatalogError;
pub use slicer2::{Slicer2SceneReader, SUPPORTED_VERSION};
pub use xcede::{EntryKind, XcedeCatalogReader};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Parsed catalog trees
//!
//! A legacy scene is a tree of named elements carrying string attributes.
//! Producing the tree from a file is the job of a [`CatalogParser`]; the
//! importer only walks it. Catalogs on disk are XML ([`XmlCatalogParser`]);
//! [`JsonCatalogParser`] reads the same tree serialized as JSON.

use crate::error::CatalogError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// One element of a catalog tree
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogElement {
    /// Element name (`MRML`, `Transform`, `Volume`, ...)
    pub name: String,
    /// Attribute map
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// Nested elements, document order
    #[serde(default)]
    pub children: Vec<CatalogElement>,
}

impl CatalogElement {
    /// Create element without attributes or children
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// With attribute
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// With child
    #[must_use]
    pub fn with_child(mut self, child: CatalogElement) -> Self {
        self.children.push(child);
        self
    }

    /// Attribute value
    #[inline]
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Attribute value, key compared ignoring ASCII case
    #[must_use]
    pub fn attribute_ignore_case(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(key))
            .map(|(_, value)| value.as_str())
    }

    /// Whether the attribute is `yes` or `true`
    #[must_use]
    pub fn flag(&self, key: &str) -> bool {
        matches!(self.attribute(key), Some("yes" | "true"))
    }

    /// Total number of elements in this subtree
    #[must_use]
    pub fn element_count(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(CatalogElement::element_count)
            .sum::<usize>()
    }
}

/// Produces a [`CatalogElement`] tree from a file
pub trait CatalogParser: Send + Sync {
    /// Parse the catalog at `path`
    ///
    /// # Errors
    /// Returns [`CatalogError`] when the file cannot be read or understood
    fn parse(&self, path: &Path) -> Result<CatalogElement, CatalogError>;
}

fn read_source(path: &Path) -> Result<String, CatalogError> {
    std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Catalog parser for XML documents
///
/// Elements map one to one; text, comments and processing instructions are
/// dropped. Document type declarations are accepted but not validated.
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlCatalogParser;

impl XmlCatalogParser {
    /// Parse from a string; `origin` names the source in errors
    ///
    /// # Errors
    /// Returns [`CatalogError::Malformed`] on invalid XML
    pub fn parse_str(&self, origin: &Path, source: &str) -> Result<CatalogElement, CatalogError> {
        let mut options = roxmltree::ParsingOptions::default();
        options.allow_dtd = true;
        let document = roxmltree::Document::parse_with_options(source, options)
            .map_err(|e| CatalogError::malformed(origin, e.to_string()))?;
        Ok(element_from_xml(document.root_element()))
    }
}

impl CatalogParser for XmlCatalogParser {
    fn parse(&self, path: &Path) -> Result<CatalogElement, CatalogError> {
        let source = read_source(path)?;
        self.parse_str(path, &source)
    }
}

fn element_from_xml(node: roxmltree::Node<'_, '_>) -> CatalogElement {
    CatalogElement {
        name: node.tag_name().name().to_string(),
        attributes: node
            .attributes()
            .map(|attribute| (attribute.name().to_string(), attribute.value().to_string()))
            .collect(),
        children: node
            .children()
            .filter(roxmltree::Node::is_element)
            .map(element_from_xml)
            .collect(),
    }
}

/// Catalog parser for JSON-encoded element trees
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCatalogParser;

impl JsonCatalogParser {
    /// Parse from a string; `origin` names the source in errors
    ///
    /// # Errors
    /// Returns [`CatalogError::Malformed`] on invalid JSON
    pub fn parse_str(&self, origin: &Path, source: &str) -> Result<CatalogElement, CatalogError> {
        serde_json::from_str(source).map_err(|e| CatalogError::malformed(origin, e.to_string()))
    }
}

impl CatalogParser for JsonCatalogParser {
    fn parse(&self, path: &Path) -> Result<CatalogElement, CatalogError> {
        let source = read_source(path)?;
        self.parse_str(path, &source)
    }
}

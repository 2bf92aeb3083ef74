//! Handler registry and dispatch
//!
//! Handlers are kept in registration order. Selection by file name picks the
//! highest confidence, ties going to the earliest registration. Load and save
//! try every handler for a tag in order and stop at the first success.

use crate::error::IoError;
use crate::file_type::{FileType, IoDirection};
use crate::handler::{ArchetypeSelection, IoContext, IoHandler};
use crate::message::UserMessage;
use crate::properties::{keys, IoProperties};
use mrml_scene::{NodeId, SceneGraph};
use std::path::{Path, PathBuf};

/// Result of a load or save request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IoOutcome {
    /// Whether some handler served the request
    pub success: bool,
    /// Primary node ids reported by the serving handler
    pub node_ids: Vec<NodeId>,
    /// Messages collected from every handler tried
    pub messages: Vec<UserMessage>,
}

impl IoOutcome {
    fn succeeded(node_ids: Vec<NodeId>, messages: Vec<UserMessage>) -> Self {
        Self {
            success: true,
            node_ids,
            messages,
        }
    }

    fn failed(messages: Vec<UserMessage>) -> Self {
        Self {
            success: false,
            node_ids: Vec::new(),
            messages,
        }
    }

    /// First reported node
    #[inline]
    #[must_use]
    pub fn first_node_id(&self) -> Option<&NodeId> {
        self.node_ids.first()
    }

    /// Whether any message is a warning or error
    #[must_use]
    pub fn has_warnings(&self) -> bool {
        self.messages.iter().any(UserMessage::is_warning_or_worse)
    }
}

/// Registry of reader/writer handlers
#[derive(Default)]
pub struct IoRegistry {
    handlers: Vec<Box<dyn IoHandler>>,
}

impl std::fmt::Debug for IoRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IoRegistry")
            .field("handler_count", &self.handlers.len())
            .field("file_types", &self.file_types())
            .finish()
    }
}

impl IoRegistry {
    /// Create empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler; duplicates are kept
    pub fn register_handler<H: IoHandler + 'static>(&mut self, handler: H) {
        self.register_boxed(Box::new(handler));
    }

    /// Register an already boxed handler
    pub fn register_boxed(&mut self, handler: Box<dyn IoHandler>) {
        tracing::debug!(
            file_type = %handler.file_type(),
            description = %handler.description(),
            "Registered IO handler"
        );
        self.handlers.push(handler);
    }

    /// Number of handlers
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Check if empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Handlers in registration order
    pub fn handlers(&self) -> impl Iterator<Item = &dyn IoHandler> {
        self.handlers.iter().map(|h| -> &dyn IoHandler { h.as_ref() })
    }

    /// Handlers serving `file_type`, registration order
    #[must_use]
    pub fn handlers_for_type(&self, file_type: impl AsRef<str>) -> Vec<&dyn IoHandler> {
        let tag = file_type.as_ref();
        self.handlers().filter(|h| h.file_type() == tag).collect()
    }

    /// Readers serving `file_type`, registration order
    #[must_use]
    pub fn readers_for_type(&self, file_type: impl AsRef<str>) -> Vec<&dyn IoHandler> {
        self.for_type_in_direction(file_type.as_ref(), IoDirection::Read)
    }

    /// Writers serving `file_type`, registration order
    #[must_use]
    pub fn writers_for_type(&self, file_type: impl AsRef<str>) -> Vec<&dyn IoHandler> {
        self.for_type_in_direction(file_type.as_ref(), IoDirection::Write)
    }

    fn for_type_in_direction(&self, tag: &str, direction: IoDirection) -> Vec<&dyn IoHandler> {
        self.handlers()
            .filter(|h| h.direction() == direction && h.file_type() == tag)
            .collect()
    }

    /// Reader most confident it can load `file_name`
    ///
    /// Catch-all handlers are only considered when no specific handler
    /// scores above zero.
    #[must_use]
    pub fn select_handler(&self, file_name: impl AsRef<Path>) -> Option<&dyn IoHandler> {
        let path = file_name.as_ref();
        let mut specific: Option<(&dyn IoHandler, f64)> = None;
        let mut fallback: Option<(&dyn IoHandler, f64)> = None;

        for handler in self.handlers().filter(|h| h.direction() == IoDirection::Read) {
            let confidence = handler.can_load_confidence(path);
            if confidence <= 0.0 {
                continue;
            }
            let slot = if handler.is_generic() {
                &mut fallback
            } else {
                &mut specific
            };
            // Strictly greater keeps the earliest registration on ties
            if slot.map_or(true, |(_, best)| confidence > best) {
                *slot = Some((handler, confidence));
            }
        }

        let selected = specific.or(fallback);
        if let Some((handler, confidence)) = selected {
            tracing::debug!(
                path = %path.display(),
                file_type = %handler.file_type(),
                confidence,
                "Selected IO handler"
            );
        } else {
            tracing::debug!(path = %path.display(), "No IO handler for file");
        }
        selected.map(|(handler, _)| handler)
    }

    /// Tag of the selected reader, [`FileType::NO_FILE`] when none
    #[must_use]
    pub fn file_type_for(&self, file_name: impl AsRef<Path>) -> FileType {
        self.select_handler(file_name)
            .map_or(FileType::NO_FILE, |h| h.file_type())
    }

    /// Load through the readers of `file_type`
    ///
    /// Readers are tried in registration order; the first whose `can_load`
    /// accepts the file and whose `load` succeeds serves the request. A reader
    /// error counts as declining.
    ///
    /// # Errors
    /// Returns [`IoError::MissingProperty`] when `fileName` is absent
    pub fn load(
        &self,
        scene: &mut SceneGraph,
        file_type: impl AsRef<str>,
        properties: &IoProperties,
    ) -> Result<IoOutcome, IoError> {
        let tag = file_type.as_ref();
        let file_name = properties.require_file_name()?;
        let mut messages = Vec::new();

        for reader in self.readers_for_type(tag) {
            if !reader.can_load(&file_name) {
                tracing::debug!(
                    handler = %reader.description(),
                    path = %file_name.display(),
                    "Reader cannot load file"
                );
                continue;
            }

            let mut ctx = IoContext::new(self, scene, &mut messages);
            match reader.load(&mut ctx, properties) {
                Ok(node_ids) => {
                    tracing::info!(
                        handler = %reader.description(),
                        path = %file_name.display(),
                        loaded = node_ids.len(),
                        "Loaded file"
                    );
                    return Ok(IoOutcome::succeeded(node_ids, messages));
                }
                Err(e) => {
                    tracing::warn!(
                        handler = %reader.description(),
                        path = %file_name.display(),
                        error = %e,
                        "Reader declined file"
                    );
                }
            }
        }

        tracing::debug!(file_type = tag, path = %file_name.display(), "No reader loaded file");
        Ok(IoOutcome::failed(messages))
    }

    /// Load and return the first reported node
    ///
    /// # Errors
    /// Returns [`IoError::MissingProperty`] when `fileName` is absent
    pub fn load_nodes_and_get_first(
        &self,
        scene: &mut SceneGraph,
        file_type: impl AsRef<str>,
        properties: &IoProperties,
    ) -> Result<Option<NodeId>, IoError> {
        Ok(self
            .load(scene, file_type, properties)?
            .first_node_id()
            .cloned())
    }

    /// Load a claimed series: `fileName` is the archetype, `fileNames` every file
    ///
    /// # Errors
    /// Same as [`IoRegistry::load`]
    pub fn load_archetype(
        &self,
        scene: &mut SceneGraph,
        selection: &ArchetypeSelection,
        properties: &IoProperties,
    ) -> Result<IoOutcome, IoError> {
        let mut properties = properties
            .clone()
            .with(keys::FILE_NAME, selection.archetype.to_string_lossy().into_owned());
        properties.set_file_names(selection.all_files().as_slice());
        self.load(scene, &selection.file_type, &properties)
    }

    /// Let readers claim series from `files`; claimed files are removed
    pub fn examine_file_list(&self, files: &mut Vec<PathBuf>) -> Vec<ArchetypeSelection> {
        let mut selections = Vec::new();
        for reader in self.handlers().filter(|h| h.direction() == IoDirection::Read) {
            if files.is_empty() {
                break;
            }
            let claimed = reader.examine_file_list(files.as_slice());
            for selection in claimed {
                files.retain(|f| !selection.claims(f));
                tracing::debug!(
                    handler = %reader.description(),
                    archetype = %selection.archetype.display(),
                    consumed = selection.consumed.len(),
                    "Reader claimed file series"
                );
                selections.push(selection);
            }
        }
        selections
    }

    /// Save through the writers of `file_type`
    ///
    /// Writers rejecting the node via `can_write` are skipped.
    ///
    /// # Errors
    /// Returns [`IoError::MissingProperty`] when `fileName` or `nodeID` is absent
    pub fn save(
        &self,
        scene: &mut SceneGraph,
        file_type: impl AsRef<str>,
        properties: &IoProperties,
    ) -> Result<IoOutcome, IoError> {
        let tag = file_type.as_ref();
        let file_name = properties.require_file_name()?;
        let node_id = properties.require_node_id()?;
        let mut messages = Vec::new();

        for writer in self.writers_for_type(tag) {
            let writable = scene
                .get_node(&node_id)
                .is_some_and(|node| writer.can_write(node));
            if !writable {
                continue;
            }

            let mut ctx = IoContext::new(self, scene, &mut messages);
            match writer.save(&mut ctx, properties) {
                Ok(node_ids) => {
                    tracing::info!(
                        handler = %writer.description(),
                        path = %file_name.display(),
                        node = %node_id,
                        "Saved node"
                    );
                    return Ok(IoOutcome::succeeded(node_ids, messages));
                }
                Err(e) => {
                    tracing::warn!(
                        handler = %writer.description(),
                        path = %file_name.display(),
                        error = %e,
                        "Writer declined node"
                    );
                }
            }
        }

        Ok(IoOutcome::failed(messages))
    }

    /// `Description (*.a *.b)` filters, registration order
    #[must_use]
    pub fn name_filters(&self, direction: IoDirection) -> Vec<String> {
        self.handlers()
            .filter(|h| h.direction() == direction)
            .map(|h| format!("{} ({})", h.description(), h.extensions().join(" ")))
            .collect()
    }

    /// Distinct tags, registration order
    #[must_use]
    pub fn file_types(&self) -> Vec<FileType> {
        let mut types: Vec<FileType> = Vec::new();
        for handler in self.handlers() {
            let file_type = handler.file_type();
            if !types.contains(&file_type) {
                types.push(file_type);
            }
        }
        types
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Stub {
        tag: FileType,
        label: &'static str,
        patterns: &'static [&'static str],
        direction: IoDirection,
        succeed: bool,
        calls: Arc<AtomicUsize>,
    }

    impl Stub {
        fn reader(tag: FileType, label: &'static str, patterns: &'static [&'static str]) -> Self {
            Self {
                tag,
                label,
                patterns,
                direction: IoDirection::Read,
                succeed: true,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl IoHandler for Stub {
        fn file_type(&self) -> FileType {
            self.tag.clone()
        }

        fn description(&self) -> String {
            self.label.to_string()
        }

        fn extensions(&self) -> Vec<String> {
            self.patterns.iter().map(ToString::to_string).collect()
        }

        fn direction(&self) -> IoDirection {
            self.direction
        }

        fn load(&self, ctx: &mut IoContext<'_>, _: &IoProperties) -> Result<Vec<NodeId>, IoError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.succeed {
                return Err(IoError::declined(self.label, "stub failure"));
            }
            let id = ctx
                .scene_mut()
                .add_node(mrml_scene::Node::displayable("Model").with_name(self.label));
            Ok(vec![id])
        }
    }

    #[test]
    fn handlers_for_type_keeps_order_and_duplicates() {
        let mut registry = IoRegistry::new();
        registry.register_handler(Stub::reader(FileType::MODEL, "a", &["*.vtk"]));
        registry.register_handler(Stub::reader(FileType::VOLUME, "b", &["*.nrrd"]));
        registry.register_handler(Stub::reader(FileType::MODEL, "c", &["*.vtk"]));

        let labels: Vec<String> = registry
            .handlers_for_type("ModelFile")
            .iter()
            .map(|h| h.description())
            .collect();
        assert_eq!(labels, vec!["a", "c"]);
        assert!(registry.handlers_for_type("Unknown").is_empty());
        assert_eq!(registry.file_types(), vec![FileType::MODEL, FileType::VOLUME]);
    }

    #[test]
    fn select_prefers_longer_suffix() {
        let mut registry = IoRegistry::new();
        registry.register_handler(Stub::reader(FileType::new("Gz"), "gz", &["*.gz"]));
        registry.register_handler(Stub::reader(FileType::VOLUME, "nifti", &["*.nii.gz", "*.nii"]));

        assert_eq!(registry.file_type_for("t1.nii.gz"), FileType::VOLUME);
        assert_eq!(registry.file_type_for("notes.gz"), "Gz");
        assert_eq!(registry.file_type_for("mesh.stl"), FileType::NO_FILE);
    }

    #[test]
    fn catch_all_is_fallback_only() {
        let mut registry = IoRegistry::new();
        registry.register_handler(Stub::reader(FileType::new("Any"), "any", &["*.*"]));
        registry.register_handler(Stub::reader(FileType::MODEL, "vtk", &["*.vtk"]));

        assert_eq!(registry.file_type_for("m.vtk"), FileType::MODEL);
        assert_eq!(registry.file_type_for("m.stl"), "Any");
    }

    #[test]
    fn load_without_file_name_is_error() {
        let registry = IoRegistry::new();
        let mut scene = SceneGraph::new();
        let err = registry
            .load(&mut scene, FileType::MODEL, &IoProperties::new())
            .unwrap_err();
        assert!(err.is_precondition());
    }

    #[test]
    fn load_without_handler_is_unsuccessful() {
        let registry = IoRegistry::new();
        let mut scene = SceneGraph::new();
        let outcome = registry
            .load(&mut scene, FileType::MODEL, &IoProperties::for_file("m.vtk"))
            .unwrap();
        assert!(!outcome.success);
        assert!(outcome.node_ids.is_empty());
    }

    #[test]
    fn failing_reader_falls_through() {
        let mut failing = Stub::reader(FileType::MODEL, "broken", &["*.vtk"]);
        failing.succeed = false;
        let failing_calls = failing.calls.clone();
        let working = Stub::reader(FileType::MODEL, "working", &["*.vtk"]);

        let mut registry = IoRegistry::new();
        registry.register_handler(failing);
        registry.register_handler(working);

        let mut scene = SceneGraph::new();
        let outcome = registry
            .load(&mut scene, FileType::MODEL, &IoProperties::for_file("m.vtk"))
            .unwrap();

        assert!(outcome.success);
        assert_eq!(failing_calls.load(Ordering::SeqCst), 1);
        let id = outcome.first_node_id().unwrap();
        assert_eq!(scene.get_node(id).unwrap().name(), Some("working"));
    }

    #[test]
    fn writers_are_not_readers() {
        let mut writer = Stub::reader(FileType::MODEL, "writer", &["*.vtk"]);
        writer.direction = IoDirection::Write;

        let mut registry = IoRegistry::new();
        registry.register_handler(writer);

        assert!(registry.select_handler("m.vtk").is_none());
        assert!(registry.readers_for_type(FileType::MODEL).is_empty());
        assert_eq!(registry.writers_for_type(FileType::MODEL).len(), 1);
        assert_eq!(
            registry.name_filters(IoDirection::Write),
            vec!["writer (*.vtk)".to_string()]
        );
        assert!(registry.name_filters(IoDirection::Read).is_empty());
    }

    #[test]
    fn save_requires_node_id() {
        let registry = IoRegistry::new();
        let mut scene = SceneGraph::new();
        let err = registry
            .save(&mut scene, FileType::MODEL, &IoProperties::for_file("m.vtk"))
            .unwrap_err();
        assert!(matches!(err, IoError::MissingProperty("nodeID")));
    }
}

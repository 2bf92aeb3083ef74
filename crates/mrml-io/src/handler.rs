//! Reader/writer handler trait
//!
//! A handler serves one file-type tag in one direction. Selection and
//! capability checks have defaults derived from [`IoHandler::extensions`];
//! handlers that can inspect file content override
//! [`IoHandler::can_load_confidence`].

use crate::confidence;
use crate::error::IoError;
use crate::file_type::{FileType, IoDirection};
use crate::message::UserMessage;
use crate::properties::IoProperties;
use crate::registry::{IoOutcome, IoRegistry};
use mrml_scene::{Node, NodeId, SceneGraph};
use std::path::{Path, PathBuf};

/// Series claimed by a handler from a list of files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchetypeSelection {
    /// File handed to the handler as `fileName`
    pub archetype: PathBuf,
    /// Other files of the series, consumed from the list
    pub consumed: Vec<PathBuf>,
    /// Handler tag that claimed the series
    pub file_type: FileType,
}

impl ArchetypeSelection {
    /// Create selection
    pub fn new(file_type: FileType, archetype: impl Into<PathBuf>) -> Self {
        Self {
            archetype: archetype.into(),
            consumed: Vec::new(),
            file_type,
        }
    }

    /// With consumed files
    #[must_use]
    pub fn with_consumed(mut self, files: impl IntoIterator<Item = PathBuf>) -> Self {
        self.consumed.extend(files);
        self
    }

    /// Archetype followed by consumed files, without duplicates
    #[must_use]
    pub fn all_files(&self) -> Vec<PathBuf> {
        let mut files = vec![self.archetype.clone()];
        for file in &self.consumed {
            if !files.contains(file) {
                files.push(file.clone());
            }
        }
        files
    }

    /// Whether `file` belongs to the selection
    #[must_use]
    pub fn claims(&self, file: &Path) -> bool {
        self.archetype == file || self.consumed.iter().any(|f| f == file)
    }
}

/// What a handler sees while serving a request
///
/// Gives access to the target scene, the registry for nested loads, and the
/// message sink of the enclosing request.
pub struct IoContext<'a> {
    registry: &'a IoRegistry,
    scene: &'a mut SceneGraph,
    messages: &'a mut Vec<UserMessage>,
}

impl<'a> IoContext<'a> {
    pub(crate) fn new(
        registry: &'a IoRegistry,
        scene: &'a mut SceneGraph,
        messages: &'a mut Vec<UserMessage>,
    ) -> Self {
        Self {
            registry,
            scene,
            messages,
        }
    }

    /// Registry serving the request
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &IoRegistry {
        self.registry
    }

    /// Target scene
    #[inline]
    #[must_use]
    pub fn scene(&self) -> &SceneGraph {
        &*self.scene
    }

    /// Target scene, mutable
    #[inline]
    pub fn scene_mut(&mut self) -> &mut SceneGraph {
        self.scene
    }

    /// Messages collected so far
    #[inline]
    #[must_use]
    pub fn messages(&self) -> &[UserMessage] {
        self.messages.as_slice()
    }

    /// Record a message
    pub fn push_message(&mut self, message: UserMessage) {
        self.messages.push(message);
    }

    /// Record a warning
    pub fn warn(&mut self, text: impl Into<String>) {
        let text = text.into();
        tracing::warn!(message = %text, "IO warning");
        self.messages.push(UserMessage::warning(text));
    }

    /// Record an informational message
    pub fn info(&mut self, text: impl Into<String>) {
        self.messages.push(UserMessage::info(text));
    }

    /// Nested load through the registry into the same scene
    ///
    /// Messages of the nested request are forwarded to this context.
    ///
    /// # Errors
    /// Same preconditions as [`IoRegistry::load`]
    pub fn load(
        &mut self,
        file_type: impl AsRef<str>,
        properties: &IoProperties,
    ) -> Result<IoOutcome, IoError> {
        let outcome = self.registry.load(self.scene, file_type, properties)?;
        self.messages.extend(outcome.messages.iter().cloned());
        Ok(outcome)
    }

    /// Nested load returning the first loaded node
    ///
    /// # Errors
    /// Same preconditions as [`IoRegistry::load`]
    pub fn load_first(
        &mut self,
        file_type: impl AsRef<str>,
        properties: &IoProperties,
    ) -> Result<Option<NodeId>, IoError> {
        Ok(self.load(file_type, properties)?.first_node_id().cloned())
    }
}

impl std::fmt::Debug for IoContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IoContext")
            .field("scene_nodes", &self.scene.len())
            .field("messages", &self.messages.len())
            .finish_non_exhaustive()
    }
}

/// Reader or writer for one file-type tag
pub trait IoHandler: Send + Sync {
    /// Tag served
    fn file_type(&self) -> FileType;

    /// Human-readable description
    fn description(&self) -> String;

    /// `*`-glob extension patterns
    fn extensions(&self) -> Vec<String>;

    /// Read or write
    fn direction(&self) -> IoDirection {
        IoDirection::Read
    }

    /// Whether any advertised pattern is a catch-all (`*`, `*.*`)
    fn is_generic(&self) -> bool {
        confidence::has_generic(&self.extensions())
    }

    /// Whether the handler accepts the file
    fn can_load(&self, file_name: &Path) -> bool {
        confidence::matches_any(&self.extensions(), file_name)
    }

    /// Selection score in `[0, 1]`; `0.0` means "cannot load"
    fn can_load_confidence(&self, file_name: &Path) -> f64 {
        confidence::extension_confidence(&self.extensions(), file_name)
    }

    /// Load into `ctx.scene_mut()`, returning the primary loaded node ids
    ///
    /// # Errors
    /// Any error is treated by the registry as this handler declining
    fn load(&self, ctx: &mut IoContext<'_>, properties: &IoProperties) -> Result<Vec<NodeId>, IoError> {
        let _ = (ctx, properties);
        Err(IoError::unsupported(self.description(), "load"))
    }

    /// Persist the node named by `nodeID`, returning the saved node ids
    ///
    /// # Errors
    /// Any error is treated by the registry as this handler declining
    fn save(&self, ctx: &mut IoContext<'_>, properties: &IoProperties) -> Result<Vec<NodeId>, IoError> {
        let _ = (ctx, properties);
        Err(IoError::unsupported(self.description(), "save"))
    }

    /// Whether the writer accepts the node
    fn can_write(&self, node: &Node) -> bool {
        let _ = node;
        true
    }

    /// Claim multi-file series from `files`
    fn examine_file_list(&self, files: &[PathBuf]) -> Vec<ArchetypeSelection> {
        let _ = files;
        Vec::new()
    }
}

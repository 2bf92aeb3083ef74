//! Testing utilities for MRML workspace
//!
//! Shared fakes, fixtures, and observers.

#![allow(missing_docs)]

use mrml_io::confidence::{extension_confidence, header_adjusted_confidence, sniff_header};
use mrml_io::{
    keys, ArchetypeSelection, FileType, IoContext, IoDirection, IoError, IoHandler,
    IoProperties, IoRegistry,
};
use mrml_scene::{Node, NodeId, NodeKind, SceneEvent, SceneGraph, SceneObserver};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Header written by [`write_color_table`]
pub const COLOR_TABLE_MAGIC: &[u8] = b"# Color table file";

/// Geometry attributes [`FakeVolumeReader`] stamps on every volume
pub const FAKE_VOLUME_SPACING: &str = "1 1 1";
pub const FAKE_VOLUME_DIMENSIONS: &str = "4 4 4";
pub const FAKE_VOLUME_IJK_TO_RAS: &str = "1 0 0 0 0 1 0 0 0 0 1 0 0 0 0 1";

// ---------------------------------------------------------------------------
// Observers
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<SceneEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn attach(scene: &mut SceneGraph) -> Arc<Self> {
        let observer = Self::new();
        scene.add_observer(observer.clone());
        observer
    }

    pub fn events(&self) -> Vec<SceneEvent> {
        self.events.lock().clone()
    }

    pub fn removed_ids(&self) -> Vec<NodeId> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                SceneEvent::NodeRemoved(id) => Some(id.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn batch_events(&self) -> Vec<SceneEvent> {
        self.events.lock().iter().filter(|e| e.is_batch()).cloned().collect()
    }

    pub fn reset(&self) {
        self.events.lock().clear();
    }
}

impl SceneObserver for RecordingObserver {
    fn on_event(&self, event: &SceneEvent) {
        self.events.lock().push(event.clone());
    }
}

// ---------------------------------------------------------------------------
// Readers
// ---------------------------------------------------------------------------

fn node_name(properties: &IoProperties, file_name: &Path) -> String {
    properties.name().map_or_else(
        || {
            file_name
                .file_stem()
                .map_or_else(String::new, |s| s.to_string_lossy().into_owned())
        },
        ToString::to_string,
    )
}

/// Model reader creating a Model owning one display and one storage node
#[derive(Debug, Clone)]
pub struct FakeModelReader {
    label: String,
    extensions: Vec<String>,
    fail: bool,
    calls: Arc<AtomicUsize>,
}

impl Default for FakeModelReader {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeModelReader {
    pub fn new() -> Self {
        Self {
            label: "Fake Model".to_string(),
            extensions: vec!["*.vtk".to_string(), "*.vtp".to_string()],
            fail: false,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Reader that always errors out of `load`
    pub fn failing() -> Self {
        Self {
            label: "Failing Model".to_string(),
            fail: true,
            ..Self::new()
        }
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = label.to_string();
        self
    }

    pub fn with_extensions(mut self, extensions: &[&str]) -> Self {
        self.extensions = extensions.iter().map(ToString::to_string).collect();
        self
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl IoHandler for FakeModelReader {
    fn file_type(&self) -> FileType {
        FileType::MODEL
    }

    fn description(&self) -> String {
        self.label.clone()
    }

    fn extensions(&self) -> Vec<String> {
        self.extensions.clone()
    }

    fn load(&self, ctx: &mut IoContext<'_>, properties: &IoProperties) -> Result<Vec<NodeId>, IoError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(IoError::declined(&self.label, "configured to fail"));
        }

        let file_name = properties.require_file_name()?;
        let scene = ctx.scene_mut();
        let display = scene.add_node(Node::display("ModelDisplay"));
        let storage = scene.add_node(
            Node::storage("ModelStorage")
                .with_attribute("fileName", file_name.to_string_lossy()),
        );
        let model = scene.add_node(
            Node::displayable("Model")
                .with_name(node_name(properties, &file_name))
                .with_display_node(display)
                .with_storage_node(storage),
        );
        Ok(vec![model])
    }
}

/// Volume reader; honors `labelMap` and `fileNames` and claims DICOM series
///
/// Every volume gets a 4x4x4 unit grid at the origin.
#[derive(Debug, Clone, Default)]
pub struct FakeVolumeReader {
    calls: Arc<AtomicUsize>,
}

impl FakeVolumeReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

impl IoHandler for FakeVolumeReader {
    fn file_type(&self) -> FileType {
        FileType::VOLUME
    }

    fn description(&self) -> String {
        "Fake Volume".to_string()
    }

    fn extensions(&self) -> Vec<String> {
        ["*.nrrd", "*.nhdr", "*.mha", "*.dcm", "*.mgz", "*.mgh", "*.nii"]
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    fn load(&self, ctx: &mut IoContext<'_>, properties: &IoProperties) -> Result<Vec<NodeId>, IoError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let file_name = properties.require_file_name()?;
        let file_count = properties.file_names().len().max(1);
        let label_map = properties.get_bool(keys::LABEL_MAP);
        let (volume_type, display_type) = if label_map {
            ("LabelMapVolume", "LabelMapVolumeDisplay")
        } else {
            ("ScalarVolume", "ScalarVolumeDisplay")
        };

        let scene = ctx.scene_mut();
        let display = scene.add_node(Node::display(display_type));
        let storage = scene.add_node(
            Node::storage("VolumeArchetypeStorage")
                .with_attribute("fileName", file_name.to_string_lossy()),
        );
        let volume = scene.add_node(
            Node::displayable(volume_type)
                .with_name(node_name(properties, &file_name))
                .with_display_node(display)
                .with_storage_node(storage)
                .with_attribute("fileCount", file_count.to_string())
                .with_attribute("spacing", FAKE_VOLUME_SPACING)
                .with_attribute("dimensions", FAKE_VOLUME_DIMENSIONS)
                .with_attribute("ijkToRAS", FAKE_VOLUME_IJK_TO_RAS),
        );
        Ok(vec![volume])
    }

    fn examine_file_list(&self, files: &[PathBuf]) -> Vec<ArchetypeSelection> {
        let mut series: Vec<(PathBuf, Vec<PathBuf>)> = Vec::new();
        for file in files {
            let is_dicom = file
                .extension()
                .is_some_and(|e| e.eq_ignore_ascii_case("dcm"));
            if !is_dicom {
                continue;
            }
            let dir = file.parent().map(Path::to_path_buf).unwrap_or_default();
            match series.iter_mut().find(|(d, _)| *d == dir) {
                Some((_, members)) => members.push(file.clone()),
                None => series.push((dir, vec![file.clone()])),
            }
        }

        series
            .into_iter()
            .filter(|(_, members)| members.len() > 1)
            .map(|(_, mut members)| {
                members.sort();
                let archetype = members.remove(0);
                ArchetypeSelection::new(FileType::VOLUME, archetype).with_consumed(members)
            })
            .collect()
    }
}

/// FreeSurfer overlay reader; requires `modelNodeId` naming a present model
///
/// Creates one storage node recording the file and the model it colors.
#[derive(Debug, Clone, Copy, Default)]
pub struct FakeOverlayReader;

impl IoHandler for FakeOverlayReader {
    fn file_type(&self) -> FileType {
        FileType::SCALAR_OVERLAY
    }

    fn description(&self) -> String {
        "Fake Overlay".to_string()
    }

    fn extensions(&self) -> Vec<String> {
        ["*.w", "*.thickness", "*.curv", "*.avg_curv", "*.sulc", "*.area", "*.annot"]
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    fn load(&self, ctx: &mut IoContext<'_>, properties: &IoProperties) -> Result<Vec<NodeId>, IoError> {
        let file_name = properties.require_file_name()?;
        let model = properties
            .get_str(keys::MODEL_NODE_ID)
            .map(NodeId::from)
            .filter(|id| ctx.scene().is_present(id))
            .ok_or_else(|| IoError::declined("Fake Overlay", "no model to color"))?;

        let id = ctx.scene_mut().add_node(
            Node::storage("ScalarOverlayStorage")
                .with_attribute("fileName", file_name.to_string_lossy())
                .with_attribute(keys::MODEL_NODE_ID, model.as_str()),
        );
        Ok(vec![id])
    }
}

/// Color table reader scoring by header presence
#[derive(Debug, Clone, Copy, Default)]
pub struct FakeColorTableReader;

impl IoHandler for FakeColorTableReader {
    fn file_type(&self) -> FileType {
        FileType::COLOR_TABLE
    }

    fn description(&self) -> String {
        "Color Table".to_string()
    }

    fn extensions(&self) -> Vec<String> {
        vec!["*.txt".to_string(), "*.ctbl".to_string()]
    }

    fn can_load_confidence(&self, file_name: &Path) -> f64 {
        let base = extension_confidence(&self.extensions(), file_name);
        header_adjusted_confidence(base, sniff_header(file_name, COLOR_TABLE_MAGIC))
    }

    fn load(&self, ctx: &mut IoContext<'_>, properties: &IoProperties) -> Result<Vec<NodeId>, IoError> {
        let file_name = properties.require_file_name()?;
        let id = ctx.scene_mut().add_node(
            Node::new("ColorTable", NodeKind::Other).with_name(node_name(properties, &file_name)),
        );
        Ok(vec![id])
    }
}

/// Plain text reader without content inspection
#[derive(Debug, Clone, Copy, Default)]
pub struct FakeTextReader;

impl IoHandler for FakeTextReader {
    fn file_type(&self) -> FileType {
        FileType::new("TextFile")
    }

    fn description(&self) -> String {
        "Text".to_string()
    }

    fn extensions(&self) -> Vec<String> {
        vec!["*.txt".to_string()]
    }
}

/// Reader accepting any file name
#[derive(Debug, Clone, Copy, Default)]
pub struct CatchAllReader;

impl IoHandler for CatchAllReader {
    fn file_type(&self) -> FileType {
        FileType::new("AnyFile")
    }

    fn description(&self) -> String {
        "Any file".to_string()
    }

    fn extensions(&self) -> Vec<String> {
        vec!["*.*".to_string()]
    }
}

// ---------------------------------------------------------------------------
// Writers
// ---------------------------------------------------------------------------

/// Model writer recording what it saved
#[derive(Debug, Clone, Default)]
pub struct FakeModelWriter {
    saved: Arc<Mutex<Vec<(NodeId, PathBuf)>>>,
}

impl FakeModelWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn saved(&self) -> Arc<Mutex<Vec<(NodeId, PathBuf)>>> {
        self.saved.clone()
    }
}

impl IoHandler for FakeModelWriter {
    fn file_type(&self) -> FileType {
        FileType::MODEL
    }

    fn description(&self) -> String {
        "Fake Model Writer".to_string()
    }

    fn extensions(&self) -> Vec<String> {
        vec!["*.vtk".to_string()]
    }

    fn direction(&self) -> IoDirection {
        IoDirection::Write
    }

    fn can_write(&self, node: &Node) -> bool {
        node.type_name() == "Model"
    }

    fn save(&self, _ctx: &mut IoContext<'_>, properties: &IoProperties) -> Result<Vec<NodeId>, IoError> {
        let file_name = properties.require_file_name()?;
        let node_id = properties.require_node_id()?;
        self.saved.lock().push((node_id.clone(), file_name));
        Ok(vec![node_id])
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Registry with model reader/writer and volume reader
pub fn model_and_volume_registry() -> IoRegistry {
    let mut registry = IoRegistry::new();
    registry.register_handler(FakeModelReader::new());
    registry.register_handler(FakeModelWriter::new());
    registry.register_handler(FakeVolumeReader::new());
    registry
}

/// Model owning one display and one storage node
pub fn add_model(scene: &mut SceneGraph) -> (NodeId, NodeId, NodeId) {
    let display = scene.add_node(Node::display("ModelDisplay"));
    let storage = scene.add_node(Node::storage("ModelStorage"));
    let model = scene.add_node(
        Node::displayable("Model")
            .with_display_node(display.clone())
            .with_storage_node(storage.clone()),
    );
    (model, display, storage)
}

pub fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

pub fn write_color_table(dir: &Path, name: &str) -> PathBuf {
    let header = String::from_utf8_lossy(COLOR_TABLE_MAGIC).into_owned();
    write_file(dir, name, &format!("{header} {name}\n0 Background 0 0 0 0\n"))
}

//! XCEDE catalog importer
//!
//! An XCEDE catalog lists FreeSurfer and FSL outputs as `entry` elements, each
//! naming a file (`uri`) and a `format`. Entries are looked up next to the
//! catalog and loaded through the registry: volumes, surface models, scalar
//! overlays onto the hemisphere model they belong to, and `register.dat`
//! registrations.
//!
//! When a catalog carries an `anat2exf` registration together with the
//! anatomical `brain.mgz` and the functional `example_func` volume, the
//! statistics volumes are moved onto the anatomy by a computed
//! `StatisticsToBrainXform` transform.

use crate::catalog::{CatalogElement, CatalogParser, XmlCatalogParser};
use crate::checkpoint::SceneCheckpoint;
use crate::matrix::{
    format_matrix, parse_matrix, parse_register_dat, statistics_to_anatomy, VolumeGeometry,
};
use glam::DMat4;
use mrml_io::{keys, FileType, IoContext, IoError, IoHandler, IoProperties};
use mrml_scene::{Node, NodeId, NodeKind};
use std::path::{Path, PathBuf};

const DESCRIPTION: &str = "Xcede Catalog";

/// Name of the transform created to align statistics with the anatomy
pub const STATISTICS_TO_BRAIN: &str = "StatisticsToBrainXform";

/// Registration that triggers the statistics alignment
pub const ANATOMY_TO_FUNCTIONAL: &str = "anat2exf";

/// What an entry's `format` loads as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Image volume
    Volume,
    /// Per-vertex values painted onto a surface
    Overlay,
    /// Linear registration
    Transform,
    /// Surface model
    Model,
}

impl EntryKind {
    /// Kind for an XCEDE format string; `None` for formats that cannot be imported
    #[must_use]
    pub fn from_format(format: &str) -> Option<Self> {
        match format {
            "FreeSurfer:mgz-1" | "FreeSurfer:mgh-1" | "nrrd:nrrd-1" | "nifti:nii-1" => Some(Self::Volume),
            "FreeSurfer:w-1"
            | "FreeSurfer:thickness-1"
            | "FreeSurfer:curv-1"
            | "FreeSurfer:avg_curv-1"
            | "FreeSurfer:sulc-1"
            | "FreeSurfer:area-1"
            | "FreeSurfer:annot-1"
            | "FreeSurfer:overlay-1" => Some(Self::Overlay),
            "FreeSurfer:matrix-1" => Some(Self::Transform),
            "FreeSurfer:surface-1" => Some(Self::Model),
            _ => None,
        }
    }
}

/// Reader for XCEDE catalogs
pub struct XcedeCatalogReader {
    parser: Box<dyn CatalogParser>,
}

impl Default for XcedeCatalogReader {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for XcedeCatalogReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XcedeCatalogReader").finish_non_exhaustive()
    }
}

impl XcedeCatalogReader {
    /// Reader using [`XmlCatalogParser`]
    #[must_use]
    pub fn new() -> Self {
        Self::with_parser(XmlCatalogParser)
    }

    /// Reader using a custom catalog parser
    #[must_use]
    pub fn with_parser(parser: impl CatalogParser + 'static) -> Self {
        Self {
            parser: Box::new(parser),
        }
    }
}

impl IoHandler for XcedeCatalogReader {
    fn file_type(&self) -> FileType {
        FileType::SCENE
    }

    fn description(&self) -> String {
        DESCRIPTION.to_string()
    }

    fn extensions(&self) -> Vec<String> {
        vec!["*.xcat".to_string()]
    }

    fn load(&self, ctx: &mut IoContext<'_>, properties: &IoProperties) -> Result<Vec<NodeId>, IoError> {
        let file_name = properties.require_file_name()?;
        let root = self.parser.parse(&file_name)?;
        if !root.name.eq_ignore_ascii_case("xcede") {
            return Err(IoError::declined(
                DESCRIPTION,
                format!("root element is '{}', not 'xcede'", root.name),
            ));
        }

        let directory = file_name
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let checkpoint = SceneCheckpoint::take(ctx.scene());
        let mut import = Import::new(directory);
        let result = import
            .element(ctx, &root)
            .and_then(|()| import.align_statistics(ctx));
        if let Err(err) = result {
            let removed = checkpoint.restore(ctx.scene_mut());
            tracing::warn!(
                path = %file_name.display(),
                removed,
                error = %err,
                "Xcede import failed; partial scene rolled back"
            );
            return Err(err);
        }

        tracing::info!(
            path = %file_name.display(),
            elements = root.element_count(),
            imported = import.loaded.len(),
            "Imported Xcede catalog"
        );
        Ok(import.loaded)
    }
}

/// One catalog entry resolved against the catalog directory
struct Entry<'a> {
    element: &'a CatalogElement,
    /// File name part of the `uri`
    file: String,
    /// `file` inside the catalog directory
    local: PathBuf,
}

impl Entry<'_> {
    fn name(&self) -> Option<&str> {
        self.element.attribute("name")
    }

    fn description(&self) -> Option<&str> {
        self.element.attribute("description")
    }

    fn hemisphere(&self) -> Option<Hemisphere> {
        if self.file.starts_with("lh.") {
            Some(Hemisphere::Left)
        } else if self.file.starts_with("rh.") {
            Some(Hemisphere::Right)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Hemisphere {
    Left,
    Right,
}

impl Hemisphere {
    fn label(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

/// State of one import
struct Import {
    directory: PathBuf,
    left_model: Option<NodeId>,
    right_model: Option<NodeId>,
    anatomy: Option<NodeId>,
    functional: Option<NodeId>,
    registration: Option<NodeId>,
    statistics: Vec<NodeId>,
    loaded: Vec<NodeId>,
}

impl Import {
    fn new(directory: PathBuf) -> Self {
        Self {
            directory,
            left_model: None,
            right_model: None,
            anatomy: None,
            functional: None,
            registration: None,
            statistics: Vec::new(),
            loaded: Vec::new(),
        }
    }

    fn element(&mut self, ctx: &mut IoContext<'_>, element: &CatalogElement) -> Result<(), IoError> {
        if element.name.eq_ignore_ascii_case("entry") {
            self.entry(ctx, element)?;
        }
        for child in &element.children {
            self.element(ctx, child)?;
        }
        Ok(())
    }

    fn entry(&mut self, ctx: &mut IoContext<'_>, element: &CatalogElement) -> Result<(), IoError> {
        let Some(uri) = element.attribute_ignore_case("uri") else {
            tracing::debug!("Catalog entry has no uri");
            return Ok(());
        };
        let Some(format) = element.attribute_ignore_case("format") else {
            tracing::debug!(uri, "Catalog entry has no format");
            return Ok(());
        };
        let Some(kind) = EntryKind::from_format(format) else {
            tracing::debug!(uri, format, "Unsupported catalog entry format");
            return Ok(());
        };

        let Some(file) = Path::new(uri).file_name() else {
            tracing::debug!(uri, "Catalog entry uri names no file");
            return Ok(());
        };
        let entry = Entry {
            element,
            file: file.to_string_lossy().into_owned(),
            local: self.directory.join(file),
        };
        if !entry.local.is_file() {
            ctx.warn(format!("Cannot find file '{}'", entry.local.display()));
            return Ok(());
        }

        tracing::debug!(file = %entry.file, ?kind, "Importing catalog entry");
        match kind {
            EntryKind::Volume => self.volume(ctx, &entry),
            EntryKind::Model => self.model(ctx, &entry),
            EntryKind::Overlay => self.overlay(ctx, &entry),
            EntryKind::Transform => {
                self.transform(ctx, &entry);
                Ok(())
            }
        }
    }

    fn volume(&mut self, ctx: &mut IoContext<'_>, entry: &Entry<'_>) -> Result<(), IoError> {
        let label_map = entry
            .element
            .attribute("labelMap")
            .and_then(|value| value.trim().parse::<i64>().ok())
            .is_some_and(|value| value != 0);
        let mut properties = IoProperties::for_file(&entry.local)
            .with(keys::LABEL_MAP, label_map)
            .with(keys::CENTERED, true)
            .with(keys::SINGLE_FILE, false)
            .with(keys::AUTO_LEVEL, !label_map);
        if let Some(name) = entry.name() {
            properties.set(keys::NAME, name);
        }

        let Some(volume) = ctx.load_first(FileType::VOLUME, &properties)? else {
            ctx.warn(format!("Could not load volume '{}'", entry.file));
            return Ok(());
        };
        self.loaded.push(volume.clone());
        set_description(ctx, &volume, entry);
        style_volume_display(ctx, &volume, &entry.file, label_map);

        if entry.file.starts_with("brain.mgz") {
            self.anatomy = Some(volume.clone());
        }
        if entry.file.starts_with("example_func") {
            self.functional = Some(volume.clone());
        }
        if entry.file.starts_with("stat") {
            self.statistics.push(volume);
        }
        Ok(())
    }

    fn model(&mut self, ctx: &mut IoContext<'_>, entry: &Entry<'_>) -> Result<(), IoError> {
        let properties = IoProperties::for_file(&entry.local);
        let Some(model) = ctx.load_first(FileType::MODEL, &properties)? else {
            ctx.warn(format!("Could not load model '{}'", entry.file));
            return Ok(());
        };
        self.loaded.push(model.clone());
        set_description(ctx, &model, entry);
        if let Some(name) = entry.name() {
            if let Some(node) = ctx.scene_mut().get_node_mut(&model) {
                node.set_name(Some(name.to_string()));
            }
        }

        let Some(hemisphere) = entry.hemisphere() else {
            return Ok(());
        };
        let slot = match hemisphere {
            Hemisphere::Left => &mut self.left_model,
            Hemisphere::Right => &mut self.right_model,
        };
        if slot.is_some() {
            ctx.warn(format!(
                "Catalog lists more than one {} hemisphere model; overlays use the first",
                hemisphere.label()
            ));
        } else {
            *slot = Some(model);
        }
        Ok(())
    }

    fn overlay(&mut self, ctx: &mut IoContext<'_>, entry: &Entry<'_>) -> Result<(), IoError> {
        let model = match entry.hemisphere() {
            Some(Hemisphere::Left) => self.left_model.clone(),
            Some(Hemisphere::Right) => self.right_model.clone(),
            None => None,
        };
        let Some(model) = model.filter(|id| ctx.scene().is_present(id)) else {
            ctx.warn(format!("No surface model for overlay '{}'", entry.file));
            return Ok(());
        };

        let properties =
            IoProperties::for_file(&entry.local).with(keys::MODEL_NODE_ID, model.as_str());
        match ctx.load_first(FileType::SCALAR_OVERLAY, &properties)? {
            Some(overlay) => self.loaded.push(overlay),
            None => ctx.warn(format!("Could not load overlay '{}'", entry.file)),
        }
        Ok(())
    }

    fn transform(&mut self, ctx: &mut IoContext<'_>, entry: &Entry<'_>) {
        if !entry.file.starts_with("register.dat") {
            tracing::debug!(file = %entry.file, "Only register.dat registrations are imported");
            return;
        }

        let matrix = match std::fs::read_to_string(&entry.local) {
            Ok(text) => parse_register_dat(&text),
            Err(e) => {
                tracing::debug!(path = %entry.local.display(), error = %e, "Unreadable registration");
                DMat4::IDENTITY
            }
        };
        let mut node = Node::new("LinearTransform", NodeKind::Transform)
            .with_attribute("matrix", format_matrix(&matrix));
        if let Some(name) = entry.name() {
            node = node.with_name(name);
        }
        if let Some(description) = entry.description() {
            node = node.with_attribute("description", description);
        }

        let id = ctx.scene_mut().add_node(node);
        self.loaded.push(id.clone());
        if entry.name() == Some(ANATOMY_TO_FUNCTIONAL) {
            self.registration = Some(id);
        }
    }

    /// Move statistics onto the anatomy when the catalog allows it
    fn align_statistics(&mut self, ctx: &mut IoContext<'_>) -> Result<(), IoError> {
        let (Some(registration), Some(anatomy), Some(functional)) =
            (&self.registration, &self.anatomy, &self.functional)
        else {
            return Ok(());
        };

        let scene = ctx.scene();
        let registration = scene
            .get_node(registration)
            .and_then(|node| node.attribute("matrix"))
            .and_then(parse_matrix)
            .unwrap_or(DMat4::IDENTITY);
        let anatomy = scene.get_node(anatomy).and_then(VolumeGeometry::from_node);
        let functional = scene.get_node(functional).and_then(VolumeGeometry::from_node);
        let (Some(anatomy), Some(functional)) = (anatomy, functional) else {
            ctx.warn("Volume geometry unavailable; statistics are not aligned to the anatomy");
            return Ok(());
        };
        let Some(matrix) = statistics_to_anatomy(&anatomy, &functional, &registration) else {
            ctx.warn("Registration is singular; statistics are not aligned to the anatomy");
            return Ok(());
        };

        let transform = ctx.scene_mut().add_node(
            Node::new("LinearTransform", NodeKind::Transform)
                .with_name(STATISTICS_TO_BRAIN)
                .with_attribute("matrix", format_matrix(&matrix)),
        );
        self.loaded.push(transform.clone());

        let targets = self.statistics.iter().chain(self.functional.iter());
        for volume in targets {
            ctx.scene_mut().set_parent(volume, Some(&transform))?;
        }
        tracing::debug!(
            transform = %transform,
            statistics = self.statistics.len(),
            "Aligned statistics to anatomy"
        );
        Ok(())
    }
}

fn set_description(ctx: &mut IoContext<'_>, id: &NodeId, entry: &Entry<'_>) {
    let Some(description) = entry.description() else {
        return;
    };
    if let Some(node) = ctx.scene_mut().get_node_mut(id) {
        node.set_attribute("description", description);
    }
}

fn style_volume_display(ctx: &mut IoContext<'_>, volume: &NodeId, file: &str, label_map: bool) {
    let display_id = ctx
        .scene()
        .get_node(volume)
        .and_then(Node::display_node_id)
        .cloned();
    let Some(display_id) = display_id else {
        return;
    };
    let Some(display_node) = ctx.scene_mut().get_node_mut(&display_id) else {
        return;
    };

    if file.starts_with("stat") {
        display_node.set_attribute("colorNodeID", "Iron");
        display_node.set_attribute("autoWindowLevel", "1");
    } else if file.starts_with("aseg") {
        display_node.set_attribute("colorNodeID", "FreeSurferLabels");
    } else {
        display_node.set_attribute("colorNodeID", "Grey");
        if !label_map {
            display_node.set_attribute("autoWindowLevel", "1");
            display_node.set_attribute("autoThreshold", "1");
        }
    }
}

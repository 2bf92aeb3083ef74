//! Slicer2 scene importer
//!
//! Walks a catalog tree depth-first and rebuilds the scene it describes.
//! Volumes and models are loaded through the registry serving the request;
//! transforms, model groups and fiducial lists are created directly.
//!
//! Transforms nest: a `Matrix` is parented to the innermost transform that
//! encloses it, and sibling matrices chain, each one becoming the parent of
//! what follows it in the same enclosing element.
//!
//! An import that fails part way removes every node it added before the
//! error is returned.

use crate::catalog::{CatalogElement, CatalogParser, XmlCatalogParser};
use crate::checkpoint::SceneCheckpoint;
use crate::matrix::{format_matrix, parse_matrix};
use glam::DMat4;
use mrml_io::{keys, FileType, IoContext, IoError, IoHandler, IoProperties, SceneVersion};
use mrml_scene::{Node, NodeId, NodeKind};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Newest scene major version understood by the importer
pub const SUPPORTED_VERSION: SceneVersion = SceneVersion::new(2, 0, 0);

/// First key handed to models that declare no `id`
pub const FIRST_GENERATED_MODEL_KEY: i64 = 1000;

const DEFAULT_TRANSFORM_NAME: &str = "Imported Transform";
const DEFAULT_VOLUME_NAME: &str = "Imported Volume";

/// Reader for Slicer2 scene catalogs
pub struct Slicer2SceneReader {
    parser: Box<dyn CatalogParser>,
}

impl Default for Slicer2SceneReader {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Slicer2SceneReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Slicer2SceneReader").finish_non_exhaustive()
    }
}

impl Slicer2SceneReader {
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

impl IoHandler for Slicer2SceneReader {
    fn file_type(&self) -> FileType {
        FileType::SCENE
    }

    fn description(&self) -> String {
        "Slicer2 Scene".to_string()
    }

    fn extensions(&self) -> Vec<String> {
        vec!["*.xml".to_string()]
    }

    fn load(&self, ctx: &mut IoContext<'_>, properties: &IoProperties) -> Result<Vec<NodeId>, IoError> {
        let file_name = properties.require_file_name()?;
        let root = self.parser.parse(&file_name)?;

        if properties.is_clear() {
            ctx.scene_mut().clear();
        }

        let directory = file_name
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let checkpoint = SceneCheckpoint::take(ctx.scene());
        let mut import = Import::new(directory);
        if let Err(err) = import.element(ctx, &root) {
            let removed = checkpoint.restore(ctx.scene_mut());
            tracing::warn!(
                path = %file_name.display(),
                removed,
                error = %err,
                "Slicer2 import failed; partial scene rolled back"
            );
            return Err(err);
        }

        tracing::info!(
            path = %file_name.display(),
            elements = root.element_count(),
            imported = import.loaded.len(),
            "Imported Slicer2 scene"
        );
        Ok(import.loaded)
    }
}

/// State of one import
struct Import {
    directory: PathBuf,
    /// One scope per open element; a matrix lands in its enclosing scope
    transform_scopes: Vec<Vec<NodeId>>,
    hierarchy_parent: Option<NodeId>,
    fiducial_list: Option<NodeId>,
    model_keys: BTreeMap<i64, NodeId>,
    loaded: Vec<NodeId>,
}

impl Import {
    fn new(directory: PathBuf) -> Self {
        Self {
            directory,
            transform_scopes: vec![Vec::new()],
            hierarchy_parent: None,
            fiducial_list: None,
            model_keys: BTreeMap::new(),
            loaded: Vec::new(),
        }
    }

    fn element(&mut self, ctx: &mut IoContext<'_>, element: &CatalogElement) -> Result<(), IoError> {
        let hierarchy_parent = self.hierarchy_parent.clone();

        self.node(ctx, element)?;

        self.transform_scopes.push(Vec::new());
        for child in &element.children {
            self.element(ctx, child)?;
        }
        self.transform_scopes.pop();

        self.hierarchy_parent = hierarchy_parent;
        Ok(())
    }

    fn node(&mut self, ctx: &mut IoContext<'_>, element: &CatalogElement) -> Result<(), IoError> {
        tracing::debug!(element = %element.name, "Importing catalog element");
        match element.name.as_str() {
            "MRML" => {
                Self::scene_header(ctx, element);
                Ok(())
            }
            // Scope only; the matrices inside carry the data
            "Transform" => Ok(()),
            "Matrix" => {
                self.matrix(ctx, element);
                Ok(())
            }
            "Volume" => self.volume(ctx, element),
            "Model" => self.model(ctx, element),
            "Hierarchy" => {
                self.hierarchy_parent = None;
                Ok(())
            }
            "ModelGroup" => {
                self.model_group(ctx, element);
                Ok(())
            }
            "ModelRef" => self.model_ref(ctx, element),
            "Fiducials" => {
                self.fiducials(ctx, element);
                Ok(())
            }
            "Point" => {
                self.point(ctx, element);
                Ok(())
            }
            "Color" => {
                Self::color(ctx, element);
                Ok(())
            }
            "Options" => {
                ctx.warn("Option nodes cannot be imported");
                Ok(())
            }
            other => {
                tracing::debug!(element = other, "Unsupported catalog element");
                Ok(())
            }
        }
    }

    fn scene_header(ctx: &mut IoContext<'_>, element: &CatalogElement) {
        if let Some(warning) = element
            .attribute("version")
            .and_then(|version| SUPPORTED_VERSION.check_major(version))
        {
            ctx.warn(warning.text);
        }
    }

    fn current_transform(&self) -> Option<NodeId> {
        self.transform_scopes
            .iter()
            .rev()
            .find_map(|scope| scope.last())
            .cloned()
    }

    fn resolve(&self, file: &str) -> PathBuf {
        let path = Path::new(file);
        if path.is_relative() {
            self.directory.join(path)
        } else {
            path.to_path_buf()
        }
    }

    fn matrix(&mut self, ctx: &mut IoContext<'_>, element: &CatalogElement) {
        let name = element.attribute("name").unwrap_or(DEFAULT_TRANSFORM_NAME);
        let matrix = match element.attribute("matrix").map(parse_matrix) {
            Some(Some(matrix)) => matrix,
            Some(None) => {
                ctx.warn(format!("Transform '{name}' has a malformed matrix; using identity"));
                DMat4::IDENTITY
            }
            None => DMat4::IDENTITY,
        };

        let mut node = Node::new("LinearTransform", NodeKind::Transform)
            .with_name(name)
            .with_attribute("matrix", format_matrix(&matrix));
        if let Some(parent) = self.current_transform() {
            node = node.with_parent(parent);
        }

        let id = ctx.scene_mut().add_node(node);
        self.loaded.push(id.clone());
        if let Some(scope) = self.transform_scopes.last_mut() {
            scope.push(id);
        }
    }

    fn volume(&mut self, ctx: &mut IoContext<'_>, element: &CatalogElement) -> Result<(), IoError> {
        let file_type = element
            .attribute("fileType")
            .unwrap_or("Basic")
            .to_ascii_lowercase();
        let name = element.attribute("name").unwrap_or(DEFAULT_VOLUME_NAME);

        let properties = match file_type.as_str() {
            "nrrd" | "generic" => {
                let file = element
                    .attribute("fileName")
                    .map(ToString::to_string)
                    .or_else(|| pattern_file_name(element));
                let Some(file) = file else {
                    ctx.warn(format!("Volume '{name}' names no file"));
                    return Ok(());
                };
                IoProperties::for_file(self.resolve(&file))
                    .with(keys::NAME, name)
                    .with(keys::LABEL_MAP, element.flag("labelMap"))
            }
            "dicom" => {
                let files: Vec<PathBuf> = element
                    .attribute("dicomFileNameList")
                    .unwrap_or_default()
                    .split_whitespace()
                    .map(|file| self.resolve(file))
                    .collect();
                let Some(first) = files.first() else {
                    ctx.warn(format!("DICOM volume '{name}' lists no files"));
                    return Ok(());
                };
                let mut properties = IoProperties::for_file(first).with(keys::NAME, name);
                properties.set_file_names(files.as_slice());
                properties
            }
            "headerless" | "basic" => {
                ctx.warn(format!(
                    "Volume '{name}' is raw image data without a header and cannot be imported"
                ));
                return Ok(());
            }
            other => {
                ctx.warn(format!("Volume '{name}' has unknown file type '{other}'"));
                return Ok(());
            }
        };

        let Some(volume) = ctx.load_first(FileType::VOLUME, &properties)? else {
            ctx.warn(format!("Could not load volume '{name}'"));
            return Ok(());
        };
        self.loaded.push(volume.clone());

        if let Some(transform) = self.current_transform() {
            ctx.scene_mut().set_parent(&volume, Some(&transform))?;
        }
        style_volume_display(ctx, &volume, element);
        Ok(())
    }

    fn model(&mut self, ctx: &mut IoContext<'_>, element: &CatalogElement) -> Result<(), IoError> {
        let Some(file) = element.attribute("fileName") else {
            ctx.warn("Model names no file");
            return Ok(());
        };
        let mut properties = IoProperties::for_file(self.resolve(file));
        if let Some(name) = element.attribute("name") {
            properties.set(keys::NAME, name);
        }

        let Some(model) = ctx.load_first(FileType::MODEL, &properties)? else {
            ctx.warn(format!("Could not load model '{file}'"));
            return Ok(());
        };
        let display = ctx
            .scene()
            .get_node(&model)
            .and_then(Node::display_node_id)
            .cloned();
        self.loaded.push(model.clone());
        if let Some(display) = &display {
            self.loaded.push(display.clone());
        }

        let key = element
            .attribute("id")
            .and_then(|id| id.trim().parse::<i64>().ok())
            .unwrap_or_else(|| self.free_model_key());
        self.model_keys.insert(key, model.clone());

        if let Some(transform) = self.current_transform() {
            ctx.scene_mut().set_parent(&model, Some(&transform))?;
        }

        let Some(display) = display else {
            return Ok(());
        };
        let Some(display) = ctx.scene_mut().get_node_mut(&display) else {
            return Ok(());
        };
        if let Some(visibility) = element.attribute("visibility") {
            display.set_attribute("visibility", if visibility == "false" { "0" } else { "1" });
        }
        if let Some(color) = element.attribute("color") {
            let color = if color.eq_ignore_ascii_case("skin") {
                "peach"
            } else {
                color
            };
            display.set_attribute("colorid", color);
        }
        Ok(())
    }

    fn free_model_key(&self) -> i64 {
        let mut key = FIRST_GENERATED_MODEL_KEY;
        while self.model_keys.contains_key(&key) {
            key += 1;
        }
        key
    }

    fn model_group(&mut self, ctx: &mut IoContext<'_>, element: &CatalogElement) {
        let mut node = Node::new("ModelHierarchy", NodeKind::Hierarchy);
        if let Some(name) = element.attribute("name") {
            node = node.with_name(name);
        }
        if let Some(visibility) = element.attribute("visibility") {
            node = node.with_attribute("visibility", if visibility == "false" { "0" } else { "1" });
        }
        if let Some(color) = element.attribute("color") {
            node = node.with_attribute("color", color);
        }
        if let Some(parent) = &self.hierarchy_parent {
            node = node.with_parent(parent.clone());
        }

        let id = ctx.scene_mut().add_node(node);
        self.loaded.push(id.clone());
        self.hierarchy_parent = Some(id);
    }

    fn model_ref(&mut self, ctx: &mut IoContext<'_>, element: &CatalogElement) -> Result<(), IoError> {
        // Some writers misspelled the attribute
        let reference = element
            .attribute("ModelRefID")
            .or_else(|| element.attribute("ModeRefID"));
        let model = reference
            .and_then(|key| key.trim().parse::<i64>().ok())
            .and_then(|key| self.model_keys.get(&key))
            .filter(|id| ctx.scene().is_present(id))
            .cloned();
        let Some(model) = model else {
            ctx.warn(format!(
                "Model reference '{}' does not match an imported model",
                reference.unwrap_or_default()
            ));
            return Ok(());
        };

        if let Some(parent) = self.hierarchy_parent.clone() {
            ctx.scene_mut().set_parent(&model, Some(&parent))?;
        }
        Ok(())
    }

    fn fiducials(&mut self, ctx: &mut IoContext<'_>, element: &CatalogElement) {
        let mut node = Node::displayable("FiducialList");
        if let Some(name) = element.attribute("name") {
            node = node.with_name(name);
        }
        for key in ["symbolSize", "textSize", "visibility", "color"] {
            if let Some(value) = element.attribute(key) {
                node = node.with_attribute(key, value);
            }
        }
        node = node.with_attribute("numberOfFiducials", "0");

        let id = ctx.scene_mut().add_node(node);
        self.loaded.push(id.clone());
        self.fiducial_list = Some(id);
    }

    fn point(&mut self, ctx: &mut IoContext<'_>, element: &CatalogElement) {
        let Some(list_id) = self.fiducial_list.clone() else {
            ctx.warn("Point outside a fiducial list was skipped");
            return;
        };
        let Some(list) = ctx.scene_mut().get_node_mut(&list_id) else {
            return;
        };

        let index = list
            .attribute("numberOfFiducials")
            .and_then(|n| n.parse::<usize>().ok())
            .unwrap_or(0);
        if let Some(xyz) = element.attribute("xyz") {
            list.set_attribute(format!("fiducial{index}.xyz"), xyz);
        }
        if let Some(label) = element.attribute("name") {
            list.set_attribute(format!("fiducial{index}.label"), label);
        }
        list.set_attribute("numberOfFiducials", (index + 1).to_string());
    }

    fn color(ctx: &mut IoContext<'_>, element: &CatalogElement) {
        let (Some(name), Some(rgb)) = (element.attribute("name"), element.attribute("diffuseColor"))
        else {
            return;
        };

        let targets: Vec<NodeId> = ctx
            .scene()
            .iter()
            .filter(|n| n.type_name() == "ModelDisplay" && n.attribute("colorid") == Some(name))
            .filter_map(|n| n.id().cloned())
            .collect();
        for id in targets {
            if let Some(display) = ctx.scene_mut().get_node_mut(&id) {
                display.set_attribute("color", rgb);
            }
        }
    }
}

fn style_volume_display(ctx: &mut IoContext<'_>, volume: &NodeId, element: &CatalogElement) {
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

    let colors = if element.attribute("colorLUT") == Some("-1") {
        "Labels"
    } else {
        "Grey"
    };
    display_node.set_attribute("colorNodeID", colors);

    let scalar = !display_node.type_name().starts_with("LabelMap");
    if element.flag("applyThreshold") {
        if scalar {
            display_node.set_attribute("applyThreshold", "1");
        } else {
            tracing::debug!(
                node_type = display_node.type_name(),
                "Threshold applies to scalar volume displays only"
            );
        }
    }
    if scalar {
        for key in ["window", "level", "lowerThreshold", "upperThreshold"] {
            if let Some(value) = element.attribute(key) {
                display_node.set_attribute(key, value);
            }
        }
    }
}

/// `filePattern` with its `%s` replaced by `filePrefix`
fn pattern_file_name(element: &CatalogElement) -> Option<String> {
    let prefix = element.attribute("filePrefix")?;
    Some(
        element
            .attribute("filePattern")
            .map_or_else(|| prefix.to_string(), |pattern| pattern.replacen("%s", prefix, 1)),
    )
}

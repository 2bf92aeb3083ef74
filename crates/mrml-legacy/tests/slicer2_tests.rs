use mrml_io::{keys, FileType, IoProperties, IoRegistry, Severity};
use mrml_legacy::{CatalogElement, CatalogError, CatalogParser, JsonCatalogParser, Slicer2SceneReader};
use mrml_scene::{Node, NodeId, SceneGraph};
use mrml_test_utils::{FakeModelReader, FakeVolumeReader};
use pretty_assertions::assert_eq;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

const SHIFT: &str = "1 0 0 10 0 1 0 20 0 0 1 30 0 0 0 1";

fn registry_with(reader: Slicer2SceneReader) -> IoRegistry {
    let mut registry = IoRegistry::new();
    registry.register_handler(reader);
    registry.register_handler(FakeVolumeReader::new());
    registry.register_handler(FakeModelReader::new());
    registry
}

fn registry() -> IoRegistry {
    registry_with(Slicer2SceneReader::new())
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn to_xml(element: &CatalogElement, out: &mut String) {
    write!(out, "<{}", element.name).unwrap();
    for (key, value) in &element.attributes {
        write!(out, " {key}=\"{}\"", escape(value)).unwrap();
    }
    out.push('>');
    for child in &element.children {
        to_xml(child, out);
    }
    write!(out, "</{}>", element.name).unwrap();
}

fn write_catalog(dir: &Path, root: &CatalogElement) -> PathBuf {
    let mut xml = String::from("<?xml version=\"1.0\" standalone='no'?>\n");
    xml.push_str("<!DOCTYPE MRML SYSTEM \"mrml20.dtd\">\n");
    to_xml(root, &mut xml);
    let path = dir.join("scene.xml");
    std::fs::write(&path, xml).unwrap();
    path
}

/// Hands out the same tree whatever the path
struct FixedCatalog(CatalogElement);

impl CatalogParser for FixedCatalog {
    fn parse(&self, _: &Path) -> Result<CatalogElement, CatalogError> {
        Ok(self.0.clone())
    }
}

fn ids(list: &[&str]) -> Vec<NodeId> {
    list.iter().map(|s| NodeId::from(*s)).collect()
}

fn node<'a>(scene: &'a SceneGraph, id: &str) -> &'a Node {
    scene.get_node(&NodeId::from(id)).unwrap()
}

fn full_catalog() -> CatalogElement {
    CatalogElement::new("MRML")
        .with_attribute("version", "2.6")
        .with_child(
            CatalogElement::new("Transform")
                .with_child(
                    CatalogElement::new("Matrix")
                        .with_attribute("name", "Shift")
                        .with_attribute("matrix", SHIFT),
                )
                .with_child(
                    CatalogElement::new("Volume")
                        .with_attribute("fileType", "NRRD")
                        .with_attribute("fileName", "head.nrrd")
                        .with_attribute("name", "Head")
                        .with_attribute("colorLUT", "0")
                        .with_attribute("applyThreshold", "yes")
                        .with_attribute("window", "100")
                        .with_attribute("level", "50"),
                )
                .with_child(
                    CatalogElement::new("Transform")
                        .with_child(CatalogElement::new("Matrix"))
                        .with_child(
                            CatalogElement::new("Model")
                                .with_attribute("fileName", "skin.vtk")
                                .with_attribute("id", "3")
                                .with_attribute("color", "Skin")
                                .with_attribute("visibility", "false"),
                        ),
                ),
        )
        .with_child(
            CatalogElement::new("Model")
                .with_attribute("fileName", "/abs/vessels.vtk")
                .with_attribute("name", "Vessels")
                .with_attribute("id", "4"),
        )
        .with_child(
            CatalogElement::new("Hierarchy").with_child(
                CatalogElement::new("ModelGroup")
                    .with_attribute("name", "Vasculature")
                    .with_child(CatalogElement::new("ModelRef").with_attribute("ModelRefID", "4")),
            ),
        )
        .with_child(
            CatalogElement::new("Fiducials")
                .with_attribute("name", "Landmarks")
                .with_child(
                    CatalogElement::new("Point")
                        .with_attribute("xyz", "1 2 3")
                        .with_attribute("name", "nasion"),
                )
                .with_child(CatalogElement::new("Point").with_attribute("xyz", "4 5 6")),
        )
        .with_child(
            CatalogElement::new("Color")
                .with_attribute("name", "peach")
                .with_attribute("diffuseColor", "1 0.8 0.6"),
        )
        .with_child(CatalogElement::new("Options"))
        .with_child(CatalogElement::new("Locator"))
}

#[test]
fn test_full_catalog_import() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = write_catalog(dir.path(), &full_catalog());
    let registry = registry();
    let mut scene = SceneGraph::new();

    let outcome = registry
        .load(&mut scene, FileType::SCENE, &IoProperties::for_file(&catalog))
        .unwrap();

    assert!(outcome.success);
    assert_eq!(
        outcome.node_ids,
        ids(&[
            "LinearTransform1",
            "ScalarVolume1",
            "LinearTransform2",
            "Model1",
            "ModelDisplay1",
            "Model2",
            "ModelDisplay2",
            "ModelHierarchy1",
            "FiducialList1",
        ])
    );

    // Transforms nest
    let shift = node(&scene, "LinearTransform1");
    assert_eq!(shift.name(), Some("Shift"));
    assert_eq!(shift.attribute("matrix"), Some(SHIFT));
    assert!(shift.parent_node_id().is_none());
    let inner = node(&scene, "LinearTransform2");
    assert_eq!(inner.name(), Some("Imported Transform"));
    assert_eq!(inner.parent_node_id().unwrap(), "LinearTransform1");

    // Data nodes follow the innermost transform
    let head = node(&scene, "ScalarVolume1");
    assert_eq!(head.name(), Some("Head"));
    assert_eq!(head.parent_node_id().unwrap(), "LinearTransform1");
    let skin = node(&scene, "Model1");
    assert_eq!(skin.name(), Some("skin"));
    assert_eq!(skin.parent_node_id().unwrap(), "LinearTransform2");

    // Relative files resolve next to the catalog
    let storage = node(&scene, "VolumeArchetypeStorage1");
    let expected = dir.path().join("head.nrrd").to_string_lossy().into_owned();
    assert_eq!(storage.attribute("fileName"), Some(expected.as_str()));
    assert_eq!(
        node(&scene, "ModelStorage2").attribute("fileName"),
        Some("/abs/vessels.vtk")
    );

    // Volume display styling
    let head_display = node(&scene, "ScalarVolumeDisplay1");
    assert_eq!(head_display.attribute("colorNodeID"), Some("Grey"));
    assert_eq!(head_display.attribute("applyThreshold"), Some("1"));
    assert_eq!(head_display.attribute("window"), Some("100"));
    assert_eq!(head_display.attribute("level"), Some("50"));

    // Model display styling, with the later Color element applied
    let skin_display = node(&scene, "ModelDisplay1");
    assert_eq!(skin_display.attribute("visibility"), Some("0"));
    assert_eq!(skin_display.attribute("colorid"), Some("peach"));
    assert_eq!(skin_display.attribute("color"), Some("1 0.8 0.6"));

    // Model group hierarchy
    let vessels = node(&scene, "Model2");
    assert_eq!(vessels.name(), Some("Vessels"));
    assert_eq!(vessels.parent_node_id().unwrap(), "ModelHierarchy1");
    assert_eq!(node(&scene, "ModelHierarchy1").name(), Some("Vasculature"));

    // Fiducials
    let landmarks = node(&scene, "FiducialList1");
    assert_eq!(landmarks.attribute("numberOfFiducials"), Some("2"));
    assert_eq!(landmarks.attribute("fiducial0.xyz"), Some("1 2 3"));
    assert_eq!(landmarks.attribute("fiducial0.label"), Some("nasion"));
    assert_eq!(landmarks.attribute("fiducial1.xyz"), Some("4 5 6"));
    assert_eq!(landmarks.attribute("fiducial1.label"), None);

    // Only the options element warns
    let warnings: Vec<&str> = outcome
        .messages
        .iter()
        .filter(|m| m.severity == Severity::Warning)
        .map(|m| m.text.as_str())
        .collect();
    assert_eq!(warnings, vec!["Option nodes cannot be imported"]);
}

#[test]
fn test_newer_scene_version_warns_and_loads() {
    let dir = tempfile::tempdir().unwrap();
    let root = CatalogElement::new("MRML")
        .with_attribute("version", "3.0")
        .with_child(CatalogElement::new("Model").with_attribute("fileName", "m.vtk"));
    let catalog = write_catalog(dir.path(), &root);
    let registry = registry();
    let mut scene = SceneGraph::new();

    let outcome = registry
        .load(&mut scene, FileType::SCENE, &IoProperties::for_file(&catalog))
        .unwrap();

    assert!(outcome.success);
    assert!(outcome.has_warnings());
    assert!(outcome.messages[0].text.contains("3.0.0"));
    assert_eq!(outcome.node_ids, ids(&["Model1", "ModelDisplay1"]));
}

#[test]
fn test_dicom_volume_passes_series() {
    let dir = tempfile::tempdir().unwrap();
    let root = CatalogElement::new("MRML").with_child(
        CatalogElement::new("Volume")
            .with_attribute("fileType", "dicom")
            .with_attribute("dicomFileNameList", "ct/1.dcm ct/2.dcm ct/3.dcm")
            .with_attribute("colorLUT", "-1"),
    );
    let catalog = write_catalog(dir.path(), &root);
    let registry = registry();
    let mut scene = SceneGraph::new();

    let outcome = registry
        .load(&mut scene, FileType::SCENE, &IoProperties::for_file(&catalog))
        .unwrap();

    assert_eq!(outcome.node_ids, ids(&["ScalarVolume1"]));
    let volume = node(&scene, "ScalarVolume1");
    assert_eq!(volume.name(), Some("Imported Volume"));
    assert_eq!(volume.attribute("fileCount"), Some("3"));
    assert_eq!(
        node(&scene, "ScalarVolumeDisplay1").attribute("colorNodeID"),
        Some("Labels")
    );
}

#[test]
fn test_label_map_volume() {
    let dir = tempfile::tempdir().unwrap();
    let root = CatalogElement::new("MRML").with_child(
        CatalogElement::new("Volume")
            .with_attribute("fileType", "Generic")
            .with_attribute("filePrefix", "seg")
            .with_attribute("filePattern", "%s.nhdr")
            .with_attribute("labelMap", "true")
            .with_attribute("applyThreshold", "true")
            .with_attribute("window", "10"),
    );
    let catalog = write_catalog(dir.path(), &root);
    let registry = registry();
    let mut scene = SceneGraph::new();

    let outcome = registry
        .load(&mut scene, FileType::SCENE, &IoProperties::for_file(&catalog))
        .unwrap();

    assert_eq!(outcome.node_ids, ids(&["LabelMapVolume1"]));
    let display = node(&scene, "LabelMapVolumeDisplay1");
    assert_eq!(display.attribute("applyThreshold"), None);
    assert_eq!(display.attribute("window"), None);
    let storage = node(&scene, "VolumeArchetypeStorage1");
    let expected = dir.path().join("seg.nhdr").to_string_lossy().into_owned();
    assert_eq!(storage.attribute("fileName"), Some(expected.as_str()));
}

#[test]
fn test_headerless_volume_is_skipped_with_warning() {
    let dir = tempfile::tempdir().unwrap();
    let root = CatalogElement::new("MRML").with_child(
        CatalogElement::new("Volume")
            .with_attribute("filePrefix", "slices/I")
            .with_attribute("imageRange", "1 60"),
    );
    let catalog = write_catalog(dir.path(), &root);
    let registry = registry();
    let mut scene = SceneGraph::new();

    let outcome = registry
        .load(&mut scene, FileType::SCENE, &IoProperties::for_file(&catalog))
        .unwrap();

    assert!(outcome.success);
    assert!(outcome.node_ids.is_empty());
    assert!(scene.is_empty());
    assert!(outcome.has_warnings());
}

#[test]
fn test_generated_model_key_is_referenced() {
    let dir = tempfile::tempdir().unwrap();
    let root = CatalogElement::new("MRML")
        .with_child(CatalogElement::new("Model").with_attribute("fileName", "a.vtk"))
        .with_child(
            CatalogElement::new("ModelGroup")
                .with_attribute("name", "Group")
                .with_child(CatalogElement::new("ModelRef").with_attribute("ModelRefID", "1000"))
                .with_child(CatalogElement::new("ModelRef").with_attribute("ModelRefID", "7")),
        );
    let catalog = write_catalog(dir.path(), &root);
    let registry = registry();
    let mut scene = SceneGraph::new();

    let outcome = registry
        .load(&mut scene, FileType::SCENE, &IoProperties::for_file(&catalog))
        .unwrap();

    assert_eq!(node(&scene, "Model1").parent_node_id().unwrap(), "ModelHierarchy1");
    assert_eq!(outcome.messages.len(), 1);
    assert!(outcome.messages[0].text.contains('7'));
}

#[test]
fn test_group_parent_is_restored_after_subtree() {
    let dir = tempfile::tempdir().unwrap();
    let root = CatalogElement::new("MRML")
        .with_child(
            CatalogElement::new("ModelGroup")
                .with_attribute("name", "Outer")
                .with_child(CatalogElement::new("ModelGroup").with_attribute("name", "Inner")),
        )
        .with_child(CatalogElement::new("ModelGroup").with_attribute("name", "Sibling"));
    let catalog = write_catalog(dir.path(), &root);
    let registry = registry();
    let mut scene = SceneGraph::new();

    registry
        .load(&mut scene, FileType::SCENE, &IoProperties::for_file(&catalog))
        .unwrap();

    assert!(node(&scene, "ModelHierarchy1").parent_node_id().is_none());
    assert_eq!(
        node(&scene, "ModelHierarchy2").parent_node_id().unwrap(),
        "ModelHierarchy1"
    );
    assert!(node(&scene, "ModelHierarchy3").parent_node_id().is_none());
}

#[test]
fn test_clear_replaces_scene() {
    let dir = tempfile::tempdir().unwrap();
    let root = CatalogElement::new("MRML")
        .with_child(CatalogElement::new("Model").with_attribute("fileName", "b.vtk"));
    let catalog = write_catalog(dir.path(), &root);
    let registry = registry();
    let mut scene = SceneGraph::new();
    let existing = scene.add_node(Node::displayable("Model"));

    let outcome = registry
        .load(
            &mut scene,
            FileType::SCENE,
            &IoProperties::for_file(&catalog).with(keys::CLEAR, true),
        )
        .unwrap();

    assert!(!scene.is_present(&existing));
    assert_eq!(outcome.node_ids, ids(&["Model2", "ModelDisplay1"]));
    assert_eq!(scene.len(), 3);
}

#[test]
fn test_unreadable_catalog_is_declined() {
    let dir = tempfile::tempdir().unwrap();
    let registry = registry();
    let mut scene = SceneGraph::new();

    let missing = registry
        .load(
            &mut scene,
            FileType::SCENE,
            &IoProperties::for_file(dir.path().join("missing.xml")),
        )
        .unwrap();
    assert!(!missing.success);

    let garbage = dir.path().join("garbage.xml");
    std::fs::write(&garbage, "<MRML><Volume></MRML>").unwrap();
    let outcome = registry
        .load(&mut scene, FileType::SCENE, &IoProperties::for_file(&garbage))
        .unwrap();
    assert!(!outcome.success);
    assert!(scene.is_empty());
}

#[test]
fn test_handwritten_xml_catalog() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = dir.path().join("case1.xml");
    std::fs::write(
        &catalog,
        r#"<?xml version="1.0" standalone='no'?>
<!DOCTYPE MRML SYSTEM "mrml20.dtd">
<MRML version="2.6">
<Transform>
<Matrix name="Shift" matrix="1 0 0 10 0 1 0 20 0 0 1 30 0 0 0 1"></Matrix>
<Model fileName="m.vtk" name="Brain"></Model>
</Transform>
</MRML>
"#,
    )
    .unwrap();
    let registry = registry();
    let mut scene = SceneGraph::new();

    let outcome = registry
        .load(&mut scene, FileType::SCENE, &IoProperties::for_file(&catalog))
        .unwrap();

    assert!(outcome.success);
    assert_eq!(
        outcome.node_ids,
        ids(&["LinearTransform1", "Model1", "ModelDisplay1"])
    );
    assert_eq!(node(&scene, "Model1").name(), Some("Brain"));
    assert_eq!(node(&scene, "Model1").parent_node_id().unwrap(), "LinearTransform1");
}

#[test]
fn test_json_parser_reads_serialized_tree() {
    let dir = tempfile::tempdir().unwrap();
    let root = CatalogElement::new("MRML")
        .with_child(CatalogElement::new("Model").with_attribute("fileName", "m.vtk"));
    let catalog = dir.path().join("scene.xml");
    std::fs::write(&catalog, serde_json::to_string_pretty(&root).unwrap()).unwrap();
    let mut scene = SceneGraph::new();

    // The XML default declines JSON text
    let outcome = registry()
        .load(&mut scene, FileType::SCENE, &IoProperties::for_file(&catalog))
        .unwrap();
    assert!(!outcome.success);

    let outcome = registry_with(Slicer2SceneReader::with_parser(JsonCatalogParser))
        .load(&mut scene, FileType::SCENE, &IoProperties::for_file(&catalog))
        .unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.node_ids, ids(&["Model1", "ModelDisplay1"]));
}

#[test]
fn test_failed_import_removes_created_nodes() {
    // Relative catalog path: an empty model file name resolves to an empty
    // path, which the nested model load rejects.
    let root = CatalogElement::new("MRML")
        .with_child(
            CatalogElement::new("Transform").with_child(
                CatalogElement::new("Matrix")
                    .with_attribute("name", "Shift")
                    .with_attribute("matrix", SHIFT),
            ),
        )
        .with_child(CatalogElement::new("Model").with_attribute("fileName", "kept.vtk"))
        .with_child(CatalogElement::new("Model").with_attribute("fileName", ""));
    let registry = registry_with(Slicer2SceneReader::with_parser(FixedCatalog(root)));
    let mut scene = SceneGraph::new();
    let existing = scene.add_node(Node::displayable("Model"));

    let outcome = registry
        .load(&mut scene, FileType::SCENE, &IoProperties::for_file("scene.xml"))
        .unwrap();

    assert!(!outcome.success);
    assert!(outcome.node_ids.is_empty());
    assert_eq!(scene.ids(), vec![existing]);
}

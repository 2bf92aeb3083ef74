use glam::{DMat4, DVec3};
use mrml_io::{keys, FileType, IoProperties, IoRegistry, Severity};
use mrml_legacy::matrix::parse_matrix;
use mrml_legacy::xcede::STATISTICS_TO_BRAIN;
use mrml_legacy::XcedeCatalogReader;
use mrml_scene::{Node, NodeId, SceneGraph};
use mrml_test_utils::{write_file, FakeModelReader, FakeOverlayReader, FakeVolumeReader};
use pretty_assertions::assert_eq;
use std::path::{Path, PathBuf};

const REGISTER_DAT: &str = "bert\n3.125\n3.125\n0.15\n1 0 0 1\n0 1 0 2\n0 0 1 3\n0 0 0 1\nround\n";

fn registry() -> IoRegistry {
    let mut registry = IoRegistry::new();
    registry.register_handler(XcedeCatalogReader::new());
    registry.register_handler(FakeVolumeReader::new());
    registry.register_handler(FakeModelReader::new().with_extensions(&["*.white", "*.pial"]));
    registry.register_handler(FakeOverlayReader);
    registry
}

fn entry(uri: &str, format: &str, extra: &str) -> String {
    format!("<entry uri=\"{uri}\" format=\"{format}\" {extra}/>\n")
}

fn write_catalog(dir: &Path, entries: &[String]) -> PathBuf {
    let xml = format!(
        "<?xml version=\"1.0\"?>\n<XCEDE>\n<project ID=\"fbirn\">\n<subject ID=\"bert\">\n{}</subject>\n</project>\n</XCEDE>\n",
        entries.concat()
    );
    write_file(dir, "bert.xcat", &xml)
}

fn touch(dir: &Path, names: &[&str]) {
    for name in names {
        write_file(dir, name, "");
    }
}

fn ids(list: &[&str]) -> Vec<NodeId> {
    list.iter().map(|s| NodeId::from(*s)).collect()
}

fn node<'a>(scene: &'a SceneGraph, id: &str) -> &'a Node {
    scene.get_node(&NodeId::from(id)).unwrap()
}

fn warnings(messages: &[mrml_io::UserMessage]) -> Vec<&str> {
    messages
        .iter()
        .filter(|m| m.severity == Severity::Warning)
        .map(|m| m.text.as_str())
        .collect()
}

#[test]
fn test_full_xcede_catalog() {
    let dir = tempfile::tempdir().unwrap();
    touch(
        dir.path(),
        &[
            "brain.mgz",
            "aseg.mgz",
            "lh.white",
            "rh.white",
            "lh.thickness",
            "rh.curv",
            "anat2std.mat",
            "example_func.nii",
            "stat_zstat1.nii",
        ],
    );
    write_file(dir.path(), "register.dat", REGISTER_DAT);
    let catalog = write_catalog(
        dir.path(),
        &[
            entry("mri/brain.mgz", "FreeSurfer:mgz-1", r#"name="brain" description="T1 anatomy""#),
            "<entry URI=\"mri/aseg.mgz\" FORMAT=\"FreeSurfer:mgz-1\" labelMap=\"1\"/>\n".to_string(),
            entry("surf/lh.white", "FreeSurfer:surface-1", r#"name="lh white""#),
            entry("surf/rh.white", "FreeSurfer:surface-1", ""),
            entry("surf/lh.thickness", "FreeSurfer:thickness-1", ""),
            entry("surf/rh.curv", "FreeSurfer:curv-1", ""),
            entry("reg/register.dat", "FreeSurfer:matrix-1", r#"name="anat2exf""#),
            entry("reg/anat2std.mat", "FreeSurfer:matrix-1", ""),
            entry("func/example_func.nii", "nifti:nii-1", ""),
            entry("stats/stat_zstat1.nii", "nifti:nii-1", ""),
            entry("notes.txt", "text:plain-1", ""),
            "<entry format=\"FreeSurfer:mgz-1\"/>\n".to_string(),
        ],
    );
    let registry = registry();
    let mut scene = SceneGraph::new();

    let outcome = registry
        .load(&mut scene, FileType::SCENE, &IoProperties::for_file(&catalog))
        .unwrap();

    assert!(outcome.success);
    assert_eq!(
        outcome.node_ids,
        ids(&[
            "ScalarVolume1",
            "LabelMapVolume1",
            "Model1",
            "Model2",
            "ScalarOverlayStorage1",
            "ScalarOverlayStorage2",
            "LinearTransform1",
            "ScalarVolume2",
            "ScalarVolume3",
            "LinearTransform2",
        ])
    );
    assert!(warnings(&outcome.messages).is_empty());

    // Volumes load from the catalog directory, whatever the uri path
    let brain = node(&scene, "ScalarVolume1");
    assert_eq!(brain.name(), Some("brain"));
    assert_eq!(brain.attribute("description"), Some("T1 anatomy"));
    let expected = dir.path().join("brain.mgz").to_string_lossy().into_owned();
    assert_eq!(
        node(&scene, "VolumeArchetypeStorage1").attribute("fileName"),
        Some(expected.as_str())
    );

    // Display colors follow the file name
    let brain_display = node(&scene, "ScalarVolumeDisplay1");
    assert_eq!(brain_display.attribute("colorNodeID"), Some("Grey"));
    assert_eq!(brain_display.attribute("autoWindowLevel"), Some("1"));
    assert_eq!(brain_display.attribute("autoThreshold"), Some("1"));
    assert_eq!(
        node(&scene, "LabelMapVolumeDisplay1").attribute("colorNodeID"),
        Some("FreeSurferLabels")
    );
    let stat_display = node(&scene, "ScalarVolumeDisplay3");
    assert_eq!(stat_display.attribute("colorNodeID"), Some("Iron"));
    assert_eq!(stat_display.attribute("autoThreshold"), None);

    // Models and the overlays painted onto them
    assert_eq!(node(&scene, "Model1").name(), Some("lh white"));
    assert_eq!(
        node(&scene, "ScalarOverlayStorage1").attribute(keys::MODEL_NODE_ID),
        Some("Model1")
    );
    assert_eq!(
        node(&scene, "ScalarOverlayStorage2").attribute(keys::MODEL_NODE_ID),
        Some("Model2")
    );

    // Registration rows come from register.dat
    let registration = node(&scene, "LinearTransform1");
    assert_eq!(registration.name(), Some("anat2exf"));
    assert_eq!(
        registration.attribute("matrix"),
        Some("1 0 0 1 0 1 0 2 0 0 1 3 0 0 0 1")
    );

    // Statistics and the functional volume move onto the anatomy
    let alignment = node(&scene, "LinearTransform2");
    assert_eq!(alignment.name(), Some(STATISTICS_TO_BRAIN));
    let matrix = parse_matrix(alignment.attribute("matrix").unwrap()).unwrap();
    let expected = DMat4::from_translation(DVec3::new(-1.0, -3.0, 2.0));
    assert!(matrix.abs_diff_eq(expected, 1e-9), "{matrix}");
    for volume in ["ScalarVolume2", "ScalarVolume3"] {
        assert_eq!(node(&scene, volume).parent_node_id().unwrap(), "LinearTransform2");
    }
    assert!(node(&scene, "ScalarVolume1").parent_node_id().is_none());
}

#[test]
fn test_statistics_stay_put_without_registration() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), &["brain.mgz", "example_func.nii", "stat_zstat1.nii"]);
    let catalog = write_catalog(
        dir.path(),
        &[
            entry("brain.mgz", "FreeSurfer:mgz-1", ""),
            entry("example_func.nii", "nifti:nii-1", ""),
            entry("stat_zstat1.nii", "nifti:nii-1", ""),
        ],
    );
    let mut scene = SceneGraph::new();

    let outcome = registry()
        .load(&mut scene, FileType::SCENE, &IoProperties::for_file(&catalog))
        .unwrap();

    assert_eq!(
        outcome.node_ids,
        ids(&["ScalarVolume1", "ScalarVolume2", "ScalarVolume3"])
    );
    assert!(scene.nodes_by_type("LinearTransform").is_empty());
    assert!(node(&scene, "ScalarVolume3").parent_node_id().is_none());
}

#[test]
fn test_overlay_without_model_warns() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), &["lh.thickness", "area.w"]);
    let catalog = write_catalog(
        dir.path(),
        &[
            entry("lh.thickness", "FreeSurfer:thickness-1", ""),
            entry("area.w", "FreeSurfer:w-1", ""),
        ],
    );
    let mut scene = SceneGraph::new();

    let outcome = registry()
        .load(&mut scene, FileType::SCENE, &IoProperties::for_file(&catalog))
        .unwrap();

    assert!(outcome.success);
    assert!(outcome.node_ids.is_empty());
    assert!(scene.is_empty());
    assert_eq!(
        warnings(&outcome.messages),
        vec![
            "No surface model for overlay 'lh.thickness'",
            "No surface model for overlay 'area.w'",
        ]
    );
}

#[test]
fn test_second_hemisphere_model_keeps_first_for_overlays() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), &["lh.white", "lh.pial", "lh.sulc"]);
    let catalog = write_catalog(
        dir.path(),
        &[
            entry("lh.white", "FreeSurfer:surface-1", ""),
            entry("lh.pial", "FreeSurfer:surface-1", ""),
            entry("lh.sulc", "FreeSurfer:sulc-1", ""),
        ],
    );
    let registry = registry();
    let mut scene = SceneGraph::new();

    let outcome = registry
        .load(&mut scene, FileType::SCENE, &IoProperties::for_file(&catalog))
        .unwrap();

    assert_eq!(
        outcome.node_ids,
        ids(&["Model1", "Model2", "ScalarOverlayStorage1"])
    );
    assert_eq!(warnings(&outcome.messages).len(), 1);
    assert!(warnings(&outcome.messages)[0].contains("left hemisphere"));
    assert_eq!(
        node(&scene, "ScalarOverlayStorage1").attribute(keys::MODEL_NODE_ID),
        Some("Model1")
    );
}

#[test]
fn test_missing_entry_file_is_skipped_with_warning() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = write_catalog(dir.path(), &[entry("mri/T1.mgz", "FreeSurfer:mgz-1", "")]);
    let mut scene = SceneGraph::new();

    let outcome = registry()
        .load(&mut scene, FileType::SCENE, &IoProperties::for_file(&catalog))
        .unwrap();

    assert!(outcome.success);
    assert!(scene.is_empty());
    let warnings = warnings(&outcome.messages);
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].starts_with("Cannot find file"));
    assert!(warnings[0].contains("T1.mgz"));
}

#[test]
fn test_catalog_without_xcede_root_is_declined() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), &["brain.mgz"]);
    let catalog = write_file(
        dir.path(),
        "other.xcat",
        "<catalog><entry uri=\"brain.mgz\" format=\"FreeSurfer:mgz-1\"/></catalog>",
    );
    let mut scene = SceneGraph::new();

    let outcome = registry()
        .load(&mut scene, FileType::SCENE, &IoProperties::for_file(&catalog))
        .unwrap();

    assert!(!outcome.success);
    assert!(scene.is_empty());
}

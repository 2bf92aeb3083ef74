//! Matrix text and volume geometry
//!
//! Catalogs and node attributes write 4x4 matrices as sixteen numbers in
//! row-major order. [`DMat4`] is column-major, so text is transposed on the
//! way in and out.

use glam::{DMat4, DVec3};
use mrml_scene::Node;

/// Parse sixteen row-major numbers
#[must_use]
pub fn parse_matrix(text: &str) -> Option<DMat4> {
    let values: Vec<f64> = parse_numbers(text)?;
    let rows: [f64; 16] = values.try_into().ok()?;
    Some(DMat4::from_cols_array(&rows).transpose())
}

/// Row-major text form of `matrix`
#[must_use]
pub fn format_matrix(matrix: &DMat4) -> String {
    matrix
        .transpose()
        .to_cols_array()
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Matrix from the lines of a FreeSurfer `register.dat`
///
/// Lines holding exactly four numbers are matrix rows, first four win; every
/// other line is header. Rows not present stay identity.
#[must_use]
pub fn parse_register_dat(text: &str) -> DMat4 {
    let mut rows = DMat4::IDENTITY.transpose().to_cols_array_2d();
    let found = text
        .lines()
        .filter_map(parse_numbers)
        .filter(|values| values.len() == 4)
        .take(4);
    for (row, values) in rows.iter_mut().zip(found) {
        row.copy_from_slice(&values);
    }
    DMat4::from_cols_array_2d(&rows).transpose()
}

fn parse_numbers(text: &str) -> Option<Vec<f64>> {
    text.split_whitespace()
        .map(str::parse::<f64>)
        .collect::<Result<_, _>>()
        .ok()
}

fn parse_vec3(text: &str) -> Option<DVec3> {
    let values: [f64; 3] = parse_numbers(text)?.try_into().ok()?;
    Some(DVec3::from_array(values))
}

/// Voxel grid of a loaded volume
///
/// Read from the `spacing`, `dimensions` and `ijkToRAS` attributes volume
/// readers leave on the node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeGeometry {
    /// Voxel size along i, j, k
    pub spacing: DVec3,
    /// Voxel count along i, j, k
    pub dimensions: DVec3,
    /// Voxel index to patient RAS
    pub ijk_to_ras: DMat4,
}

impl VolumeGeometry {
    /// Geometry of `node`, `None` when any attribute is missing or malformed
    #[must_use]
    pub fn from_node(node: &Node) -> Option<Self> {
        Some(Self {
            spacing: parse_vec3(node.attribute("spacing")?)?,
            dimensions: parse_vec3(node.attribute("dimensions")?)?,
            ijk_to_ras: parse_matrix(node.attribute("ijkToRAS")?)?,
        })
    }

    /// FreeSurfer `tkregister` voxel-to-RAS matrix
    #[must_use]
    pub fn tkreg_vox_to_ras(&self) -> DMat4 {
        let DVec3 { x: sx, y: sy, z: sz } = self.spacing;
        let DVec3 { x: nx, y: ny, z: nz } = self.dimensions;
        DMat4::from_cols_array(&[
            -sx, 0.0, 0.0, sx * nx / 2.0, //
            0.0, 0.0, sz, -sz * nz / 2.0, //
            0.0, -sy, 0.0, sy * ny / 2.0, //
            0.0, 0.0, 0.0, 1.0,
        ])
        .transpose()
    }
}

/// Transform placing functional statistics onto the anatomical volume
///
/// `registration` is the `register.dat` matrix taking anatomical tkregister
/// RAS to functional tkregister RAS. The result is the inverse of the
/// functional-RAS to anatomical-RAS chain. `None` when a matrix in the chain
/// is singular.
#[must_use]
pub fn statistics_to_anatomy(
    anatomy: &VolumeGeometry,
    functional: &VolumeGeometry,
    registration: &DMat4,
) -> Option<DMat4> {
    let invertible = |m: &DMat4| m.determinant().abs() > f64::EPSILON;
    let anatomy_tkreg = anatomy.tkreg_vox_to_ras();
    if ![anatomy_tkreg, *registration, functional.ijk_to_ras]
        .iter()
        .all(invertible)
    {
        return None;
    }

    let ras_to_ras = anatomy.ijk_to_ras
        * anatomy_tkreg.inverse()
        * registration.inverse()
        * functional.tkreg_vox_to_ras()
        * functional.ijk_to_ras.inverse();
    invertible(&ras_to_ras).then(|| ras_to_ras.inverse())
}

//! Binary STL and the filament swap sidecar.

use std::path::{Path, PathBuf};

use qrslab_mesh::TriangleMesh;
use serde::{Deserialize, Serialize};

use crate::error::{ExportError, Result};
use crate::ExportOptions;

const HEADER_LEN: usize = 80;
const RECORD_LEN: usize = 50;

/// Encode `mesh` as binary STL.
///
/// The 80-byte header names the swap height so the file stays
/// self-describing without its sidecar.
pub fn stl_bytes(mesh: &TriangleMesh, swap_height_mm: f64) -> Result<Vec<u8>> {
    let num_triangles = mesh.num_triangles();
    let count = u32::try_from(num_triangles).map_err(|_| ExportError::TooLarge(num_triangles))?;
    let mut data = Vec::with_capacity(HEADER_LEN + 4 + num_triangles * RECORD_LEN);

    let mut header = format!("qrslab binary STL; change filament at Z={swap_height_mm:.3} mm")
        .into_bytes();
    header.resize(HEADER_LEN, b' ');
    data.extend_from_slice(&header);
    data.extend_from_slice(&count.to_le_bytes());

    for tri in mesh.triangles() {
        let normal = mesh.facet_normal(tri);
        for c in normal.iter() {
            data.extend_from_slice(&(*c as f32).to_le_bytes());
        }
        for index in tri {
            let start = index as usize * 3;
            for c in &mesh.vertices[start..start + 3] {
                data.extend_from_slice(&c.to_le_bytes());
            }
        }
        // Attribute byte count
        data.extend_from_slice(&0u16.to_le_bytes());
    }

    Ok(data)
}

/// Swap instructions written next to an STL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapSidecar {
    /// File name of the STL this sidecar describes.
    pub model: String,
    /// Z at which to change filament (mm).
    pub swap_height_mm: f64,
    /// Materials bottom to top.
    pub materials: Vec<String>,
    /// Human-readable instruction.
    pub instruction: String,
}

impl SwapSidecar {
    /// Sidecar for the STL at `stl_path`.
    pub fn new(stl_path: &Path, swap_height_mm: f64, options: &ExportOptions) -> Self {
        let model = stl_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let below = &options.base_material.name;
        let above = &options.accent_material.name;
        Self {
            model,
            swap_height_mm,
            materials: vec![below.clone(), above.clone()],
            instruction: format!(
                "Print in {below} and change filament to {above} at Z={swap_height_mm:.3} mm"
            ),
        }
    }

    /// `<stem>.swap.toml` next to `stl_path`.
    pub fn path_for(stl_path: &Path) -> PathBuf {
        stl_path.with_extension("swap.toml")
    }

    /// Serialize as TOML.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string(self)?)
    }
}

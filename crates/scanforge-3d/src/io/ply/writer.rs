use std::io::{BufWriter, Write};
use std::path::Path;

use super::PlyError;
use crate::mesh::TriangleMesh;

/// Write a triangle mesh as a binary little-endian PLY file.
///
/// Normals and colors are emitted only when the mesh carries them; faces are
/// written as `uchar`-counted `int` index lists.
pub fn write_ply(path: impl AsRef<Path>, mesh: &TriangleMesh) -> Result<(), PlyError> {
    let file = std::fs::File::create(path)?;
    let mut writer = BufWriter::new(file);

    let mut header = String::from("ply\nformat binary_little_endian 1.0\n");
    header.push_str(&format!("element vertex {}\n", mesh.vertices.len()));
    header.push_str("property float x\nproperty float y\nproperty float z\n");
    if mesh.normals.is_some() {
        header.push_str("property float nx\nproperty float ny\nproperty float nz\n");
    }
    if mesh.colors.is_some() {
        header.push_str("property uchar red\nproperty uchar green\nproperty uchar blue\n");
    }
    header.push_str(&format!("element face {}\n", mesh.triangles.len()));
    header.push_str("property list uchar int vertex_indices\n");
    header.push_str("end_header\n");
    writer.write_all(header.as_bytes())?;

    for (i, vertex) in mesh.vertices.iter().enumerate() {
        for &component in vertex {
            writer.write_all(&(component as f32).to_le_bytes())?;
        }
        if let Some(normals) = &mesh.normals {
            for &component in &normals[i] {
                writer.write_all(&(component as f32).to_le_bytes())?;
            }
        }
        if let Some(colors) = &mesh.colors {
            writer.write_all(&colors[i])?;
        }
    }

    for triangle in &mesh.triangles {
        writer.write_all(&[3u8])?;
        for &index in triangle {
            writer.write_all(&(index as i32).to_le_bytes())?;
        }
    }

    writer.flush()?;
    Ok(())
}

use std::io::{BufRead, Read};
use std::path::Path;

use super::{PlyDataType, PlyError};
use crate::mesh::TriangleMesh;

struct PlyHeader {
    vertex_count: usize,
    face_count: usize,
    vertex_properties: Vec<(String, PlyDataType)>,
}

fn parse_header<R: BufRead>(reader: &mut R) -> Result<PlyHeader, PlyError> {
    let mut line = String::new();
    let mut is_ply = false;
    let mut is_binary_little_endian = false;
    let mut vertex_count = None;
    let mut face_count = 0usize;
    let mut vertex_properties = Vec::new();
    let mut in_vertex_element = false;

    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            break;
        }
        let trimmed = line.trim();

        if trimmed == "ply" {
            is_ply = true;
            continue;
        }
        if trimmed == "end_header" {
            break;
        }
        if trimmed.starts_with("format binary_little_endian") {
            is_binary_little_endian = true;
        } else if trimmed.starts_with("comment") {
            continue;
        } else if trimmed.starts_with("element vertex") {
            in_vertex_element = true;
            vertex_count = Some(
                trimmed
                    .split_whitespace()
                    .last()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(0),
            );
        } else if trimmed.starts_with("element face") {
            in_vertex_element = false;
            face_count = trimmed
                .split_whitespace()
                .last()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0);
        } else if trimmed.starts_with("element") {
            in_vertex_element = false;
        } else if trimmed.starts_with("property list") {
            // Only the face index list is expected here.
            if in_vertex_element {
                return Err(PlyError::UnsupportedProperty);
            }
        } else if trimmed.starts_with("property") {
            if !in_vertex_element {
                continue;
            }
            let parts: Vec<&str> = trimmed.split_whitespace().collect();
            if parts.len() < 3 {
                return Err(PlyError::UnsupportedProperty);
            }
            vertex_properties.push((parts[2].to_string(), parse_data_type(parts[1])?));
        }
    }

    if !is_ply || !is_binary_little_endian {
        return Err(PlyError::UnsupportedProperty);
    }
    let vertex_count = vertex_count.ok_or(PlyError::UnsupportedProperty)?;

    Ok(PlyHeader {
        vertex_count,
        face_count,
        vertex_properties,
    })
}

fn parse_data_type(type_str: &str) -> Result<PlyDataType, PlyError> {
    match type_str {
        "float" | "float32" => Ok(PlyDataType::Float32),
        "double" | "float64" => Ok(PlyDataType::Float64),
        "uchar" | "uint8" => Ok(PlyDataType::UInt8),
        _ => Err(PlyError::UnsupportedProperty),
    }
}

fn read_scalar<R: Read>(reader: &mut R, data_type: PlyDataType) -> Result<f64, PlyError> {
    let mut buffer = [0u8; 8];
    let bytes = &mut buffer[..data_type.size_of()];
    reader.read_exact(bytes)?;
    Ok(match data_type {
        PlyDataType::Float32 => f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64,
        PlyDataType::Float64 => f64::from_le_bytes(buffer),
        PlyDataType::UInt8 => bytes[0] as f64,
    })
}

/// Read a binary little-endian PLY triangle mesh.
///
/// Positions are required; normals and colors are picked up when the header
/// declares the conventional `nx/ny/nz` and `red/green/blue` properties.
pub fn read_ply(path: impl AsRef<Path>) -> Result<TriangleMesh, PlyError> {
    let file = std::fs::File::open(path)?;
    let mut reader = std::io::BufReader::new(file);
    let header = parse_header(&mut reader)?;

    let names: Vec<&str> = header
        .vertex_properties
        .iter()
        .map(|(name, _)| name.as_str())
        .collect();
    let has_position = ["x", "y", "z"].iter().all(|n| names.contains(n));
    if !has_position {
        return Err(PlyError::UnsupportedProperty);
    }
    let has_normals = ["nx", "ny", "nz"].iter().all(|n| names.contains(n));
    let has_colors = ["red", "green", "blue"].iter().all(|n| names.contains(n));

    let mut vertices = Vec::with_capacity(header.vertex_count);
    let mut normals = has_normals.then(|| Vec::with_capacity(header.vertex_count));
    let mut colors = has_colors.then(|| Vec::with_capacity(header.vertex_count));

    for _ in 0..header.vertex_count {
        let mut position = [0.0f64; 3];
        let mut normal = [0.0f64; 3];
        let mut color = [0u8; 3];
        for (name, data_type) in &header.vertex_properties {
            let value = read_scalar(&mut reader, *data_type)?;
            match name.as_str() {
                "x" => position[0] = value,
                "y" => position[1] = value,
                "z" => position[2] = value,
                "nx" => normal[0] = value,
                "ny" => normal[1] = value,
                "nz" => normal[2] = value,
                "red" => color[0] = value as u8,
                "green" => color[1] = value as u8,
                "blue" => color[2] = value as u8,
                _ => {}
            }
        }
        vertices.push(position);
        if let Some(ref mut normals) = normals {
            normals.push(normal);
        }
        if let Some(ref mut colors) = colors {
            colors.push(color);
        }
    }

    let mut triangles = Vec::with_capacity(header.face_count);
    for _ in 0..header.face_count {
        let mut count = [0u8; 1];
        reader.read_exact(&mut count)?;
        if count[0] != 3 {
            return Err(PlyError::NonTriangularFace);
        }
        let mut triangle = [0usize; 3];
        for slot in triangle.iter_mut() {
            let mut bytes = [0u8; 4];
            reader.read_exact(&mut bytes)?;
            *slot = i32::from_le_bytes(bytes) as usize;
        }
        triangles.push(triangle);
    }

    Ok(TriangleMesh {
        vertices,
        normals,
        colors,
        triangles,
    })
}

#[cfg(test)]
mod tests {
    use super::super::write_ply;
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn sample_mesh() -> TriangleMesh {
        TriangleMesh {
            vertices: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.5]],
            normals: Some(vec![[0.0, 0.0, 1.0]; 3]),
            colors: Some(vec![[255, 0, 0], [0, 255, 0], [0, 0, 255]]),
            triangles: vec![[0, 1, 2]],
        }
    }

    #[test]
    fn test_roundtrip_full_mesh() {
        let file = NamedTempFile::new().unwrap();
        let mesh = sample_mesh();
        write_ply(file.path(), &mesh).unwrap();

        let read = read_ply(file.path()).unwrap();
        assert_eq!(read.vertex_count(), mesh.vertex_count());
        assert_eq!(read.triangle_count(), mesh.triangle_count());
        assert_eq!(read.triangles, mesh.triangles);
        assert_eq!(read.colors, mesh.colors);
        for (a, b) in read.vertices.iter().zip(mesh.vertices.iter()) {
            for k in 0..3 {
                assert_relative_eq!(a[k], b[k], epsilon = 1e-6);
            }
        }
        for (a, b) in read
            .normals
            .as_ref()
            .unwrap()
            .iter()
            .zip(mesh.normals.as_ref().unwrap().iter())
        {
            for k in 0..3 {
                assert_relative_eq!(a[k], b[k], epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn test_roundtrip_positions_only() {
        let file = NamedTempFile::new().unwrap();
        let mesh = TriangleMesh {
            vertices: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            normals: None,
            colors: None,
            triangles: vec![[0, 1, 2]],
        };
        write_ply(file.path(), &mesh).unwrap();

        let read = read_ply(file.path()).unwrap();
        assert_eq!(read.vertex_count(), 3);
        assert_eq!(read.triangle_count(), 1);
        assert!(read.normals.is_none());
        assert!(read.colors.is_none());
    }

    #[test]
    fn test_rejects_ascii_ply() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"ply\nformat ascii 1.0\nelement vertex 0\nend_header\n")
            .unwrap();
        assert!(matches!(
            read_ply(file.path()),
            Err(PlyError::UnsupportedProperty)
        ));
    }

    #[test]
    fn test_parse_header_with_faces() {
        let header_text = "ply\nformat binary_little_endian 1.0\nelement vertex 4\nproperty float x\nproperty float y\nproperty float z\nelement face 2\nproperty list uchar int vertex_indices\nend_header\n";
        let mut reader = std::io::BufReader::new(header_text.as_bytes());
        let header = parse_header(&mut reader).unwrap();
        assert_eq!(header.vertex_count, 4);
        assert_eq!(header.face_count, 2);
        assert_eq!(header.vertex_properties.len(), 3);
        assert_eq!(header.vertex_properties[0].0, "x");
    }
}

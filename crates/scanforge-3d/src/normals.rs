use std::num::NonZero;

use glam::{DMat3, DVec3};
use kiddo::immutable::float::kdtree::ImmutableKdTree;
use kiddo::SquaredEuclidean;

use crate::pointcloud::PointCloud;

// Fallback normal for degenerate neighbourhoods: facing the sensor.
const SENSOR_FACING: [f64; 3] = [0.0, 0.0, -1.0];

/// Estimate per-point normals from the covariance of the k nearest neighbours.
///
/// The normal of each point is the smallest principal axis of its local
/// neighbourhood, oriented toward the sensor origin (camera-space clouds keep
/// the sensor at the origin looking down +z).
pub fn estimate_normals(cloud: &PointCloud, k: usize) -> PointCloud {
    let points = cloud.points();
    if points.len() < 3 || k < 3 {
        let mut out = cloud.clone();
        out.set_normals(vec![SENSOR_FACING; points.len()]);
        return out;
    }

    let kdtree: ImmutableKdTree<f64, u32, 3, 32> = ImmutableKdTree::new_from_slice(points);
    let k = k.min(points.len());

    let normals = points
        .iter()
        .map(|point| {
            let neighbours =
                kdtree.nearest_n::<SquaredEuclidean>(point, NonZero::new(k).unwrap());

            let mut centroid = DVec3::ZERO;
            for nn in &neighbours {
                centroid += DVec3::from_array(points[nn.item as usize]);
            }
            centroid /= neighbours.len() as f64;

            let mut covariance = DMat3::ZERO;
            for nn in &neighbours {
                let d = DVec3::from_array(points[nn.item as usize]) - centroid;
                covariance += DMat3::from_cols(d * d.x, d * d.y, d * d.z);
            }

            match smallest_eigenvector(&covariance) {
                Some(normal) => {
                    // Orient toward the sensor at the origin.
                    let p = DVec3::from_array(*point);
                    if normal.dot(p) > 0.0 {
                        (-normal).to_array()
                    } else {
                        normal.to_array()
                    }
                }
                None => SENSOR_FACING,
            }
        })
        .collect();

    let mut out = cloud.clone();
    out.set_normals(normals);
    out
}

// Smallest principal axis of a symmetric 3x3 matrix: power-iterate the two
// dominant eigenvectors, the third is their cross product.
fn smallest_eigenvector(matrix: &DMat3) -> Option<DVec3> {
    let first = power_iterate(matrix, None)?;
    let eigenvalue = first.dot(*matrix * first);
    let deflated = *matrix
        - DMat3::from_cols(
            first * (first.x * eigenvalue),
            first * (first.y * eigenvalue),
            first * (first.z * eigenvalue),
        );
    let second = power_iterate(&deflated, Some(first))?;
    let normal = first.cross(second);
    if normal.length() < 1e-12 {
        return None;
    }
    Some(normal.normalize())
}

fn power_iterate(matrix: &DMat3, orthogonal_to: Option<DVec3>) -> Option<DVec3> {
    let mut v = DVec3::new(1.0, 0.9, 0.8).normalize();
    for _ in 0..64 {
        let mut next = *matrix * v;
        if let Some(axis) = orthogonal_to {
            next -= axis * next.dot(axis);
        }
        let norm = next.length();
        if norm < 1e-15 {
            return None;
        }
        v = next / norm;
    }
    Some(v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn plane_cloud(z: f64) -> PointCloud {
        let mut points = Vec::new();
        for i in 0..6 {
            for j in 0..6 {
                points.push([i as f64 * 0.01, j as f64 * 0.01, z]);
            }
        }
        PointCloud::new(points, None, None)
    }

    #[test]
    fn test_plane_normals_face_sensor() {
        let cloud = estimate_normals(&plane_cloud(1.0), 8);
        let normals = cloud.normals().unwrap();
        assert_eq!(normals.len(), cloud.len());
        for normal in normals {
            assert_relative_eq!(normal[0], 0.0, epsilon = 1e-6);
            assert_relative_eq!(normal[1], 0.0, epsilon = 1e-6);
            assert_relative_eq!(normal[2], -1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_tiny_cloud_gets_fallback_normals() {
        let cloud = PointCloud::new(vec![[0.0, 0.0, 1.0], [0.1, 0.0, 1.0]], None, None);
        let with_normals = estimate_normals(&cloud, 8);
        assert_eq!(with_normals.normals().unwrap().len(), 2);
        assert_eq!(with_normals.normals().unwrap()[0], SENSOR_FACING);
    }

    #[test]
    fn test_normals_are_unit_length() {
        let mut points = Vec::new();
        // A sloped surface, z = x.
        for i in 0..6 {
            for j in 0..6 {
                points.push([i as f64 * 0.01, j as f64 * 0.01, 1.0 + i as f64 * 0.01]);
            }
        }
        let cloud = estimate_normals(&PointCloud::new(points, None, None), 8);
        for normal in cloud.normals().unwrap() {
            let len = (normal[0].powi(2) + normal[1].powi(2) + normal[2].powi(2)).sqrt();
            assert_relative_eq!(len, 1.0, epsilon = 1e-9);
        }
    }
}

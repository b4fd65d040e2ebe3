use std::collections::HashMap;

use crate::pointcloud::PointCloud;

// Per-voxel accumulator: point sum, color sum, normal sum, count.
type VoxelData = ([f64; 3], [u64; 3], [f64; 3], usize);

/// Downsample a point cloud on a regular voxel grid.
///
/// Points falling into the same voxel of edge length `leaf_size` are replaced
/// by their centroid; colors and normals, when present, are averaged alongside
/// (normals are re-normalized). A non-positive `leaf_size` returns the input
/// unchanged.
pub fn voxel_downsample(cloud: &PointCloud, leaf_size: f64) -> PointCloud {
    if leaf_size <= 0.0 {
        return cloud.clone();
    }

    let mut grid: HashMap<(i64, i64, i64), VoxelData> = HashMap::new();
    let mut order: Vec<(i64, i64, i64)> = Vec::new();

    for (i, point) in cloud.points().iter().enumerate() {
        let key = (
            (point[0] / leaf_size).floor() as i64,
            (point[1] / leaf_size).floor() as i64,
            (point[2] / leaf_size).floor() as i64,
        );
        let entry = grid.entry(key).or_insert_with(|| {
            order.push(key);
            ([0.0; 3], [0; 3], [0.0; 3], 0)
        });
        for k in 0..3 {
            entry.0[k] += point[k];
        }
        if let Some(colors) = cloud.colors() {
            for k in 0..3 {
                entry.1[k] += colors[i][k] as u64;
            }
        }
        if let Some(normals) = cloud.normals() {
            for k in 0..3 {
                entry.2[k] += normals[i][k];
            }
        }
        entry.3 += 1;
    }

    let mut points = Vec::with_capacity(order.len());
    let mut colors = cloud.colors().map(|_| Vec::with_capacity(order.len()));
    let mut normals = cloud.normals().map(|_| Vec::with_capacity(order.len()));

    // Iterate in first-seen order so downsampling is deterministic.
    for key in order {
        let (point_sum, color_sum, normal_sum, count) = grid[&key];
        let inv_count = 1.0 / count as f64;
        points.push([
            point_sum[0] * inv_count,
            point_sum[1] * inv_count,
            point_sum[2] * inv_count,
        ]);
        if let Some(ref mut colors) = colors {
            colors.push([
                (color_sum[0] as f64 * inv_count).round() as u8,
                (color_sum[1] as f64 * inv_count).round() as u8,
                (color_sum[2] as f64 * inv_count).round() as u8,
            ]);
        }
        if let Some(ref mut normals) = normals {
            let mean = [
                normal_sum[0] * inv_count,
                normal_sum[1] * inv_count,
                normal_sum[2] * inv_count,
            ];
            let norm = (mean[0] * mean[0] + mean[1] * mean[1] + mean[2] * mean[2]).sqrt();
            if norm > 0.0 {
                normals.push([mean[0] / norm, mean[1] / norm, mean[2] / norm]);
            } else {
                normals.push(mean);
            }
        }
    }

    PointCloud::new(points, colors, normals)
}

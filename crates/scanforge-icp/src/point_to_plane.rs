use kiddo::immutable::float::kdtree::ImmutableKdTree;

use scanforge_3d::pointcloud::PointCloud;
use scanforge_3d::pose::Pose;

use crate::ops::{delta_pose, find_correspondences, solve_normal_equations};

/// Point-to-plane ICP alignment for pose refinement.
///
/// Minimizes the distance between transformed source points and the tangent
/// planes of their target matches, so the target must carry normals; without
/// them the seed transform is returned unchanged. Correspondences beyond
/// `max_distance` are discarded. The best transform found is always returned;
/// poor convergence degrades quality rather than failing.
pub fn align_point_to_plane(
    source: &PointCloud,
    target: &PointCloud,
    max_distance: f64,
    seed: &Pose,
    max_iterations: usize,
) -> Pose {
    let target_normals = match target.normals() {
        Some(normals) => normals,
        None => {
            log::warn!("point-to-plane alignment needs target normals, keeping seed transform");
            return seed.clone();
        }
    };
    if source.is_empty() || target.is_empty() {
        return seed.clone();
    }

    let kdtree: ImmutableKdTree<f64, u32, 3, 32> = ImmutableKdTree::new_from_slice(target.points());
    let max_squared_distance = if max_distance > 0.0 {
        max_distance * max_distance
    } else {
        f64::INFINITY
    };

    let mut transform = seed.clone();
    let mut current: Vec<[f64; 3]> = source
        .points()
        .iter()
        .map(|p| transform.transform_point(p))
        .collect();

    for iteration in 0..max_iterations {
        let matches = find_correspondences(&current, &kdtree, max_squared_distance);
        if matches.len() < 6 {
            log::debug!("point-to-plane iteration {iteration}: too few correspondences");
            break;
        }

        let mut ata = [[0.0; 6]; 6];
        let mut atb = [0.0; 6];
        for m in &matches {
            let p = current[m.source];
            let q = target.points()[m.target];
            let n = target_normals[m.target];
            // One row per match: [p x n | n] * x = -(p - q) . n
            let row = [
                p[1] * n[2] - p[2] * n[1],
                p[2] * n[0] - p[0] * n[2],
                p[0] * n[1] - p[1] * n[0],
                n[0],
                n[1],
                n[2],
            ];
            let residual =
                -((p[0] - q[0]) * n[0] + (p[1] - q[1]) * n[1] + (p[2] - q[2]) * n[2]);
            for i in 0..6 {
                atb[i] += row[i] * residual;
                for j in 0..6 {
                    ata[i][j] += row[i] * row[j];
                }
            }
        }

        let x = match solve_normal_equations(&ata, &atb) {
            Some(x) => x,
            None => break,
        };
        transform = delta_pose(&x).compose(&transform);
        for (point, src) in current.iter_mut().zip(source.points()) {
            *point = transform.transform_point(src);
        }

        let update_norm = x.iter().map(|v| v * v).sum::<f64>().sqrt();
        log::debug!("point-to-plane iteration {iteration}: update {update_norm:.2e}");
        if update_norm < 1e-10 {
            break;
        }
    }

    transform
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    // Three orthogonal plane patches meeting at the origin, with exact normals.
    fn corner_cloud() -> PointCloud {
        let mut points = Vec::new();
        let mut normals = Vec::new();
        for i in 0..6 {
            for j in 0..6 {
                let a = i as f64 * 0.05;
                let b = j as f64 * 0.05;
                points.push([a, b, 0.0]);
                normals.push([0.0, 0.0, 1.0]);
                points.push([0.0, a, b]);
                normals.push([1.0, 0.0, 0.0]);
                points.push([a, 0.0, b]);
                normals.push([0.0, 1.0, 0.0]);
            }
        }
        PointCloud::new(points, None, Some(normals))
    }

    #[test]
    fn test_recovers_small_motion() {
        let target = corner_cloud();
        let motion =
            Pose::from_axis_angle(&[0.0, 1.0, 0.0], 0.02, [0.01, -0.005, 0.02]).unwrap();
        let source = target.transformed(&motion.inverse());

        let aligned = align_point_to_plane(&source, &target, 0.1, &Pose::identity(), 30);

        for (p, q) in source.points().iter().zip(target.points()) {
            let moved = aligned.transform_point(p);
            for k in 0..3 {
                assert_relative_eq!(moved[k], q[k], epsilon = 1e-3);
            }
        }
    }

    #[test]
    fn test_missing_normals_keeps_seed() {
        let target = PointCloud::new(vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]], None, None);
        let source = target.clone();
        let seed = Pose::from_axis_angle(&[0.0, 0.0, 1.0], 0.3, [0.5, 0.0, 0.0]).unwrap();
        let aligned = align_point_to_plane(&source, &target, 0.1, &seed, 10);
        assert_eq!(aligned, seed);
    }

    #[test]
    fn test_identity_on_matching_clouds() {
        let target = corner_cloud();
        let aligned = align_point_to_plane(&target, &target, 0.1, &Pose::identity(), 10);
        assert_relative_eq!(aligned.translation_norm(), 0.0, epsilon = 1e-9);
        assert_relative_eq!(aligned.rotation_angle(), 0.0, epsilon = 1e-9);
    }
}

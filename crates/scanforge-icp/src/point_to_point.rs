use kiddo::immutable::float::kdtree::ImmutableKdTree;

use scanforge_3d::pointcloud::PointCloud;
use scanforge_3d::pose::Pose;

use crate::ops::{delta_pose, find_correspondences, solve_normal_equations};

/// Result of an iterative alignment run.
///
/// The transform maps the source into the target frame.
#[derive(Debug, Clone)]
pub struct AlignmentResult {
    /// Estimated rigid transform.
    pub transform: Pose,
    /// The total number of iterations performed.
    pub num_iterations: usize,
    /// Last computed RMSE over inlier correspondences, in meters.
    pub rmse: f64,
    /// Inlier correspondences backing the final estimate.
    pub num_correspondences: usize,
    /// Whether the RMSE settled below the tolerance before the iteration cap.
    pub converged: bool,
}

/// Convergence controls for iterative alignment.
#[derive(Debug, Clone)]
pub struct ConvergenceCriteria {
    /// Maximum number of iterations to perform.
    pub max_iterations: usize,
    /// Convergence tolerance as the difference in RMSE between two
    /// consecutive iterations.
    pub tolerance: f64,
}

impl Default for ConvergenceCriteria {
    fn default() -> Self {
        Self {
            max_iterations: 30,
            tolerance: 1e-6,
        }
    }
}

/// Iterative closest point alignment minimizing point-to-point distances.
///
/// Each iteration matches the transformed source against the target with
/// robust gating, solves the linearized rigid update, and composes it onto
/// the running estimate seeded by `seed`.
pub fn align_point_to_point(
    source: &PointCloud,
    target: &PointCloud,
    seed: &Pose,
    criteria: &ConvergenceCriteria,
) -> AlignmentResult {
    let mut result = AlignmentResult {
        transform: seed.clone(),
        num_iterations: 0,
        rmse: f64::INFINITY,
        num_correspondences: 0,
        converged: false,
    };
    if source.is_empty() || target.is_empty() {
        return result;
    }

    let kdtree: ImmutableKdTree<f64, u32, 3, 32> = ImmutableKdTree::new_from_slice(target.points());
    let mut current: Vec<[f64; 3]> = source
        .points()
        .iter()
        .map(|p| result.transform.transform_point(p))
        .collect();

    for iteration in 0..criteria.max_iterations {
        let matches = find_correspondences(&current, &kdtree, f64::INFINITY);
        if matches.len() < 3 {
            break;
        }

        let mut ata = [[0.0; 6]; 6];
        let mut atb = [0.0; 6];
        for m in &matches {
            let p = current[m.source];
            let q = target.points()[m.target];
            // Three rows per match: residual q - p, jacobian [-[p]x | I].
            let rows = [
                [0.0, p[2], -p[1], 1.0, 0.0, 0.0],
                [-p[2], 0.0, p[0], 0.0, 1.0, 0.0],
                [p[1], -p[0], 0.0, 0.0, 0.0, 1.0],
            ];
            let residuals = [q[0] - p[0], q[1] - p[1], q[2] - p[2]];
            for (row, residual) in rows.iter().zip(residuals) {
                for i in 0..6 {
                    atb[i] += row[i] * residual;
                    for j in 0..6 {
                        ata[i][j] += row[i] * row[j];
                    }
                }
            }
        }

        let x = match solve_normal_equations(&ata, &atb) {
            Some(x) => x,
            None => break,
        };
        result.transform = delta_pose(&x).compose(&result.transform);
        for (point, src) in current.iter_mut().zip(source.points()) {
            *point = result.transform.transform_point(src);
        }

        let rmse =
            (matches.iter().map(|m| m.squared_distance).sum::<f64>() / matches.len() as f64).sqrt();
        result.num_iterations = iteration + 1;
        result.num_correspondences = matches.len();
        log::debug!(
            "icp iteration {iteration}: rmse {rmse:.6}, correspondences {}",
            matches.len()
        );

        if (result.rmse - rmse).abs() < criteria.tolerance {
            result.rmse = rmse;
            result.converged = true;
            break;
        }
        result.rmse = rmse;
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn grid_cloud() -> PointCloud {
        let mut points = Vec::new();
        for i in 0..6 {
            for j in 0..6 {
                for k in 0..3 {
                    points.push([
                        i as f64 * 0.1 + rand::random::<f64>() * 0.005,
                        j as f64 * 0.1 + rand::random::<f64>() * 0.005,
                        k as f64 * 0.1 + rand::random::<f64>() * 0.005,
                    ]);
                }
            }
        }
        PointCloud::new(points, None, None)
    }

    #[test]
    fn test_align_identical_clouds_converges() {
        let cloud = grid_cloud();
        let result = align_point_to_point(
            &cloud,
            &cloud,
            &Pose::identity(),
            &ConvergenceCriteria::default(),
        );
        assert!(result.converged);
        assert_relative_eq!(result.rmse, 0.0, epsilon = 1e-9);
        assert_eq!(result.num_correspondences, cloud.len());
        assert_relative_eq!(result.transform.translation_norm(), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_align_recovers_small_motion() {
        let target = grid_cloud();
        let motion =
            Pose::from_axis_angle(&[0.0, 0.0, 1.0], 0.01, [0.02, 0.01, -0.015]).unwrap();
        // The alignment maps source onto target, so the source is the target
        // pulled back through the expected motion.
        let source = target.transformed(&motion.inverse());

        let result = align_point_to_point(
            &source,
            &target,
            &Pose::identity(),
            &ConvergenceCriteria {
                max_iterations: 50,
                tolerance: 1e-12,
            },
        );

        for (p, q) in source.points().iter().zip(target.points()) {
            let moved = result.transform.transform_point(p);
            for k in 0..3 {
                assert_relative_eq!(moved[k], q[k], epsilon = 1e-4);
            }
        }
    }

    #[test]
    fn test_align_empty_source_returns_seed() {
        let target = grid_cloud();
        let seed = Pose::from_axis_angle(&[1.0, 0.0, 0.0], 0.2, [0.1, 0.0, 0.0]).unwrap();
        let result = align_point_to_point(
            &PointCloud::default(),
            &target,
            &seed,
            &ConvergenceCriteria::default(),
        );
        assert!(!result.converged);
        assert_eq!(result.num_iterations, 0);
        assert_eq!(result.transform, seed);
    }
}

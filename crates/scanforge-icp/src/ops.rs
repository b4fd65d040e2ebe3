use faer::prelude::*;
use kiddo::immutable::float::kdtree::ImmutableKdTree;
use kiddo::SquaredEuclidean;

use scanforge_3d::pose::{axis_angle_to_rotation_matrix, Pose};

/// A matched source/target index pair with its squared distance.
pub(crate) struct Correspondence {
    pub source: usize,
    pub target: usize,
    pub squared_distance: f64,
}

/// Nearest-neighbour matching with robust outlier gating.
///
/// Matches past `median + 3 * MAD` of the squared distances are rejected;
/// `max_squared_distance` additionally caps matches when finite.
pub(crate) fn find_correspondences(
    source: &[[f64; 3]],
    kdtree: &ImmutableKdTree<f64, u32, 3, 32>,
    max_squared_distance: f64,
) -> Vec<Correspondence> {
    if source.is_empty() {
        return Vec::new();
    }

    let nn_results = source
        .iter()
        .map(|p| kdtree.nearest_one::<SquaredEuclidean>(p))
        .collect::<Vec<_>>();

    let mut distances = nn_results.iter().map(|nn| nn.distance).collect::<Vec<_>>();
    distances.sort_by(|a, b| a.total_cmp(b));
    let median = distances[distances.len() / 2];

    let mut deviations = distances
        .iter()
        .map(|d| (d - median).abs())
        .collect::<Vec<_>>();
    deviations.sort_by(|a, b| a.total_cmp(b));
    let sigma = 1.4826 * deviations[deviations.len() / 2];

    let gate = (median + 3.0 * sigma).min(max_squared_distance);

    nn_results
        .iter()
        .enumerate()
        .filter(|(_, nn)| nn.distance <= gate)
        .map(|(i, nn)| Correspondence {
            source: i,
            target: nn.item as usize,
            squared_distance: nn.distance,
        })
        .collect()
}

/// Solve the 6x6 normal equations of a linearized rigid alignment step.
///
/// Returns `[rx, ry, rz, tx, ty, tz]`, or `None` when the system is singular.
pub(crate) fn solve_normal_equations(ata: &[[f64; 6]; 6], atb: &[f64; 6]) -> Option<[f64; 6]> {
    let lhs = faer::Mat::from_fn(6, 6, |i, j| ata[i][j]);
    let rhs = faer::Mat::from_fn(6, 1, |i, _| atb[i]);
    let solution = lhs.partial_piv_lu().solve(&rhs);

    let mut x = [0.0; 6];
    for (i, value) in x.iter_mut().enumerate() {
        *value = solution.read(i, 0);
    }
    if x.iter().any(|v| !v.is_finite()) {
        return None;
    }
    Some(x)
}

/// Turn a small-angle update vector into a rigid transform.
pub(crate) fn delta_pose(x: &[f64; 6]) -> Pose {
    let angle = (x[0] * x[0] + x[1] * x[1] + x[2] * x[2]).sqrt();
    let translation = [x[3], x[4], x[5]];
    if angle < 1e-12 {
        return Pose::new(Pose::identity().rotation, translation);
    }
    match axis_angle_to_rotation_matrix(&[x[0], x[1], x[2]], angle) {
        Ok(rotation) => Pose::new(rotation, translation),
        Err(_) => Pose::new(Pose::identity().rotation, translation),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_correspondences_identity() {
        let points = vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [1.0, 1.0, 0.0],
        ];
        let kdtree: ImmutableKdTree<f64, u32, 3, 32> = ImmutableKdTree::new_from_slice(&points);
        let matches = find_correspondences(&points, &kdtree, f64::INFINITY);
        assert_eq!(matches.len(), 4);
        for m in &matches {
            assert_eq!(m.source, m.target);
            assert_eq!(m.squared_distance, 0.0);
        }
    }

    #[test]
    fn test_find_correspondences_respects_max_distance() {
        let target = vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]];
        let source = vec![[0.01, 0.0, 0.0], [5.0, 0.0, 0.0]];
        let kdtree: ImmutableKdTree<f64, u32, 3, 32> = ImmutableKdTree::new_from_slice(&target);
        let matches = find_correspondences(&source, &kdtree, 0.1 * 0.1);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].source, 0);
    }

    #[test]
    fn test_delta_pose_pure_translation() {
        let pose = delta_pose(&[0.0, 0.0, 0.0, 0.1, -0.2, 0.3]);
        assert_eq!(pose.translation, [0.1, -0.2, 0.3]);
        assert_eq!(pose.rotation, Pose::identity().rotation);
    }

    #[test]
    fn test_solve_normal_equations_identity_system() {
        let mut ata = [[0.0; 6]; 6];
        let mut atb = [0.0; 6];
        for i in 0..6 {
            ata[i][i] = 2.0;
            atb[i] = 1.0;
        }
        let x = solve_normal_equations(&ata, &atb).unwrap();
        for value in x {
            assert!((value - 0.5).abs() < 1e-12);
        }
    }
}

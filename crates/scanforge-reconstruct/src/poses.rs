use scanforge_3d::camera::PinholeIntrinsics;
use scanforge_3d::pose::Pose;
use scanforge_3d::rgbd::RgbdImage;

use crate::engine::{GeometryEngine, OdometryEstimate};

/// Sequentially chained camera poses, one per keyframe.
#[derive(Debug, Clone)]
pub struct PoseChain {
    /// Absolute poses mapping each frame's camera space into world space.
    pub poses: Vec<Pose>,
    /// How many frames fell back to the stationary-camera assumption.
    pub fallbacks: usize,
}

/// Estimate one absolute pose per keyframe by chaining frame-to-frame
/// odometry.
///
/// The anchor frame's pose is the identity. Every later pose composes the
/// odometry estimate onto its predecessor; when odometry diverges the camera
/// is assumed stationary for that frame so a handful of bad pairs degrade
/// quality instead of aborting the run. Poses depend only on their immediate
/// predecessor; no global correction is applied.
pub fn estimate_poses<E: GeometryEngine>(
    engine: &E,
    keyframes: &[RgbdImage],
    intrinsics: &PinholeIntrinsics,
) -> PoseChain {
    let mut chain = PoseChain {
        poses: Vec::with_capacity(keyframes.len()),
        fallbacks: 0,
    };
    if keyframes.is_empty() {
        return chain;
    }

    chain.poses.push(Pose::identity());
    for i in 1..keyframes.len() {
        let estimate = engine.compute_odometry(
            &keyframes[i - 1],
            &keyframes[i],
            intrinsics,
            &Pose::identity(),
        );
        let previous = &chain.poses[i - 1];
        let pose = match estimate {
            OdometryEstimate::Converged(relative) => relative.compose(previous),
            OdometryEstimate::Diverged => {
                log::warn!("odometry diverged between keyframes {} and {}, assuming stationary camera", i - 1, i);
                chain.fallbacks += 1;
                previous.clone()
            }
        };
        chain.poses.push(pose);
    }
    chain
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use scanforge_3d::mesh::TriangleMesh;
    use scanforge_3d::pointcloud::PointCloud;
    use std::cell::RefCell;

    // An engine whose odometry is scripted per call.
    struct ScriptedEngine {
        estimates: RefCell<Vec<OdometryEstimate>>,
    }

    impl ScriptedEngine {
        fn new(estimates: Vec<OdometryEstimate>) -> Self {
            Self {
                estimates: RefCell::new(estimates),
            }
        }
    }

    impl GeometryEngine for ScriptedEngine {
        type Volume = ();

        fn compute_odometry(
            &self,
            _prev: &RgbdImage,
            _cur: &RgbdImage,
            _intrinsics: &PinholeIntrinsics,
            _seed: &Pose,
        ) -> OdometryEstimate {
            self.estimates.borrow_mut().remove(0)
        }

        fn project_to_cloud(
            &self,
            _frame: &RgbdImage,
            _intrinsics: &PinholeIntrinsics,
        ) -> PointCloud {
            PointCloud::default()
        }

        fn downsample(&self, cloud: &PointCloud, _voxel: f64) -> PointCloud {
            cloud.clone()
        }

        fn estimate_normals(&self, cloud: &PointCloud) -> PointCloud {
            cloud.clone()
        }

        fn icp_align(
            &self,
            _source: &PointCloud,
            _target: &PointCloud,
            _max_distance: f64,
            seed: &Pose,
            _max_iterations: usize,
        ) -> Pose {
            seed.clone()
        }

        fn create_volume(&self, _voxel_length: f64, _sdf_trunc: f64) {}

        fn integrate(
            &self,
            _volume: &mut (),
            _frame: &RgbdImage,
            _intrinsics: &PinholeIntrinsics,
            _world_to_camera: &Pose,
        ) {
        }

        fn extract_mesh(&self, _volume: &()) -> TriangleMesh {
            TriangleMesh::new()
        }
    }

    fn frames(count: usize) -> Vec<RgbdImage> {
        (0..count)
            .map(|_| RgbdImage::new(vec![[0, 0, 0]; 4], vec![1.0; 4], 2, 2))
            .collect()
    }

    fn step(translation: [f64; 3]) -> OdometryEstimate {
        OdometryEstimate::Converged(Pose::new(Pose::identity().rotation, translation))
    }

    #[test]
    fn test_single_frame_needs_no_estimation() {
        let engine = ScriptedEngine::new(vec![]);
        let chain = estimate_poses(&engine, &frames(1), &PinholeIntrinsics::default());
        assert_eq!(chain.poses.len(), 1);
        assert_eq!(chain.poses[0], Pose::identity());
        assert_eq!(chain.fallbacks, 0);
    }

    #[test]
    fn test_chain_composes_relative_steps() {
        let engine = ScriptedEngine::new(vec![
            step([0.1, 0.0, 0.0]),
            step([0.0, 0.2, 0.0]),
        ]);
        let chain = estimate_poses(&engine, &frames(3), &PinholeIntrinsics::default());
        assert_eq!(chain.poses.len(), 3);
        assert_eq!(chain.fallbacks, 0);
        assert_relative_eq!(chain.poses[1].translation[0], 0.1);
        assert_relative_eq!(chain.poses[2].translation[0], 0.1);
        assert_relative_eq!(chain.poses[2].translation[1], 0.2);
    }

    #[test]
    fn test_all_failures_collapse_to_identity() {
        let engine = ScriptedEngine::new(vec![
            OdometryEstimate::Diverged,
            OdometryEstimate::Diverged,
            OdometryEstimate::Diverged,
        ]);
        let chain = estimate_poses(&engine, &frames(4), &PinholeIntrinsics::default());
        assert_eq!(chain.poses.len(), 4);
        assert_eq!(chain.fallbacks, 3);
        for pose in &chain.poses {
            assert_eq!(*pose, Pose::identity());
        }
    }

    #[test]
    fn test_fallback_holds_previous_pose() {
        let engine = ScriptedEngine::new(vec![step([0.1, 0.0, 0.0]), OdometryEstimate::Diverged]);
        let chain = estimate_poses(&engine, &frames(3), &PinholeIntrinsics::default());
        assert_eq!(chain.fallbacks, 1);
        assert_eq!(chain.poses[2], chain.poses[1]);
    }
}

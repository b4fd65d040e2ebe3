use scanforge_3d::camera::PinholeIntrinsics;
use scanforge_3d::pointcloud::PointCloud;
use scanforge_3d::pose::Pose;
use scanforge_3d::rgbd::RgbdImage;

use crate::config::ReconstructionConfig;
use crate::engine::GeometryEngine;

/// Refine a chained pose sequence with point-to-plane ICP.
///
/// Every frame is re-registered against its predecessor's point cloud, seeded
/// with the relative motion the odometry chain already established; ICP is
/// initialization-sensitive, so it is never run blind. The refined transform
/// is composed onto the refined chain, keeping the anchor pose untouched.
/// ICP always reports a transform, so a poor alignment degrades mesh quality
/// silently instead of failing the run.
///
/// PRECONDITION: `keyframes` and `poses` have the same length, at least 2.
pub fn refine_poses<E: GeometryEngine>(
    engine: &E,
    keyframes: &[RgbdImage],
    intrinsics: &PinholeIntrinsics,
    poses: &[Pose],
    config: &ReconstructionConfig,
) -> Vec<Pose> {
    assert_eq!(keyframes.len(), poses.len());

    let build_cloud = |frame: &RgbdImage| -> PointCloud {
        let cloud = engine.project_to_cloud(frame, intrinsics);
        let cloud = engine.downsample(&cloud, config.icp_voxel);
        // Normals back the point-to-plane distance metric.
        engine.estimate_normals(&cloud)
    };

    let mut refined = vec![poses[0].clone()];
    let mut previous_cloud = build_cloud(&keyframes[0]);

    for i in 1..keyframes.len() {
        let cloud = build_cloud(&keyframes[i]);
        let seed = poses[i - 1].inverse().compose(&poses[i]);
        let delta = engine.icp_align(
            &cloud,
            &previous_cloud,
            config.icp_distance,
            &seed,
            config.icp_iterations,
        );
        let pose = refined[i - 1].compose(&delta);
        log::debug!(
            "refined keyframe {i}: translation {:.4} m, rotation {:.4} rad",
            delta.translation_norm(),
            delta.rotation_angle()
        );
        refined.push(pose);
        previous_cloud = cloud;
    }

    refined
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use scanforge_3d::mesh::TriangleMesh;
    use std::cell::RefCell;

    // Engine that echoes the ICP seed and records it.
    struct SeedEchoEngine {
        seeds: RefCell<Vec<Pose>>,
    }

    impl GeometryEngine for SeedEchoEngine {
        type Volume = ();

        fn compute_odometry(
            &self,
            _prev: &RgbdImage,
            _cur: &RgbdImage,
            _intrinsics: &PinholeIntrinsics,
            _seed: &Pose,
        ) -> crate::engine::OdometryEstimate {
            crate::engine::OdometryEstimate::Diverged
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
            self.seeds.borrow_mut().push(seed.clone());
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

    #[test]
    fn test_refine_seeds_with_odometry_relative_motion() {
        let engine = SeedEchoEngine {
            seeds: RefCell::new(Vec::new()),
        };
        let step = Pose::new(Pose::identity().rotation, [0.1, 0.0, 0.0]);
        let poses = vec![Pose::identity(), step.clone()];

        let refined = refine_poses(
            &engine,
            &frames(2),
            &PinholeIntrinsics::default(),
            &poses,
            &ReconstructionConfig::default(),
        );

        assert_eq!(refined.len(), 2);
        assert_eq!(refined[0], Pose::identity());

        let seeds = engine.seeds.borrow();
        assert_eq!(seeds.len(), 1);
        // Seed is inv(P0) * P1 = the odometry step, not the identity.
        for k in 0..3 {
            assert_relative_eq!(seeds[0].translation[k], step.translation[k], epsilon = 1e-12);
        }
    }

    #[test]
    fn test_refined_chain_composes_deltas() {
        let engine = SeedEchoEngine {
            seeds: RefCell::new(Vec::new()),
        };
        let p1 = Pose::new(Pose::identity().rotation, [0.1, 0.0, 0.0]);
        let p2 = Pose::new(Pose::identity().rotation, [0.1, 0.2, 0.0]);
        let poses = vec![Pose::identity(), p1.clone(), p2.clone()];

        let refined = refine_poses(
            &engine,
            &frames(3),
            &PinholeIntrinsics::default(),
            &poses,
            &ReconstructionConfig::default(),
        );

        // The echo engine returns each seed unchanged, so refinement
        // reproduces the odometry chain.
        for (refined_pose, pose) in refined.iter().zip(&poses) {
            for k in 0..3 {
                assert_relative_eq!(
                    refined_pose.translation[k],
                    pose.translation[k],
                    epsilon = 1e-12
                );
            }
        }
    }
}

use scanforge_3d::camera::PinholeIntrinsics;
use scanforge_3d::pose::Pose;
use scanforge_3d::rgbd::RgbdImage;
use scanforge_3d::voxel_grid::voxel_downsample;

use crate::point_to_point::{align_point_to_point, ConvergenceCriteria};

/// Controls for the frame-to-frame odometry estimate.
#[derive(Debug, Clone)]
pub struct OdometryParams {
    /// Voxel size for downsampling the frame clouds, in meters.
    pub voxel_size: f64,
    /// Iteration cap for the underlying alignment.
    pub max_iterations: usize,
    /// RMSE tolerance for the underlying alignment.
    pub tolerance: f64,
    /// Minimum number of inlier correspondences for a trustworthy estimate.
    pub min_correspondences: usize,
    /// Maximum admissible alignment RMSE, in meters.
    pub max_rmse: f64,
}

impl Default for OdometryParams {
    fn default() -> Self {
        Self {
            voxel_size: 0.02,
            max_iterations: 30,
            tolerance: 1e-6,
            min_correspondences: 30,
            max_rmse: 0.05,
        }
    }
}

/// A frame-to-frame odometry estimate.
#[derive(Debug, Clone)]
pub struct OdometryResult {
    /// Whether the estimate is trustworthy.
    pub success: bool,
    /// Relative transform mapping the current frame into the previous
    /// frame's camera space. On failure this holds the seed.
    pub relative: Pose,
}

/// Estimate the relative motion between two consecutive RGB-D frames.
///
/// Both frames are back-projected into camera-space clouds, downsampled, and
/// aligned with a seeded point-to-point solve. The estimate is reported as
/// untrustworthy when depth support is too thin or the residual too large;
/// callers decide the fallback.
pub fn rgbd_odometry(
    prev: &RgbdImage,
    cur: &RgbdImage,
    intrinsics: &PinholeIntrinsics,
    seed: &Pose,
    params: &OdometryParams,
) -> OdometryResult {
    let target = voxel_downsample(&prev.to_point_cloud(intrinsics), params.voxel_size);
    let source = voxel_downsample(&cur.to_point_cloud(intrinsics), params.voxel_size);

    if source.len() < params.min_correspondences || target.len() < params.min_correspondences {
        log::debug!(
            "odometry: too little depth support ({} / {} points)",
            source.len(),
            target.len()
        );
        return OdometryResult {
            success: false,
            relative: seed.clone(),
        };
    }

    let result = align_point_to_point(
        &source,
        &target,
        seed,
        &ConvergenceCriteria {
            max_iterations: params.max_iterations,
            tolerance: params.tolerance,
        },
    );

    let success = result.num_correspondences >= params.min_correspondences
        && result.rmse.is_finite()
        && result.rmse <= params.max_rmse;
    if !success {
        log::debug!(
            "odometry rejected: rmse {:.4}, correspondences {}",
            result.rmse,
            result.num_correspondences
        );
    }

    OdometryResult {
        success,
        relative: result.transform,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn flat_frame(size: usize, depth: f64) -> (RgbdImage, PinholeIntrinsics) {
        let frame = RgbdImage::new(
            vec![[128, 128, 128]; size * size],
            vec![depth; size * size],
            size,
            size,
        );
        let f = size as f64;
        let c = size as f64 / 2.0;
        (frame, PinholeIntrinsics::new(size, size, f, f, c, c))
    }

    #[test]
    fn test_static_frames_give_near_identity() {
        let (frame, intrinsics) = flat_frame(20, 1.0);
        let result = rgbd_odometry(
            &frame,
            &frame,
            &intrinsics,
            &Pose::identity(),
            &OdometryParams::default(),
        );
        assert!(result.success);
        assert_relative_eq!(result.relative.translation_norm(), 0.0, epsilon = 1e-6);
        assert_relative_eq!(result.relative.rotation_angle(), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_empty_depth_reports_failure() {
        let (mut frame, intrinsics) = flat_frame(20, 1.0);
        frame.depth.fill(0.0);
        let (other, _) = flat_frame(20, 1.0);
        let result = rgbd_odometry(
            &frame,
            &other,
            &intrinsics,
            &Pose::identity(),
            &OdometryParams::default(),
        );
        assert!(!result.success);
        assert_eq!(result.relative, Pose::identity());
    }
}

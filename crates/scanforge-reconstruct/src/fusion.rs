use scanforge_3d::camera::PinholeIntrinsics;
use scanforge_3d::pose::Pose;
use scanforge_3d::rgbd::RgbdImage;

use scanforge_io::dataset::FramePair;

use crate::engine::GeometryEngine;
use crate::error::ReconstructError;

/// Integrate every posed keyframe into the fusion volume, in keyframe order.
///
/// The volume is fixed in world space, so each frame is integrated with the
/// inverse of its pose (world into camera space). A frame whose dimensions
/// disagree with the calibration is a precondition violation and aborts the
/// whole run; integration itself has no per-frame failure path.
///
/// PRECONDITION: `keyframes`, `pairs`, and `poses` have the same length.
pub fn integrate_keyframes<E: GeometryEngine>(
    engine: &E,
    volume: &mut E::Volume,
    keyframes: &[RgbdImage],
    pairs: &[FramePair],
    poses: &[Pose],
    intrinsics: &PinholeIntrinsics,
) -> Result<(), ReconstructError> {
    assert_eq!(keyframes.len(), poses.len());
    assert_eq!(keyframes.len(), pairs.len());

    for ((frame, pair), pose) in keyframes.iter().zip(pairs).zip(poses) {
        if frame.width != intrinsics.width || frame.height != intrinsics.height {
            return Err(ReconstructError::MalformedFrame {
                index: pair.index,
                width: frame.width,
                height: frame.height,
                expected_width: intrinsics.width,
                expected_height: intrinsics.height,
            });
        }
        engine.integrate(volume, frame, intrinsics, &pose.inverse());
    }
    Ok(())
}

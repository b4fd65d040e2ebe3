use serde::{Deserialize, Serialize};

use crate::error::ReconstructError;

/// Tunables of one reconstruction run.
///
/// Built once from a preset plus explicit overrides and never mutated
/// mid-run. Non-positive `depth_scale`/`depth_trunc` values mean "use the
/// dataset's recorded calibration".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconstructionConfig {
    /// TSDF voxel edge length in meters.
    pub voxel_length: f64,
    /// TSDF truncation distance in meters.
    pub sdf_trunc: f64,
    /// Raw depth units per meter; non-positive falls back to the dataset.
    pub depth_scale: f64,
    /// Maximum trusted depth in meters; non-positive falls back to the dataset.
    pub depth_trunc: f64,
    /// Mean depth change (meters) required to keep a frame; zero keeps all.
    pub keyframe_threshold: f64,
    /// Whether to refine odometry poses with point-to-plane ICP.
    pub icp_refine: bool,
    /// ICP max correspondence distance in meters.
    pub icp_distance: f64,
    /// Voxel size for downsampling ICP clouds, in meters.
    pub icp_voxel: f64,
    /// ICP iteration cap.
    pub icp_iterations: usize,
    /// Taubin smoothing iterations applied to the final mesh.
    pub smooth_iterations: usize,
    /// Maximum hole radius (meters) to close in the final mesh; zero disables.
    pub fill_hole_radius: f64,
    /// Name of the preset this configuration started from.
    pub preset: String,
}

impl Default for ReconstructionConfig {
    fn default() -> Self {
        Self {
            voxel_length: 0.004,
            sdf_trunc: 0.04,
            depth_scale: 1000.0,
            depth_trunc: 3.0,
            keyframe_threshold: 0.0,
            icp_refine: false,
            icp_distance: 0.02,
            icp_voxel: 0.01,
            icp_iterations: 30,
            smooth_iterations: 0,
            fill_hole_radius: 0.0,
            preset: "small".to_string(),
        }
    }
}

/// Optional per-field overrides layered on top of a preset.
///
/// A present value always wins over the preset's value; absent fields keep
/// the base configuration untouched.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Override for [`ReconstructionConfig::voxel_length`].
    pub voxel_length: Option<f64>,
    /// Override for [`ReconstructionConfig::sdf_trunc`].
    pub sdf_trunc: Option<f64>,
    /// Override for [`ReconstructionConfig::depth_scale`].
    pub depth_scale: Option<f64>,
    /// Override for [`ReconstructionConfig::depth_trunc`].
    pub depth_trunc: Option<f64>,
    /// Override for [`ReconstructionConfig::keyframe_threshold`].
    pub keyframe_threshold: Option<f64>,
    /// Override for [`ReconstructionConfig::icp_refine`].
    pub icp_refine: Option<bool>,
    /// Override for [`ReconstructionConfig::icp_distance`].
    pub icp_distance: Option<f64>,
    /// Override for [`ReconstructionConfig::icp_voxel`].
    pub icp_voxel: Option<f64>,
    /// Override for [`ReconstructionConfig::icp_iterations`].
    pub icp_iterations: Option<usize>,
    /// Override for [`ReconstructionConfig::smooth_iterations`].
    pub smooth_iterations: Option<usize>,
    /// Override for [`ReconstructionConfig::fill_hole_radius`].
    pub fill_hole_radius: Option<f64>,
}

impl ConfigOverrides {
    /// Apply the present fields on top of `base`.
    pub fn apply(&self, base: ReconstructionConfig) -> ReconstructionConfig {
        ReconstructionConfig {
            voxel_length: self.voxel_length.unwrap_or(base.voxel_length),
            sdf_trunc: self.sdf_trunc.unwrap_or(base.sdf_trunc),
            depth_scale: self.depth_scale.unwrap_or(base.depth_scale),
            depth_trunc: self.depth_trunc.unwrap_or(base.depth_trunc),
            keyframe_threshold: self.keyframe_threshold.unwrap_or(base.keyframe_threshold),
            icp_refine: self.icp_refine.unwrap_or(base.icp_refine),
            icp_distance: self.icp_distance.unwrap_or(base.icp_distance),
            icp_voxel: self.icp_voxel.unwrap_or(base.icp_voxel),
            icp_iterations: self.icp_iterations.unwrap_or(base.icp_iterations),
            smooth_iterations: self.smooth_iterations.unwrap_or(base.smooth_iterations),
            fill_hole_radius: self.fill_hole_radius.unwrap_or(base.fill_hole_radius),
            preset: base.preset,
        }
    }
}

/// Look up a named reconstruction preset.
pub fn reconstruction_preset(name: &str) -> Result<ReconstructionConfig, ReconstructError> {
    let preset = name.to_lowercase();
    match preset.as_str() {
        "small" => Ok(ReconstructionConfig {
            voxel_length: 0.003,
            sdf_trunc: 0.03,
            depth_trunc: 2.0,
            keyframe_threshold: 0.003,
            icp_refine: true,
            icp_distance: 0.015,
            icp_voxel: 0.008,
            icp_iterations: 40,
            smooth_iterations: 5,
            fill_hole_radius: 0.008,
            preset,
            ..ReconstructionConfig::default()
        }),
        "medium" => Ok(ReconstructionConfig {
            voxel_length: 0.006,
            sdf_trunc: 0.05,
            depth_trunc: 3.0,
            keyframe_threshold: 0.005,
            icp_refine: true,
            icp_distance: 0.025,
            icp_voxel: 0.012,
            icp_iterations: 30,
            smooth_iterations: 3,
            fill_hole_radius: 0.01,
            preset,
            ..ReconstructionConfig::default()
        }),
        "large" => Ok(ReconstructionConfig {
            voxel_length: 0.01,
            sdf_trunc: 0.08,
            depth_trunc: 4.0,
            keyframe_threshold: 0.008,
            icp_refine: false,
            icp_distance: 0.03,
            icp_voxel: 0.02,
            icp_iterations: 20,
            smooth_iterations: 0,
            fill_hole_radius: 0.0,
            preset,
            ..ReconstructionConfig::default()
        }),
        "small-object" => Ok(ReconstructionConfig {
            voxel_length: 0.0025,
            sdf_trunc: 0.02,
            depth_trunc: 1.5,
            keyframe_threshold: 0.002,
            icp_refine: true,
            icp_distance: 0.01,
            icp_voxel: 0.006,
            icp_iterations: 50,
            smooth_iterations: 6,
            fill_hole_radius: 0.006,
            preset,
            ..ReconstructionConfig::default()
        }),
        "face-scan" => Ok(ReconstructionConfig {
            voxel_length: 0.003,
            sdf_trunc: 0.025,
            depth_trunc: 1.5,
            keyframe_threshold: 0.003,
            icp_refine: true,
            icp_distance: 0.012,
            icp_voxel: 0.007,
            icp_iterations: 45,
            smooth_iterations: 4,
            fill_hole_radius: 0.01,
            preset,
            ..ReconstructionConfig::default()
        }),
        _ => Err(ReconstructError::UnknownPreset(name.to_string())),
    }
}

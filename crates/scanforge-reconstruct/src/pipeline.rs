use std::path::Path;

use scanforge_3d::io::ply::write_ply;
use scanforge_3d::rgbd::RgbdImage;

use scanforge_io::dataset::{list_frame_pairs, load_metadata, FramePair};
use scanforge_io::{read_image_mono16, read_image_rgb8};

use crate::cleanup::clean_mesh;
use crate::config::ReconstructionConfig;
use crate::engine::{DenseEngine, GeometryEngine};
use crate::error::ReconstructError;
use crate::fusion::integrate_keyframes;
use crate::keyframes::{check_depth_coverage, select_keyframes};
use crate::poses::estimate_poses;
use crate::refine::refine_poses;

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Loading,
    KeyframeSelecting,
    PoseEstimating,
    IcpRefining,
    Fusing,
    Extracting,
    Cleaning,
    Writing,
    Done,
}

/// Summary of a completed reconstruction run.
#[derive(Debug, Clone)]
pub struct ReconstructionReport {
    /// Frame pairs found in the dataset.
    pub frames_total: usize,
    /// Keyframes retained by selection.
    pub keyframes: usize,
    /// Odometry failures absorbed by the stationary-camera fallback.
    pub odometry_fallbacks: usize,
    /// Vertices in the written mesh.
    pub vertices: usize,
    /// Triangles in the written mesh.
    pub triangles: usize,
}

/// Reconstruct a dataset into a surface mesh with the default dense engine.
///
/// Reads the dataset at `input_dir`, runs the full pipeline, and writes the
/// final mesh to `output_mesh`. The run is single-use, synchronous, and owns
/// all of its intermediate state; it either completes or returns the first
/// terminal error.
pub fn reconstruct(
    input_dir: &Path,
    output_mesh: &Path,
    config: &ReconstructionConfig,
) -> Result<ReconstructionReport, ReconstructError> {
    reconstruct_with_engine(&DenseEngine::default(), input_dir, output_mesh, config)
}

/// Reconstruct a dataset with an injected geometry engine.
pub fn reconstruct_with_engine<E: GeometryEngine>(
    engine: &E,
    input_dir: &Path,
    output_mesh: &Path,
    config: &ReconstructionConfig,
) -> Result<ReconstructionReport, ReconstructError> {
    enter(Stage::Loading);
    let meta = load_metadata(input_dir)?;
    let pairs = list_frame_pairs(input_dir)?;
    if pairs.is_empty() {
        return Err(ReconstructError::EmptyDataset);
    }
    let frames_total = pairs.len();

    // Effective calibration: the config wins only when it carries a positive
    // value, otherwise the dataset's recorded calibration applies.
    let depth_scale = if config.depth_scale > 0.0 {
        config.depth_scale
    } else {
        meta.depth_scale
    };
    let depth_trunc = if config.depth_trunc > 0.0 {
        config.depth_trunc
    } else {
        meta.depth_trunc
    };
    let intrinsics = meta.intrinsics.clone();

    enter(Stage::KeyframeSelecting);
    let pairs = select_keyframes(&pairs, depth_scale, config.keyframe_threshold)?;
    if pairs.is_empty() {
        return Err(ReconstructError::EmptyKeyframeSet);
    }
    check_depth_coverage(&pairs, depth_scale)?;
    log::info!("selected {} of {frames_total} frames", pairs.len());

    let keyframes = load_keyframes(&pairs, depth_scale, depth_trunc)?;

    enter(Stage::PoseEstimating);
    let chain = estimate_poses(engine, &keyframes, &intrinsics);
    if chain.fallbacks > 0 {
        log::warn!(
            "{} of {} odometry steps fell back to a stationary camera",
            chain.fallbacks,
            keyframes.len().saturating_sub(1)
        );
    }

    let poses = if config.icp_refine && keyframes.len() >= 2 {
        enter(Stage::IcpRefining);
        refine_poses(engine, &keyframes, &intrinsics, &chain.poses, config)
    } else {
        chain.poses
    };

    enter(Stage::Fusing);
    let mut volume = engine.create_volume(config.voxel_length, config.sdf_trunc);
    integrate_keyframes(engine, &mut volume, &keyframes, &pairs, &poses, &intrinsics)?;

    enter(Stage::Extracting);
    let mut mesh = engine.extract_mesh(&volume);
    if mesh.is_empty() {
        return Err(ReconstructError::EmptyMesh);
    }

    enter(Stage::Cleaning);
    clean_mesh(&mut mesh, config.smooth_iterations, config.fill_hole_radius);
    if mesh.is_empty() {
        return Err(ReconstructError::EmptyMesh);
    }

    enter(Stage::Writing);
    write_mesh(output_mesh, &mesh)?;

    enter(Stage::Done);
    Ok(ReconstructionReport {
        frames_total,
        keyframes: keyframes.len(),
        odometry_fallbacks: chain.fallbacks,
        vertices: mesh.vertex_count(),
        triangles: mesh.triangle_count(),
    })
}

fn enter(stage: Stage) {
    log::info!("reconstruction stage: {stage:?}");
}

// Decode the selected frame pairs into RGB-D images.
fn load_keyframes(
    pairs: &[FramePair],
    depth_scale: f64,
    depth_trunc: f64,
) -> Result<Vec<RgbdImage>, ReconstructError> {
    let mut keyframes = Vec::with_capacity(pairs.len());
    for pair in pairs {
        let color = read_image_rgb8(&pair.color_path)?;
        let depth = read_image_mono16(&pair.depth_path)?;
        if color.width != depth.width || color.height != depth.height {
            return Err(ReconstructError::MalformedFrame {
                index: pair.index,
                width: depth.width,
                height: depth.height,
                expected_width: color.width,
                expected_height: color.height,
            });
        }
        let rgb = color
            .data
            .chunks_exact(3)
            .map(|px| [px[0], px[1], px[2]])
            .collect();
        keyframes.push(RgbdImage::from_raw_depth(
            rgb,
            &depth.data,
            depth.width,
            depth.height,
            depth_scale,
            depth_trunc,
        ));
    }
    Ok(keyframes)
}

fn write_mesh(
    path: &Path,
    mesh: &scanforge_3d::mesh::TriangleMesh,
) -> Result<(), ReconstructError> {
    let supported = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("ply"))
        .unwrap_or(false);
    if !supported {
        return Err(ReconstructError::OutputWriteFailure(format!(
            "unsupported mesh format: {}",
            path.display()
        )));
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ReconstructError::OutputWriteFailure(e.to_string()))?;
        }
    }

    write_ply(path, mesh).map_err(|e| ReconstructError::OutputWriteFailure(e.to_string()))
}

use scanforge_io::IoError;

/// Terminal errors of a reconstruction run.
///
/// Each kind carries a diagnosis distinguishing a capture problem from a
/// parameter or output problem; none of them is retried automatically.
/// Per-frame odometry divergence is absorbed inside the pipeline and never
/// surfaces here.
#[derive(Debug, thiserror::Error)]
pub enum ReconstructError {
    /// The dataset holds no usable color/depth frame pairs.
    #[error("No frames found in the dataset.")]
    EmptyDataset,

    /// Keyframe selection removed every frame.
    #[error("Keyframe selection removed all frames.")]
    EmptyKeyframeSet,

    /// The sampled depth frames carry almost no measurements.
    #[error(
        "Depth frames are mostly empty. Check capture depth_min/depth_max or disable \
         background masking."
    )]
    DegenerateDepthData,

    /// A frame's dimensions disagree with the dataset calibration.
    #[error(
        "Frame {index} has dimensions {width}x{height}, expected {expected_width}x{expected_height}."
    )]
    MalformedFrame {
        /// Capture index of the offending frame.
        index: usize,
        /// Frame width in pixels.
        width: usize,
        /// Frame height in pixels.
        height: usize,
        /// Width recorded in the calibration.
        expected_width: usize,
        /// Height recorded in the calibration.
        expected_height: usize,
    },

    /// Reconstruction produced a mesh with no geometry.
    #[error("Reconstruction produced an empty mesh.")]
    EmptyMesh,

    /// The output path cannot be written or the format is unsupported.
    #[error("Failed to write mesh output: {0}")]
    OutputWriteFailure(String),

    /// The requested preset name is not known.
    #[error("Unknown reconstruction preset: {0}")]
    UnknownPreset(String),

    /// Reading the dataset failed.
    #[error("Failed to read dataset: {0}")]
    Dataset(#[from] IoError),
}

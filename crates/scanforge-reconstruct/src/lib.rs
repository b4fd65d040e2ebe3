#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Mesh cleanup sequencing.
pub mod cleanup;

/// Reconstruction configuration, presets, and override resolution.
pub mod config;

/// The geometry engine port and its dense default implementation.
pub mod engine;

/// Terminal pipeline errors.
pub mod error;

/// Volumetric fusion of posed keyframes.
pub mod fusion;

/// Keyframe selection and depth sanity diagnostics.
pub mod keyframes;

/// The end-to-end reconstruction orchestrator.
pub mod pipeline;

/// Sequential camera pose estimation.
pub mod poses;

/// ICP-based pose refinement.
pub mod refine;

pub use config::{reconstruction_preset, ConfigOverrides, ReconstructionConfig};
pub use engine::{DenseEngine, GeometryEngine, OdometryEstimate, VolumeBounds};
pub use error::ReconstructError;
pub use pipeline::{reconstruct, reconstruct_with_engine, ReconstructionReport};

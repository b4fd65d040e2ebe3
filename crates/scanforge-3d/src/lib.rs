#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Pinhole camera intrinsics.
pub mod camera;

/// I/O for 3D surface data.
pub mod io;

/// Triangle meshes and topological cleanup operations.
pub mod mesh;

/// Surface normal estimation for point clouds.
pub mod normals;

/// Point cloud container.
pub mod pointcloud;

/// Rigid transforms in SE(3).
pub mod pose;

/// RGB-D images and pinhole back-projection.
pub mod rgbd;

/// Truncated signed distance volumes and isosurface extraction.
pub mod tsdf;

/// Voxel grid downsampling.
pub mod voxel_grid;

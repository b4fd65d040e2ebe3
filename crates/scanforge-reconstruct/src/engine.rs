use scanforge_3d::camera::PinholeIntrinsics;
use scanforge_3d::mesh::TriangleMesh;
use scanforge_3d::normals::estimate_normals;
use scanforge_3d::pointcloud::PointCloud;
use scanforge_3d::pose::Pose;
use scanforge_3d::rgbd::RgbdImage;
use scanforge_3d::tsdf::TsdfVolume;
use scanforge_3d::voxel_grid::voxel_downsample;

use scanforge_icp::{align_point_to_plane, rgbd_odometry, OdometryParams};

/// Outcome of a single odometry attempt between consecutive keyframes.
///
/// Divergence is not an error: the pose estimator applies its stationary
/// fallback and the run continues.
#[derive(Debug, Clone)]
pub enum OdometryEstimate {
    /// The solver converged on a relative transform.
    Converged(Pose),
    /// The solver failed to converge.
    Diverged,
}

/// Dense geometry capability consumed by the reconstruction pipeline.
///
/// The pipeline only sequences these primitives; injecting a scripted
/// implementation makes the orchestration deterministic to test.
pub trait GeometryEngine {
    /// Opaque fused-volume handle.
    type Volume;

    /// Estimate the relative transform mapping `cur` into `prev`'s camera
    /// space, starting from `seed`.
    fn compute_odometry(
        &self,
        prev: &RgbdImage,
        cur: &RgbdImage,
        intrinsics: &PinholeIntrinsics,
        seed: &Pose,
    ) -> OdometryEstimate;

    /// Back-project a frame into a colored camera-space point cloud.
    fn project_to_cloud(&self, frame: &RgbdImage, intrinsics: &PinholeIntrinsics) -> PointCloud;

    /// Downsample a cloud on a voxel grid; non-positive `voxel` passes through.
    fn downsample(&self, cloud: &PointCloud, voxel: f64) -> PointCloud;

    /// Attach estimated normals to a cloud.
    fn estimate_normals(&self, cloud: &PointCloud) -> PointCloud;

    /// Point-to-plane ICP between two clouds; always yields its best transform.
    fn icp_align(
        &self,
        source: &PointCloud,
        target: &PointCloud,
        max_distance: f64,
        seed: &Pose,
        max_iterations: usize,
    ) -> Pose;

    /// Create an empty fusion volume.
    fn create_volume(&self, voxel_length: f64, sdf_trunc: f64) -> Self::Volume;

    /// Integrate a frame observed from `world_to_camera` into the volume.
    fn integrate(
        &self,
        volume: &mut Self::Volume,
        frame: &RgbdImage,
        intrinsics: &PinholeIntrinsics,
        world_to_camera: &Pose,
    );

    /// Extract the isosurface mesh from the volume.
    fn extract_mesh(&self, volume: &Self::Volume) -> TriangleMesh;
}

/// Spatial extent of the dense fusion volume, in world coordinates.
#[derive(Debug, Clone)]
pub struct VolumeBounds {
    /// World-space position of the volume's minimum corner.
    pub origin: [f64; 3],
    /// Edge lengths of the volume in meters.
    pub extent: [f64; 3],
}

impl Default for VolumeBounds {
    /// A 1.5 m cube in front of the anchor camera, centered on its axis.
    fn default() -> Self {
        Self {
            origin: [-0.75, -0.75, 0.0],
            extent: [1.5, 1.5, 1.5],
        }
    }
}

/// Default engine backed by the scanforge dense kernels.
#[derive(Debug, Clone)]
pub struct DenseEngine {
    bounds: VolumeBounds,
    odometry: OdometryParams,
    normals_neighbours: usize,
}

impl Default for DenseEngine {
    fn default() -> Self {
        Self::new(VolumeBounds::default())
    }
}

impl DenseEngine {
    /// Create an engine fusing into the given volume bounds.
    pub fn new(bounds: VolumeBounds) -> Self {
        Self {
            bounds,
            odometry: OdometryParams::default(),
            normals_neighbours: 30,
        }
    }

    /// Replace the odometry controls.
    pub fn with_odometry_params(mut self, params: OdometryParams) -> Self {
        self.odometry = params;
        self
    }
}

impl GeometryEngine for DenseEngine {
    type Volume = TsdfVolume;

    fn compute_odometry(
        &self,
        prev: &RgbdImage,
        cur: &RgbdImage,
        intrinsics: &PinholeIntrinsics,
        seed: &Pose,
    ) -> OdometryEstimate {
        let result = rgbd_odometry(prev, cur, intrinsics, seed, &self.odometry);
        if result.success {
            OdometryEstimate::Converged(result.relative)
        } else {
            OdometryEstimate::Diverged
        }
    }

    fn project_to_cloud(&self, frame: &RgbdImage, intrinsics: &PinholeIntrinsics) -> PointCloud {
        frame.to_point_cloud(intrinsics)
    }

    fn downsample(&self, cloud: &PointCloud, voxel: f64) -> PointCloud {
        voxel_downsample(cloud, voxel)
    }

    fn estimate_normals(&self, cloud: &PointCloud) -> PointCloud {
        estimate_normals(cloud, self.normals_neighbours)
    }

    fn icp_align(
        &self,
        source: &PointCloud,
        target: &PointCloud,
        max_distance: f64,
        seed: &Pose,
        max_iterations: usize,
    ) -> Pose {
        align_point_to_plane(source, target, max_distance, seed, max_iterations)
    }

    fn create_volume(&self, voxel_length: f64, sdf_trunc: f64) -> TsdfVolume {
        let dims = [
            (self.bounds.extent[0] / voxel_length).ceil().max(1.0) as usize + 1,
            (self.bounds.extent[1] / voxel_length).ceil().max(1.0) as usize + 1,
            (self.bounds.extent[2] / voxel_length).ceil().max(1.0) as usize + 1,
        ];
        TsdfVolume::new(dims, voxel_length, sdf_trunc, self.bounds.origin)
    }

    fn integrate(
        &self,
        volume: &mut TsdfVolume,
        frame: &RgbdImage,
        intrinsics: &PinholeIntrinsics,
        world_to_camera: &Pose,
    ) {
        volume.integrate(frame, intrinsics, world_to_camera);
    }

    fn extract_mesh(&self, volume: &TsdfVolume) -> TriangleMesh {
        volume.extract_mesh()
    }
}

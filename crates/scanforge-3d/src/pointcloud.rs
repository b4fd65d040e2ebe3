use crate::pose::Pose;

/// A point cloud with optional per-point colors and normals.
#[derive(Debug, Clone, Default)]
pub struct PointCloud {
    // The points in the point cloud.
    points: Vec<[f64; 3]>,
    // The colors of the points.
    colors: Option<Vec<[u8; 3]>>,
    // The normals of the points.
    normals: Option<Vec<[f64; 3]>>,
}

impl PointCloud {
    /// Create a new point cloud from points, colors (optional), and normals (optional).
    pub fn new(
        points: Vec<[f64; 3]>,
        colors: Option<Vec<[u8; 3]>>,
        normals: Option<Vec<[f64; 3]>>,
    ) -> Self {
        Self {
            points,
            colors,
            normals,
        }
    }

    /// Get the number of points in the point cloud.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the point cloud is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Get as reference the points in the point cloud.
    pub fn points(&self) -> &[[f64; 3]] {
        &self.points
    }

    /// Get as reference the colors of the points in the point cloud.
    pub fn colors(&self) -> Option<&[[u8; 3]]> {
        self.colors.as_deref()
    }

    /// Get as reference the normals of the points in the point cloud.
    pub fn normals(&self) -> Option<&[[f64; 3]]> {
        self.normals.as_deref()
    }

    /// Replace the normals of the point cloud.
    ///
    /// PRECONDITION: `normals` has the same length as the points.
    pub fn set_normals(&mut self, normals: Vec<[f64; 3]>) {
        assert_eq!(normals.len(), self.points.len());
        self.normals = Some(normals);
    }

    /// Apply a rigid transform to the cloud, rotating normals along.
    pub fn transformed(&self, pose: &Pose) -> PointCloud {
        let points = self
            .points
            .iter()
            .map(|p| pose.transform_point(p))
            .collect();
        let normals = self
            .normals
            .as_ref()
            .map(|normals| normals.iter().map(|n| pose.rotate_vector(n)).collect());
        PointCloud {
            points,
            colors: self.colors.clone(),
            normals,
        }
    }

    /// Get the minimum bound of the point cloud.
    pub fn min_bound(&self) -> [f64; 3] {
        self.points.iter().fold(
            [f64::INFINITY, f64::INFINITY, f64::INFINITY],
            |acc, p| [acc[0].min(p[0]), acc[1].min(p[1]), acc[2].min(p[2])],
        )
    }

    /// Get the maximum bound of the point cloud.
    pub fn max_bound(&self) -> [f64; 3] {
        self.points.iter().fold(
            [f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY],
            |acc, p| [acc[0].max(p[0]), acc[1].max(p[1]), acc[2].max(p[2])],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::Pose;
    use approx::assert_relative_eq;

    #[test]
    fn test_pointcloud_accessors() {
        let cloud = PointCloud::new(
            vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]],
            Some(vec![[255, 0, 0], [0, 255, 0]]),
            Some(vec![[0.0, 1.0, 0.0], [1.0, 0.0, 0.0]]),
        );

        assert_eq!(cloud.len(), 2);
        assert!(!cloud.is_empty());
        assert_eq!(cloud.colors().map(|c| c.len()), Some(2));
        assert_eq!(cloud.normals().map(|n| n.len()), Some(2));
    }

    #[test]
    fn test_transformed_rotates_normals() {
        let cloud = PointCloud::new(
            vec![[1.0, 0.0, 0.0]],
            None,
            Some(vec![[1.0, 0.0, 0.0]]),
        );
        let pose =
            Pose::from_axis_angle(&[0.0, 0.0, 1.0], std::f64::consts::PI / 2.0, [0.0, 0.0, 1.0])
                .unwrap();
        let moved = cloud.transformed(&pose);

        let point = moved.points()[0];
        assert_relative_eq!(point[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(point[1], 1.0, epsilon = 1e-12);
        assert_relative_eq!(point[2], 1.0, epsilon = 1e-12);

        // Normals pick up the rotation but not the translation.
        let normal = moved.normals().unwrap()[0];
        assert_relative_eq!(normal[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(normal[1], 1.0, epsilon = 1e-12);
        assert_relative_eq!(normal[2], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_bounds() {
        let cloud = PointCloud::new(vec![[0.0, -1.0, 2.0], [1.0, 1.0, 0.5]], None, None);
        assert_eq!(cloud.min_bound(), [0.0, -1.0, 0.5]);
        assert_eq!(cloud.max_bound(), [1.0, 1.0, 2.0]);
    }
}

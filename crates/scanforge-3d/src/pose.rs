use glam::{DMat3, DVec3};

/// A rigid transform in SE(3): a rotation followed by a translation.
///
/// Used both for camera poses (camera space into world space) and for
/// relative motion between frames. Composition follows matrix convention:
/// `a.compose(&b)` applies `b` first, then `a`.
#[derive(Debug, Clone, PartialEq)]
pub struct Pose {
    /// Row-major 3x3 rotation matrix.
    pub rotation: [[f64; 3]; 3],
    /// Translation vector.
    pub translation: [f64; 3],
}

impl Pose {
    /// Create a transform from rotation and translation parts.
    pub fn new(rotation: [[f64; 3]; 3], translation: [f64; 3]) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    /// The identity transform.
    pub fn identity() -> Self {
        Self {
            rotation: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            translation: [0.0, 0.0, 0.0],
        }
    }

    /// Build a transform rotating about `axis` by `angle` radians, then translating.
    pub fn from_axis_angle(
        axis: &[f64; 3],
        angle: f64,
        translation: [f64; 3],
    ) -> Result<Self, &'static str> {
        Ok(Self {
            rotation: axis_angle_to_rotation_matrix(axis, angle)?,
            translation,
        })
    }

    /// Compose this transform with another (`self * other`).
    pub fn compose(&self, other: &Pose) -> Pose {
        let r1 = self.rot_mat();
        let r2 = other.rot_mat();
        let t = r1 * DVec3::from_array(other.translation) + DVec3::from_array(self.translation);
        Pose::from_parts(r1 * r2, t)
    }

    /// The inverse transform.
    pub fn inverse(&self) -> Pose {
        let r_inv = self.rot_mat().transpose();
        let t_inv = -(r_inv * DVec3::from_array(self.translation));
        Pose::from_parts(r_inv, t_inv)
    }

    /// Apply the transform to a point.
    pub fn transform_point(&self, point: &[f64; 3]) -> [f64; 3] {
        (self.rot_mat() * DVec3::from_array(*point) + DVec3::from_array(self.translation))
            .to_array()
    }

    /// Rotate a direction vector, ignoring the translation part.
    pub fn rotate_vector(&self, vector: &[f64; 3]) -> [f64; 3] {
        (self.rot_mat() * DVec3::from_array(*vector)).to_array()
    }

    /// View the transform as a 4x4 homogeneous matrix.
    pub fn as_matrix(&self) -> [[f64; 4]; 4] {
        let r = &self.rotation;
        let t = &self.translation;
        [
            [r[0][0], r[0][1], r[0][2], t[0]],
            [r[1][0], r[1][1], r[1][2], t[1]],
            [r[2][0], r[2][1], r[2][2], t[2]],
            [0.0, 0.0, 0.0, 1.0],
        ]
    }

    /// Rotation angle in radians of the rotation part.
    pub fn rotation_angle(&self) -> f64 {
        let trace = self.rotation[0][0] + self.rotation[1][1] + self.rotation[2][2];
        ((trace - 1.0) / 2.0).clamp(-1.0, 1.0).acos()
    }

    /// Euclidean norm of the translation part.
    pub fn translation_norm(&self) -> f64 {
        DVec3::from_array(self.translation).length()
    }

    fn rot_mat(&self) -> DMat3 {
        let r = &self.rotation;
        DMat3::from_cols(
            DVec3::new(r[0][0], r[1][0], r[2][0]),
            DVec3::new(r[0][1], r[1][1], r[2][1]),
            DVec3::new(r[0][2], r[1][2], r[2][2]),
        )
    }

    fn from_parts(rotation: DMat3, translation: DVec3) -> Pose {
        let mut r = [[0.0; 3]; 3];
        for (j, col) in [rotation.x_axis, rotation.y_axis, rotation.z_axis]
            .iter()
            .enumerate()
        {
            r[0][j] = col.x;
            r[1][j] = col.y;
            r[2][j] = col.z;
        }
        Pose {
            rotation: r,
            translation: translation.to_array(),
        }
    }
}

/// Compute the rotation matrix from an axis and angle.
///
/// The axis does not need to be normalized; a zero axis is an error.
pub fn axis_angle_to_rotation_matrix(
    axis: &[f64; 3],
    angle: f64,
) -> Result<[[f64; 3]; 3], &'static str> {
    let magnitude = (axis[0].powi(2) + axis[1].powi(2) + axis[2].powi(2)).sqrt();
    if magnitude < 1e-10 {
        return Err("cannot compute rotation matrix from a zero vector");
    }
    let x = axis[0] / magnitude;
    let y = axis[1] / magnitude;
    let z = axis[2] / magnitude;

    let c = angle.cos();
    let s = angle.sin();
    let t = 1.0 - c;

    Ok([
        [c + x * x * t, x * y * t - z * s, x * z * t + y * s],
        [x * y * t + z * s, c + y * y * t, y * z * t - x * s],
        [x * z * t - y * s, y * z * t + x * s, c + z * z * t],
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn assert_pose_eq(a: &Pose, b: &Pose, epsilon: f64) {
        for i in 0..3 {
            for j in 0..3 {
                assert_relative_eq!(a.rotation[i][j], b.rotation[i][j], epsilon = epsilon);
            }
            assert_relative_eq!(a.translation[i], b.translation[i], epsilon = epsilon);
        }
    }

    #[test]
    fn test_identity_is_neutral() {
        let pose = Pose::from_axis_angle(&[0.0, 1.0, 0.0], 0.3, [0.1, -0.2, 0.5]).unwrap();
        let composed = pose.compose(&Pose::identity());
        assert_pose_eq(&pose, &composed, 1e-12);
        let composed = Pose::identity().compose(&pose);
        assert_pose_eq(&pose, &composed, 1e-12);
    }

    #[test]
    fn test_inverse_roundtrip() {
        let pose = Pose::from_axis_angle(&[1.0, 2.0, -0.5], 0.7, [0.3, 0.1, -0.4]).unwrap();
        let roundtrip = pose.compose(&pose.inverse());
        assert_pose_eq(&roundtrip, &Pose::identity(), 1e-12);

        let point = [0.4, -0.2, 1.1];
        let there = pose.transform_point(&point);
        let back = pose.inverse().transform_point(&there);
        for i in 0..3 {
            assert_relative_eq!(back[i], point[i], epsilon = 1e-12);
        }
    }

    #[test]
    fn test_compose_matches_sequential_application() {
        let a = Pose::from_axis_angle(&[0.0, 0.0, 1.0], 0.4, [0.1, 0.0, 0.0]).unwrap();
        let b = Pose::from_axis_angle(&[1.0, 0.0, 0.0], -0.2, [0.0, 0.2, 0.0]).unwrap();
        let point = [0.5, 0.5, 0.5];
        let sequential = a.transform_point(&b.transform_point(&point));
        let composed = a.compose(&b).transform_point(&point);
        for i in 0..3 {
            assert_relative_eq!(sequential[i], composed[i], epsilon = 1e-12);
        }
    }

    #[test]
    fn test_axis_angle_quarter_turn() {
        let rotation =
            axis_angle_to_rotation_matrix(&[1.0, 0.0, 0.0], std::f64::consts::PI / 2.0).unwrap();
        let expected = [[1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]];
        for i in 0..3 {
            for j in 0..3 {
                assert_relative_eq!(rotation[i][j], expected[i][j], epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_axis_angle_zero_axis_rejected() {
        assert!(axis_angle_to_rotation_matrix(&[0.0, 0.0, 0.0], 1.0).is_err());
    }

    #[test]
    fn test_rotation_angle_and_translation_norm() {
        let pose = Pose::from_axis_angle(&[0.0, 1.0, 0.0], 0.25, [3.0, 0.0, 4.0]).unwrap();
        assert_relative_eq!(pose.rotation_angle(), 0.25, epsilon = 1e-12);
        assert_relative_eq!(pose.translation_norm(), 5.0, epsilon = 1e-12);
    }
}

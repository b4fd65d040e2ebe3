use serde::{Deserialize, Serialize};

/// Intrinsic parameters of a pinhole camera.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PinholeIntrinsics {
    /// Image width in pixels.
    pub width: usize,
    /// Image height in pixels.
    pub height: usize,
    /// Focal length along x in pixels.
    pub fx: f64,
    /// Focal length along y in pixels.
    pub fy: f64,
    /// Principal point x coordinate in pixels.
    pub cx: f64,
    /// Principal point y coordinate in pixels.
    pub cy: f64,
}

impl PinholeIntrinsics {
    /// Create intrinsics from explicit parameters.
    pub fn new(width: usize, height: usize, fx: f64, fy: f64, cx: f64, cy: f64) -> Self {
        Self {
            width,
            height,
            fx,
            fy,
            cx,
            cy,
        }
    }

    /// Project a camera-space point onto the image plane.
    ///
    /// Returns `None` for points on or behind the camera plane.
    pub fn project(&self, point: &[f64; 3]) -> Option<(f64, f64)> {
        if point[2] <= 0.0 {
            return None;
        }
        let inv_z = 1.0 / point[2];
        Some((
            self.fx * point[0] * inv_z + self.cx,
            self.fy * point[1] * inv_z + self.cy,
        ))
    }

    /// Back-project the pixel `(u, v)` at the given depth into camera space.
    pub fn unproject(&self, u: f64, v: f64, depth: f64) -> [f64; 3] {
        [
            (u - self.cx) * depth / self.fx,
            (v - self.cy) * depth / self.fy,
            depth,
        ]
    }

    /// Check whether integer pixel coordinates land inside the image bounds.
    pub fn contains(&self, u: isize, v: isize) -> bool {
        u >= 0 && (u as usize) < self.width && v >= 0 && (v as usize) < self.height
    }
}

impl Default for PinholeIntrinsics {
    /// VGA profile of a structured-light depth sensor.
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            fx: 525.0,
            fy: 525.0,
            cx: 319.5,
            cy: 239.5,
        }
    }
}

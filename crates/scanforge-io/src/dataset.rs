use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use scanforge_3d::camera::PinholeIntrinsics;

use crate::error::IoError;

/// Calibration metadata stored beside a captured dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetMeta {
    /// Camera intrinsics the frames were captured with.
    pub intrinsics: PinholeIntrinsics,
    /// Raw depth units per meter.
    pub depth_scale: f64,
    /// Maximum trusted depth in meters.
    pub depth_trunc: f64,
    /// Color channel ordering of the stored images.
    #[serde(default = "default_color_format")]
    pub color_format: String,
    /// Unit of the raw depth values.
    #[serde(default = "default_depth_unit")]
    pub depth_unit: String,
}

fn default_color_format() -> String {
    "rgb".to_string()
}

fn default_depth_unit() -> String {
    "mm".to_string()
}

impl Default for DatasetMeta {
    fn default() -> Self {
        Self {
            intrinsics: PinholeIntrinsics::default(),
            depth_scale: 1000.0,
            depth_trunc: 3.0,
            color_format: default_color_format(),
            depth_unit: default_depth_unit(),
        }
    }
}

/// One dataset frame: its index and the color/depth file pair.
#[derive(Debug, Clone, PartialEq)]
pub struct FramePair {
    /// Capture index of the frame.
    pub index: usize,
    /// Path of the 8-bit RGB color image.
    pub color_path: PathBuf,
    /// Path of the 16-bit depth image.
    pub depth_path: PathBuf,
}

/// Create the `color/` and `depth/` subdirectories of a dataset root.
pub fn ensure_dirs(root: &Path) -> Result<(PathBuf, PathBuf), IoError> {
    let color_dir = root.join("color");
    let depth_dir = root.join("depth");
    std::fs::create_dir_all(&color_dir)?;
    std::fs::create_dir_all(&depth_dir)?;
    Ok((color_dir, depth_dir))
}

/// Persist calibration metadata as `metadata.json` at the dataset root.
pub fn write_metadata(root: &Path, meta: &DatasetMeta) -> Result<(), IoError> {
    let payload = serde_json::to_string_pretty(meta)?;
    std::fs::write(root.join("metadata.json"), payload)?;
    Ok(())
}

/// Load calibration metadata from the dataset root.
pub fn load_metadata(root: &Path) -> Result<DatasetMeta, IoError> {
    let path = root.join("metadata.json");
    if !path.exists() {
        return Err(IoError::FileDoesNotExist(path));
    }
    let payload = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&payload)?)
}

/// List the dataset's color/depth frame pairs in capture-index order.
///
/// Color files follow `color/color_<index>.png`; a pair is listed only when
/// the matching `depth/depth_<index>.png` exists. A missing `color/`
/// directory yields an empty list.
pub fn list_frame_pairs(root: &Path) -> Result<Vec<FramePair>, IoError> {
    let color_dir = root.join("color");
    let depth_dir = root.join("depth");
    if !color_dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut pairs = Vec::new();
    for entry in std::fs::read_dir(&color_dir)? {
        let color_path = entry?.path();
        let stem = match color_path.file_stem().and_then(|s| s.to_str()) {
            Some(stem) => stem,
            None => continue,
        };
        if !stem.starts_with("color_")
            || color_path.extension().and_then(|e| e.to_str()) != Some("png")
        {
            continue;
        }
        let token = match stem.rsplit('_').next() {
            Some(token) => token,
            None => continue,
        };
        let index: usize = match token.parse() {
            Ok(index) => index,
            Err(_) => {
                log::warn!("skipping color frame with unparsable index: {color_path:?}");
                continue;
            }
        };
        let depth_path = depth_dir.join(format!("depth_{token}.png"));
        if depth_path.exists() {
            pairs.push(FramePair {
                index,
                color_path,
                depth_path,
            });
        }
    }

    pairs.sort_by_key(|pair| pair.index);
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        std::fs::write(path, b"").unwrap();
    }

    #[test]
    fn test_metadata_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let meta = DatasetMeta {
            intrinsics: PinholeIntrinsics::new(320, 240, 260.0, 260.0, 159.5, 119.5),
            depth_scale: 5000.0,
            depth_trunc: 2.0,
            ..DatasetMeta::default()
        };
        write_metadata(dir.path(), &meta).unwrap();
        let loaded = load_metadata(dir.path()).unwrap();
        assert_eq!(loaded, meta);
    }

    #[test]
    fn test_metadata_defaults_for_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let payload = r#"{
            "intrinsics": {"width": 640, "height": 480, "fx": 525.0, "fy": 525.0, "cx": 319.5, "cy": 239.5},
            "depth_scale": 1000.0,
            "depth_trunc": 3.0
        }"#;
        std::fs::write(dir.path().join("metadata.json"), payload).unwrap();
        let loaded = load_metadata(dir.path()).unwrap();
        assert_eq!(loaded.color_format, "rgb");
        assert_eq!(loaded.depth_unit, "mm");
    }

    #[test]
    fn test_missing_metadata_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_metadata(dir.path()),
            Err(IoError::FileDoesNotExist(_))
        ));
    }

    #[test]
    fn test_list_frame_pairs_orders_and_filters() {
        let dir = tempfile::tempdir().unwrap();
        let (color_dir, depth_dir) = ensure_dirs(dir.path()).unwrap();

        // Written out of order; frame 1 has no depth and must be skipped.
        touch(&color_dir.join("color_0002.png"));
        touch(&depth_dir.join("depth_0002.png"));
        touch(&color_dir.join("color_0000.png"));
        touch(&depth_dir.join("depth_0000.png"));
        touch(&color_dir.join("color_0001.png"));
        touch(&color_dir.join("notes.txt"));

        let pairs = list_frame_pairs(dir.path()).unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].index, 0);
        assert_eq!(pairs[1].index, 2);
        assert!(pairs[1].depth_path.ends_with("depth_0002.png"));
    }

    #[test]
    fn test_list_frame_pairs_empty_dataset() {
        let dir = tempfile::tempdir().unwrap();
        assert!(list_frame_pairs(dir.path()).unwrap().is_empty());
    }
}

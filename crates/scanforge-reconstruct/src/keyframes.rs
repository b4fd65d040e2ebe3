use std::path::Path;

use scanforge_io::dataset::FramePair;
use scanforge_io::read_image_mono16;

use crate::error::ReconstructError;

// How many of the leading keyframes the depth sanity diagnostic samples.
const SANITY_SAMPLE_COUNT: usize = 5;
// Below this fraction of measured pixels the capture is considered masked out.
const MIN_VALID_DEPTH_FRACTION: f64 = 0.01;

/// Filter the ordered frame sequence down to keyframes.
///
/// The first frame is always kept; a later frame is kept iff its mean
/// absolute depth difference against the last kept frame is at least
/// `threshold` meters. A non-positive threshold keeps every frame without
/// touching the depth files.
pub fn select_keyframes(
    pairs: &[FramePair],
    depth_scale: f64,
    threshold: f64,
) -> Result<Vec<FramePair>, ReconstructError> {
    if threshold <= 0.0 {
        return Ok(pairs.to_vec());
    }

    let mut selected = Vec::new();
    let mut last_depth: Option<Vec<f64>> = None;
    for pair in pairs {
        let depth = decode_depth_meters(&pair.depth_path, depth_scale)?;
        match &last_depth {
            None => {
                selected.push(pair.clone());
                last_depth = Some(depth);
            }
            Some(previous) => {
                let delta = mean_abs_diff(&depth, previous);
                if delta >= threshold {
                    log::debug!("keyframe {}: mean depth change {delta:.4} m", pair.index);
                    selected.push(pair.clone());
                    last_depth = Some(depth);
                }
            }
        }
    }
    Ok(selected)
}

/// Fail fast when the selected frames carry almost no depth.
///
/// Samples the first few keyframes and trips when even the best of them has
/// less than 1% measured pixels, which points at a capture configuration
/// problem rather than a reconstruction one.
pub fn check_depth_coverage(
    pairs: &[FramePair],
    depth_scale: f64,
) -> Result<(), ReconstructError> {
    let sample = &pairs[..pairs.len().min(SANITY_SAMPLE_COUNT)];
    if sample.is_empty() {
        return Ok(());
    }

    let mut best_fraction: f64 = 0.0;
    for pair in sample {
        let depth = decode_depth_meters(&pair.depth_path, depth_scale)?;
        if depth.is_empty() {
            continue;
        }
        let valid = depth.iter().filter(|&&d| d > 0.0).count();
        best_fraction = best_fraction.max(valid as f64 / depth.len() as f64);
    }

    if best_fraction < MIN_VALID_DEPTH_FRACTION {
        return Err(ReconstructError::DegenerateDepthData);
    }
    Ok(())
}

fn decode_depth_meters(path: &Path, depth_scale: f64) -> Result<Vec<f64>, ReconstructError> {
    let raw = read_image_mono16(path)?;
    Ok(raw
        .data
        .iter()
        .map(|&value| value as f64 / depth_scale)
        .collect())
}

// Mean absolute difference over pixels measured in both frames. Mismatched
// buffer sizes count as maximally different; the fusion stage will reject
// the frame properly.
fn mean_abs_diff(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() {
        return f64::INFINITY;
    }
    let mut sum = 0.0;
    let mut count = 0usize;
    for (&x, &y) in a.iter().zip(b) {
        if x > 0.0 && y > 0.0 {
            sum += (x - y).abs();
            count += 1;
        }
    }
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scanforge_io::dataset::ensure_dirs;
    use scanforge_io::png::ImageBuffer;
    use scanforge_io::write_image_mono16;
    use std::path::PathBuf;

    // Write a 4x4 depth frame with the given raw value and return its pair.
    fn write_depth_frame(root: &Path, index: usize, raw_value: u16) -> FramePair {
        let (color_dir, depth_dir) = ensure_dirs(root).unwrap();
        let depth_path = depth_dir.join(format!("depth_{index:04}.png"));
        write_image_mono16(
            &depth_path,
            &ImageBuffer {
                data: vec![raw_value; 16],
                width: 4,
                height: 4,
            },
        )
        .unwrap();
        FramePair {
            index,
            color_path: color_dir.join(format!("color_{index:04}.png")),
            depth_path,
        }
    }

    #[test]
    fn test_zero_threshold_is_identity() {
        let pairs = vec![
            FramePair {
                index: 0,
                color_path: PathBuf::from("color_0000.png"),
                depth_path: PathBuf::from("depth_0000.png"),
            },
            FramePair {
                index: 1,
                color_path: PathBuf::from("color_0001.png"),
                depth_path: PathBuf::from("depth_0001.png"),
            },
        ];
        // No files exist on disk; the identity policy must not read them.
        let selected = select_keyframes(&pairs, 1000.0, 0.0).unwrap();
        assert_eq!(selected, pairs);
        let selected = select_keyframes(&pairs, 1000.0, -1.0).unwrap();
        assert_eq!(selected, pairs);
    }

    #[test]
    fn test_threshold_filters_static_frames() {
        let dir = tempfile::tempdir().unwrap();
        // Frames at 1.000 m, 1.001 m, 1.050 m, 1.051 m.
        let pairs = vec![
            write_depth_frame(dir.path(), 0, 1000),
            write_depth_frame(dir.path(), 1, 1001),
            write_depth_frame(dir.path(), 2, 1050),
            write_depth_frame(dir.path(), 3, 1051),
        ];

        let selected = select_keyframes(&pairs, 1000.0, 0.01).unwrap();
        let indices: Vec<usize> = selected.iter().map(|p| p.index).collect();
        // First always kept; frame 2 moved 5 cm from frame 0; frame 3 barely
        // moved from the last kept frame 2.
        assert_eq!(indices, vec![0, 2]);
    }

    #[test]
    fn test_selection_is_index_increasing_and_keeps_first() {
        let dir = tempfile::tempdir().unwrap();
        let pairs: Vec<FramePair> = (0..5)
            .map(|i| write_depth_frame(dir.path(), i, 1000 + (i as u16) * 40))
            .collect();
        let selected = select_keyframes(&pairs, 1000.0, 0.03).unwrap();
        assert_eq!(selected[0].index, 0);
        for window in selected.windows(2) {
            assert!(window[0].index < window[1].index);
        }
    }

    #[test]
    fn test_depth_coverage_trips_on_empty_depth() {
        let dir = tempfile::tempdir().unwrap();
        let pairs = vec![
            write_depth_frame(dir.path(), 0, 0),
            write_depth_frame(dir.path(), 1, 0),
        ];
        assert!(matches!(
            check_depth_coverage(&pairs, 1000.0),
            Err(ReconstructError::DegenerateDepthData)
        ));
    }

    #[test]
    fn test_depth_coverage_passes_on_measured_depth() {
        let dir = tempfile::tempdir().unwrap();
        let pairs = vec![write_depth_frame(dir.path(), 0, 1500)];
        assert!(check_depth_coverage(&pairs, 1000.0).is_ok());
    }
}

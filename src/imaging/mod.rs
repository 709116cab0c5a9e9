//! Image-side inputs to a diagnosis run.
//!
//! Each image may carry two optional companions: a `<stem>.json` sidecar
//! with agronomic metadata, and a `<stem>.txt` detection result in the ROI
//! directory. Both degrade gracefully; a bare image still diagnoses from
//! the whole frame.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::warn;

pub const UNKNOWN_TIME: &str = "未知时间";
pub const UNKNOWN_CROP: &str = "未知作物";
pub const UNKNOWN_STAGE: &str = "未知生育期";
pub const DEFAULT_ENVIRONMENT: &str = "自然环境";

/// Coordinate precision in decimal places
const COORD_DECIMALS: i32 = 2;

/// Agronomic metadata for one image, sourced from its JSON sidecar
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ImageMeta {
    pub capture_time: String,
    pub crop_type: String,
    pub growth_stage: String,
    pub environment: String,
}

impl Default for ImageMeta {
    fn default() -> Self {
        Self {
            capture_time: UNKNOWN_TIME.to_string(),
            crop_type: UNKNOWN_CROP.to_string(),
            growth_stage: UNKNOWN_STAGE.to_string(),
            environment: DEFAULT_ENVIRONMENT.to_string(),
        }
    }
}

impl ImageMeta {
    /// Read the `<stem>.json` sidecar next to the image.
    ///
    /// A missing sidecar is normal; a malformed one is logged and replaced
    /// with defaults. An unknown capture time falls back to the image
    /// file's modification time.
    pub fn load(image_path: &Path) -> Self {
        let sidecar = image_path.with_extension("json");
        let mut meta = match std::fs::read_to_string(&sidecar) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(meta) => meta,
                Err(err) => {
                    warn!(
                        path = %sidecar.display(),
                        "image metadata sidecar unparsable, using defaults: {err}"
                    );
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        };

        if meta.capture_time == UNKNOWN_TIME {
            if let Some(mtime) = modified_time(image_path) {
                meta.capture_time = mtime;
            }
        }
        meta
    }
}

fn modified_time(path: &Path) -> Option<String> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    let local: chrono::DateTime<chrono::Local> = modified.into();
    Some(local.format("%Y-%m-%d %H:%M").to_string())
}

/// Detected symptom boxes of one label within one image
#[derive(Debug, Clone, PartialEq)]
pub struct SymptomGroup {
    pub label: String,
    pub boxes: Vec<Vec<f64>>,
}

/// All detected symptom regions of one image, grouped by label in
/// first-appearance order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SymptomRegions {
    pub groups: Vec<SymptomGroup>,
}

impl SymptomRegions {
    /// Read the `<stem>.txt` detection result from the ROI directory.
    ///
    /// Each line is `label_id x1 y1 x2 y2 ...`; lines with fewer than five
    /// fields or unparsable numbers are skipped. A missing file warns once
    /// and yields an empty set, the diagnosis then covers the whole image.
    pub fn load(image_path: &Path, roi_dir: &Path, classes: &[String]) -> Self {
        let stem = match image_path.file_stem() {
            Some(stem) => stem.to_string_lossy().into_owned(),
            None => return Self::default(),
        };
        let result_path = roi_dir.join(format!("{stem}.txt"));

        let raw = match std::fs::read_to_string(&result_path) {
            Ok(raw) => raw,
            Err(_) => {
                warn!(
                    path = %result_path.display(),
                    "no symptom detection result, diagnosing from the whole image"
                );
                return Self::default();
            }
        };

        Self::parse(&raw, classes)
    }

    fn parse(raw: &str, classes: &[String]) -> Self {
        let mut regions = Self::default();
        for line in raw.lines() {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 5 {
                continue;
            }
            let Ok(label_id) = parts[0].parse::<usize>() else {
                continue;
            };
            let Ok(coords) = parts[1..]
                .iter()
                .map(|p| p.parse::<f64>())
                .collect::<std::result::Result<Vec<f64>, _>>()
            else {
                continue;
            };

            let coords: Vec<f64> = coords.into_iter().map(round_clamp).collect();
            let label = classes
                .get(label_id)
                .cloned()
                .unwrap_or_else(|| format!("未知症状_{label_id}"));
            regions.push(label, coords);
        }
        regions
    }

    fn push(&mut self, label: String, coords: Vec<f64>) {
        match self.groups.iter_mut().find(|g| g.label == label) {
            Some(group) => group.boxes.push(coords),
            None => self.groups.push(SymptomGroup {
                label,
                boxes: vec![coords],
            }),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

fn round_clamp(value: f64) -> f64 {
    let scale = 10f64.powi(COORD_DECIMALS);
    ((value * scale).round() / scale).max(0.0)
}

/// One fully loaded image input
#[derive(Debug, Clone)]
pub struct ImageInput {
    pub path: PathBuf,
    pub meta: ImageMeta,
    pub regions: SymptomRegions,
}

impl ImageInput {
    pub fn load(image_path: &Path, roi_dir: &Path, classes: &[String]) -> Self {
        Self {
            path: image_path.to_path_buf(),
            meta: ImageMeta::load(image_path),
            regions: SymptomRegions::load(image_path, roi_dir, classes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn classes() -> Vec<String> {
        vec!["叶斑".to_string(), "黄化".to_string()]
    }

    #[test]
    fn test_sidecar_metadata_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("leaf.jpg");
        fs::write(&image, b"jpg").unwrap();
        fs::write(
            dir.path().join("leaf.json"),
            r#"{"capture_time": "2025-06-01 08:30", "crop_type": "水稻", "growth_stage": "分蘖期", "environment": "大田"}"#,
        )
        .unwrap();

        let meta = ImageMeta::load(&image);
        assert_eq!(meta.capture_time, "2025-06-01 08:30");
        assert_eq!(meta.crop_type, "水稻");
        assert_eq!(meta.growth_stage, "分蘖期");
        assert_eq!(meta.environment, "大田");
    }

    #[test]
    fn test_partial_sidecar_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("leaf.jpg");
        fs::write(&image, b"jpg").unwrap();
        fs::write(dir.path().join("leaf.json"), r#"{"crop_type": "小麦"}"#).unwrap();

        let meta = ImageMeta::load(&image);
        assert_eq!(meta.crop_type, "小麦");
        assert_eq!(meta.growth_stage, UNKNOWN_STAGE);
        assert_eq!(meta.environment, DEFAULT_ENVIRONMENT);
        // Unknown capture time falls back to the image mtime
        assert_ne!(meta.capture_time, UNKNOWN_TIME);
    }

    #[test]
    fn test_missing_sidecar_uses_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("leaf.jpg");
        fs::write(&image, b"jpg").unwrap();

        let meta = ImageMeta::load(&image);
        assert_eq!(meta.crop_type, UNKNOWN_CROP);
        assert!(meta.capture_time.contains('-'));
    }

    #[test]
    fn test_missing_image_keeps_unknown_time() {
        let meta = ImageMeta::load(Path::new("/nonexistent/leaf.jpg"));
        assert_eq!(meta.capture_time, UNKNOWN_TIME);
    }

    #[test]
    fn test_malformed_sidecar_degrades_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("leaf.jpg");
        fs::write(&image, b"jpg").unwrap();
        fs::write(dir.path().join("leaf.json"), "{broken").unwrap();

        let meta = ImageMeta::load(&image);
        assert_eq!(meta.crop_type, UNKNOWN_CROP);
    }

    #[test]
    fn test_region_parse_groups_by_label() {
        let raw = "0 0.1 0.2 0.3 0.4\n1 0.5 0.6 0.7 0.8\n0 0.15 0.25 0.35 0.45\n";
        let regions = SymptomRegions::parse(raw, &classes());
        assert_eq!(regions.groups.len(), 2);
        assert_eq!(regions.groups[0].label, "叶斑");
        assert_eq!(regions.groups[0].boxes.len(), 2);
        assert_eq!(regions.groups[1].label, "黄化");
    }

    #[test]
    fn test_region_parse_skips_short_and_bad_lines() {
        let raw = "0 0.1 0.2\nnot a line\n0 0.1 x 0.3 0.4\n1 0.5 0.6 0.7 0.8\n";
        let regions = SymptomRegions::parse(raw, &classes());
        assert_eq!(regions.groups.len(), 1);
        assert_eq!(regions.groups[0].label, "黄化");
    }

    #[test]
    fn test_region_parse_rounds_and_clamps() {
        let raw = "0 0.123456 -0.5 0.999 1.005\n";
        let regions = SymptomRegions::parse(raw, &classes());
        assert_eq!(regions.groups[0].boxes[0], vec![0.12, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn test_unknown_label_id_gets_placeholder() {
        let raw = "7 0.1 0.2 0.3 0.4\n";
        let regions = SymptomRegions::parse(raw, &classes());
        assert_eq!(regions.groups[0].label, "未知症状_7");
    }

    #[test]
    fn test_missing_roi_file_yields_empty_regions() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("leaf.jpg");
        fs::write(&image, b"jpg").unwrap();

        let regions = SymptomRegions::load(&image, dir.path(), &classes());
        assert!(regions.is_empty());
    }

    #[test]
    fn test_image_input_load() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("leaf.jpg");
        fs::write(&image, b"jpg").unwrap();
        fs::write(dir.path().join("leaf.txt"), "0 0.1 0.2 0.3 0.4\n").unwrap();

        let input = ImageInput::load(&image, dir.path(), &classes());
        assert_eq!(input.path, image);
        assert_eq!(input.regions.groups.len(), 1);
    }
}

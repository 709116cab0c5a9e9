//! Multi-image prompt paragraphs.
//!
//! One numbered paragraph per image, in input order, so the model never
//! confuses which metadata or detections belong to which image. Images
//! without detections are simply omitted from the ROI paragraph list.

use crate::imaging::ImageInput;

/// Capture metadata paragraphs, one per image
pub fn image_meta_prompt(inputs: &[ImageInput]) -> String {
    let mut prompt = String::new();
    for (idx, input) in inputs.iter().enumerate() {
        let meta = &input.meta;
        prompt.push_str(&format!(
            "第{}张图像拍摄于{}，作物类型为{}，生育阶段为{}，拍摄环境为{}。\n",
            idx + 1,
            meta.capture_time,
            meta.crop_type,
            meta.growth_stage,
            meta.environment
        ));
    }
    prompt
}

/// Detected symptom-region paragraphs for images that have detections
pub fn symptom_roi_prompt(inputs: &[ImageInput]) -> String {
    let mut prompt = String::new();
    for (idx, input) in inputs.iter().enumerate() {
        if input.regions.is_empty() {
            continue;
        }

        let mut paragraph = format!("第{}张图像中，检测到以下疑似病害症状区域：", idx + 1);
        for group in &input.regions.groups {
            let boxes = group
                .boxes
                .iter()
                .map(|coords| format!("{coords:?}"))
                .collect::<Vec<_>>()
                .join(", ");
            paragraph.push_str(&format!(
                "{}处{}症状，位置坐标为{}；",
                group.boxes.len(),
                group.label,
                boxes
            ));
        }

        prompt.push_str(paragraph.trim_end_matches('；'));
        prompt.push_str("。\n");
    }
    prompt
}

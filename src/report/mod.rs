//! Diagnosis artifacts.
//!
//! A successful run writes two timestamped files: the briefing holds only
//! the final recommendation, the full report holds every stage's prompt
//! and raw model output. Write failures are persistence errors the caller
//! logs without failing the run.

use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::info;

use crate::errors::{DiagnosisError, Result};
use crate::pipeline::StageResult;

const FILE_STAMP: &str = "%y%m%d%H%M";

/// Write the briefing file and return its path
pub fn write_briefing(dir: &Path, briefing: &str) -> Result<PathBuf> {
    let path = artifact_path(dir, "briefing")?;
    let mut content = briefing.to_string();
    content.push('\n');
    std::fs::write(&path, content)
        .map_err(|err| DiagnosisError::Persistence(format!("briefing write failed: {err}")))?;
    info!(path = %path.display(), "briefing saved");
    Ok(path)
}

/// Write the full report, one prompt/output block per stage
pub fn write_full_report(dir: &Path, stages: &[StageResult]) -> Result<PathBuf> {
    let path = artifact_path(dir, "fullreport")?;
    let mut content = String::new();
    for stage in stages {
        content.push_str("·提示词：\n");
        content.push_str(&stage.prompt);
        content.push_str("\n\n");
        content.push_str("·PlantDoc：\n");
        content.push_str(&stage.raw_output);
        content.push_str("\n\n");
    }
    std::fs::write(&path, content)
        .map_err(|err| DiagnosisError::Persistence(format!("full report write failed: {err}")))?;
    info!(path = %path.display(), "full report saved");
    Ok(path)
}

fn artifact_path(dir: &Path, prefix: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).map_err(|err| {
        DiagnosisError::Persistence(format!(
            "artifact directory {} unusable: {err}",
            dir.display()
        ))
    })?;
    let stamp = Local::now().format(FILE_STAMP);
    Ok(dir.join(format!("{prefix}_{stamp}.txt")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage(n: u8) -> StageResult {
        StageResult {
            stage: n,
            prompt: format!("提示{n}"),
            raw_output: format!("输出{n}"),
            extracted_answer: format!("答案{n}"),
        }
    }

    #[test]
    fn test_briefing_content_and_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_briefing(dir.path(), "防治建议：及时喷药。").unwrap();
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("briefing_"));
        assert!(name.ends_with(".txt"));
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "防治建议：及时喷药。\n");
    }

    #[test]
    fn test_full_report_block_per_stage() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_full_report(dir.path(), &[stage(1), stage(2)]).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.matches("·提示词：\n").count(), 2);
        assert_eq!(content.matches("·PlantDoc：\n").count(), 2);
        assert!(content.contains("提示1"));
        assert!(content.contains("输出2"));
        assert!(!content.contains("答案1"));
    }

    #[test]
    fn test_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("reports").join("today");
        let path = write_briefing(&nested, "内容").unwrap();
        assert!(path.exists());
    }
}

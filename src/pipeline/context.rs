//! Per-run diagnostic context.
//!
//! Holds the conversation message list (one system message plus one user
//! message whose image parts persist for the whole run) and the record of
//! every completed stage.

use std::path::PathBuf;

use chrono::{DateTime, Local};
use uuid::Uuid;

use crate::client::{push_image, ChatMessage};
use crate::pipeline::state::DiagnosisState;

/// Record of one completed stage
#[derive(Debug, Clone)]
pub struct StageResult {
    pub stage: u8,
    pub prompt: String,
    pub raw_output: String,
    pub extracted_answer: String,
}

/// State of one diagnostic run
#[derive(Debug, Clone)]
pub struct DiagnosisContext {
    pub run_id: Uuid,
    pub started_at: DateTime<Local>,
    pub state: DiagnosisState,
    pub image_paths: Vec<PathBuf>,
    pub messages: Vec<ChatMessage>,
    pub stage_results: Vec<StageResult>,
}

impl DiagnosisContext {
    /// Start a fresh run: system message, one user message, all images
    /// attached up front.
    pub fn new(system_prompt: &str, image_paths: Vec<PathBuf>) -> Self {
        let mut messages = vec![ChatMessage::system(system_prompt), ChatMessage::user()];
        for path in &image_paths {
            push_image(&mut messages, &path.display().to_string(), false);
        }

        Self {
            run_id: Uuid::new_v4(),
            started_at: Local::now(),
            state: DiagnosisState::first(),
            image_paths,
            messages,
            stage_results: Vec::new(),
        }
    }

    pub fn record(&mut self, result: StageResult) {
        self.stage_results.push(result);
    }

    /// Extracted answer of a completed stage
    pub fn answer(&self, stage: u8) -> Option<&str> {
        self.stage_results
            .iter()
            .find(|r| r.stage == stage)
            .map(|r| r.extracted_answer.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ContentPart;

    #[test]
    fn test_new_context_attaches_all_images() {
        let ctx = DiagnosisContext::new(
            "你是植物病害诊断专家",
            vec![PathBuf::from("/data/a.jpg"), PathBuf::from("/data/b.jpg")],
        );
        assert_eq!(ctx.state, DiagnosisState::ContextAssessment);
        assert_eq!(ctx.messages.len(), 2);
        let images = ctx.messages[1]
            .content
            .iter()
            .filter(|p| p.is_image())
            .count();
        assert_eq!(images, 2);
    }

    #[test]
    fn test_answer_lookup() {
        let mut ctx = DiagnosisContext::new("系统提示", Vec::new());
        ctx.record(StageResult {
            stage: 1,
            prompt: "p".to_string(),
            raw_output: "<answer>水稻分蘖期</answer>".to_string(),
            extracted_answer: "水稻分蘖期".to_string(),
        });
        assert_eq!(ctx.answer(1), Some("水稻分蘖期"));
        assert_eq!(ctx.answer(2), None);
    }

    #[test]
    fn test_system_message_text() {
        let ctx = DiagnosisContext::new("系统提示", Vec::new());
        assert!(matches!(
            &ctx.messages[0].content[0],
            ContentPart::Text { text } if text == "系统提示"
        ));
    }
}

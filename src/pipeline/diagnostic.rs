//! Five-stage diagnostic pipeline.
//!
//! Stages run strictly in order over one shared conversation: images stay
//! attached for the whole run while each stage swaps in its own text
//! prompt. Stage answers feed later stages as retrieval queries, and a run
//! persists its artifacts only after all five stages complete.

use std::path::PathBuf;

use chrono::Local;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::error;

use crate::client::{push_text, CompletionBackend};
use crate::errors::{DiagnosisError, Result};
use crate::imaging::ImageInput;
use crate::knowledge::KnowledgeSource;
use crate::pipeline::context::{DiagnosisContext, StageResult};
use crate::pipeline::extract::{extract_answer, strip_bracketed};
use crate::pipeline::prompter::{image_meta_prompt, symptom_roi_prompt};
use crate::pipeline::state::DiagnosisState;
use crate::report;
use crate::retrieval::{RetrievalEngine, RetrievalParams};

const PREINFO: &str = "农业背景知识：\n";
const PREQ: &str = "诊断任务：\n";

const STAGE_INSTRUCTIONS: [&str; 5] = [
    "请根据图像判断作物类型、生育阶段以及生长环境状况，并对整体健康状态进行初步评估。在<think> </think>中给出分析过程，在<answer> </answer>中给出简要诊断概述。",
    "图像中标注了一些疑似病害症状区域（ROI）。请逐一判断这些区域是否为有效病斑，并检查是否存在被遗漏的重要症状区域。在<think> </think>中给出分析，在<answer> </answer>中给出最终确认的病斑描述。",
    "结合图像症状、作物信息以及农业病害知识，逐一判断可能的植物病害类型，并分析其发生原因与严重程度，生成详细的病害诊断报告。",
    "在前述诊断基础上，分析该病害在当前环境条件下的可能发展趋势，评估其对作物产量和品质的潜在影响。",
    "基于以上全部信息完成两步任务：第一步，在<think> </think>中系统评估当前病害风险等级；第二步，在<answer> </answer>中给出科学、可执行的防治建议，包括推荐的农艺措施或植保方案。",
];

fn time_line() -> String {
    format!("当前时间：{}\n", Local::now().format("%Y-%m-%d %H:%M"))
}

/// How much of the model output to surface while a run is in progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShowMode {
    /// Progress bar only
    #[default]
    None,
    /// Full stage output after each stage completes
    Stage,
    /// Token-by-token echo while the stage runs
    Stream,
}

/// Static configuration of a pipeline instance
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub system_prompt: String,
    pub show: ShowMode,
    pub roi_dir: PathBuf,
    pub symptom_classes: Vec<String>,
    pub briefing_dir: PathBuf,
    pub report_dir: PathBuf,
}

/// The diagnostic pipeline over injected completion and retrieval backends
pub struct DiagnosticPipeline {
    completion: Box<dyn CompletionBackend>,
    retrieval: RetrievalEngine,
    disease: KnowledgeSource,
    crop: KnowledgeSource,
    treatment: KnowledgeSource,
    options: PipelineOptions,
}

impl DiagnosticPipeline {
    pub fn new(
        completion: Box<dyn CompletionBackend>,
        retrieval: RetrievalEngine,
        disease: KnowledgeSource,
        crop: KnowledgeSource,
        treatment: KnowledgeSource,
        options: PipelineOptions,
    ) -> Self {
        Self {
            completion,
            retrieval,
            disease,
            crop,
            treatment,
            options,
        }
    }

    /// Run a full five-stage diagnosis over the given images.
    ///
    /// Any stage failure aborts the run; artifacts are written only after
    /// stage five, and a write failure there is logged without failing an
    /// otherwise complete diagnosis.
    pub async fn run(&self, image_paths: Vec<PathBuf>) -> Result<DiagnosisContext> {
        let inputs: Vec<ImageInput> = image_paths
            .iter()
            .map(|path| {
                ImageInput::load(path, &self.options.roi_dir, &self.options.symptom_classes)
            })
            .collect();

        let mut ctx = DiagnosisContext::new(&self.options.system_prompt, image_paths);
        let progress = ProgressBar::new(STAGE_INSTRUCTIONS.len() as u64);
        progress.set_style(
            ProgressStyle::with_template("{msg} {bar:40.green} {pos}/{len}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        progress.set_message("植物病害诊断中");

        // Stage 1: crop and environment overview
        let prompt = format!(
            "{PREINFO}{}{}{PREQ}{}",
            image_meta_prompt(&inputs),
            time_line(),
            STAGE_INSTRUCTIONS[0]
        );
        self.run_stage(&mut ctx, prompt, &progress).await?;

        // Stage 2: symptom region verification
        let prompt = format!(
            "{PREINFO}{}{PREQ}{}",
            symptom_roi_prompt(&inputs),
            STAGE_INSTRUCTIONS[1]
        );
        self.run_stage(&mut ctx, prompt, &progress).await?;

        // Stage 3: disease identification, knowledge-grounded
        let crop_query = ctx.answer(1).unwrap_or("").to_string();
        let disease_query = strip_bracketed(ctx.answer(2).unwrap_or(""));
        let crop_knowledge = self.retrieve_knowledge(&self.crop, &crop_query)?;
        let disease_knowledge = self.retrieve_knowledge(&self.disease, &disease_query)?;
        let prompt = format!(
            "{PREINFO}{crop_knowledge}{disease_knowledge}{PREQ}{}",
            STAGE_INSTRUCTIONS[2]
        );
        self.run_stage(&mut ctx, prompt, &progress).await?;

        // Stage 4: trend analysis over the stage-3 diagnosis
        let diagnosis = ctx.answer(3).unwrap_or("").to_string();
        let prompt = format!("{PREINFO}{diagnosis}{PREQ}{}", STAGE_INSTRUCTIONS[3]);
        self.run_stage(&mut ctx, prompt, &progress).await?;

        // Stage 5: risk assessment and treatment planning
        let treatment_knowledge = self.retrieve_knowledge(&self.treatment, &diagnosis)?;
        let prompt = format!(
            "{PREINFO}{treatment_knowledge}{}{PREQ}{}",
            time_line(),
            STAGE_INSTRUCTIONS[4]
        );
        self.run_stage(&mut ctx, prompt, &progress).await?;

        progress.finish_with_message("诊断完成");

        let briefing = ctx.answer(5).unwrap_or("").to_string();
        if let Err(err) = report::write_briefing(&self.options.briefing_dir, &briefing) {
            error!("briefing not persisted: {err}");
        }
        if let Err(err) = report::write_full_report(&self.options.report_dir, &ctx.stage_results) {
            error!("full report not persisted: {err}");
        }

        Ok(ctx)
    }

    async fn run_stage(
        &self,
        ctx: &mut DiagnosisContext,
        prompt: String,
        progress: &ProgressBar,
    ) -> Result<()> {
        let stage = match ctx.state.stage_number() {
            Some(stage) => stage,
            None => {
                return Err(DiagnosisError::InvalidTransition {
                    from: format!("{:?}", ctx.state),
                    to: "next diagnostic stage".to_string(),
                });
            }
        };
        let name = ctx.state.display_name();

        push_text(&mut ctx.messages, &prompt, true);
        let stream = self.options.show == ShowMode::Stream;
        let raw = match self.completion.complete(&ctx.messages, stream).await {
            Ok(raw) => raw,
            Err(err) => {
                ctx.state = DiagnosisState::Failed;
                return Err(err);
            }
        };

        if self.options.show == ShowMode::Stage {
            progress.println(format!("\n[{name}]\n{raw}"));
        }

        let extracted_answer = extract_answer(&raw).to_string();
        ctx.record(StageResult {
            stage,
            prompt,
            raw_output: raw,
            extracted_answer,
        });
        ctx.state = ctx.state.advance();
        progress.inc(1);
        Ok(())
    }

    /// Headed knowledge block for one source, empty when the query is
    /// blank or nothing matches
    fn retrieve_knowledge(&self, source: &KnowledgeSource, query: &str) -> Result<String> {
        if query.trim().is_empty() {
            return Ok(String::new());
        }

        let body = if source.params.eager {
            let params = RetrievalParams {
                top_k: source.params.top_k,
                score_threshold: source.params.score_threshold,
                chunk_size_budget: source.params.chunk_size_budget,
            };
            let spans = self.retrieval.retrieve(&source.chunks, query, &params)?;
            spans
                .into_iter()
                .map(|span| span.text)
                .collect::<Vec<_>>()
                .join("\n")
        } else {
            source.lexical_lookup(query)
        };

        if body.is_empty() {
            return Ok(String::new());
        }
        Ok(format!("{}\n{body}\n", source.kind.header()))
    }
}

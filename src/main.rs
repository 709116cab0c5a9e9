//! PlantDoc CLI entry point.

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use indicatif::ProgressBar;
use tracing::info;
use tracing_subscriber::EnvFilter;

use plantdoc::cli::Args;
use plantdoc::client::LlamaClient;
use plantdoc::config::Config;
use plantdoc::knowledge::{KnowledgeKind, KnowledgeSource};
use plantdoc::monitor::ResourceMonitor;
use plantdoc::pipeline::{DiagnosticPipeline, PipelineOptions};
use plantdoc::retrieval::{BertEmbedder, RetrievalEngine};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(args.log_directive())),
        )
        .init();

    for image in &args.images {
        if !image.exists() {
            anyhow::bail!("image not found: {}", image.display());
        }
    }

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(host) = &args.host {
        config.server.host = host.clone();
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(model) = &args.model {
        config.server.model = model.clone();
    }

    let client = LlamaClient::new(&config.server.host, config.server.port, &config.server.model)?;
    info!(url = client.base_url(), model = client.model(), "waiting for llama-server");
    let spinner = ProgressBar::new_spinner();
    spinner.set_message("等待模型服务就绪");
    spinner.enable_steady_tick(Duration::from_millis(120));
    let ready = client.wait_until_ready(config.server.startup_timeout()).await;
    spinner.finish_and_clear();
    ready?;

    info!(model = config.knowledge.embedding_model, "loading embedding model");
    let embedder = BertEmbedder::new(&config.knowledge.embedding_model)?;
    let retrieval = RetrievalEngine::new(Box::new(embedder));

    let disease = KnowledgeSource::load(
        KnowledgeKind::Disease,
        &config.knowledge.disease_path,
        config.knowledge.max_words,
        config.knowledge.disease.source_params(),
    );
    let crop = KnowledgeSource::load(
        KnowledgeKind::Crop,
        &config.knowledge.crop_path,
        config.knowledge.max_words,
        config.knowledge.crop.source_params(),
    );
    let treatment = KnowledgeSource::load(
        KnowledgeKind::Treatment,
        &config.knowledge.treatment_path,
        config.knowledge.max_words,
        config.knowledge.treatment.source_params(),
    );

    let options = PipelineOptions {
        system_prompt: config.diagnosis.system_prompt.clone(),
        show: args.show.show_mode(),
        roi_dir: config.diagnosis.roi_dir.clone(),
        symptom_classes: config.diagnosis.symptom_classes.clone(),
        briefing_dir: config.artifacts.briefing_dir.clone(),
        report_dir: config.artifacts.report_dir.clone(),
    };
    let pipeline = DiagnosticPipeline::new(
        Box::new(client),
        retrieval,
        disease,
        crop,
        treatment,
        options,
    );

    // Guard held for the whole diagnosis span, dropped right after
    let monitor = config
        .monitor
        .enabled
        .then(|| ResourceMonitor::start(&config.monitor.monitor_config()));
    let ctx = pipeline.run(args.images).await;
    drop(monitor);
    let ctx = ctx?;

    println!("\n{}", "诊断简报".green().bold());
    match ctx.answer(5) {
        Some(briefing) => println!("{briefing}"),
        None => println!("{}", "未生成诊断简报".yellow()),
    }

    Ok(())
}

//! PlantDoc: knowledge-grounded plant disease diagnosis.
//!
//! A five-stage vision-language diagnosis pipeline over a local
//! llama-server instance. Agricultural knowledge bases are chunked and
//! embedded locally, stage answers drive retrieval for later stages, and
//! every run persists a briefing plus a full prompt/response report.

pub mod cli;
pub mod client;
pub mod config;
pub mod errors;
pub mod imaging;
pub mod knowledge;
pub mod monitor;
pub mod pipeline;
pub mod report;
pub mod retrieval;

pub use config::Config;
pub use errors::{DiagnosisError, Result};
pub use pipeline::{DiagnosticPipeline, PipelineOptions, ShowMode};

//! Five-stage knowledge-grounded diagnosis: run state machine, shared
//! conversation context, answer extraction, prompt assembly and the
//! pipeline driver itself.

pub mod context;
pub mod diagnostic;
pub mod extract;
pub mod prompter;
pub mod state;

pub use context::{DiagnosisContext, StageResult};
pub use diagnostic::{DiagnosticPipeline, PipelineOptions, ShowMode};
pub use extract::{extract_answer, strip_bracketed};
pub use state::DiagnosisState;

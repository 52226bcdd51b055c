// Affiliation pipeline: pure processing stages plus the run orchestrator

pub mod orchestrator;
pub mod processing;

pub use orchestrator::{extract_only, run_pipeline, PipelinePorts, RunSummary};

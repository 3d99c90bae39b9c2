//! Scripted replay of multi-tab permission sessions.

pub mod host;
pub mod model;
pub mod runner;

pub use model::{load_scenario_from_path, parse_scenario_str, DocumentSpec, Scenario, Step, TabSpec};
pub use runner::{run_scenario, DocumentReport, EventRecord, ScenarioReport, TabReport};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to deserialize scenario: {0}")]
    Deserialize(String),
    #[error("duplicate tab name: {0}")]
    DuplicateTab(String),
    #[error("step {step}: unknown tab {tab}")]
    UnknownTab { step: usize, tab: String },
    #[error("step {step}: tab {tab} has no document named {document}")]
    UnknownDocument {
        step: usize,
        tab: String,
        document: String,
    },
}

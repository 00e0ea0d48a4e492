//! JSON exporter for finished runs.
//!
//! Writes the flattened event log and per-tick snapshots so a run can be
//! inspected or plotted outside the simulator.

use crate::runner::ScenarioResult;
use bookstore_core::{BookstoreModel, EventRecord, RunSummary, SimError, SimResult, Snapshot};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Complete simulation export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimExport {
    /// Scenario name
    pub scenario: String,

    /// Seed used; `None` when the run failed before one was drawn
    pub seed: Option<u64>,

    /// Ticks executed
    pub ticks: u64,

    /// Final results
    pub passed: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,

    /// Event log in emission order
    pub events: Vec<EventRecord>,

    /// One inventory-level map per tick
    pub snapshots: Vec<Snapshot>,

    pub summary: RunSummary,
}

impl SimExport {
    /// Creates a new export container.
    pub fn new(scenario: &str, seed: Option<u64>) -> Self {
        Self {
            scenario: scenario.to_string(),
            seed,
            ticks: 0,
            passed: false,
            failure_reason: None,
            events: Vec::new(),
            snapshots: Vec::new(),
            summary: RunSummary::default(),
        }
    }

    /// Builds an export from a runner result and, when the run got that far,
    /// its model.
    pub fn from_run(result: &ScenarioResult, model: Option<&BookstoreModel>) -> Self {
        let mut export = Self::new(result.scenario.name(), result.seed);
        if let Some(model) = model {
            export.capture(model);
        }
        export.finalize(result.passed, result.failure_reason.clone());
        export
    }

    /// Copies the model's log, snapshots and counters.
    pub fn capture(&mut self, model: &BookstoreModel) {
        self.ticks = model.tick();
        self.events = model.events();
        self.snapshots = model.snapshots().to_vec();
        self.summary = model.summary();
    }

    /// Finalizes the export.
    pub fn finalize(&mut self, passed: bool, failure_reason: Option<String>) {
        self.passed = passed;
        self.failure_reason = failure_reason;
    }

    pub fn to_json(&self) -> SimResult<String> {
        serde_json::to_string_pretty(self).map_err(SimError::export)
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> SimResult<()> {
        let json = self.to_json()?;
        let mut file = File::create(path.as_ref()).map_err(SimError::export)?;
        file.write_all(json.as_bytes()).map_err(SimError::export)?;
        Ok(())
    }
}

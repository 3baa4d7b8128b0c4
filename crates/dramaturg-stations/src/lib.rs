//! Dramaturg Stations: the seven analysis stations.
//!
//! Every station is deterministic given its inputs; only framing (S2) and
//! synthesis (S7) call the generation capability, and only when the
//! orchestrator was given one.
//!
//! # Pipeline Flow
//!
//! ```text
//! Script → S1 → S2 → S3 → S4 → S5 → S6 → S7 → Report
//!          ↓     ↓     ↓     ↓     ↓     ↓     ↓
//!      Entities Frame Network Metrics Arcs Plan Markdown
//! ```

pub mod diagnosis;
pub mod dynamics;
pub mod extraction;
pub mod framing;
pub mod lexicon;
pub mod metrics;
pub mod model;
pub mod render;
pub mod structure;
pub mod synthesis;
pub mod text;
pub mod treatment;

pub use diagnosis::DiagnosisStation;
pub use dynamics::DynamicsStation;
pub use extraction::ExtractionStation;
pub use framing::FramingStation;
pub use metrics::MetricsStation;
pub use model::DiagnosisReport;
pub use render::{ReportFormat, ReportRenderer};
pub use structure::StructureStation;
pub use synthesis::SynthesisStation;
pub use treatment::{treatment_plan, CycleError};

use dramaturg_core::{FailureCause, PipelineError, Station, StationError, StationId, StationRegistry};

// ============================================================================
// DEFAULT PIPELINE
// ============================================================================

/// The seven stations in execution order
pub fn default_stations(format: ReportFormat) -> Result<Vec<Box<dyn Station>>, PipelineError> {
    let synthesis = SynthesisStation::new(format)
        .map_err(|e| PipelineError::Configuration(format!("report templates: {}", e)))?;
    Ok(vec![
        Box::new(ExtractionStation::default()),
        Box::new(FramingStation::default()),
        Box::new(StructureStation::default()),
        Box::new(MetricsStation),
        Box::new(DynamicsStation::default()),
        Box::new(DiagnosisStation),
        Box::new(synthesis),
    ])
}

pub fn standard_registry(format: ReportFormat) -> Result<StationRegistry, PipelineError> {
    StationRegistry::new(default_stations(format)?)
}

pub(crate) fn payload_error(station: StationId, e: serde_json::Error) -> StationError {
    StationError::new(station, FailureCause::Analysis(format!("could not encode payload: {}", e)))
}

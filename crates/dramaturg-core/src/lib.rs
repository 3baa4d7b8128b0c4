//! Dramaturg Core: Station trait, data model, uncertainty and orchestrator
//!
//! A submitted script runs through seven stations in a fixed order. Each
//! station reads the accumulated results of the stations before it and
//! returns a confidence-scored [`StageResult`]; the final report is then
//! scored by a [`ContentEvaluator`] that can flag, but never veto, a run.

pub mod context;
pub mod data_model;
pub mod error;
pub mod generation;
pub mod input;
pub mod registry;
pub mod runner;
pub mod station;
pub mod uncertainty;

pub use context::RunContext;
pub use data_model::{
    mean_confidence, Alternate, Category, ComplianceFlag, ConstitutionalCheck,
    ConstitutionalPrinciple, ConstitutionalResult, DiagnosticIssue, OrchestrationResult, Priority,
    Recommendation, ReportMeta, Severity, StageResult, StationId,
};
pub use error::PipelineError;
pub use generation::{
    GenerationCache, GenerationClient, GenerationError, InMemoryCache, ModelParams, TextGenerator,
};
pub use input::{PipelineInput, RawInput};
pub use registry::StationRegistry;
pub use runner::{ContentEvaluator, Orchestrator, RunState, REPORT_META_KEY};
pub use station::{FailureCause, StageInput, Station, StationError};
pub use uncertainty::{Evidence, Uncertainty, UncertaintyKind, UncertaintyNote, UncertaintyQuantifier};

/// Engine version
pub const DRAMATURG_VERSION: &str = "1.0.0";

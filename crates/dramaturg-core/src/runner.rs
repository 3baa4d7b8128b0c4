//! Pipeline Orchestrator: validates input, chains the stations, gates the report
//!
//! ```text
//! Pending → Validating → Running(S1..S7) → Evaluating → Completed
//!               ↓              ↓      ↓
//!             Failed        Failed  Cancelled
//! ```
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::context::RunContext;
use crate::data_model::{
    mean_confidence, ComplianceFlag, ConstitutionalResult, OrchestrationResult, ReportMeta,
    StageResult, StationId,
};
use crate::error::PipelineError;
use crate::generation::GenerationClient;
use crate::input::{PipelineInput, RawInput};
use crate::registry::StationRegistry;
use crate::station::{FailureCause, StageInput, StationError};

/// Meta key under which the final station stores the report text
pub const REPORT_META_KEY: &str = "report";

/// Scores produced content against a policy; never fails a run.
pub trait ContentEvaluator: Send + Sync {
    fn evaluate(&self, content: &str) -> ConstitutionalResult;

    /// Scores below this flag the run
    fn threshold(&self) -> f64;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Pending,
    Validating,
    Running(StationId),
    Evaluating,
    Completed,
    Failed,
    Cancelled,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RunState::Pending => write!(f, "pending"),
            RunState::Validating => write!(f, "validating"),
            RunState::Running(id) => write!(f, "running({})", id),
            RunState::Evaluating => write!(f, "evaluating"),
            RunState::Completed => write!(f, "completed"),
            RunState::Failed => write!(f, "failed"),
            RunState::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Tracks the state of one run and logs each transition.
struct RunTracker<'a> {
    run_id: &'a str,
    state: RunState,
}

impl<'a> RunTracker<'a> {
    fn new(run_id: &'a str) -> Self {
        Self {
            run_id,
            state: RunState::Pending,
        }
    }

    fn transition(&mut self, next: RunState) {
        debug!(run_id = %self.run_id, from = %self.state, to = %next, "run state transition");
        self.state = next;
    }
}

/// Runs the seven-station chain. Shareable across concurrent runs: every run
/// owns its own accumulation map, the registry is only borrowed.
pub struct Orchestrator {
    registry: Arc<StationRegistry>,
    evaluator: Arc<dyn ContentEvaluator>,
    generation: Option<GenerationClient>,
}

impl Orchestrator {
    pub fn new(registry: StationRegistry, evaluator: Arc<dyn ContentEvaluator>) -> Self {
        Self {
            registry: Arc::new(registry),
            evaluator,
            generation: None,
        }
    }

    pub fn with_generation(mut self, generation: GenerationClient) -> Self {
        self.generation = Some(generation);
        self
    }

    pub fn registry(&self) -> &StationRegistry {
        &self.registry
    }

    /// `runPipeline(rawInput)`: a complete result or a structured failure
    pub async fn run_pipeline(
        &self,
        raw: impl Into<RawInput>,
    ) -> Result<OrchestrationResult, PipelineError> {
        self.run_with_cancellation(raw, CancellationToken::new()).await
    }

    /// Like [`Orchestrator::run_pipeline`], checking `cancel` between stations
    pub async fn run_with_cancellation(
        &self,
        raw: impl Into<RawInput>,
        cancel: CancellationToken,
    ) -> Result<OrchestrationResult, PipelineError> {
        let start = Instant::now();
        let ctx = RunContext::new()
            .with_generation(self.generation.clone())
            .with_cancellation(cancel);
        let mut tracker = RunTracker::new(&ctx.run_id);

        tracker.transition(RunState::Validating);
        let input = match PipelineInput::normalize(raw.into()) {
            Ok(input) => input,
            Err(err) => {
                tracker.transition(RunState::Failed);
                warn!(run_id = %ctx.run_id, error = %err, "rejected submission");
                return Err(err);
            }
        };
        info!(
            run_id = %ctx.run_id,
            pipeline = %self.registry.pipeline_id(),
            chars = input.text.len(),
            "pipeline run started"
        );

        let mut accumulated: BTreeMap<StationId, StageResult> = BTreeMap::new();
        for station in self.registry.iter() {
            if ctx.is_cancelled() {
                return Err(self.cancelled(&mut tracker, &accumulated));
            }

            let id = station.id();
            tracker.transition(RunState::Running(id));
            let station_start = Instant::now();
            let view = StageInput {
                text: &input.text,
                previous_results: &accumulated,
                options: &input.options,
            };

            match station.run(&view, &ctx).await {
                Ok(result) => {
                    debug!(
                        run_id = %ctx.run_id,
                        station = %id,
                        confidence = result.confidence,
                        notes = result.uncertainties.len(),
                        elapsed_ms = station_start.elapsed().as_millis() as u64,
                        "station completed"
                    );
                    accumulated.entry(id).or_insert(result);
                }
                Err(err) => {
                    tracker.transition(RunState::Failed);
                    error!(run_id = %ctx.run_id, station = %id, cause = %err.cause, "station failed");
                    return Err(err.into());
                }
            }
        }

        if ctx.is_cancelled() {
            return Err(self.cancelled(&mut tracker, &accumulated));
        }

        tracker.transition(RunState::Evaluating);
        let final_report = match accumulated
            .get(&StationId::S7)
            .and_then(|r| r.meta.get(REPORT_META_KEY))
            .and_then(|v| v.as_str())
        {
            Some(report) => report.to_string(),
            None => {
                tracker.transition(RunState::Failed);
                return Err(StationError::new(
                    StationId::S7,
                    FailureCause::Analysis("final station produced no report text".to_string()),
                )
                .into());
            }
        };

        let compliance = self.evaluator.evaluate(&final_report);
        let threshold = self.evaluator.threshold();
        let compliance_flag = if compliance.overall_score < threshold {
            let mut recommendations = compliance.recommendations.clone();
            if recommendations.is_empty() {
                recommendations.push(format!(
                    "Report scored {:.2} against a compliance threshold of {:.2}; review before sharing",
                    compliance.overall_score, threshold
                ));
            }
            warn!(
                run_id = %ctx.run_id,
                score = compliance.overall_score,
                threshold,
                "report flagged by compliance evaluator"
            );
            Some(ComplianceFlag {
                score: compliance.overall_score,
                threshold,
                recommendations,
            })
        } else {
            None
        };

        let total_confidence = mean_confidence(accumulated.values());
        let execution_time_ms = start.elapsed().as_millis() as u64;
        tracker.transition(RunState::Completed);
        info!(
            run_id = %ctx.run_id,
            total_confidence,
            elapsed_ms = execution_time_ms,
            flagged = compliance_flag.is_some(),
            "pipeline run completed"
        );

        Ok(OrchestrationResult {
            run_id: ctx.run_id.clone(),
            stations: accumulated,
            final_report,
            report_meta: ReportMeta {
                started_at: ctx.started_at,
                compliance,
                compliance_flag,
            },
            total_confidence,
            execution_time_ms,
        })
    }

    fn cancelled(
        &self,
        tracker: &mut RunTracker<'_>,
        accumulated: &BTreeMap<StationId, StageResult>,
    ) -> PipelineError {
        tracker.transition(RunState::Cancelled);
        let completed: Vec<StationId> = accumulated.keys().copied().collect();
        info!(run_id = %tracker.run_id, completed = completed.len(), "pipeline run cancelled");
        PipelineError::Cancelled { completed }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_model::ConstitutionalCheck;
    use crate::station::Station;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Echo {
        id: StationId,
        confidence: f64,
        calls: Arc<AtomicUsize>,
        cancel_after: Option<CancellationToken>,
    }

    #[async_trait]
    impl Station for Echo {
        fn id(&self) -> StationId {
            self.id
        }

        fn description(&self) -> &'static str {
            "echo"
        }

        async fn run(&self, input: &StageInput<'_>, _ctx: &RunContext) -> Result<StageResult, StationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(token) = &self.cancel_after {
                token.cancel();
            }
            assert_eq!(input.previous_results.len(), self.id.index() - 1);
            let mut result = StageResult::new(format!("{} saw {}", self.id, input.text), self.confidence);
            if self.id == StationId::S7 {
                result.meta.insert(REPORT_META_KEY.to_string(), json!("final report"));
            }
            Ok(result)
        }
    }

    struct Fixed(f64);

    impl ContentEvaluator for Fixed {
        fn evaluate(&self, _content: &str) -> ConstitutionalResult {
            ConstitutionalResult {
                overall_score: self.0,
                checks: vec![ConstitutionalCheck {
                    principle: "fixed".to_string(),
                    passed: self.0 >= 0.7,
                    confidence: self.0,
                    explanation: "fixed score".to_string(),
                }],
                recommendations: vec![],
            }
        }

        fn threshold(&self) -> f64 {
            0.7
        }
    }

    fn orchestrator(score: f64, calls: &Arc<AtomicUsize>, cancel_at: Option<(StationId, CancellationToken)>) -> Orchestrator {
        let stations: Vec<Box<dyn Station>> = StationId::ALL
            .iter()
            .map(|id| {
                Box::new(Echo {
                    id: *id,
                    confidence: 0.1 * id.index() as f64,
                    calls: calls.clone(),
                    cancel_after: cancel_at
                        .as_ref()
                        .filter(|(at, _)| at == id)
                        .map(|(_, t)| t.clone()),
                }) as Box<dyn Station>
            })
            .collect();
        Orchestrator::new(StationRegistry::new(stations).unwrap(), Arc::new(Fixed(score)))
    }

    #[tokio::test]
    async fn test_completed_run_has_all_stations() {
        let calls = Arc::new(AtomicUsize::new(0));
        let result = orchestrator(0.9, &calls, None).run_pipeline("text").await.unwrap();

        assert_eq!(result.stations.len(), 7);
        assert_eq!(result.final_report, "final report");
        assert!((result.total_confidence - 0.4).abs() < 1e-9);
        assert!(!result.is_compliance_flagged());
        assert_eq!(calls.load(Ordering::SeqCst), 7);
    }

    #[tokio::test]
    async fn test_low_compliance_flags_but_completes() {
        let calls = Arc::new(AtomicUsize::new(0));
        let result = orchestrator(0.4, &calls, None).run_pipeline("text").await.unwrap();

        let flag = result.report_meta.compliance_flag.clone().unwrap();
        assert_eq!(flag.threshold, 0.7);
        assert!(!flag.recommendations.is_empty());
        assert_eq!(result.final_report, "final report");
    }

    #[tokio::test]
    async fn test_empty_input_never_runs_stations() {
        let calls = Arc::new(AtomicUsize::new(0));
        let err = orchestrator(0.9, &calls, None).run_pipeline("  ").await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancellation_between_stations() {
        let calls = Arc::new(AtomicUsize::new(0));
        let token = CancellationToken::new();
        let orch = orchestrator(0.9, &calls, Some((StationId::S3, token.clone())));

        let err = orch.run_with_cancellation("text", token).await.unwrap_err();
        assert_eq!(
            err,
            PipelineError::Cancelled {
                completed: vec![StationId::S1, StationId::S2, StationId::S3]
            }
        );
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_run_state_display() {
        assert_eq!(RunState::Running(StationId::S4).to_string(), "running(S4)");
    }
}

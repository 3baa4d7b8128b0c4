//! S7 Synthesis: final report and visualization summary
use async_trait::async_trait;
use dramaturg_core::{
    mean_confidence, FailureCause, RunContext, StageInput, StageResult, Station, StationError,
    StationId, UncertaintyKind, UncertaintyNote, REPORT_META_KEY,
};
use handlebars::TemplateError;
use serde_json::Value;
use tracing::{debug, warn};

use crate::model::{
    keys, ConflictNetwork, DiagnosisReport, Dynamics, Frame, NetworkMetrics, StationConfidence,
    Visualization,
};
use crate::payload_error;
use crate::render::{Limitation, NetworkSummary, ReportData, ReportFormat, ReportRenderer, StationLine};

/// Stations whose findings the report summarizes
const ANALYSIS_STATIONS: [StationId; 6] = [
    StationId::S1,
    StationId::S2,
    StationId::S3,
    StationId::S4,
    StationId::S5,
    StationId::S6,
];

/// Below this the report carries its own reliability note
const LOW_CONFIDENCE: f64 = 0.5;

pub struct SynthesisStation {
    renderer: ReportRenderer,
    default_format: ReportFormat,
}

impl SynthesisStation {
    pub fn new(default_format: ReportFormat) -> Result<Self, TemplateError> {
        Ok(Self {
            renderer: ReportRenderer::new()?,
            default_format,
        })
    }

    /// `report_format` option, falling back to the configured default
    fn format(&self, input: &StageInput<'_>) -> ReportFormat {
        match input.option_str("report_format") {
            Some(name) => ReportFormat::parse(name).unwrap_or_else(|| {
                warn!(format = name, "unknown report format, using default");
                self.default_format
            }),
            None => self.default_format,
        }
    }
}

fn limitations(upstream: &[(StationId, &StageResult)]) -> Vec<Limitation> {
    upstream
        .iter()
        .flat_map(|(id, result)| {
            result.uncertainties.iter().map(move |note| Limitation {
                station: id.to_string(),
                aspect: note.aspect().to_string(),
                kind: match note.kind() {
                    UncertaintyKind::Epistemic => "epistemic".to_string(),
                    UncertaintyKind::Aleatoric => "aleatoric".to_string(),
                },
                reducible: note.is_reducible(),
                note: note.note().to_string(),
            })
        })
        .collect()
}

fn alternates(upstream: &[(StationId, &StageResult)]) -> Vec<String> {
    upstream
        .iter()
        .flat_map(|(id, result)| {
            result.alternates.iter().map(move |alt| {
                format!("{}: {} ({:.0}%)", id, alt.hypothesis, alt.confidence * 100.0)
            })
        })
        .collect()
}

fn editorial_prompt(report: &str) -> String {
    format!(
        "Write a short editorial note to the writer, based only on this analysis. \
         Keep it constructive and do not repeat the report.\n\n{}",
        report
    )
}

#[async_trait]
impl Station for SynthesisStation {
    fn id(&self) -> StationId {
        StationId::S7
    }

    fn description(&self) -> &'static str {
        "final report"
    }

    fn depends_on(&self) -> &'static [StationId] {
        &ANALYSIS_STATIONS
    }

    async fn run(&self, input: &StageInput<'_>, ctx: &RunContext) -> Result<StageResult, StationError> {
        let mut upstream = Vec::with_capacity(ANALYSIS_STATIONS.len());
        for id in ANALYSIS_STATIONS {
            upstream.push((id, input.require(StationId::S7, id)?));
        }

        let frame: Frame = input.require_payload(StationId::S7, StationId::S2, keys::FRAME)?;
        let network: ConflictNetwork = input.require_payload(StationId::S7, StationId::S3, keys::NETWORK)?;
        let metrics: NetworkMetrics = input.require_payload(StationId::S7, StationId::S4, keys::METRICS)?;
        let dynamics: Dynamics = input.require_payload(StationId::S7, StationId::S5, keys::DYNAMICS)?;
        let diagnosis = DiagnosisReport::from_result(upstream[5].1).ok_or_else(|| {
            StationError::new(
                StationId::S7,
                FailureCause::Analysis("diagnosis result carries no report".to_string()),
            )
        })?;

        let confidence = mean_confidence(upstream.iter().map(|(_, r)| *r));
        let format = self.format(input);

        let data = ReportData {
            frame,
            stations: upstream
                .iter()
                .map(|(id, r)| StationLine {
                    id: id.to_string(),
                    name: id.name().to_string(),
                    summary: r.summary.clone(),
                    confidence: r.confidence,
                })
                .collect(),
            network: NetworkSummary {
                nodes: network.nodes.len(),
                edges: network.edges.len(),
                conflicts: metrics.conflict_count,
                resolved: network.conflicts().filter(|e| e.resolved).count(),
                density: metrics.density,
                efficiency: metrics.efficiency_score,
            },
            arc_shape: dynamics.arc_shape.to_string(),
            motifs: dynamics.motifs.clone(),
            diagnostics: diagnosis.diagnostics.clone(),
            plan: diagnosis.planned().into_iter().cloned().collect(),
            confidence,
            limitations: limitations(&upstream),
            alternates: alternates(&upstream),
        };

        let mut report = self.renderer.render(format, &data).map_err(|e| {
            StationError::new(StationId::S7, FailureCause::Analysis(format!("report rendering failed: {}", e)))
        })?;

        let mut result = StageResult::new(
            format!(
                "Report with {} issues and {} planned steps",
                diagnosis.diagnostics.len(),
                diagnosis.treatment_plan.len()
            ),
            confidence,
        );
        if confidence < LOW_CONFIDENCE {
            result = result.with_note(UncertaintyNote::epistemic(
                "report",
                "findings rest on low-confidence analyses; a longer draft would firm them up",
            ));
        }

        if let Some(client) = ctx.generation() {
            let params = ctx.model_params(input.options);
            let note = client
                .generate(StationId::S7, &editorial_prompt(&report), &params)
                .await?;
            let note = note.trim();
            if note.is_empty() {
                warn!(run_id = %ctx.run_id, "generator returned an empty editorial note");
                result = result.degrade(
                    0.9,
                    UncertaintyNote::epistemic("editorial", "generator returned no editorial note"),
                );
            } else {
                let heading = match format {
                    ReportFormat::Markdown => "\n## Editorial Note\n\n",
                    ReportFormat::Plain => "\nEDITORIAL NOTE\n  ",
                };
                report.push_str(heading);
                report.push_str(note);
                report.push('\n');
            }
        }

        let visualization = Visualization {
            nodes: network.nodes,
            edges: network.edges,
            tension_curve: dynamics.tension_curve,
            station_confidence: upstream
                .iter()
                .map(|(id, r)| StationConfidence {
                    station: id.to_string(),
                    name: id.name().to_string(),
                    confidence: r.confidence,
                })
                .collect(),
        };

        debug!(run_id = %ctx.run_id, chars = report.len(), format = ?format, "report rendered");
        result.meta.insert(REPORT_META_KEY.to_string(), Value::String(report));
        result
            .with_payload(keys::VISUALIZATION, &visualization)
            .map_err(|e| payload_error(StationId::S7, e))
    }
}

//! Data Model: StageResult, diagnostics, recommendations, compliance and run results
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::uncertainty::UncertaintyNote;

/// Identifier of one of the seven stations, ordered by execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StationId {
    S1,
    S2,
    S3,
    S4,
    S5,
    S6,
    S7,
}

impl StationId {
    /// Execution order of the chain
    pub const ALL: [StationId; 7] = [
        StationId::S1,
        StationId::S2,
        StationId::S3,
        StationId::S4,
        StationId::S5,
        StationId::S6,
        StationId::S7,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StationId::S1 => "S1",
            StationId::S2 => "S2",
            StationId::S3 => "S3",
            StationId::S4 => "S4",
            StationId::S5 => "S5",
            StationId::S6 => "S6",
            StationId::S7 => "S7",
        }
    }

    /// Human readable station name
    pub fn name(&self) -> &'static str {
        match self {
            StationId::S1 => "extraction",
            StationId::S2 => "framing",
            StationId::S3 => "structure",
            StationId::S4 => "metrics",
            StationId::S5 => "dynamics",
            StationId::S6 => "diagnosis",
            StationId::S7 => "synthesis",
        }
    }

    /// 1-based position in the chain
    pub fn index(&self) -> usize {
        *self as usize + 1
    }
}

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A competing interpretation a station could not rule out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alternate {
    pub hypothesis: String,
    pub confidence: f64,
}

/// Typed, confidence-scored output of one station.
///
/// `uncertainties`, `alternates` and `meta` are always present (possibly
/// empty) so consumers iterate without checking for absence. `meta` holds
/// station-specific payloads that the orchestrator never interprets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageResult {
    pub summary: String,
    pub confidence: f64,
    #[serde(default)]
    pub uncertainties: Vec<UncertaintyNote>,
    #[serde(default)]
    pub alternates: Vec<Alternate>,
    #[serde(default)]
    pub meta: Map<String, Value>,
}

impl StageResult {
    /// Create a result; confidence is clamped into `[0, 1]`
    pub fn new(summary: impl Into<String>, confidence: f64) -> Self {
        Self {
            summary: summary.into(),
            confidence: clamp_unit(confidence),
            ..Self::default()
        }
    }

    pub fn with_note(mut self, note: UncertaintyNote) -> Self {
        self.uncertainties.push(note);
        self
    }

    pub fn with_notes(mut self, notes: impl IntoIterator<Item = UncertaintyNote>) -> Self {
        self.uncertainties.extend(notes);
        self
    }

    pub fn with_alternate(mut self, hypothesis: impl Into<String>, confidence: f64) -> Self {
        self.alternates.push(Alternate {
            hypothesis: hypothesis.into(),
            confidence: clamp_unit(confidence),
        });
        self
    }

    /// Attach a serializable payload under `key`
    pub fn with_payload<T: Serialize>(
        mut self,
        key: &str,
        payload: &T,
    ) -> Result<Self, serde_json::Error> {
        self.meta.insert(key.to_string(), serde_json::to_value(payload)?);
        Ok(self)
    }

    /// Read a payload previously attached with [`StageResult::with_payload`]
    pub fn payload<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.meta
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Degrade instead of failing: scale confidence down and record why.
    pub fn degrade(mut self, factor: f64, note: UncertaintyNote) -> Self {
        self.confidence = clamp_unit(self.confidence * clamp_unit(factor));
        self.uncertainties.push(note);
        self
    }
}

/// Ordered severity of a diagnostic issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticIssue {
    /// Unique within a run (ex: "D-001")
    pub id: String,
    #[serde(rename = "type")]
    pub issue_type: String,
    pub severity: Severity,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

/// Ordered recommendation priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Immediate,
}

impl Priority {
    /// Priority a remediation inherits from the issue it addresses
    pub fn for_severity(severity: Severity) -> Self {
        match severity {
            Severity::Critical => Priority::Immediate,
            Severity::High => Priority::High,
            Severity::Medium => Priority::Medium,
            Severity::Low => Priority::Low,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Medium => write!(f, "medium"),
            Priority::High => write!(f, "high"),
            Priority::Immediate => write!(f, "immediate"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Character,
    Dialogue,
    Theme,
    Plot,
    Structure,
    Pacing,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Category::Character => "character",
            Category::Dialogue => "dialogue",
            Category::Theme => "theme",
            Category::Plot => "plot",
            Category::Structure => "structure",
            Category::Pacing => "pacing",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    /// Unique within a run (ex: "R-001")
    pub id: String,
    pub priority: Priority,
    pub category: Category,
    pub title: String,
    pub description: String,
    pub rationale: String,
    /// Expected benefit in `[0, 1]`
    pub impact: f64,
    /// Expected cost in `[0, 1]`
    pub effort: f64,
    pub timeline: String,
    /// Ids of recommendations emitted earlier in the same run
    #[serde(default)]
    pub dependencies: BTreeSet<String>,
    pub expected_outcome: String,
    /// Issues this recommendation addresses
    #[serde(default)]
    pub issue_ids: Vec<String>,
}

// ============================================================================
// COMPLIANCE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstitutionalPrinciple {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Strictly positive
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstitutionalCheck {
    /// Id of the evaluated principle
    pub principle: String,
    pub passed: bool,
    pub confidence: f64,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstitutionalResult {
    pub overall_score: f64,
    pub checks: Vec<ConstitutionalCheck>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

/// Annotation attached to a completed run that scored below the compliance
/// threshold. Not an error: the report is still delivered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceFlag {
    pub score: f64,
    pub threshold: f64,
    pub recommendations: Vec<String>,
}

// ============================================================================
// RUN RESULT
// ============================================================================

/// Metadata associated with the final report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMeta {
    pub started_at: DateTime<Utc>,
    pub compliance: ConstitutionalResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compliance_flag: Option<ComplianceFlag>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestrationResult {
    pub run_id: String,
    /// All seven stations, keyed in execution order
    pub stations: BTreeMap<StationId, StageResult>,
    pub final_report: String,
    pub report_meta: ReportMeta,
    pub total_confidence: f64,
    pub execution_time_ms: u64,
}

impl OrchestrationResult {
    pub fn is_compliance_flagged(&self) -> bool {
        self.report_meta.compliance_flag.is_some()
    }

    pub fn station(&self, id: StationId) -> Option<&StageResult> {
        self.stations.get(&id)
    }
}

/// Arithmetic mean of the stage confidences (0.0 for an empty map)
pub fn mean_confidence<'a>(results: impl IntoIterator<Item = &'a StageResult>) -> f64 {
    let (sum, count) = results
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), r| (sum + r.confidence, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

pub(crate) fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uncertainty::UncertaintyNote;

    #[test]
    fn test_station_order() {
        assert!(StationId::S1 < StationId::S7);
        assert_eq!(StationId::S3.index(), 3);
        assert_eq!(StationId::ALL.len(), 7);
        assert_eq!(serde_json::to_string(&StationId::S2).unwrap(), "\"S2\"");
    }

    #[test]
    fn test_stage_result_clamps_confidence() {
        assert_eq!(StageResult::new("x", 1.7).confidence, 1.0);
        assert_eq!(StageResult::new("x", -0.2).confidence, 0.0);
        assert_eq!(StageResult::new("x", f64::NAN).confidence, 0.0);
    }

    #[test]
    fn test_payload_roundtrip_through_meta() {
        let result = StageResult::new("x", 0.5)
            .with_payload("tags", &vec!["a".to_string(), "b".to_string()])
            .unwrap();
        let tags: Vec<String> = result.payload("tags").unwrap();
        assert_eq!(tags, vec!["a", "b"]);
        assert!(result.payload::<Vec<String>>("missing").is_none());
    }

    #[test]
    fn test_degrade_lowers_confidence_and_records_note() {
        let result = StageResult::new("x", 0.8)
            .degrade(0.5, UncertaintyNote::epistemic("input", "too short"));
        assert!((result.confidence - 0.4).abs() < 1e-9);
        assert_eq!(result.uncertainties.len(), 1);
    }

    #[test]
    fn test_severity_and_priority_ordering() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::Medium > Severity::Low);
        assert!(Priority::Immediate > Priority::High);
        assert_eq!(Priority::for_severity(Severity::Critical), Priority::Immediate);
        assert_eq!(Priority::for_severity(Severity::Low), Priority::Low);
    }

    #[test]
    fn test_mean_confidence() {
        let results = vec![StageResult::new("a", 0.2), StageResult::new("b", 0.6)];
        assert!((mean_confidence(&results) - 0.4).abs() < 1e-9);
        assert_eq!(mean_confidence(&Vec::<StageResult>::new()), 0.0);
    }
}

//! Typed payloads the stations attach to their results
use dramaturg_core::{DiagnosticIssue, Recommendation, StageResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Meta keys under which payloads travel between stations
pub mod keys {
    pub const ENTITIES: &str = "entities";
    pub const RELATIONS: &str = "relations";
    pub const SEGMENTS: &str = "segments";
    pub const FRAME: &str = "frame";
    pub const NETWORK: &str = "conflict_network";
    pub const METRICS: &str = "metrics";
    pub const DYNAMICS: &str = "dynamics";
    pub const DIAGNOSTICS: &str = "diagnostics";
    pub const RECOMMENDATIONS: &str = "recommendations";
    pub const TREATMENT_PLAN: &str = "treatment_plan";
    pub const VISUALIZATION: &str = "visualization";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Character,
    Place,
    Object,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EntityKind::Character => write!(f, "character"),
            EntityKind::Place => write!(f, "place"),
            EntityKind::Object => write!(f, "object"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// "E1", "E2", ... in order of first mention
    pub id: String,
    pub name: String,
    pub kind: EntityKind,
    pub mentions: usize,
    /// Prose sentence indexes the entity appears in, ascending
    pub sentences: Vec<usize>,
    /// Lines of dialogue spoken by the entity
    pub dialogue_lines: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    Antagonistic,
    Supportive,
    Resolving,
    Neutral,
}

/// Subject-verb-object link between two entities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub source: String,
    pub target: String,
    pub verb: String,
    pub polarity: Polarity,
    pub sentence: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub genre: String,
    pub tone: String,
    /// Entity id of the protagonist
    pub protagonist: Option<String>,
    pub protagonist_label: String,
    /// Confidence in the protagonist choice alone
    #[serde(default)]
    pub protagonist_confidence: f64,
    pub thesis: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logline: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Conflict,
    Alliance,
    Association,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkNode {
    pub id: String,
    pub label: String,
    pub kind: EntityKind,
    /// Mention count
    pub weight: f64,
    pub protagonist: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkEdge {
    pub source: String,
    pub target: String,
    pub kind: EdgeKind,
    pub weight: f64,
    /// Only meaningful for conflict edges
    pub resolved: bool,
    pub verbs: Vec<String>,
}

impl NetworkEdge {
    pub fn touches(&self, node_id: &str) -> bool {
        self.source == node_id || self.target == node_id
    }

    pub fn is_open_conflict(&self) -> bool {
        self.kind == EdgeKind::Conflict && !self.resolved
    }
}

/// Relation graph built by the structure station
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConflictNetwork {
    pub nodes: Vec<NetworkNode>,
    pub edges: Vec<NetworkEdge>,
}

impl ConflictNetwork {
    pub fn node(&self, id: &str) -> Option<&NetworkNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn protagonist(&self) -> Option<&NetworkNode> {
        self.nodes.iter().find(|n| n.protagonist)
    }

    pub fn degree(&self, id: &str) -> usize {
        self.edges.iter().filter(|e| e.touches(id)).count()
    }

    pub fn label(&self, id: &str) -> String {
        self.node(id)
            .map(|n| n.label.clone())
            .unwrap_or_else(|| id.to_string())
    }

    pub fn conflicts(&self) -> impl Iterator<Item = &NetworkEdge> {
        self.edges.iter().filter(|e| e.kind == EdgeKind::Conflict)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeMetrics {
    pub node_id: String,
    pub degree: usize,
    pub centrality: f64,
    pub efficiency: f64,
}

/// A node whose metric falls well below the network mean
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricOutlier {
    pub node_id: String,
    pub metric: String,
    pub value: f64,
    pub expected: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkMetrics {
    pub density: f64,
    pub conflict_count: usize,
    pub conflict_ratio: f64,
    pub resolution_rate: f64,
    pub node_metrics: Vec<NodeMetrics>,
    pub isolated: Vec<String>,
    pub outliers: Vec<MetricOutlier>,
    /// Overall structural efficiency in `[0, 1]`
    pub efficiency_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Motif {
    pub name: String,
    pub strength: f64,
    pub evidence: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArcShape {
    Rising,
    Falling,
    Peaked,
    Valley,
    Flat,
}

impl fmt::Display for ArcShape {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            ArcShape::Rising => "rising",
            ArcShape::Falling => "falling",
            ArcShape::Peaked => "peaked",
            ArcShape::Valley => "valley",
            ArcShape::Flat => "flat",
        };
        write!(f, "{}", s)
    }
}

/// Presence of a character across setup, confrontation and resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterArc {
    pub node_id: String,
    pub presence: [bool; 3],
    pub trajectory: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dynamics {
    pub motifs: Vec<Motif>,
    pub tension_curve: Vec<f64>,
    pub arc_shape: ArcShape,
    pub character_arcs: Vec<CharacterArc>,
}

/// Station 6 output, stored as three meta entries on its result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisReport {
    pub diagnostics: Vec<DiagnosticIssue>,
    pub recommendations: Vec<Recommendation>,
    /// Recommendation ids in execution order
    pub treatment_plan: Vec<String>,
}

impl DiagnosisReport {
    pub fn attach_to(&self, result: StageResult) -> Result<StageResult, serde_json::Error> {
        result
            .with_payload(keys::DIAGNOSTICS, &self.diagnostics)?
            .with_payload(keys::RECOMMENDATIONS, &self.recommendations)?
            .with_payload(keys::TREATMENT_PLAN, &self.treatment_plan)
    }

    pub fn from_result(result: &StageResult) -> Option<Self> {
        Some(Self {
            diagnostics: result.payload(keys::DIAGNOSTICS)?,
            recommendations: result.payload(keys::RECOMMENDATIONS)?,
            treatment_plan: result.payload(keys::TREATMENT_PLAN)?,
        })
    }

    /// Recommendations in treatment-plan order
    pub fn planned(&self) -> Vec<&Recommendation> {
        self.treatment_plan
            .iter()
            .filter_map(|id| self.recommendations.iter().find(|r| &r.id == id))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationConfidence {
    pub station: String,
    pub name: String,
    pub confidence: f64,
}

/// Aggregate summary for charting a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Visualization {
    pub nodes: Vec<NetworkNode>,
    pub edges: Vec<NetworkEdge>,
    pub tension_curve: Vec<f64>,
    pub station_confidence: Vec<StationConfidence>,
}

//! S6 Diagnosis: structural anomalies, recommendations and the treatment plan
//!
//! Every anomaly found in the conflict network becomes exactly one
//! [`DiagnosticIssue`]. Severity follows a fixed rule: `critical` when the
//! anomaly breaks story logic, `high` when it weakens the protagonist's arc,
//! `medium` or `low` otherwise. High and critical issues always receive a
//! recommendation; the others only when the remedy is cheap and worthwhile.
use async_trait::async_trait;
use dramaturg_core::uncertainty::propagated;
use dramaturg_core::{
    mean_confidence, Category, DiagnosticIssue, FailureCause, Priority, Recommendation, RunContext,
    Severity, StageInput, StageResult, Station, StationError, StationId, UncertaintyNote,
};
use std::collections::BTreeSet;
use tracing::{debug, warn};

use crate::model::{
    keys, ArcShape, ConflictNetwork, DiagnosisReport, Dynamics, Entity, EntityKind, NetworkMetrics,
};
use crate::payload_error;
use crate::text::{Segment, SegmentKind};
use crate::treatment::treatment_plan;

/// Minimum impact for a medium/low issue to earn a recommendation
const MIN_IMPACT: f64 = 0.5;

/// Maximum effort for a medium/low issue to earn a recommendation
const MAX_EFFORT: f64 = 0.5;

#[derive(Default)]
pub struct DiagnosisStation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnomalyKind {
    MissingProtagonist,
    DanglingEdge,
    NoCentralConflict,
    ProtagonistAbsentFromResolution,
    SilentCharacter,
    IsolatedNode,
    UnresolvedConflict,
    EfficiencyOutlier,
    ThematicVoid,
    FlatTension,
}

impl AnomalyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyKind::MissingProtagonist => "missing_protagonist",
            AnomalyKind::DanglingEdge => "dangling_edge",
            AnomalyKind::NoCentralConflict => "no_central_conflict",
            AnomalyKind::ProtagonistAbsentFromResolution => "protagonist_absent_from_resolution",
            AnomalyKind::SilentCharacter => "silent_character",
            AnomalyKind::IsolatedNode => "isolated_node",
            AnomalyKind::UnresolvedConflict => "unresolved_conflict",
            AnomalyKind::EfficiencyOutlier => "efficiency_outlier",
            AnomalyKind::ThematicVoid => "thematic_void",
            AnomalyKind::FlatTension => "flat_tension",
        }
    }

    /// Fixes every later remedy builds on
    fn is_foundational(&self) -> bool {
        matches!(self, AnomalyKind::MissingProtagonist | AnomalyKind::DanglingEdge)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Anomaly {
    pub kind: AnomalyKind,
    pub severity: Severity,
    pub description: String,
    pub location: Option<String>,
    /// Network nodes involved
    pub nodes: Vec<String>,
}

impl Anomaly {
    fn new(kind: AnomalyKind, severity: Severity, description: String) -> Self {
        Self {
            kind,
            severity,
            description,
            location: None,
            nodes: Vec::new(),
        }
    }

    fn at(mut self, location: String, nodes: Vec<String>) -> Self {
        self.location = Some(location);
        self.nodes = nodes;
        self
    }
}

/// Remediation template for one anomaly
struct Remedy {
    category: Category,
    title: String,
    description: String,
    impact: f64,
    effort: f64,
    timeline: &'static str,
    expected_outcome: String,
    suggestions: Vec<String>,
}

/// Everything the scan reads from the earlier stations
pub struct DiagnosisInput<'a> {
    pub network: &'a ConflictNetwork,
    pub metrics: &'a NetworkMetrics,
    pub dynamics: &'a Dynamics,
    pub entities: &'a [Entity],
    pub sentence_count: usize,
    pub has_dialogue: bool,
}

/// Scan the network and its analyses for structural anomalies
pub fn scan(input: &DiagnosisInput<'_>) -> Vec<Anomaly> {
    let network = input.network;
    let protagonist = network.protagonist().map(|p| p.id.as_str());
    let is_protagonist = |id: &str| protagonist == Some(id);
    let mut found = Vec::new();

    if protagonist.is_none() {
        found.push(Anomaly::new(
            AnomalyKind::MissingProtagonist,
            Severity::Critical,
            "No character carries the story; nothing anchors its logic".to_string(),
        ));
    }

    for edge in &network.edges {
        let missing: Vec<&str> = [edge.source.as_str(), edge.target.as_str()]
            .into_iter()
            .filter(|id| network.node(id).is_none())
            .collect();
        if !missing.is_empty() {
            found.push(
                Anomaly::new(
                    AnomalyKind::DanglingEdge,
                    Severity::Critical,
                    format!("Relationship refers to unknown entities: {}", missing.join(", ")),
                )
                .at(format!("{}–{}", edge.source, edge.target), vec![edge.source.clone(), edge.target.clone()]),
            );
        }
    }

    if network.nodes.len() >= 2 && input.metrics.conflict_count == 0 {
        found.push(Anomaly::new(
            AnomalyKind::NoCentralConflict,
            Severity::High,
            "No opposing forces: the network has no conflict edge".to_string(),
        ));
    }

    if let Some(hero) = protagonist {
        let absent = input
            .dynamics
            .character_arcs
            .iter()
            .find(|arc| arc.node_id == hero)
            .is_some_and(|arc| !arc.presence[2]);
        if input.sentence_count >= 3 && absent {
            found.push(
                Anomaly::new(
                    AnomalyKind::ProtagonistAbsentFromResolution,
                    Severity::High,
                    format!("{} is absent from the resolution", network.label(hero)),
                )
                .at(network.label(hero), vec![hero.to_string()]),
            );
        }
    }

    if input.has_dialogue {
        for entity in input
            .entities
            .iter()
            .filter(|e| e.kind == EntityKind::Character && e.mentions >= 2 && e.dialogue_lines == 0)
        {
            let severity = if is_protagonist(entity.id.as_str()) { Severity::High } else { Severity::Low };
            found.push(
                Anomaly::new(
                    AnomalyKind::SilentCharacter,
                    severity,
                    format!("{} never speaks in a script that uses dialogue", entity.name),
                )
                .at(entity.name.clone(), vec![entity.id.clone()]),
            );
        }
    }

    for id in &input.metrics.isolated {
        let severity = match network.node(id) {
            _ if is_protagonist(id.as_str()) => Severity::High,
            Some(node) if node.kind == EntityKind::Character => Severity::Medium,
            _ => Severity::Low,
        };
        found.push(
            Anomaly::new(
                AnomalyKind::IsolatedNode,
                severity,
                format!("{} has no relationship with anything else in the story", network.label(id)),
            )
            .at(network.label(id), vec![id.clone()]),
        );
    }

    for edge in network.edges.iter().filter(|e| e.is_open_conflict()) {
        let severity = if is_protagonist(edge.source.as_str()) || is_protagonist(edge.target.as_str()) {
            Severity::High
        } else {
            Severity::Medium
        };
        found.push(
            Anomaly::new(
                AnomalyKind::UnresolvedConflict,
                severity,
                format!(
                    "Conflict between {} and {} ({}) is never resolved",
                    network.label(&edge.source),
                    network.label(&edge.target),
                    edge.verbs.join(", ")
                ),
            )
            .at(
                format!("{}–{}", network.label(&edge.source), network.label(&edge.target)),
                vec![edge.source.clone(), edge.target.clone()],
            ),
        );
    }

    for outlier in input
        .metrics
        .outliers
        .iter()
        .filter(|o| !input.metrics.isolated.contains(&o.node_id))
    {
        let severity = if is_protagonist(outlier.node_id.as_str()) { Severity::High } else { Severity::Low };
        found.push(
            Anomaly::new(
                AnomalyKind::EfficiencyOutlier,
                severity,
                format!(
                    "{} contributes little to the network ({} {:.2} against a mean of {:.2})",
                    network.label(&outlier.node_id),
                    outlier.metric,
                    outlier.value,
                    outlier.expected
                ),
            )
            .at(network.label(&outlier.node_id), vec![outlier.node_id.clone()]),
        );
    }

    if input.dynamics.motifs.is_empty() && input.sentence_count >= 2 {
        found.push(Anomaly::new(
            AnomalyKind::ThematicVoid,
            Severity::Medium,
            "No recurring motif gives the story a thematic spine".to_string(),
        ));
    }

    if input.dynamics.arc_shape == ArcShape::Flat && input.sentence_count >= 4 {
        found.push(Anomaly::new(
            AnomalyKind::FlatTension,
            Severity::Medium,
            "Tension never builds or releases across the script".to_string(),
        ));
    }

    found
}

fn remedy(anomaly: &Anomaly, network: &ConflictNetwork) -> Remedy {
    let subject = anomaly
        .nodes
        .first()
        .map(|id| network.label(id))
        .unwrap_or_else(|| "the story".to_string());

    match anomaly.kind {
        AnomalyKind::MissingProtagonist => Remedy {
            category: Category::Character,
            title: "Establish a protagonist".to_string(),
            description: "Choose one character whose want drives the action and give them the most scenes".to_string(),
            impact: 0.9,
            effort: 0.6,
            timeline: "before the next draft",
            expected_outcome: "Readers know whose story it is from the first page".to_string(),
            suggestions: vec![
                "Name the character the story follows".to_string(),
                "Give that character a concrete goal early on".to_string(),
            ],
        },
        AnomalyKind::DanglingEdge => Remedy {
            category: Category::Structure,
            title: "Repair broken relationship references".to_string(),
            description: format!("Introduce or remove the entities referenced by {}", anomaly.location.as_deref().unwrap_or("the edge")),
            impact: 0.8,
            effort: 0.2,
            timeline: "immediately",
            expected_outcome: "Every relationship points at an entity on the page".to_string(),
            suggestions: vec!["Introduce each character before they act".to_string()],
        },
        AnomalyKind::NoCentralConflict => Remedy {
            category: Category::Plot,
            title: "Introduce a central conflict".to_string(),
            description: "Put an opposing force, person or circumstance directly in the protagonist's way".to_string(),
            impact: 0.9,
            effort: 0.7,
            timeline: "next draft",
            expected_outcome: "A clear dramatic question the ending can answer".to_string(),
            suggestions: vec![
                "Give the protagonist an antagonist or obstacle".to_string(),
                "Raise the stakes of failure".to_string(),
            ],
        },
        AnomalyKind::ProtagonistAbsentFromResolution => Remedy {
            category: Category::Character,
            title: format!("Carry {} into the resolution", subject),
            description: format!("Let {} act in the final third so the ending resolves their arc", subject),
            impact: 0.8,
            effort: 0.4,
            timeline: "next draft",
            expected_outcome: "The ending pays off the protagonist's journey".to_string(),
            suggestions: vec![format!("Write a closing beat where {} makes a decisive choice", subject)],
        },
        AnomalyKind::SilentCharacter => Remedy {
            category: Category::Dialogue,
            title: format!("Give {} a voice", subject),
            description: format!("Add lines that reveal what {} wants", subject),
            impact: 0.6,
            effort: 0.3,
            timeline: "next pass",
            expected_outcome: format!("{} reads as a person rather than a prop", subject),
            suggestions: vec![format!("Let {} answer back in a key scene", subject)],
        },
        AnomalyKind::IsolatedNode => {
            let character = anomaly
                .nodes
                .first()
                .and_then(|id| network.node(id))
                .is_some_and(|n| n.kind == EntityKind::Character);
            Remedy {
                category: if character { Category::Character } else { Category::Structure },
                title: format!("Connect {} to the rest of the story", subject),
                description: format!("Tie {} to the protagonist or the central conflict, or cut it", subject),
                impact: if character { 0.6 } else { 0.3 },
                effort: if character { 0.3 } else { 0.2 },
                timeline: "next pass",
                expected_outcome: format!("{} earns its place in the story", subject),
                suggestions: vec![format!("Give {} a stake in the outcome", subject)],
            }
        }
        AnomalyKind::UnresolvedConflict => Remedy {
            category: Category::Plot,
            title: format!("Resolve {}", anomaly.location.as_deref().unwrap_or("the open conflict")),
            description: "Pay off the conflict with a confrontation, reconciliation or defeat".to_string(),
            impact: 0.7,
            effort: 0.4,
            timeline: "next draft",
            expected_outcome: "The conflict closes and the audience feels the consequence".to_string(),
            suggestions: vec!["Stage a scene where the two sides settle it".to_string()],
        },
        AnomalyKind::EfficiencyOutlier => Remedy {
            category: Category::Structure,
            title: format!("Strengthen {}'s involvement", subject),
            description: format!("Give {} more relationships or merge them with a stronger character", subject),
            impact: 0.4,
            effort: 0.4,
            timeline: "next pass",
            expected_outcome: "Each element pulls its weight in the network".to_string(),
            suggestions: vec![format!("Consider merging {} into another role", subject)],
        },
        AnomalyKind::ThematicVoid => Remedy {
            category: Category::Theme,
            title: "Seed a recurring motif".to_string(),
            description: "Repeat an image, object or idea that echoes the protagonist's struggle".to_string(),
            impact: 0.6,
            effort: 0.5,
            timeline: "next pass",
            expected_outcome: "A thematic thread the audience can follow".to_string(),
            suggestions: vec!["Return to one image at the start, middle and end".to_string()],
        },
        AnomalyKind::FlatTension => Remedy {
            category: Category::Pacing,
            title: "Build escalating tension".to_string(),
            description: "Order the beats so each complication raises the stakes before the climax".to_string(),
            impact: 0.7,
            effort: 0.6,
            timeline: "next draft",
            expected_outcome: "A tension curve that rises toward a climax".to_string(),
            suggestions: vec!["Add a reversal at the midpoint".to_string()],
        },
    }
}

fn worth_recommending(severity: Severity, fix: &Remedy) -> bool {
    severity >= Severity::High || (fix.impact >= MIN_IMPACT && fix.effort <= MAX_EFFORT)
}

/// Turn anomalies into ordered issues, recommendations and a treatment plan.
///
/// A recommendation only depends on recommendations emitted before it, either
/// foundational ones or ones touching the same nodes.
pub fn synthesize(mut anomalies: Vec<Anomaly>, network: &ConflictNetwork) -> Result<DiagnosisReport, StationError> {
    anomalies.sort_by(|a, b| b.severity.cmp(&a.severity));

    let mut diagnostics = Vec::with_capacity(anomalies.len());
    let mut recommendations: Vec<Recommendation> = Vec::new();
    let mut emitted: Vec<(&Anomaly, String)> = Vec::new();

    for (i, anomaly) in anomalies.iter().enumerate() {
        let issue_id = format!("D-{:03}", i + 1);
        let fix = remedy(anomaly, network);
        diagnostics.push(DiagnosticIssue {
            id: issue_id.clone(),
            issue_type: anomaly.kind.as_str().to_string(),
            severity: anomaly.severity,
            description: anomaly.description.clone(),
            location: anomaly.location.clone(),
            suggestions: fix.suggestions.clone(),
        });

        if !worth_recommending(anomaly.severity, &fix) {
            continue;
        }

        let id = format!("R-{:03}", recommendations.len() + 1);
        let dependencies: BTreeSet<String> = emitted
            .iter()
            .filter(|(earlier, _)| {
                earlier.kind.is_foundational() || earlier.nodes.iter().any(|n| anomaly.nodes.contains(n))
            })
            .map(|(_, rec_id)| rec_id.clone())
            .collect();

        recommendations.push(Recommendation {
            id: id.clone(),
            priority: Priority::for_severity(anomaly.severity),
            category: fix.category,
            title: fix.title,
            description: fix.description,
            rationale: format!("Addresses {} ({} severity): {}", issue_id, anomaly.severity, anomaly.description),
            impact: fix.impact,
            effort: fix.effort,
            timeline: fix.timeline.to_string(),
            dependencies,
            expected_outcome: fix.expected_outcome,
            issue_ids: vec![issue_id],
        });
        emitted.push((anomaly, id));
    }

    let plan = treatment_plan(&recommendations)
        .map_err(|e| StationError::new(StationId::S6, FailureCause::Analysis(e.to_string())))?;

    Ok(DiagnosisReport {
        diagnostics,
        recommendations,
        treatment_plan: plan,
    })
}

#[async_trait]
impl Station for DiagnosisStation {
    fn id(&self) -> StationId {
        StationId::S6
    }

    fn description(&self) -> &'static str {
        "diagnostics, recommendations and treatment plan"
    }

    fn depends_on(&self) -> &'static [StationId] {
        &[StationId::S1, StationId::S3, StationId::S4, StationId::S5]
    }

    async fn run(&self, input: &StageInput<'_>, _ctx: &RunContext) -> Result<StageResult, StationError> {
        let entities: Vec<Entity> = input.require_payload(StationId::S6, StationId::S1, keys::ENTITIES)?;
        let segments: Vec<Segment> = input.require_payload(StationId::S6, StationId::S1, keys::SEGMENTS)?;
        let network: ConflictNetwork = input.require_payload(StationId::S6, StationId::S3, keys::NETWORK)?;
        let metrics: NetworkMetrics = input.require_payload(StationId::S6, StationId::S4, keys::METRICS)?;
        let dynamics: Dynamics = input.require_payload(StationId::S6, StationId::S5, keys::DYNAMICS)?;

        let upstream = [StationId::S3, StationId::S4, StationId::S5]
            .into_iter()
            .map(|id| input.require(StationId::S6, id))
            .collect::<Result<Vec<_>, _>>()?;
        let inherited = propagated(mean_confidence(upstream));

        let anomalies = scan(&DiagnosisInput {
            network: &network,
            metrics: &metrics,
            dynamics: &dynamics,
            entities: &entities,
            sentence_count: segments.iter().filter(|s| s.is_prose()).count(),
            has_dialogue: segments
                .iter()
                .any(|s| matches!(s.kind, SegmentKind::Dialogue { .. })),
        });
        let report = synthesize(anomalies, &network)?;

        let critical = report
            .diagnostics
            .iter()
            .filter(|d| d.severity >= Severity::High)
            .count();
        if critical > 0 {
            warn!(issues = critical, "high severity diagnostics");
        }
        let summary = if report.diagnostics.is_empty() {
            "No structural anomalies found".to_string()
        } else {
            format!(
                "{} issues ({} high or critical), {} recommendations",
                report.diagnostics.len(),
                critical,
                report.recommendations.len()
            )
        };

        let mut result = StageResult::new(summary, 1.0 - inherited);
        if inherited > 0.15 {
            result = result.with_note(UncertaintyNote::epistemic(
                "diagnosis",
                format!("{:.0}% uncertainty inherited from structure, metrics and dynamics", inherited * 100.0),
            ));
        }
        if network.nodes.is_empty() {
            result = result.with_note(UncertaintyNote::epistemic("diagnosis", "empty network; diagnosis rests on absence alone"));
        }

        debug!(
            issues = report.diagnostics.len(),
            recommendations = report.recommendations.len(),
            "diagnosis finished"
        );
        report
            .attach_to(result)
            .map_err(|e| payload_error(StationId::S6, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CharacterArc, EdgeKind, MetricOutlier, NetworkEdge, NetworkNode};

    fn node(id: &str, kind: EntityKind, protagonist: bool) -> NetworkNode {
        NetworkNode {
            id: id.to_string(),
            label: id.to_string(),
            kind,
            weight: 1.0,
            protagonist,
        }
    }

    fn conflict(a: &str, b: &str, resolved: bool) -> NetworkEdge {
        NetworkEdge {
            source: a.to_string(),
            target: b.to_string(),
            kind: EdgeKind::Conflict,
            weight: 1.0,
            resolved,
            verbs: vec!["fights".to_string()],
        }
    }

    fn dynamics(arc_shape: ArcShape, arcs: Vec<CharacterArc>) -> Dynamics {
        Dynamics {
            motifs: vec![],
            tension_curve: vec![],
            arc_shape,
            character_arcs: arcs,
        }
    }

    fn run_scan(network: &ConflictNetwork, metrics: &NetworkMetrics, dynamics: &Dynamics, sentences: usize) -> Vec<Anomaly> {
        scan(&DiagnosisInput {
            network,
            metrics,
            dynamics,
            entities: &[],
            sentence_count: sentences,
            has_dialogue: false,
        })
    }

    #[test]
    fn test_missing_protagonist_is_critical() {
        let network = ConflictNetwork {
            nodes: vec![node("E1", EntityKind::Object, false)],
            edges: vec![],
        };
        let anomalies = run_scan(&network, &NetworkMetrics::default(), &dynamics(ArcShape::Flat, vec![]), 1);
        assert_eq!(anomalies[0].kind, AnomalyKind::MissingProtagonist);
        assert_eq!(anomalies[0].severity, Severity::Critical);
    }

    #[test]
    fn test_dangling_edge_is_critical() {
        let network = ConflictNetwork {
            nodes: vec![node("E1", EntityKind::Character, true)],
            edges: vec![conflict("E1", "E9", false)],
        };
        let anomalies = run_scan(&network, &NetworkMetrics::default(), &dynamics(ArcShape::Flat, vec![]), 1);
        assert!(anomalies
            .iter()
            .any(|a| a.kind == AnomalyKind::DanglingEdge && a.severity == Severity::Critical));
    }

    #[test]
    fn test_unresolved_conflict_severity_follows_protagonist() {
        let network = ConflictNetwork {
            nodes: vec![
                node("E1", EntityKind::Character, true),
                node("E2", EntityKind::Character, false),
                node("E3", EntityKind::Character, false),
            ],
            edges: vec![conflict("E1", "E2", false), conflict("E2", "E3", false)],
        };
        let metrics = NetworkMetrics {
            conflict_count: 2,
            ..NetworkMetrics::default()
        };
        let anomalies = run_scan(&network, &metrics, &dynamics(ArcShape::Rising, vec![]), 2);
        let severities: Vec<_> = anomalies
            .iter()
            .filter(|a| a.kind == AnomalyKind::UnresolvedConflict)
            .map(|a| a.severity)
            .collect();
        assert_eq!(severities, vec![Severity::High, Severity::Medium]);
    }

    #[test]
    fn test_isolated_and_outlier_severity() {
        let network = ConflictNetwork {
            nodes: vec![
                node("E1", EntityKind::Character, true),
                node("E2", EntityKind::Character, false),
                node("E3", EntityKind::Place, false),
                node("E4", EntityKind::Character, false),
            ],
            edges: vec![conflict("E1", "E4", true)],
        };
        let metrics = NetworkMetrics {
            conflict_count: 1,
            isolated: vec!["E2".to_string(), "E3".to_string()],
            outliers: vec![
                MetricOutlier {
                    node_id: "E2".to_string(),
                    metric: "efficiency".to_string(),
                    value: 0.0,
                    expected: 0.5,
                },
                MetricOutlier {
                    node_id: "E4".to_string(),
                    metric: "efficiency".to_string(),
                    value: 0.1,
                    expected: 0.5,
                },
            ],
            ..NetworkMetrics::default()
        };
        let anomalies = run_scan(&network, &metrics, &dynamics(ArcShape::Rising, vec![]), 2);

        let isolated: Vec<_> = anomalies
            .iter()
            .filter(|a| a.kind == AnomalyKind::IsolatedNode)
            .map(|a| a.severity)
            .collect();
        assert_eq!(isolated, vec![Severity::Medium, Severity::Low]);

        let outliers: Vec<_> = anomalies
            .iter()
            .filter(|a| a.kind == AnomalyKind::EfficiencyOutlier)
            .collect();
        assert_eq!(outliers.len(), 1);
        assert_eq!(outliers[0].nodes, vec!["E4".to_string()]);
    }

    #[test]
    fn test_protagonist_absent_from_resolution() {
        let network = ConflictNetwork {
            nodes: vec![node("E1", EntityKind::Character, true)],
            edges: vec![],
        };
        let arcs = vec![CharacterArc {
            node_id: "E1".to_string(),
            presence: [true, true, false],
            trajectory: String::new(),
        }];
        let anomalies = run_scan(&network, &NetworkMetrics::default(), &dynamics(ArcShape::Rising, arcs), 6);
        assert!(anomalies.iter().any(|a| a.kind == AnomalyKind::ProtagonistAbsentFromResolution));
    }

    #[test]
    fn test_synthesis_traces_and_orders() {
        let network = ConflictNetwork {
            nodes: vec![
                node("E1", EntityKind::Character, true),
                node("E2", EntityKind::Character, false),
                node("E3", EntityKind::Place, false),
            ],
            edges: vec![conflict("E1", "E2", false)],
        };
        let anomalies = vec![
            Anomaly::new(AnomalyKind::IsolatedNode, Severity::Low, "place".to_string())
                .at("E3".to_string(), vec!["E3".to_string()]),
            Anomaly::new(AnomalyKind::ThematicVoid, Severity::Medium, "void".to_string()),
            Anomaly::new(AnomalyKind::UnresolvedConflict, Severity::High, "open".to_string())
                .at("E1–E2".to_string(), vec!["E1".to_string(), "E2".to_string()]),
            Anomaly::new(AnomalyKind::SilentCharacter, Severity::High, "quiet".to_string())
                .at("E1".to_string(), vec!["E1".to_string()]),
        ];
        let report = synthesize(anomalies, &network).unwrap();

        assert_eq!(report.diagnostics.len(), 4);
        assert_eq!(report.diagnostics[0].id, "D-001");
        assert_eq!(report.diagnostics[0].severity, Severity::High);
        assert_eq!(report.diagnostics[3].severity, Severity::Low);

        // The low-impact place issue gets no recommendation.
        assert_eq!(report.recommendations.len(), 3);
        for rec in &report.recommendations {
            if rec.priority >= Priority::High {
                let issue = report
                    .diagnostics
                    .iter()
                    .find(|d| rec.issue_ids.contains(&d.id))
                    .unwrap();
                assert!(issue.severity >= Severity::High);
            }
        }

        // The silent protagonist shares E1 with the open conflict.
        let silent = &report.recommendations[1];
        assert!(silent.dependencies.contains("R-001"));
        assert_eq!(report.treatment_plan, vec!["R-001", "R-002", "R-003"]);
    }
}

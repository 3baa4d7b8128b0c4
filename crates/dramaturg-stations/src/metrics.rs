//! S4 Metrics: quantitative efficiency scoring over the conflict network
use async_trait::async_trait;
use dramaturg_core::uncertainty::propagated;
use dramaturg_core::{
    RunContext, StageInput, StageResult, Station, StationError, StationId, UncertaintyNote,
};
use tracing::debug;

use crate::model::{keys, ConflictNetwork, MetricOutlier, NetworkMetrics, NodeMetrics};
use crate::payload_error;

/// Inherited uncertainty above this is worth a note
const NOTE_THRESHOLD: f64 = 0.15;

/// Pure function of the network: reads station 3 only.
#[derive(Default)]
pub struct MetricsStation;

pub fn compute_metrics(network: &ConflictNetwork) -> NetworkMetrics {
    let n = network.nodes.len();
    let m = network.edges.len();

    let density = if n < 2 {
        0.0
    } else {
        (2.0 * m as f64 / (n * (n - 1)) as f64).min(1.0)
    };

    let weighted: Vec<f64> = network
        .nodes
        .iter()
        .map(|node| {
            network
                .edges
                .iter()
                .filter(|e| e.touches(&node.id))
                .map(|e| e.weight)
                .sum::<f64>()
        })
        .collect();
    let max_weighted = weighted.iter().copied().fold(0.0, f64::max);

    let node_metrics: Vec<NodeMetrics> = network
        .nodes
        .iter()
        .zip(&weighted)
        .map(|(node, w)| {
            let degree = network.degree(&node.id);
            NodeMetrics {
                node_id: node.id.clone(),
                degree,
                centrality: if n < 2 { 0.0 } else { degree as f64 / (n - 1) as f64 },
                efficiency: if max_weighted > 0.0 { w / max_weighted } else { 0.0 },
            }
        })
        .collect();

    let isolated = node_metrics
        .iter()
        .filter(|nm| nm.degree == 0)
        .map(|nm| nm.node_id.clone())
        .collect();

    let outliers = efficiency_outliers(&node_metrics);

    let conflict_count = network.conflicts().count();
    let resolved = network.conflicts().filter(|e| e.resolved).count();
    let conflict_ratio = if m == 0 { 0.0 } else { conflict_count as f64 / m as f64 };
    let resolution_rate = if conflict_count == 0 {
        0.0
    } else {
        resolved as f64 / conflict_count as f64
    };

    NetworkMetrics {
        density,
        conflict_count,
        conflict_ratio,
        resolution_rate,
        node_metrics,
        isolated,
        outliers,
        efficiency_score: 0.4 * density + 0.3 * conflict_ratio + 0.3 * resolution_rate,
    }
}

/// Nodes more than one standard deviation below the mean efficiency
fn efficiency_outliers(node_metrics: &[NodeMetrics]) -> Vec<MetricOutlier> {
    if node_metrics.len() < 3 {
        return Vec::new();
    }
    let n = node_metrics.len() as f64;
    let mean = node_metrics.iter().map(|nm| nm.efficiency).sum::<f64>() / n;
    let variance = node_metrics
        .iter()
        .map(|nm| (nm.efficiency - mean).powi(2))
        .sum::<f64>()
        / n;
    let std = variance.sqrt();
    if std <= f64::EPSILON {
        return Vec::new();
    }

    node_metrics
        .iter()
        .filter(|nm| nm.efficiency < mean - std)
        .map(|nm| MetricOutlier {
            node_id: nm.node_id.clone(),
            metric: "efficiency".to_string(),
            value: nm.efficiency,
            expected: mean,
        })
        .collect()
}

#[async_trait]
impl Station for MetricsStation {
    fn id(&self) -> StationId {
        StationId::S4
    }

    fn description(&self) -> &'static str {
        "network efficiency metrics"
    }

    fn depends_on(&self) -> &'static [StationId] {
        &[StationId::S3]
    }

    async fn run(&self, input: &StageInput<'_>, _ctx: &RunContext) -> Result<StageResult, StationError> {
        let structure = input.require(StationId::S4, StationId::S3)?;
        let network: ConflictNetwork = input.require_payload(StationId::S4, StationId::S3, keys::NETWORK)?;

        let metrics = compute_metrics(&network);
        let inherited = propagated(structure.confidence);

        let summary = format!(
            "Density {:.2}, conflict ratio {:.2}, resolution rate {:.2}, efficiency {:.2} ({} isolated, {} outliers)",
            metrics.density,
            metrics.conflict_ratio,
            metrics.resolution_rate,
            metrics.efficiency_score,
            metrics.isolated.len(),
            metrics.outliers.len(),
        );
        let mut result = StageResult::new(summary, 1.0 - inherited);
        if inherited > NOTE_THRESHOLD {
            result = result.with_note(UncertaintyNote::epistemic(
                "metrics",
                format!("{:.0}% uncertainty inherited from the structure station", inherited * 100.0),
            ));
        }

        debug!(efficiency = metrics.efficiency_score, outliers = metrics.outliers.len(), "metrics computed");
        result
            .with_payload(keys::METRICS, &metrics)
            .map_err(|e| payload_error(StationId::S4, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EdgeKind, EntityKind, NetworkEdge, NetworkNode};

    fn node(id: &str) -> NetworkNode {
        NetworkNode {
            id: id.to_string(),
            label: id.to_string(),
            kind: EntityKind::Character,
            weight: 1.0,
            protagonist: false,
        }
    }

    fn edge(a: &str, b: &str, kind: EdgeKind, weight: f64, resolved: bool) -> NetworkEdge {
        NetworkEdge {
            source: a.to_string(),
            target: b.to_string(),
            kind,
            weight,
            resolved,
            verbs: vec![],
        }
    }

    #[test]
    fn test_empty_network() {
        let metrics = compute_metrics(&ConflictNetwork::default());
        assert_eq!(metrics.density, 0.0);
        assert_eq!(metrics.efficiency_score, 0.0);
        assert!(metrics.isolated.is_empty());
    }

    #[test]
    fn test_density_and_conflict_ratios() {
        let network = ConflictNetwork {
            nodes: vec![node("A"), node("B"), node("C"), node("D")],
            edges: vec![
                edge("A", "B", EdgeKind::Conflict, 2.0, true),
                edge("A", "C", EdgeKind::Conflict, 2.0, false),
                edge("B", "C", EdgeKind::Alliance, 1.0, false),
            ],
        };
        let metrics = compute_metrics(&network);

        assert!((metrics.density - 0.5).abs() < 1e-9);
        assert_eq!(metrics.conflict_count, 2);
        assert!((metrics.conflict_ratio - 2.0 / 3.0).abs() < 1e-9);
        assert!((metrics.resolution_rate - 0.5).abs() < 1e-9);
        assert_eq!(metrics.isolated, vec!["D".to_string()]);
        assert_eq!(metrics.node_metrics[0].efficiency, 1.0);
        assert!(metrics.outliers.iter().any(|o| o.node_id == "D"));
        assert!((metrics.efficiency_score - (0.2 + 0.2 + 0.15)).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_confidence_follows_structure() {
        let structure = StageResult::new("net", 0.3)
            .with_payload(keys::NETWORK, &ConflictNetwork::default())
            .unwrap();
        let previous = [(StationId::S3, structure)].into_iter().collect();
        let options = Default::default();
        let input = StageInput {
            text: "x",
            previous_results: &previous,
            options: &options,
        };

        let result = MetricsStation.run(&input, &RunContext::new()).await.unwrap();
        assert!(1.0 - result.confidence >= propagated(0.3) - 1e-9);
        assert_eq!(result.uncertainties.len(), 1);
    }
}

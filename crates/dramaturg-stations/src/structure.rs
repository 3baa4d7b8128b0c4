//! S3 Structure: builds the conflict network from extracted entities and relations
use async_trait::async_trait;
use dramaturg_core::uncertainty::propagated;
use dramaturg_core::{
    Evidence, RunContext, StageInput, StageResult, Station, StationError,
    StationId, UncertaintyNote, UncertaintyQuantifier,
};
use std::collections::HashMap;
use tracing::debug;

use crate::model::{
    keys, ConflictNetwork, EdgeKind, Entity, Frame, NetworkEdge, NetworkNode, Polarity, Relation,
};
use crate::payload_error;

/// Weight a shared sentence adds to a pair
const CO_OCCURRENCE_WEIGHT: f64 = 0.5;

#[derive(Default)]
pub struct StructureStation {
    quantifier: UncertaintyQuantifier,
}

/// Per-pair accumulator while the network is built
#[derive(Default)]
struct PairState {
    source: String,
    target: String,
    weight: f64,
    verbs: Vec<String>,
    saw_conflict: bool,
    open: bool,
    supportive: bool,
}

impl PairState {
    fn apply(&mut self, relation: &Relation) {
        self.verbs.push(relation.verb.clone());
        match relation.polarity {
            Polarity::Antagonistic => {
                self.weight += 1.0;
                self.saw_conflict = true;
                self.open = true;
            }
            Polarity::Resolving => {
                self.weight += 1.0;
                self.saw_conflict = true;
                self.open = false;
            }
            Polarity::Supportive => {
                self.weight += 1.0;
                self.supportive = true;
                self.open = false;
            }
            Polarity::Neutral => self.weight += 0.75,
        }
    }

    fn into_edge(self) -> NetworkEdge {
        let kind = if self.saw_conflict {
            EdgeKind::Conflict
        } else if self.supportive {
            EdgeKind::Alliance
        } else {
            EdgeKind::Association
        };
        NetworkEdge {
            source: self.source,
            target: self.target,
            kind,
            weight: self.weight,
            resolved: kind == EdgeKind::Conflict && !self.open,
            verbs: self.verbs,
        }
    }
}

fn pair_key(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

/// Aggregate relations and sentence co-occurrence into one edge per entity pair.
///
/// A conflict edge counts as resolved when a resolving or supportive relation
/// follows the last antagonistic one.
pub fn build_network(entities: &[Entity], relations: &[Relation], protagonist: Option<&str>) -> ConflictNetwork {
    let nodes = entities
        .iter()
        .map(|e| NetworkNode {
            id: e.id.clone(),
            label: e.name.clone(),
            kind: e.kind,
            weight: e.mentions as f64,
            protagonist: protagonist == Some(e.id.as_str()),
        })
        .collect();

    let mut order: Vec<(String, String)> = Vec::new();
    let mut pairs: HashMap<(String, String), PairState> = HashMap::new();
    let mut pair = |source: &str, target: &str| -> (String, String) {
        let key = pair_key(source, target);
        if !pairs.contains_key(&key) {
            order.push(key.clone());
            pairs.insert(
                key.clone(),
                PairState {
                    source: source.to_string(),
                    target: target.to_string(),
                    ..PairState::default()
                },
            );
        }
        key
    };

    let mut keyed: Vec<((String, String), &Relation)> = Vec::new();
    for relation in relations.iter().filter(|r| r.source != r.target) {
        keyed.push((pair(&relation.source, &relation.target), relation));
    }

    let mut co_occurrence: Vec<(String, String)> = Vec::new();
    for (i, a) in entities.iter().enumerate() {
        for b in &entities[i + 1..] {
            let shared = a.sentences.iter().filter(|s| b.sentences.contains(s)).count();
            for _ in 0..shared {
                co_occurrence.push(pair(&a.id, &b.id));
            }
        }
    }

    for (key, relation) in keyed {
        if let Some(state) = pairs.get_mut(&key) {
            state.apply(relation);
        }
    }
    for key in co_occurrence {
        if let Some(state) = pairs.get_mut(&key) {
            state.weight += CO_OCCURRENCE_WEIGHT;
        }
    }

    let edges = order
        .into_iter()
        .filter_map(|key| pairs.remove(&key))
        .map(PairState::into_edge)
        .collect();

    ConflictNetwork { nodes, edges }
}

#[async_trait]
impl Station for StructureStation {
    fn id(&self) -> StationId {
        StationId::S3
    }

    fn description(&self) -> &'static str {
        "relation and conflict network"
    }

    fn depends_on(&self) -> &'static [StationId] {
        &[StationId::S1, StationId::S2]
    }

    async fn run(&self, input: &StageInput<'_>, _ctx: &RunContext) -> Result<StageResult, StationError> {
        let extraction = input.require(StationId::S3, StationId::S1)?;
        let entities: Vec<Entity> = input.require_payload(StationId::S3, StationId::S1, keys::ENTITIES)?;
        let relations: Vec<Relation> = input.require_payload(StationId::S3, StationId::S1, keys::RELATIONS)?;
        let frame: Frame = input.require_payload(StationId::S3, StationId::S2, keys::FRAME)?;

        let network = build_network(&entities, &relations, frame.protagonist.as_deref());
        let backed = network.edges.iter().filter(|e| !e.verbs.is_empty()).count();
        let associations = network
            .edges
            .iter()
            .filter(|e| e.kind == EdgeKind::Association)
            .count();
        let association_share = if network.edges.is_empty() {
            0.0
        } else {
            associations as f64 / network.edges.len() as f64
        };

        let local = self.quantifier.quantify(
            &Evidence::new(backed, network.nodes.len().saturating_sub(1).max(1))
                .with_ambiguity(association_share * 0.5),
        );
        // Only the protagonist choice shapes the network; genre does not.
        let inherited = propagated((extraction.confidence + frame.protagonist_confidence) / 2.0);
        let confidence = local.confidence() * (1.0 - inherited);

        let conflicts = network.conflicts().count();
        let summary = format!(
            "Conflict network with {} nodes and {} edges ({} conflicts, {} resolved)",
            network.nodes.len(),
            network.edges.len(),
            conflicts,
            network.conflicts().filter(|e| e.resolved).count(),
        );
        let mut result = StageResult::new(summary, confidence)
            .with_notes(self.quantifier.notes("network", &local));
        if inherited > 0.0 {
            result = result.with_note(UncertaintyNote::epistemic(
                "network",
                format!("{:.0}% uncertainty inherited from extraction and the protagonist choice", inherited * 100.0),
            ));
        }
        if network.nodes.is_empty() {
            result = result.degrade(0.5, UncertaintyNote::epistemic("network", "no entities to connect"));
        }

        debug!(nodes = network.nodes.len(), edges = network.edges.len(), conflicts, "network built");
        result
            .with_payload(keys::NETWORK, &network)
            .map_err(|e| payload_error(StationId::S3, e))
    }
}

//! S5 Dynamics: motifs, tension curve, arc shape and character presence
use async_trait::async_trait;
use dramaturg_core::uncertainty::propagated;
use dramaturg_core::{
    Evidence, RunContext, StageInput, StageResult, Station, StationError, StationId,
    UncertaintyNote, UncertaintyQuantifier,
};
use std::collections::BTreeSet;
use std::ops::Range;
use tracing::debug;

use crate::lexicon::{matches_any, verb_polarity, INTENSITY, MOTIFS};
use crate::model::{
    keys, ArcShape, CharacterArc, ConflictNetwork, Dynamics, Entity, EntityKind, Motif, Polarity,
};
use crate::payload_error;
use crate::text::{tokenize, Segment};

/// Differences smaller than this read as flat
const ARC_EPSILON: f64 = 0.1;

/// Sentences needed for a well-supported arc
const EXPECTED_SENTENCES: usize = 6;

/// Motif hits that saturate strength at 1.0
const MOTIF_SATURATION: f64 = 3.0;

#[derive(Default)]
pub struct DynamicsStation {
    quantifier: UncertaintyQuantifier,
}

pub fn detect_motifs(sentences: &[&str]) -> Vec<Motif> {
    let words: Vec<String> = sentences
        .iter()
        .flat_map(|s| tokenize(s).into_iter().map(|t| t.lower))
        .collect();

    let mut motifs: Vec<Motif> = MOTIFS
        .iter()
        .filter_map(|(name, lexicon)| {
            let hits: Vec<&String> = words.iter().filter(|w| matches_any(w, lexicon)).collect();
            if hits.is_empty() {
                return None;
            }
            let evidence: BTreeSet<String> = hits.iter().map(|w| w.to_string()).collect();
            Some(Motif {
                name: name.to_string(),
                strength: (hits.len() as f64 / MOTIF_SATURATION).min(1.0),
                evidence: evidence.into_iter().take(5).collect(),
            })
        })
        .collect();
    motifs.sort_by(|a, b| b.strength.total_cmp(&a.strength));
    motifs
}

/// Per-sentence tension normalized to `[0, 1]`
pub fn tension_curve(sentences: &[&str]) -> Vec<f64> {
    let raw: Vec<f64> = sentences
        .iter()
        .map(|sentence| {
            let tokens = tokenize(sentence);
            let conflict = tokens
                .iter()
                .filter(|t| verb_polarity(&t.lower) == Some(Polarity::Antagonistic))
                .count() as f64;
            let intensity = tokens
                .iter()
                .filter(|t| INTENSITY.contains(t.lower.as_str()))
                .count() as f64;
            let exclaim = if sentence.contains('!') { 0.5 } else { 0.0 };
            conflict + 0.5 * intensity + exclaim
        })
        .collect();

    let peak = raw.iter().copied().fold(0.0, f64::max);
    if peak <= 0.0 {
        return vec![0.0; raw.len()];
    }
    raw.into_iter().map(|v| v / peak).collect()
}

/// Index ranges of setup, confrontation and resolution
pub fn thirds(len: usize) -> [Range<usize>; 3] {
    [0..len / 3, len / 3..2 * len / 3, 2 * len / 3..len]
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

pub fn arc_shape(curve: &[f64]) -> ArcShape {
    let (a, b, c) = match curve.len() {
        0 => return ArcShape::Flat,
        n if n < 3 => {
            let (first, last) = (curve[0], curve[n - 1]);
            (first, (first + last) / 2.0, last)
        }
        n => {
            let [setup, middle, end] = thirds(n);
            (mean(&curve[setup]), mean(&curve[middle]), mean(&curve[end]))
        }
    };

    if b > a + ARC_EPSILON && b > c + ARC_EPSILON {
        ArcShape::Peaked
    } else if b < a - ARC_EPSILON && b < c - ARC_EPSILON {
        ArcShape::Valley
    } else if c > a + ARC_EPSILON {
        ArcShape::Rising
    } else if c < a - ARC_EPSILON {
        ArcShape::Falling
    } else {
        ArcShape::Flat
    }
}

fn trajectory(presence: [bool; 3]) -> String {
    match presence {
        [true, true, true] => "present throughout",
        [true, false, false] => "drops out after the setup",
        [true, true, false] => "absent from the resolution",
        [false, true, true] => "enters in the confrontation",
        [false, false, true] => "appears only in the resolution",
        [false, true, false] => "appears only in the confrontation",
        [true, false, true] => "bookends the story",
        [false, false, false] => "never on the page",
    }
    .to_string()
}

pub fn character_arcs(entities: &[Entity], sentence_count: usize) -> Vec<CharacterArc> {
    let acts = thirds(sentence_count);
    entities
        .iter()
        .filter(|e| e.kind == EntityKind::Character)
        .map(|e| {
            let presence = [0, 1, 2].map(|act| {
                e.sentences.iter().any(|s| acts[act].contains(s))
                    || (sentence_count < 3 && !e.sentences.is_empty())
            });
            CharacterArc {
                node_id: e.id.clone(),
                presence,
                trajectory: trajectory(presence),
            }
        })
        .collect()
}

#[async_trait]
impl Station for DynamicsStation {
    fn id(&self) -> StationId {
        StationId::S5
    }

    fn description(&self) -> &'static str {
        "motifs, tension and arcs"
    }

    fn depends_on(&self) -> &'static [StationId] {
        &[StationId::S1, StationId::S3, StationId::S4]
    }

    async fn run(&self, input: &StageInput<'_>, _ctx: &RunContext) -> Result<StageResult, StationError> {
        let segments: Vec<Segment> = input.require_payload(StationId::S5, StationId::S1, keys::SEGMENTS)?;
        let entities: Vec<Entity> = input.require_payload(StationId::S5, StationId::S1, keys::ENTITIES)?;
        let network: ConflictNetwork = input.require_payload(StationId::S5, StationId::S3, keys::NETWORK)?;
        let metrics = input.require(StationId::S5, StationId::S4)?;

        let sentences: Vec<&str> = segments
            .iter()
            .filter(|s| s.is_prose())
            .map(|s| s.text.as_str())
            .collect();

        let motifs = detect_motifs(&sentences);
        let curve = tension_curve(&sentences);
        let shape = arc_shape(&curve);
        let arcs: Vec<CharacterArc> = character_arcs(&entities, sentences.len())
            .into_iter()
            .filter(|arc| network.node(&arc.node_id).is_some())
            .collect();

        let ambiguity = match motifs.as_slice() {
            [first, second, ..] if first.strength > 0.0 => 0.5 * second.strength / first.strength,
            _ => 0.0,
        };
        let local = self.quantifier.quantify(
            &Evidence::new(sentences.len(), EXPECTED_SENTENCES).with_ambiguity(ambiguity),
        );
        let inherited = propagated(metrics.confidence);
        let confidence = local.confidence() * (1.0 - inherited);

        let motif_names: Vec<&str> = motifs.iter().map(|m| m.name.as_str()).collect();
        let summary = format!(
            "{} tension arc over {} sentences; motifs: {}",
            shape,
            sentences.len(),
            if motif_names.is_empty() { "none".to_string() } else { motif_names.join(", ") },
        );
        let mut result = StageResult::new(summary, confidence)
            .with_notes(self.quantifier.notes("dynamics", &local));
        if motifs.len() > 1 && ambiguity >= 0.4 {
            result = result.with_alternate(
                format!("{} as the dominant motif rather than {}", motifs[1].name, motifs[0].name),
                motifs[1].strength * confidence,
            );
        }
        if sentences.len() < 3 {
            result = result.with_note(UncertaintyNote::epistemic(
                "arc",
                "too few sentences to separate setup, confrontation and resolution",
            ));
        }

        let dynamics = Dynamics {
            motifs,
            tension_curve: curve,
            arc_shape: shape,
            character_arcs: arcs,
        };
        debug!(arc = %dynamics.arc_shape, motifs = dynamics.motifs.len(), "dynamics analysed");
        result
            .with_payload(keys::DYNAMICS, &dynamics)
            .map_err(|e| payload_error(StationId::S5, e))
    }
}

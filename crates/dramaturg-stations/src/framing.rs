//! S2 Framing: genre, tone, protagonist and thesis
use async_trait::async_trait;
use dramaturg_core::{
    Evidence, RunContext, StageInput, StageResult, Station, StationError, StationId, Uncertainty,
    UncertaintyNote, UncertaintyQuantifier,
};
use tracing::{debug, warn};

use crate::lexicon::{count_hits, GENRES, TONES};
use crate::model::{keys, Entity, EntityKind, Frame, Relation};
use crate::payload_error;
use crate::text::tokenize;

/// Bonus a matching `genre_hint` option adds to a genre score
const HINT_BONUS: f64 = 2.0;

/// Runner-up genres within this share of the leader become alternates
const ALTERNATE_RATIO: f64 = 0.75;

/// Share of S2 confidence carried by the protagonist choice; genre carries the rest
const PROTAGONIST_WEIGHT: f64 = 0.6;

#[derive(Default)]
pub struct FramingStation {
    quantifier: UncertaintyQuantifier,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenreScore {
    pub genre: &'static str,
    pub score: f64,
}

/// Genre scores sorted best first; ties keep lexicon order
pub fn score_genres(words: &[String], hint: Option<&str>) -> Vec<GenreScore> {
    let hint = hint.map(|h| h.trim().to_lowercase());
    let mut scores: Vec<GenreScore> = GENRES
        .iter()
        .map(|(genre, lexicon)| {
            let mut score = count_hits(words, lexicon) as f64;
            if hint.as_deref() == Some(*genre) {
                score += HINT_BONUS;
            }
            GenreScore { genre: *genre, score }
        })
        .collect();
    scores.sort_by(|a, b| b.score.total_cmp(&a.score));
    scores
}

pub fn detect_tone(words: &[String]) -> &'static str {
    TONES
        .iter()
        .map(|(tone, lexicon)| (*tone, count_hits(words, lexicon)))
        .filter(|(_, hits)| *hits > 0)
        .max_by_key(|(_, hits)| *hits)
        .map(|(tone, _)| tone)
        .unwrap_or("neutral")
}

/// Most mentioned character; the earliest one wins a tie
pub fn pick_protagonist(entities: &[Entity]) -> Option<&Entity> {
    entities
        .iter()
        .filter(|e| e.kind == EntityKind::Character)
        .fold(None, |best: Option<&Entity>, e| match best {
            Some(b) if b.mentions >= e.mentions => Some(b),
            _ => Some(e),
        })
}

/// Evidence for `hero` being the protagonist: its mentions, made ambiguous
/// by the closest rival character
pub fn protagonist_evidence(entities: &[Entity], hero: &Entity) -> Evidence {
    let rival = entities
        .iter()
        .filter(|e| e.kind == EntityKind::Character && e.id != hero.id)
        .map(|e| e.mentions)
        .max()
        .unwrap_or(0);
    Evidence::new(hero.mentions, 3).with_ambiguity(rival as f64 / hero.mentions.max(1) as f64)
}

fn label(entity: &Entity) -> String {
    if entity.name.chars().next().is_some_and(char::is_uppercase) {
        entity.name.clone()
    } else {
        format!("the {}", entity.name)
    }
}

fn thesis(genre: &str, protagonist: Option<&Entity>, entities: &[Entity], relations: &[Relation]) -> String {
    let Some(hero) = protagonist else {
        return format!("A {} piece without a clearly identifiable protagonist.", genre);
    };
    let action = relations
        .iter()
        .find(|r| r.source == hero.id)
        .and_then(|r| {
            entities
                .iter()
                .find(|e| e.id == r.target)
                .map(|target| format!(" {} {}", r.verb, label(target)))
        })
        .unwrap_or_default();
    format!("A {} story in which {}{}.", genre, label(hero), action)
}

fn logline_prompt(frame: &Frame, text: &str) -> String {
    format!(
        "Write a one-sentence logline for this {} script with a {} tone. Protagonist: {}.\n\n{}",
        frame.genre, frame.tone, frame.protagonist_label, text
    )
}

#[async_trait]
impl Station for FramingStation {
    fn id(&self) -> StationId {
        StationId::S2
    }

    fn description(&self) -> &'static str {
        "genre, tone and thesis"
    }

    fn depends_on(&self) -> &'static [StationId] {
        &[StationId::S1]
    }

    async fn run(&self, input: &StageInput<'_>, ctx: &RunContext) -> Result<StageResult, StationError> {
        let entities: Vec<Entity> = input.require_payload(StationId::S2, StationId::S1, keys::ENTITIES)?;
        let relations: Vec<Relation> = input.require_payload(StationId::S2, StationId::S1, keys::RELATIONS)?;

        let words: Vec<String> = tokenize(input.text).into_iter().map(|t| t.lower).collect();
        let scores = score_genres(&words, input.option_str("genre_hint"));
        let (leader, runner_up) = match scores.as_slice() {
            [first, second, ..] => (first.clone(), second.score),
            [first] => (first.clone(), 0.0),
            [] => (GenreScore { genre: "drama", score: 0.0 }, 0.0),
        };
        let genre = if leader.score > 0.0 { leader.genre } else { "drama" };

        let protagonist = pick_protagonist(&entities);
        let cast = match protagonist {
            Some(hero) => self.quantifier.quantify(&protagonist_evidence(&entities, hero)),
            None => Uncertainty::BASELINE,
        };
        let mut frame = Frame {
            genre: genre.to_string(),
            tone: detect_tone(&words).to_string(),
            protagonist: protagonist.map(|p| p.id.clone()),
            protagonist_label: protagonist.map(label).unwrap_or_else(|| "unknown".to_string()),
            protagonist_confidence: cast.confidence(),
            thesis: thesis(genre, protagonist, &entities, &relations),
            logline: None,
        };

        let evidence = Evidence::new(leader.score.round() as usize, 3)
            .with_conflicting(runner_up.round() as usize)
            .with_ambiguity(if leader.score > 0.0 { runner_up / leader.score } else { 0.0 });
        let uncertainty = self.quantifier.quantify(&evidence);
        let confidence =
            PROTAGONIST_WEIGHT * cast.confidence() + (1.0 - PROTAGONIST_WEIGHT) * uncertainty.confidence();
        let mut result = StageResult::new(
            format!("Framed as {} ({} tone): {}", frame.genre, frame.tone, frame.thesis),
            confidence,
        )
        .with_notes(self.quantifier.notes("genre", &uncertainty));

        if leader.score > 0.0 {
            for alt in scores.iter().skip(1).filter(|s| s.score >= leader.score * ALTERNATE_RATIO) {
                result = result.with_alternate(
                    format!("{} rather than {}", alt.genre, leader.genre),
                    alt.score / leader.score * uncertainty.confidence(),
                );
            }
        }
        result = match protagonist {
            Some(_) => result.with_notes(self.quantifier.notes("protagonist", &cast)),
            None => result.with_note(UncertaintyNote::epistemic(
                "protagonist",
                "no character stands out as the protagonist",
            )),
        };

        if let Some(client) = ctx.generation() {
            let params = ctx.model_params(input.options);
            let logline = client
                .generate(StationId::S2, &logline_prompt(&frame, input.text), &params)
                .await?;
            let logline = logline.trim();
            if logline.is_empty() {
                warn!(run_id = %ctx.run_id, "generator returned an empty logline");
                result = result.degrade(
                    0.9,
                    UncertaintyNote::epistemic("logline", "generator returned no logline"),
                );
            } else {
                frame.logline = Some(logline.to_string());
            }
        }

        debug!(genre = %frame.genre, tone = %frame.tone, alternates = result.alternates.len(), "framing finished");
        result
            .with_payload(keys::FRAME, &frame)
            .map_err(|e| payload_error(StationId::S2, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(text: &str) -> Vec<String> {
        tokenize(text).into_iter().map(|t| t.lower).collect()
    }

    #[test]
    fn test_science_fiction_leads_for_astronaut() {
        let scores = score_genres(&words("A lonely astronaut discovers a signal."), None);
        assert_eq!(scores[0].genre, "science fiction");
        assert_eq!(scores[0].score, 2.0);
    }

    #[test]
    fn test_genre_hint_adds_bonus() {
        let scores = score_genres(&words("A lonely astronaut discovers a signal."), Some("Horror"));
        let horror = scores.iter().find(|s| s.genre == "horror").unwrap();
        assert_eq!(horror.score, HINT_BONUS);
    }

    #[test]
    fn test_tone_defaults_to_neutral() {
        assert_eq!(detect_tone(&words("The table is brown.")), "neutral");
        assert_eq!(detect_tone(&words("She is alone and lonely.")), "melancholic");
    }

    #[test]
    fn test_protagonist_is_most_mentioned_character() {
        let entity = |id: &str, name: &str, kind, mentions| Entity {
            id: id.to_string(),
            name: name.to_string(),
            kind,
            mentions,
            sentences: vec![0],
            dialogue_lines: 0,
        };
        let entities = vec![
            entity("E1", "Mira", EntityKind::Character, 2),
            entity("E2", "ship", EntityKind::Object, 9),
            entity("E3", "Jonah", EntityKind::Character, 3),
        ];
        assert_eq!(pick_protagonist(&entities).unwrap().id, "E3");
        assert!(pick_protagonist(&entities[1..2]).is_none());
    }

    #[test]
    fn test_protagonist_support_survives_a_crowded_cast() {
        let quantifier = UncertaintyQuantifier::default();
        let extraction =
            crate::extraction::extract("Alice attacks Bob. Bob attacks Carol. Carol attacks Dave. Dave forgives Alice.");
        let hero = pick_protagonist(&extraction.entities).unwrap();
        let crowded = quantifier.quantify(&protagonist_evidence(&extraction.entities, hero));
        assert!(crowded.confidence() > 0.0);

        let extraction = crate::extraction::extract(
            "Later Mira climbs the tower. Later Mira watches the sea. Later Mira finds Jonah.",
        );
        let hero = pick_protagonist(&extraction.entities).unwrap();
        assert_eq!(hero.name, "Mira");
        let clear = quantifier.quantify(&protagonist_evidence(&extraction.entities, hero));
        assert!(clear.confidence() > crowded.confidence());
    }

    #[test]
    fn test_thesis_mentions_first_action() {
        let extraction = crate::extraction::extract("A lonely astronaut discovers a signal.");
        let hero = pick_protagonist(&extraction.entities);
        let text = thesis("science fiction", hero, &extraction.entities, &extraction.relations);
        assert_eq!(text, "A science fiction story in which the astronaut discovers the signal.");
    }
}

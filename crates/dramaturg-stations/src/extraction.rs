//! S1 Extraction: entities and subject-verb-object relations
use async_trait::async_trait;
use dramaturg_core::{
    Evidence, FailureCause, RunContext, StageInput, StageResult, Station, StationError, StationId,
    UncertaintyNote, UncertaintyQuantifier,
};
use std::collections::HashMap;
use tracing::debug;

use crate::lexicon::{
    base_form, is_person_noun, is_place_noun, is_verb, verb_polarity, DETERMINERS,
    OBJECT_PRONOUNS, PLACE_PREPOSITIONS, STOPWORDS, SUBJECT_PRONOUNS,
};
use crate::model::{keys, Entity, EntityKind, Relation};
use crate::text::{cue_name, heading_place, segment, title_case, tokenize, Segment, SegmentKind, Token};
use crate::payload_error;

#[derive(Default)]
pub struct ExtractionStation {
    quantifier: UncertaintyQuantifier,
}

/// Everything S1 found, before it is packed into a [`StageResult`]
#[derive(Debug, Default)]
pub struct Extraction {
    pub segments: Vec<Segment>,
    pub sentence_count: usize,
    pub entities: Vec<Entity>,
    pub relations: Vec<Relation>,
    pub resolved_pronouns: usize,
    pub unresolved_pronouns: usize,
}

/// A mention inside one sentence, spanning tokens `start..=end`
#[derive(Debug, Clone, Copy)]
struct Mention {
    start: usize,
    end: usize,
    entity: usize,
}

#[derive(Default)]
struct Extractor {
    entities: Vec<Entity>,
    by_key: HashMap<String, usize>,
    relations: Vec<Relation>,
    last_character: Option<usize>,
    last_object: Option<usize>,
    pending_places: Vec<usize>,
    resolved_pronouns: usize,
    unresolved_pronouns: usize,
}

impl Extractor {
    fn register(&mut self, key: String, name: String, kind: EntityKind) -> usize {
        if let Some(&index) = self.by_key.get(&key) {
            return index;
        }
        let index = self.entities.len();
        self.entities.push(Entity {
            id: format!("E{}", index + 1),
            name,
            kind,
            mentions: 0,
            sentences: Vec::new(),
            dialogue_lines: 0,
        });
        self.by_key.insert(key, index);
        index
    }

    fn touch(&mut self, index: usize, sentence: usize, mention: bool) {
        let entity = &mut self.entities[index];
        if mention {
            entity.mentions += 1;
        }
        if entity.sentences.last() != Some(&sentence) {
            entity.sentences.push(sentence);
        }
        match entity.kind {
            EntityKind::Character => self.last_character = Some(index),
            EntityKind::Object => self.last_object = Some(index),
            EntityKind::Place => {}
        }
    }

    fn heading(&mut self, line: &str) {
        if let Some(place) = heading_place(line) {
            let index = self.register(place.clone(), title_case(&place), EntityKind::Place);
            self.entities[index].mentions += 1;
            self.pending_places.push(index);
        }
    }

    fn cue(&mut self, name: &str) {
        let index = self.register(name.to_lowercase(), name.to_string(), EntityKind::Character);
        self.entities[index].mentions += 1;
    }

    fn sentence(&mut self, index: usize, segment: &Segment) {
        for place in std::mem::take(&mut self.pending_places) {
            self.touch(place, index, false);
        }
        if let SegmentKind::Dialogue { speaker } = &segment.kind {
            let speaker = self.register(speaker.to_lowercase(), speaker.clone(), EntityKind::Character);
            self.entities[speaker].dialogue_lines += 1;
            self.touch(speaker, index, false);
        }

        let tokens = tokenize(&segment.text);
        let mentions = self.mentions(index, &tokens);

        for pair in mentions.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if a.entity == b.entity {
                continue;
            }
            let verb = tokens[a.end + 1..b.start]
                .iter()
                .find_map(|t| verb_polarity(&t.lower).map(|p| (t.lower.clone(), p)));
            if let Some((verb, polarity)) = verb {
                self.relations.push(Relation {
                    source: self.entities[a.entity].id.clone(),
                    target: self.entities[b.entity].id.clone(),
                    verb,
                    polarity,
                    sentence: index,
                });
            }
        }
    }

    fn mentions(&mut self, sentence: usize, tokens: &[Token<'_>]) -> Vec<Mention> {
        let mut mentions = Vec::new();
        let mut i = 0;
        while i < tokens.len() {
            let token = &tokens[i];
            let next = tokens.get(i + 1);

            let pronoun = SUBJECT_PRONOUNS.contains(token.lower.as_str())
                || OBJECT_PRONOUNS.contains(token.lower.as_str())
                || token.lower == "it";
            let possessive = token.lower == "her" && next.is_some_and(is_nominal);
            if pronoun && !possessive {
                let target = if token.lower == "it" {
                    self.last_object
                } else {
                    self.last_character
                };
                match target {
                    Some(entity) => {
                        self.resolved_pronouns += 1;
                        self.touch(entity, sentence, true);
                        mentions.push(Mention { start: i, end: i, entity });
                    }
                    None => self.unresolved_pronouns += 1,
                }
                i += 1;
                continue;
            }

            if DETERMINERS.contains(token.lower.as_str()) {
                let phrase: Vec<&Token<'_>> = tokens[i + 1..]
                    .iter()
                    .take(2)
                    .take_while(|t| is_nominal(t))
                    .collect();
                if let Some(head) = phrase.last() {
                    let key = base_form(&head.lower);
                    let kind = if is_person_noun(&key) {
                        EntityKind::Character
                    } else if is_place_noun(&key) {
                        EntityKind::Place
                    } else {
                        EntityKind::Object
                    };
                    let entity = self.register(key.clone(), key, kind);
                    self.touch(entity, sentence, true);
                    mentions.push(Mention {
                        start: i,
                        end: head.position,
                        entity,
                    });
                    i = head.position + 1;
                    continue;
                }
                i += 1;
                continue;
            }

            if self.is_name_start(tokens, i) {
                let end = tokens[i..]
                    .iter()
                    .take_while(|t| t.capitalized && !STOPWORDS.contains(t.lower.as_str()))
                    .last()
                    .map(|t| t.position)
                    .unwrap_or(i);
                let name = tokens[i..=end]
                    .iter()
                    .map(|t| t.text.trim_end_matches("'s").trim_end_matches("’s"))
                    .collect::<Vec<_>>()
                    .join(" ");
                let key = name.to_lowercase();
                let after_preposition = i > 0 && PLACE_PREPOSITIONS.contains(tokens[i - 1].lower.as_str());
                let kind = if after_preposition || is_place_noun(&tokens[end].lower) {
                    EntityKind::Place
                } else {
                    EntityKind::Character
                };
                let entity = self.register(key, name, kind);
                self.touch(entity, sentence, true);
                mentions.push(Mention { start: i, end, entity });
                i = end + 1;
                continue;
            }

            i += 1;
        }
        mentions
    }

    /// Capitalized, not a function word; at sentence start only when already
    /// known or directly followed by a verb.
    fn is_name_start(&self, tokens: &[Token<'_>], i: usize) -> bool {
        let token = &tokens[i];
        if !token.capitalized || STOPWORDS.contains(token.lower.as_str()) || is_verb(&token.lower) {
            return false;
        }
        if i > 0 {
            return true;
        }
        self.by_key.contains_key(&token.lower)
            || tokens.get(1).is_some_and(|next| is_verb(&next.lower))
    }
}

/// Lowercase content word that can sit inside a noun phrase
fn is_nominal(token: &Token<'_>) -> bool {
    !token.capitalized && !STOPWORDS.contains(token.lower.as_str()) && !is_verb(&token.lower)
}

/// Run the extraction over a script
pub fn extract(text: &str) -> Extraction {
    let segments = segment(text);
    let mut extractor = Extractor::default();
    let mut sentence_count = 0;

    for seg in &segments {
        match &seg.kind {
            SegmentKind::Heading => extractor.heading(&seg.text),
            SegmentKind::Cue => extractor.cue(&cue_name(&seg.text)),
            SegmentKind::Action | SegmentKind::Dialogue { .. } => {
                extractor.sentence(sentence_count, seg);
                sentence_count += 1;
            }
        }
    }

    Extraction {
        segments,
        sentence_count,
        entities: extractor.entities,
        relations: extractor.relations,
        resolved_pronouns: extractor.resolved_pronouns,
        unresolved_pronouns: extractor.unresolved_pronouns,
    }
}

impl Extraction {
    pub fn evidence(&self) -> Evidence {
        let mentions: usize = self.entities.iter().map(|e| e.mentions).sum();
        let ambiguity = if mentions == 0 {
            0.0
        } else {
            0.3 * self.resolved_pronouns as f64 / mentions as f64
        };
        Evidence::new(
            self.entities.len() + self.relations.len(),
            (self.sentence_count * 2).max(4),
        )
        .with_conflicting(self.unresolved_pronouns)
        .with_ambiguity(ambiguity)
    }

    fn count(&self, kind: EntityKind) -> usize {
        self.entities.iter().filter(|e| e.kind == kind).count()
    }
}

#[async_trait]
impl Station for ExtractionStation {
    fn id(&self) -> StationId {
        StationId::S1
    }

    fn description(&self) -> &'static str {
        "entities and relations"
    }

    async fn run(&self, input: &StageInput<'_>, _ctx: &RunContext) -> Result<StageResult, StationError> {
        if input.text.trim().is_empty() {
            return Err(StationError::new(StationId::S1, FailureCause::EmptyInput));
        }

        let extraction = extract(input.text);
        let uncertainty = self.quantifier.quantify(&extraction.evidence());
        debug!(
            entities = extraction.entities.len(),
            relations = extraction.relations.len(),
            sentences = extraction.sentence_count,
            "extraction finished"
        );

        let summary = format!(
            "Extracted {} entities ({} characters, {} places, {} objects) and {} relations from {} sentences",
            extraction.entities.len(),
            extraction.count(EntityKind::Character),
            extraction.count(EntityKind::Place),
            extraction.count(EntityKind::Object),
            extraction.relations.len(),
            extraction.sentence_count,
        );
        let mut result = StageResult::new(summary, uncertainty.confidence())
            .with_notes(self.quantifier.notes("entities", &uncertainty));

        if extraction.entities.is_empty() {
            result = result.degrade(
                0.5,
                UncertaintyNote::epistemic("entities", "no entities recognised; later stations work from an empty cast"),
            );
        }
        if extraction.unresolved_pronouns > 0 {
            result = result.with_note(UncertaintyNote::aleatoric(
                "coreference",
                format!("{} pronouns had no antecedent", extraction.unresolved_pronouns),
            ));
        }

        result
            .with_payload(keys::ENTITIES, &extraction.entities)
            .and_then(|r| r.with_payload(keys::RELATIONS, &extraction.relations))
            .and_then(|r| r.with_payload(keys::SEGMENTS, &extraction.segments))
            .map_err(|e| payload_error(StationId::S1, e))
    }
}

//! Text segmentation: scene headings, speaker cues, dialogue and prose sentences
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static SENTENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^.!?]+[.!?]*").expect("sentence pattern compiles"));
static WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z][A-Za-z'’\-]*").expect("word pattern compiles"));
static HEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(INT\./EXT|EXT\./INT|INT|EXT|I/E)[.\s]").expect("heading pattern compiles")
});
static CUE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Z][A-Z0-9 .'\-]{0,30}(\s*\([A-Za-z0-9 .']+\))?$").expect("cue pattern compiles")
});

const TRANSITIONS: &[&str] = &["THE END", "FADE OUT", "FADE IN", "CONTINUED", "BLACK", "CUT TO"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SegmentKind {
    Heading,
    Cue,
    Action,
    Dialogue { speaker: String },
}

/// One analysable unit of the script, in reading order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub index: usize,
    pub text: String,
    #[serde(flatten)]
    pub kind: SegmentKind,
}

impl Segment {
    /// Action or dialogue, as opposed to formatting lines
    pub fn is_prose(&self) -> bool {
        matches!(self.kind, SegmentKind::Action | SegmentKind::Dialogue { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'a> {
    pub text: &'a str,
    /// Lowercased, possessive stripped
    pub lower: String,
    pub position: usize,
    pub capitalized: bool,
}

/// Split a script into segments. Lines following a speaker cue are dialogue
/// of that speaker until the next blank line, heading or cue.
pub fn segment(text: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut speaker: Option<String> = None;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            speaker = None;
            continue;
        }
        if line.starts_with('(') && line.ends_with(')') {
            continue;
        }
        if is_scene_heading(line) {
            speaker = None;
            push(&mut segments, line, SegmentKind::Heading);
            continue;
        }
        if is_cue(line) {
            speaker = Some(cue_name(line));
            push(&mut segments, line, SegmentKind::Cue);
            continue;
        }

        for sentence in SENTENCE.find_iter(line) {
            let sentence = sentence.as_str().trim();
            if !sentence.chars().any(char::is_alphabetic) {
                continue;
            }
            let kind = match &speaker {
                Some(name) => SegmentKind::Dialogue { speaker: name.clone() },
                None => SegmentKind::Action,
            };
            push(&mut segments, sentence, kind);
        }
    }
    segments
}

fn push(segments: &mut Vec<Segment>, text: &str, kind: SegmentKind) {
    segments.push(Segment {
        index: segments.len(),
        text: text.to_string(),
        kind,
    });
}

pub fn tokenize(sentence: &str) -> Vec<Token<'_>> {
    WORD.find_iter(sentence)
        .enumerate()
        .map(|(position, m)| {
            let text = m.as_str();
            let lower = text.to_lowercase();
            let lower = lower
                .strip_suffix("'s")
                .or_else(|| lower.strip_suffix("’s"))
                .map(str::to_string)
                .unwrap_or_else(|| lower.trim_end_matches(['\'', '’', '-']).to_string());
            Token {
                text,
                lower,
                position,
                capitalized: text.chars().next().is_some_and(char::is_uppercase),
            }
        })
        .collect()
}

pub fn is_scene_heading(line: &str) -> bool {
    HEADING.is_match(line)
}

/// A cue never ends a sentence; "NO GUNS." is shouted dialogue
pub fn is_cue(line: &str) -> bool {
    let name = line.split('(').next().unwrap_or(line).trim_end();
    CUE.is_match(line)
        && !name.ends_with(['.', '!', '?'])
        && !is_scene_heading(line)
        && line.split_whitespace().count() <= 4
        && !TRANSITIONS.iter().any(|t| line.starts_with(t))
}

/// "JOHN (V.O.)" → "John"
pub fn cue_name(line: &str) -> String {
    let name = line.split('(').next().unwrap_or(line).trim();
    title_case(name)
}

/// "INT. SPACE STATION - NIGHT" → "space station"
pub fn heading_place(line: &str) -> Option<String> {
    let rest = line.split_once('.').map(|(_, rest)| rest).unwrap_or(line);
    let place = rest.split(" - ").next().unwrap_or(rest).trim();
    if place.is_empty() {
        None
    } else {
        Some(place.to_lowercase())
    }
}

pub fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let lower = word.to_lowercase();
            let mut chars = lower.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prose_sentences() {
        let segments = segment("A lonely astronaut discovers a signal. She answers it!");
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "A lonely astronaut discovers a signal.");
        assert_eq!(segments[1].kind, SegmentKind::Action);
    }

    #[test]
    fn test_screenplay_blocks() {
        let script = "INT. SPACE STATION - NIGHT\n\nMIRA (V.O.)\nIs anyone out there?\n\nMira drifts past the window.";
        let segments = segment(script);
        assert_eq!(segments[0].kind, SegmentKind::Heading);
        assert_eq!(segments[1].kind, SegmentKind::Cue);
        assert_eq!(
            segments[2].kind,
            SegmentKind::Dialogue { speaker: "Mira".to_string() }
        );
        assert_eq!(segments[3].kind, SegmentKind::Action);
        assert_eq!(heading_place(&segments[0].text).as_deref(), Some("space station"));
    }

    #[test]
    fn test_shouted_line_stays_dialogue() {
        let segments = segment("VERA\nWe go in at midnight.\nNO GUNS.\n\nDUKE\nFine.");
        let kinds: Vec<_> = segments.iter().map(|s| s.kind.clone()).collect();
        let vera = SegmentKind::Dialogue { speaker: "Vera".to_string() };
        assert_eq!(
            kinds,
            vec![
                SegmentKind::Cue,
                vera.clone(),
                vera,
                SegmentKind::Cue,
                SegmentKind::Dialogue { speaker: "Duke".to_string() },
            ]
        );
    }

    #[test]
    fn test_cue_detection() {
        assert!(is_cue("JOHN"));
        assert!(is_cue("DR. KELLER (O.S.)"));
        assert!(!is_cue("John walks in."));
        assert!(!is_cue("INT. HOUSE - DAY"));
        assert!(!is_cue("THE END"));
        assert!(!is_cue("NO GUNS."));
        assert!(is_cue("VERA (CONT'D)"));
        assert_eq!(cue_name("DR. KELLER (O.S.)"), "Dr. Keller");
    }

    #[test]
    fn test_tokenize_strips_possessive() {
        let tokens = tokenize("The captain's ship drifts.");
        assert_eq!(tokens.len(), 4);
        assert_eq!(tokens[1].lower, "captain");
        assert!(tokens[0].capitalized);
        assert!(!tokens[2].capitalized);
    }
}

//! Word lists shared by the stations
use once_cell::sync::Lazy;
use std::collections::HashSet;

use crate::model::Polarity;

fn set(words: &[&'static str]) -> HashSet<&'static str> {
    words.iter().copied().collect()
}

pub static DETERMINERS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    set(&[
        "a", "an", "the", "his", "her", "their", "its", "my", "our", "your", "this", "that",
        "these", "those", "some", "every",
    ])
});

pub static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    set(&[
        "a", "an", "the", "and", "or", "but", "if", "then", "than", "so", "of", "in", "on", "at",
        "to", "from", "by", "with", "without", "for", "into", "onto", "over", "under", "out",
        "up", "down", "off", "about", "after", "before", "while", "when", "where", "who", "whom",
        "what", "which", "why", "how", "is", "are", "was", "were", "be", "been", "being", "has",
        "have", "had", "do", "does", "did", "not", "no", "yes", "it", "he", "she", "they", "we",
        "you", "i", "me", "him", "them", "us", "his", "her", "their", "its", "my", "our", "your",
        "this", "that", "these", "those", "there", "here", "all", "any", "each", "every", "some",
        "one", "just", "only", "very", "too", "also", "again", "still", "now", "later", "soon",
        "never", "always", "suddenly", "finally", "slowly", "quickly", "as", "like", "can",
        "could", "will", "would", "should", "must", "may", "might", "something", "nothing",
        "everything", "someone", "anyone", "nobody", "way", "day", "night", "time", "moment",
    ])
});

pub static SUBJECT_PRONOUNS: Lazy<HashSet<&'static str>> =
    Lazy::new(|| set(&["he", "she", "they"]));

pub static OBJECT_PRONOUNS: Lazy<HashSet<&'static str>> =
    Lazy::new(|| set(&["him", "her", "them"]));

pub static PERSON_NOUNS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    set(&[
        "man", "woman", "boy", "girl", "child", "kid", "baby", "mother", "father", "mom", "dad",
        "sister", "brother", "son", "daughter", "wife", "husband", "friend", "captain", "doctor",
        "detective", "officer", "soldier", "king", "queen", "prince", "princess", "knight",
        "wizard", "witch", "stranger", "teacher", "student", "nurse", "pilot", "engineer",
        "agent", "killer", "thief", "lover", "farmer", "hunter", "robot", "android", "alien",
        "creature", "monster", "crew", "boss", "priest", "sheriff", "lawyer", "judge", "driver",
        "waitress", "neighbor", "villain", "hero", "heroine", "commander", "survivor", "orphan",
        "widow", "girlfriend", "boyfriend", "partner", "rival", "mentor", "guard", "spy",
    ])
});

pub const PERSON_SUFFIXES: &[&str] = &["naut", "ist", "ian"];

pub static PLACES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    set(&[
        "city", "town", "village", "house", "home", "ship", "station", "planet", "forest",
        "castle", "room", "street", "school", "hospital", "office", "island", "desert", "ocean",
        "sea", "moon", "kingdom", "church", "bar", "apartment", "lab", "laboratory", "base",
        "colony", "world", "earth", "space", "cave", "mountain", "river", "farm", "prison",
        "camp", "road", "kitchen", "garden", "valley", "harbor", "outpost", "bridge",
    ])
});

pub static PLACE_PREPOSITIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    set(&[
        "in", "at", "into", "inside", "toward", "towards", "across", "through", "near", "on",
    ])
});

static ANTAGONISTIC: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    set(&[
        "fight", "attack", "betray", "hunt", "threaten", "oppose", "kill", "chase", "confront",
        "argue", "refuse", "steal", "lie", "hate", "destroy", "trap", "accuse", "deceive",
        "abandon", "resist", "challenge", "battle", "strike", "shoot", "stab", "blame", "reject",
        "capture", "pursue", "sabotage", "ambush", "punish", "fear",
    ])
});

static SUPPORTIVE: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    set(&[
        "help", "love", "join", "trust", "protect", "meet", "befriend", "guide", "marry",
        "rescue", "comfort", "support", "teach", "hug", "kiss", "embrace", "thank", "welcome",
        "shelter", "defend", "follow", "visit", "encourage",
    ])
});

static RESOLVING: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    set(&[
        "forgive", "reconcile", "defeat", "escape", "save", "free", "resolve", "apologize",
        "accept", "unite", "overcome", "heal", "release", "spare", "redeem", "outwit",
    ])
});

static NEUTRAL_VERBS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    set(&[
        "discover", "find", "see", "watch", "hear", "receive", "call", "enter", "leave", "tell",
        "ask", "answer", "open", "carry", "build", "search", "seek", "want", "need", "know",
        "remember", "notice", "study", "decode", "track", "read", "write", "send", "take",
        "give", "bring", "hold", "reach", "approach", "examine", "investigate", "board",
        "explore", "follow", "greet", "face", "drift", "wait", "run", "walk", "stare", "look",
        "detect", "answer", "repair", "lose", "miss",
    ])
});

/// Candidate base forms of an inflected word ("carries" → "carry")
fn stems(word: &str) -> Vec<String> {
    let mut candidates = vec![word.to_string()];
    let mut push = |s: Option<String>| {
        if let Some(s) = s {
            if !s.is_empty() {
                candidates.push(s);
            }
        }
    };
    push(word.strip_suffix("ies").map(|s| format!("{}y", s)));
    push(word.strip_suffix("ied").map(|s| format!("{}y", s)));
    push(word.strip_suffix('s').map(str::to_string));
    push(word.strip_suffix("es").map(str::to_string));
    push(word.strip_suffix('d').map(str::to_string));
    push(word.strip_suffix("ed").map(str::to_string));
    push(word.strip_suffix("ing").map(str::to_string));
    push(word.strip_suffix("ing").map(|s| format!("{}e", s)));
    // "running" → "run", "trapped" → "trap"
    for suffix in ["ing", "ed"] {
        push(word.strip_suffix(suffix).and_then(undouble));
    }
    candidates
}

fn undouble(stem: &str) -> Option<String> {
    let mut chars = stem.chars().rev();
    match (chars.next(), chars.next()) {
        (Some(a), Some(b)) if a == b && !"aeiou".contains(a) => {
            Some(stem[..stem.len() - a.len_utf8()].to_string())
        }
        _ => None,
    }
}

/// Polarity of a known verb, `None` for words not in any verb list
pub fn verb_polarity(word: &str) -> Option<Polarity> {
    stems(word).iter().find_map(|stem| {
        let stem = stem.as_str();
        if ANTAGONISTIC.contains(stem) {
            Some(Polarity::Antagonistic)
        } else if RESOLVING.contains(stem) {
            Some(Polarity::Resolving)
        } else if SUPPORTIVE.contains(stem) {
            Some(Polarity::Supportive)
        } else if NEUTRAL_VERBS.contains(stem) {
            Some(Polarity::Neutral)
        } else {
            None
        }
    })
}

pub fn is_verb(word: &str) -> bool {
    verb_polarity(word).is_some()
}

/// Base form used as a lexicon lookup key for nouns and adjectives
pub fn base_form(word: &str) -> String {
    if word.len() > 3 && word.ends_with('s') && !word.ends_with("ss") {
        word[..word.len() - 1].to_string()
    } else {
        word.to_string()
    }
}

pub fn is_person_noun(word: &str) -> bool {
    let base = base_form(word);
    PERSON_NOUNS.contains(base.as_str())
        || PERSON_SUFFIXES
            .iter()
            .any(|suffix| base.len() > suffix.len() + 2 && base.ends_with(suffix))
}

pub fn is_place_noun(word: &str) -> bool {
    PLACES.contains(base_form(word).as_str())
}

pub const GENRES: &[(&str, &[&str])] = &[
    (
        "science fiction",
        &[
            "astronaut", "signal", "planet", "space", "ship", "alien", "robot", "station",
            "galaxy", "orbit", "future", "android", "laser", "colony", "star", "starship",
            "mars", "moon", "probe", "transmission", "satellite", "cosmos", "spacecraft",
        ],
    ),
    (
        "thriller",
        &[
            "murder", "gun", "chase", "spy", "kill", "conspiracy", "agent", "bomb", "hostage",
            "threat", "escape", "danger", "assassin", "pursue", "ambush", "deadline",
        ],
    ),
    (
        "mystery",
        &[
            "detective", "clue", "secret", "mystery", "body", "suspect", "investigate",
            "disappear", "missing", "puzzle", "witness", "alibi", "evidence",
        ],
    ),
    (
        "horror",
        &[
            "blood", "scream", "ghost", "monster", "dark", "haunted", "demon", "dead", "fear",
            "creature", "curse", "nightmare", "corpse",
        ],
    ),
    (
        "romance",
        &[
            "love", "kiss", "heart", "wedding", "marry", "romance", "date", "lover", "together",
            "passion", "embrace", "girlfriend", "boyfriend",
        ],
    ),
    (
        "comedy",
        &[
            "joke", "laugh", "funny", "silly", "prank", "clumsy", "party", "awkward", "hilarious",
            "banana",
        ],
    ),
    (
        "fantasy",
        &[
            "dragon", "magic", "wizard", "kingdom", "sword", "spell", "quest", "elf", "queen",
            "prophecy", "witch", "castle", "knight",
        ],
    ),
    (
        "drama",
        &[
            "family", "father", "mother", "grief", "lonely", "loss", "memory", "home",
            "hospital", "divorce", "struggle", "alone", "funeral", "silence",
        ],
    ),
];

pub const TONES: &[(&str, &[&str])] = &[
    (
        "melancholic",
        &["lonely", "alone", "grief", "loss", "sad", "empty", "silent", "tears", "cold", "lost", "mourn"],
    ),
    (
        "tense",
        &["danger", "threat", "fear", "run", "dark", "chase", "gun", "scream", "panic", "hunt"],
    ),
    (
        "hopeful",
        &["hope", "light", "discover", "dream", "new", "signal", "home", "dawn", "rescue", "save"],
    ),
    ("comic", &["laugh", "joke", "funny", "silly", "prank", "grin"]),
    ("romantic", &["love", "kiss", "heart", "embrace", "tender"]),
];

pub const MOTIFS: &[(&str, &[&str])] = &[
    (
        "isolation",
        &["lonely", "alone", "isolated", "solitary", "silence", "silent", "empty", "abandoned", "stranded"],
    ),
    (
        "discovery",
        &["discover", "find", "signal", "secret", "reveal", "uncover", "search", "explore", "message", "decode"],
    ),
    ("betrayal", &["betray", "lie", "deceive", "traitor", "cheat", "backstab"]),
    ("redemption", &["forgive", "redeem", "atone", "sacrifice", "save", "apologize", "heal"]),
    ("loss", &["lose", "loss", "death", "die", "grief", "mourn", "gone", "funeral"]),
    ("power", &["power", "control", "rule", "throne", "command", "empire", "crown"]),
    ("love", &["love", "kiss", "heart", "marry", "romance", "embrace"]),
];

pub static INTENSITY: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    set(&[
        "danger", "scream", "suddenly", "gun", "blood", "fear", "explode", "explosion", "run",
        "crash", "alarm", "panic", "fire", "storm", "dies", "death", "shout", "race", "burn",
    ])
});

/// Number of tokens matching any word of `words` (stem aware)
pub fn count_hits(tokens: &[String], words: &[&str]) -> usize {
    tokens
        .iter()
        .filter(|token| stems(token).iter().any(|stem| words.contains(&stem.as_str())))
        .count()
}

/// Whether `token` matches `words` (stem aware)
pub fn matches_any(token: &str, words: &[&str]) -> bool {
    stems(token).iter().any(|stem| words.contains(&stem.as_str()))
}

//! Rule checks: each compiled rule scores content in `[0, 1]`

use regex::Regex;

use crate::principle::{ConfigError, PrincipleRule};

/// Score and human-readable detail for one rule
#[derive(Debug, Clone, PartialEq)]
pub struct RuleOutcome {
    pub score: f64,
    pub detail: String,
}

impl RuleOutcome {
    fn new(score: f64, detail: impl Into<String>) -> Self {
        Self {
            score: score.clamp(0.0, 1.0),
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Term {
    text: String,
    pattern: Regex,
}

/// A rule with its term patterns compiled once
#[derive(Debug, Clone)]
pub enum CompiledRule {
    MinLength(usize),
    MaxLength(usize),
    RequiredTerms { terms: Vec<Term>, min_hits: usize },
    ForbiddenTerms(Vec<Term>),
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Case-insensitive; word boundaries only where the term starts or ends in a word character
fn term_pattern(term: &str) -> String {
    let lead = if term.starts_with(is_word_char) { r"\b" } else { "" };
    let trail = if term.ends_with(is_word_char) { r"\b" } else { "" };
    format!("(?i){}{}{}", lead, regex::escape(term), trail)
}

fn compile_terms(terms: &[String]) -> Result<Vec<Term>, ConfigError> {
    terms
        .iter()
        .map(|t| {
            let pattern = Regex::new(&term_pattern(t.trim()))
                .map_err(|e| ConfigError::Invalid(format!("term '{}': {}", t, e)))?;
            Ok(Term {
                text: t.trim().to_string(),
                pattern,
            })
        })
        .collect()
}

impl CompiledRule {
    pub fn compile(rule: &PrincipleRule) -> Result<Self, ConfigError> {
        Ok(match rule {
            PrincipleRule::MinLength { chars } => CompiledRule::MinLength(*chars),
            PrincipleRule::MaxLength { chars } => CompiledRule::MaxLength(*chars),
            PrincipleRule::RequiredTerms { terms, min_hits } => CompiledRule::RequiredTerms {
                terms: compile_terms(terms)?,
                min_hits: *min_hits,
            },
            PrincipleRule::ForbiddenTerms { terms } => CompiledRule::ForbiddenTerms(compile_terms(terms)?),
        })
    }

    pub fn check(&self, content: &str) -> RuleOutcome {
        let length = content.chars().count();
        match self {
            CompiledRule::MinLength(min) => {
                if length >= *min {
                    RuleOutcome::new(1.0, format!("{} characters", length))
                } else {
                    RuleOutcome::new(
                        length as f64 / (*min).max(1) as f64,
                        format!("only {} of {} expected characters", length, min),
                    )
                }
            }
            CompiledRule::MaxLength(max) => {
                if length <= *max {
                    RuleOutcome::new(1.0, format!("{} characters", length))
                } else {
                    RuleOutcome::new(
                        *max as f64 / length as f64,
                        format!("{} characters, over the {} limit", length, max),
                    )
                }
            }
            CompiledRule::RequiredTerms { terms, min_hits } => {
                let missing: Vec<&str> = terms
                    .iter()
                    .filter(|t| !t.pattern.is_match(content))
                    .map(|t| t.text.as_str())
                    .collect();
                let hits = terms.len() - missing.len();
                if hits >= *min_hits {
                    RuleOutcome::new(1.0, format!("{} of {} required terms present", hits, terms.len()))
                } else {
                    RuleOutcome::new(
                        hits as f64 / (*min_hits).max(1) as f64,
                        format!("missing {}", missing.join(", ")),
                    )
                }
            }
            CompiledRule::ForbiddenTerms(terms) => {
                let found: Vec<&str> = terms
                    .iter()
                    .filter(|t| t.pattern.is_match(content))
                    .map(|t| t.text.as_str())
                    .collect();
                if found.is_empty() {
                    RuleOutcome::new(1.0, "no forbidden terms")
                } else {
                    RuleOutcome::new(0.0, format!("contains {}", found.join(", ")))
                }
            }
        }
    }
}

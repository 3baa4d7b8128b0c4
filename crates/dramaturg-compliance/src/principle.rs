//! Principle sets: weighted, YAML-configurable policy for report content
//!
//! A set is an ordered list of principles, each scored by one or more rules.

use dramaturg_core::ConstitutionalPrinciple;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("CONFIG/cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CONFIG/malformed principle set: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("CONFIG/{0}")]
    Invalid(String),
}

fn default_pass_mark() -> f64 {
    0.75
}

fn default_min_hits() -> usize {
    1
}

/// One scoring rule; a principle's confidence is the mean of its rule scores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PrincipleRule {
    /// Content must be at least `chars` characters long
    MinLength { chars: usize },

    /// Content should stay under `chars` characters
    MaxLength { chars: usize },

    /// At least `min_hits` of `terms` must appear (whole words, any case)
    RequiredTerms {
        terms: Vec<String>,
        #[serde(default = "default_min_hits")]
        min_hits: usize,
    },

    /// None of `terms` may appear (whole words, any case)
    ForbiddenTerms { terms: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrincipleSpec {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub weight: f64,
    /// Confidence needed for the principle to pass
    #[serde(default = "default_pass_mark")]
    pub pass_mark: f64,
    #[serde(default)]
    pub rules: Vec<PrincipleRule>,
}

impl PrincipleSpec {
    pub fn principle(&self) -> ConstitutionalPrinciple {
        ConstitutionalPrinciple {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            weight: self.weight,
        }
    }
}

/// Ordered principles plus the score below which a run is flagged
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrincipleSet {
    pub threshold: f64,
    pub principles: Vec<PrincipleSpec>,
}

impl PrincipleSet {
    /// Parse and validate a set from YAML
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let set: PrincipleSet = serde_yaml::from_str(yaml)?;
        set.validate()?;
        Ok(set)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.principles.is_empty() {
            return Err(ConfigError::Invalid("principle set is empty".to_string()));
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(ConfigError::Invalid(format!(
                "threshold {} is outside [0, 1]",
                self.threshold
            )));
        }

        let mut seen = HashSet::new();
        for p in &self.principles {
            if !seen.insert(p.id.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate principle id '{}'", p.id)));
            }
            if !(p.weight.is_finite() && p.weight > 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "principle '{}' needs a positive weight, got {}",
                    p.id, p.weight
                )));
            }
            if !(0.0..=1.0).contains(&p.pass_mark) {
                return Err(ConfigError::Invalid(format!(
                    "principle '{}' pass mark {} is outside [0, 1]",
                    p.id, p.pass_mark
                )));
            }
            for rule in &p.rules {
                let terms: &[String] = match rule {
                    PrincipleRule::RequiredTerms { terms, .. } | PrincipleRule::ForbiddenTerms { terms } => {
                        terms.as_slice()
                    }
                    _ => &[],
                };
                // A blank term compiles to a pattern that matches everything
                if terms.iter().any(|t| t.trim().is_empty()) {
                    return Err(ConfigError::Invalid(format!("principle '{}' has a blank term", p.id)));
                }
                if let PrincipleRule::RequiredTerms { terms, min_hits } = rule {
                    if *min_hits == 0 || *min_hits > terms.len() {
                        return Err(ConfigError::Invalid(format!(
                            "principle '{}' asks for {} of {} terms",
                            p.id,
                            min_hits,
                            terms.len()
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    pub fn principles(&self) -> Vec<ConstitutionalPrinciple> {
        self.principles.iter().map(PrincipleSpec::principle).collect()
    }
}

impl Default for PrincipleSet {
    /// Helpfulness, harmlessness and honesty, tuned for analysis reports
    fn default() -> Self {
        let terms = |words: &[&str]| words.iter().map(|w| w.to_string()).collect::<Vec<_>>();
        Self {
            threshold: 0.7,
            principles: vec![
                PrincipleSpec {
                    id: "helpfulness".to_string(),
                    name: "Helpfulness".to_string(),
                    description: "The report gives the writer concrete findings and next steps".to_string(),
                    weight: 1.0,
                    pass_mark: default_pass_mark(),
                    rules: vec![
                        PrincipleRule::MinLength { chars: 200 },
                        PrincipleRule::RequiredTerms {
                            terms: terms(&["diagnostics", "treatment plan"]),
                            min_hits: 2,
                        },
                    ],
                },
                PrincipleSpec {
                    id: "harmlessness".to_string(),
                    name: "Harmlessness".to_string(),
                    description: "Critique targets the script, never the writer".to_string(),
                    weight: 1.5,
                    pass_mark: default_pass_mark(),
                    // Phrases aimed at the writer; the report quotes the script,
                    // so bare nouns from the story must not trip this.
                    rules: vec![PrincipleRule::ForbiddenTerms {
                        terms: terms(&[
                            "you are talentless",
                            "you have no talent",
                            "you cannot write",
                            "you can't write",
                            "you should give up",
                            "your writing is garbage",
                            "your writing is worthless",
                            "your writing is pathetic",
                        ]),
                    }],
                },
                PrincipleSpec {
                    id: "honesty".to_string(),
                    name: "Honesty".to_string(),
                    description: "The report states how sure it is and does not overclaim".to_string(),
                    weight: 1.0,
                    pass_mark: default_pass_mark(),
                    rules: vec![
                        PrincipleRule::RequiredTerms {
                            terms: terms(&["confidence"]),
                            min_hits: 1,
                        },
                        PrincipleRule::ForbiddenTerms {
                            terms: terms(&[
                                "guaranteed success",
                                "guaranteed to succeed",
                                "this script is flawless",
                                "certainly a hit",
                            ]),
                        },
                    ],
                },
            ],
        }
    }
}

//! Constitutional evaluator: weighted-average pass rate over a principle set
//!
//! `overall = Σ(passed ? confidence × weight : 0) / Σ weight`
//!
//! A principle's confidence is the mean of its rule scores and it passes
//! when that mean reaches its pass mark. Recommendations are produced only
//! for content scoring below the set's threshold.

use dramaturg_core::{ConstitutionalCheck, ConstitutionalPrinciple, ConstitutionalResult, ContentEvaluator};
use tracing::debug;

use crate::checks::{CompiledRule, RuleOutcome};
use crate::principle::{ConfigError, PrincipleSet, PrincipleSpec};

struct CompiledPrinciple {
    spec: PrincipleSpec,
    rules: Vec<CompiledRule>,
}

impl CompiledPrinciple {
    fn check(&self, content: &str) -> ConstitutionalCheck {
        let outcomes: Vec<RuleOutcome> = self.rules.iter().map(|r| r.check(content)).collect();
        let confidence = if outcomes.is_empty() {
            1.0
        } else {
            outcomes.iter().map(|o| o.score).sum::<f64>() / outcomes.len() as f64
        };
        let explanation = if outcomes.is_empty() {
            "no rules configured".to_string()
        } else {
            outcomes
                .iter()
                .map(|o| o.detail.as_str())
                .collect::<Vec<_>>()
                .join("; ")
        };
        ConstitutionalCheck {
            principle: self.spec.id.clone(),
            passed: confidence >= self.spec.pass_mark,
            confidence,
            explanation,
        }
    }
}

pub struct ConstitutionalEvaluator {
    set: PrincipleSet,
    compiled: Vec<CompiledPrinciple>,
}

impl ConstitutionalEvaluator {
    /// Validate the set and compile its rules
    pub fn new(set: PrincipleSet) -> Result<Self, ConfigError> {
        set.validate()?;
        let compiled = set
            .principles
            .iter()
            .map(|spec| {
                Ok(CompiledPrinciple {
                    spec: spec.clone(),
                    rules: spec
                        .rules
                        .iter()
                        .map(CompiledRule::compile)
                        .collect::<Result<_, _>>()?,
                })
            })
            .collect::<Result<_, ConfigError>>()?;
        Ok(Self { set, compiled })
    }

    pub fn standard() -> Result<Self, ConfigError> {
        Self::new(PrincipleSet::default())
    }

    pub fn principle_set(&self) -> &PrincipleSet {
        &self.set
    }

    pub fn principles(&self) -> Vec<ConstitutionalPrinciple> {
        self.set.principles()
    }

    fn recommendations(&self, checks: &[ConstitutionalCheck]) -> Vec<String> {
        let mut recommendations: Vec<String> = self
            .compiled
            .iter()
            .zip(checks)
            .filter(|(_, check)| !check.passed)
            .map(|(p, check)| format!("{}: {} ({})", p.spec.name, p.spec.description, check.explanation))
            .collect();

        // Every principle passed, but with too little confidence overall
        if recommendations.is_empty() {
            if let Some((p, check)) = self
                .compiled
                .iter()
                .zip(checks)
                .min_by(|a, b| a.1.confidence.total_cmp(&b.1.confidence))
            {
                recommendations.push(format!(
                    "{}: strengthen this area, it passed with only {:.0}% confidence ({})",
                    p.spec.name,
                    check.confidence * 100.0,
                    check.explanation
                ));
            }
        }
        recommendations
    }
}

impl ContentEvaluator for ConstitutionalEvaluator {
    fn evaluate(&self, content: &str) -> ConstitutionalResult {
        let checks: Vec<ConstitutionalCheck> = self.compiled.iter().map(|p| p.check(content)).collect();

        let (earned, total) = self
            .compiled
            .iter()
            .zip(&checks)
            .fold((0.0, 0.0), |(earned, total), (p, check)| {
                let gained = if check.passed { check.confidence * p.spec.weight } else { 0.0 };
                (earned + gained, total + p.spec.weight)
            });
        let overall_score = if total > 0.0 { earned / total } else { 0.0 };

        let recommendations = if overall_score >= self.set.threshold {
            Vec::new()
        } else {
            self.recommendations(&checks)
        };

        debug!(
            overall_score,
            threshold = self.set.threshold,
            failed = checks.iter().filter(|c| !c.passed).count(),
            "content evaluated"
        );
        ConstitutionalResult {
            overall_score,
            checks,
            recommendations,
        }
    }

    fn threshold(&self) -> f64 {
        self.set.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::principle::PrincipleRule;
    use proptest::prelude::*;

    fn spec(id: &str, weight: f64, rules: Vec<PrincipleRule>) -> PrincipleSpec {
        PrincipleSpec {
            id: id.to_string(),
            name: id.to_string(),
            description: format!("{} principle", id),
            weight,
            pass_mark: 0.75,
            rules,
        }
    }

    fn forbid(word: &str) -> PrincipleRule {
        PrincipleRule::ForbiddenTerms {
            terms: vec![word.to_string()],
        }
    }

    const REPORT: &str = "# Script Analysis Report\n\n## Diagnostics\n\nNo structural anomalies found.\n\n\
        ## Treatment Plan\n\nNothing to treat.\n\n## Uncertainty and Limitations\n\n\
        Analysis confidence: 62% (mean of the six analysis stations). The extraction found \
        two characters and a single relation between them.";

    #[test]
    fn test_all_pass_scores_exactly_one() {
        let evaluator = ConstitutionalEvaluator::standard().unwrap();
        let result = evaluator.evaluate(REPORT);
        assert!(result.checks.iter().all(|c| c.passed && c.confidence == 1.0), "{:?}", result.checks);
        assert_eq!(result.overall_score, 1.0);
        assert!(result.recommendations.is_empty());
    }

    #[test]
    fn test_weighted_failure() {
        let evaluator = ConstitutionalEvaluator::standard().unwrap();
        let insulting = format!("{} Honestly, you have no talent.", REPORT);
        let result = evaluator.evaluate(&insulting);

        let harmless = result.checks.iter().find(|c| c.principle == "harmlessness").unwrap();
        assert!(!harmless.passed);
        // 1.0 + 1.0 of 3.5 total weight
        assert!((result.overall_score - 2.0 / 3.5).abs() < 1e-12);
        assert_eq!(result.recommendations.len(), 1);
        assert!(result.recommendations[0].starts_with("Harmlessness"));
    }

    #[test]
    fn test_score_below_threshold_with_no_failures() {
        let set = PrincipleSet {
            threshold: 0.9,
            principles: vec![PrincipleSpec {
                pass_mark: 0.5,
                ..spec("length", 1.0, vec![PrincipleRule::MinLength { chars: 100 }])
            }],
        };
        let evaluator = ConstitutionalEvaluator::new(set).unwrap();
        let result = evaluator.evaluate(&"x".repeat(60));
        assert!(result.checks[0].passed);
        assert!((result.overall_score - 0.6).abs() < 1e-12);
        assert_eq!(result.recommendations.len(), 1);
    }

    #[test]
    fn test_principle_without_rules_passes() {
        let set = PrincipleSet {
            threshold: 0.5,
            principles: vec![spec("open", 1.0, vec![])],
        };
        let result = ConstitutionalEvaluator::new(set).unwrap().evaluate("");
        assert_eq!(result.overall_score, 1.0);
        assert_eq!(result.checks[0].explanation, "no rules configured");
    }

    #[test]
    fn test_invalid_set_is_rejected() {
        let set = PrincipleSet {
            threshold: 0.5,
            principles: vec![spec("a", -1.0, vec![])],
        };
        assert!(ConstitutionalEvaluator::new(set).is_err());
    }

    proptest! {
        #[test]
        fn overall_score_is_bounded(content in ".{0,400}", w1 in 0.1f64..5.0, w2 in 0.1f64..5.0) {
            let set = PrincipleSet {
                threshold: 0.7,
                principles: vec![
                    spec("length", w1, vec![PrincipleRule::MinLength { chars: 200 }]),
                    spec("polite", w2, vec![forbid("garbage"), forbid("stupid")]),
                ],
            };
            let evaluator = ConstitutionalEvaluator::new(set).unwrap();
            let result = evaluator.evaluate(&content);
            prop_assert!((0.0..=1.0).contains(&result.overall_score));
            prop_assert_eq!(result.recommendations.is_empty(), result.overall_score >= 0.7);
        }

        #[test]
        fn perfect_checks_score_one(weights in prop::collection::vec(0.1f64..10.0, 1..8)) {
            let set = PrincipleSet {
                threshold: 0.7,
                principles: weights
                    .iter()
                    .enumerate()
                    .map(|(i, w)| spec(&format!("p{}", i), *w, vec![forbid("never-present")]))
                    .collect(),
            };
            let result = ConstitutionalEvaluator::new(set).unwrap().evaluate("clean content");
            prop_assert_eq!(result.overall_score, 1.0);
        }
    }
}

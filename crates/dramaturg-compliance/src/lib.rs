//! Dramaturg Compliance: scores generated reports against weighted principles
//!
//! The principle set is configuration (YAML), not code. Scoring never fails
//! a pipeline run; a score below the threshold only flags it.
//!
//! # Example
//!
//! ```ignore
//! use dramaturg_compliance::{evaluate, PrincipleSet};
//!
//! let result = evaluate("## Diagnostics ...", &PrincipleSet::default())?;
//! println!("score: {:.2}", result.overall_score);
//! ```

pub mod checks;
pub mod evaluator;
pub mod principle;

pub use checks::{CompiledRule, RuleOutcome};
pub use evaluator::ConstitutionalEvaluator;
pub use principle::{ConfigError, PrincipleRule, PrincipleSet, PrincipleSpec};

use dramaturg_core::{ConstitutionalResult, ContentEvaluator};

/// One-off evaluation against `set`
pub fn evaluate(content: &str, set: &PrincipleSet) -> Result<ConstitutionalResult, ConfigError> {
    Ok(ConstitutionalEvaluator::new(set.clone())?.evaluate(content))
}

/// Whether `content` reaches the set's threshold
pub fn would_pass(content: &str, set: &PrincipleSet) -> Result<bool, ConfigError> {
    Ok(evaluate(content, set)?.overall_score >= set.threshold)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_content_fails_default_set() {
        assert!(!would_pass("Looks fine.", &PrincipleSet::default()).unwrap());
    }
}

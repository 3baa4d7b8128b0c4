//! Uncertainty Quantifier: epistemic vs aleatoric estimates for station findings
//!
//! Epistemic uncertainty comes from sparse evidence and shrinks as more
//! material is gathered. Aleatoric uncertainty comes from conflicting or
//! inherently ambiguous material and never shrinks, so notes of that kind
//! are never reducible.

use serde::{Deserialize, Serialize};

use crate::data_model::clamp_unit;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UncertaintyKind {
    Epistemic,
    Aleatoric,
}

/// A single uncertainty annotation on a [`crate::StageResult`].
///
/// Fields are private so an aleatoric note can never claim to be reducible,
/// including notes read back from serialized results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "NoteRepr")]
pub struct UncertaintyNote {
    kind: UncertaintyKind,
    aspect: String,
    note: String,
    reducible: bool,
}

#[derive(Deserialize)]
struct NoteRepr {
    kind: UncertaintyKind,
    aspect: String,
    note: String,
    #[serde(default)]
    reducible: bool,
}

impl From<NoteRepr> for UncertaintyNote {
    fn from(repr: NoteRepr) -> Self {
        UncertaintyNote::new(repr.kind, repr.aspect, repr.note, repr.reducible)
    }
}

impl UncertaintyNote {
    /// `reducible` is forced to false for aleatoric notes
    pub fn new(
        kind: UncertaintyKind,
        aspect: impl Into<String>,
        note: impl Into<String>,
        reducible: bool,
    ) -> Self {
        Self {
            kind,
            aspect: aspect.into(),
            note: note.into(),
            reducible: reducible && kind == UncertaintyKind::Epistemic,
        }
    }

    pub fn epistemic(aspect: impl Into<String>, note: impl Into<String>) -> Self {
        Self::new(UncertaintyKind::Epistemic, aspect, note, true)
    }

    pub fn aleatoric(aspect: impl Into<String>, note: impl Into<String>) -> Self {
        Self::new(UncertaintyKind::Aleatoric, aspect, note, false)
    }

    pub fn kind(&self) -> UncertaintyKind {
        self.kind
    }

    pub fn aspect(&self) -> &str {
        &self.aspect
    }

    pub fn note(&self) -> &str {
        &self.note
    }

    pub fn is_reducible(&self) -> bool {
        self.reducible
    }
}

/// Evidence backing a finding.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    /// Items that support the finding
    pub supporting: usize,
    /// Items a well-supported finding would have
    pub expected: usize,
    /// Items pointing at a competing interpretation
    pub conflicting: usize,
    /// Inherent ambiguity of the material in `[0, 1]`
    pub ambiguity: f64,
}

impl Evidence {
    pub fn new(supporting: usize, expected: usize) -> Self {
        Self {
            supporting,
            expected,
            ..Self::default()
        }
    }

    pub fn with_conflicting(mut self, conflicting: usize) -> Self {
        self.conflicting = conflicting;
        self
    }

    pub fn with_ambiguity(mut self, ambiguity: f64) -> Self {
        self.ambiguity = clamp_unit(ambiguity);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.supporting == 0 && self.conflicting == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Uncertainty {
    pub epistemic: f64,
    pub aleatoric: f64,
    pub total: f64,
}

impl Uncertainty {
    /// Maximal reducible uncertainty, returned for missing evidence
    pub const BASELINE: Uncertainty = Uncertainty {
        epistemic: 1.0,
        aleatoric: 0.0,
        total: 1.0,
    };

    fn from_parts(epistemic: f64, aleatoric: f64) -> Self {
        let epistemic = clamp_unit(epistemic);
        let aleatoric = clamp_unit(aleatoric);
        Self {
            epistemic,
            aleatoric,
            total: epistemic + aleatoric,
        }
    }

    /// Confidence implied by this uncertainty, in `[0, 1]`
    pub fn confidence(&self) -> f64 {
        clamp_unit(1.0 - self.total)
    }
}

/// Stateless quantifier; the threshold only controls which notes are emitted.
#[derive(Debug, Clone, Copy)]
pub struct UncertaintyQuantifier {
    note_threshold: f64,
}

impl Default for UncertaintyQuantifier {
    fn default() -> Self {
        Self {
            note_threshold: 0.15,
        }
    }
}

impl UncertaintyQuantifier {
    pub fn new(note_threshold: f64) -> Self {
        Self {
            note_threshold: clamp_unit(note_threshold),
        }
    }

    /// Estimate uncertainty for `evidence`.
    ///
    /// Total is non-decreasing as `supporting` drops or `conflicting` grows.
    pub fn quantify(&self, evidence: &Evidence) -> Uncertainty {
        quantify(evidence)
    }

    /// Notes describing `uncertainty` for `aspect`, one per kind above the threshold
    pub fn notes(&self, aspect: &str, uncertainty: &Uncertainty) -> Vec<UncertaintyNote> {
        let mut notes = Vec::new();
        if uncertainty.epistemic > self.note_threshold {
            notes.push(UncertaintyNote::epistemic(
                aspect,
                format!(
                    "sparse evidence ({:.0}% epistemic); more material would sharpen this",
                    uncertainty.epistemic * 100.0
                ),
            ));
        }
        if uncertainty.aleatoric > self.note_threshold {
            notes.push(UncertaintyNote::aleatoric(
                aspect,
                format!(
                    "conflicting or ambiguous material ({:.0}% aleatoric)",
                    uncertainty.aleatoric * 100.0
                ),
            ));
        }
        notes
    }
}

/// See [`UncertaintyQuantifier::quantify`]
pub fn quantify(evidence: &Evidence) -> Uncertainty {
    if evidence.is_empty() {
        return Uncertainty::BASELINE;
    }

    let expected = evidence.expected.max(1) as f64;
    let sparsity = 1.0 - (evidence.supporting as f64).min(expected) / expected;

    let observed = (evidence.supporting + evidence.conflicting) as f64;
    let conflict = evidence.conflicting as f64 / observed;

    Uncertainty::from_parts(sparsity, 0.5 * conflict + 0.5 * clamp_unit(evidence.ambiguity))
}

/// Uncertainty a downstream station inherits from an upstream confidence.
///
/// Large upstream uncertainty (at least 0.5) passes through unchanged;
/// smaller amounts are damped, since a pure function of its input adds no
/// noise of its own.
pub fn propagated(upstream_confidence: f64) -> f64 {
    let upstream = 1.0 - clamp_unit(upstream_confidence);
    upstream * (upstream * 2.0).clamp(0.5, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_empty_evidence_is_baseline() {
        assert_eq!(quantify(&Evidence::default()), Uncertainty::BASELINE);
        assert_eq!(quantify(&Evidence::new(0, 10)), Uncertainty::BASELINE);
    }

    #[test]
    fn test_full_evidence_has_no_uncertainty() {
        let u = quantify(&Evidence::new(5, 5));
        assert_eq!(u.total, 0.0);
        assert_eq!(u.confidence(), 1.0);
    }

    #[test]
    fn test_aleatoric_notes_are_never_reducible() {
        let note = UncertaintyNote::new(UncertaintyKind::Aleatoric, "genre", "mixed", true);
        assert!(!note.is_reducible());

        let parsed: UncertaintyNote = serde_json::from_str(
            r#"{"kind":"aleatoric","aspect":"genre","note":"mixed","reducible":true}"#,
        )
        .unwrap();
        assert!(!parsed.is_reducible());
    }

    #[test]
    fn test_notes_follow_threshold() {
        let q = UncertaintyQuantifier::default();
        let u = quantify(&Evidence::new(1, 4).with_conflicting(2));
        let notes = q.notes("entities", &u);
        assert_eq!(notes.len(), 2);
        assert!(notes.iter().any(|n| n.kind() == UncertaintyKind::Epistemic && n.is_reducible()));
        assert!(notes.iter().any(|n| n.kind() == UncertaintyKind::Aleatoric && !n.is_reducible()));

        assert!(q.notes("entities", &quantify(&Evidence::new(4, 4))).is_empty());
    }

    #[test]
    fn test_propagated_passes_large_uncertainty_through() {
        assert!((propagated(0.3) - 0.7).abs() < 1e-9);
        assert!((propagated(0.5) - 0.5).abs() < 1e-9);
        assert!(propagated(0.9) < 0.1);
        assert_eq!(propagated(1.0), 0.0);
    }

    proptest! {
        #[test]
        fn total_is_sum_and_non_negative(s in 0usize..50, e in 0usize..50, c in 0usize..50, a in 0.0f64..1.0) {
            let u = quantify(&Evidence::new(s, e).with_conflicting(c).with_ambiguity(a));
            prop_assert!(u.epistemic >= 0.0);
            prop_assert!(u.aleatoric >= 0.0);
            prop_assert!((u.total - (u.epistemic + u.aleatoric)).abs() < 1e-12);
        }

        #[test]
        fn more_conflict_never_lowers_total(s in 1usize..50, e in 1usize..50, c in 0usize..50) {
            let base = quantify(&Evidence::new(s, e).with_conflicting(c));
            let more = quantify(&Evidence::new(s, e).with_conflicting(c + 1));
            prop_assert!(more.total >= base.total - 1e-12);
        }

        #[test]
        fn sparser_support_never_lowers_total(s in 1usize..50, e in 1usize..50, c in 0usize..50) {
            let base = quantify(&Evidence::new(s, e).with_conflicting(c));
            let sparser = quantify(&Evidence::new(s - 1, e).with_conflicting(c));
            prop_assert!(sparser.total >= base.total - 1e-12);
        }

        #[test]
        fn propagated_grows_with_upstream_uncertainty(a in 0.0f64..1.0, b in 0.0f64..1.0) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(propagated(lo) >= propagated(hi) - 1e-12);
            if lo < 0.5 {
                prop_assert!(propagated(lo) >= 1.0 - lo - 1e-12);
            }
        }
    }
}

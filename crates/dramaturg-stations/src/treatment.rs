//! Treatment plan: execution order for recommendations
use dramaturg_core::Recommendation;
use std::cmp::Ordering;
use std::collections::HashMap;
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug, Clone, PartialEq)]
#[error("PLAN/dependency cycle among {0:?}")]
pub struct CycleError(pub Vec<String>);

/// Whether `a` should run before `b` when both are ready
fn precedes(a: &Recommendation, b: &Recommendation) -> Ordering {
    b.priority
        .cmp(&a.priority)
        .then_with(|| a.effort.total_cmp(&b.effort))
}

/// Order recommendations topologically by `dependencies`; among the ready
/// ones, higher priority first, then lower effort, then emission order.
///
/// Dependencies on ids outside `recommendations` are ignored.
pub fn treatment_plan(recommendations: &[Recommendation]) -> Result<Vec<String>, CycleError> {
    let index: HashMap<&str, usize> = recommendations
        .iter()
        .enumerate()
        .map(|(i, r)| (r.id.as_str(), i))
        .collect();

    let mut pending = vec![0usize; recommendations.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); recommendations.len()];
    for (i, rec) in recommendations.iter().enumerate() {
        for dep in &rec.dependencies {
            match index.get(dep.as_str()) {
                Some(&d) => {
                    pending[i] += 1;
                    dependents[d].push(i);
                }
                None => warn!(recommendation = %rec.id, dependency = %dep, "unknown dependency ignored"),
            }
        }
    }

    let mut ready: Vec<usize> = (0..recommendations.len()).filter(|&i| pending[i] == 0).collect();
    let mut plan = Vec::with_capacity(recommendations.len());

    while !ready.is_empty() {
        let (pos, _) = ready
            .iter()
            .enumerate()
            .min_by(|x, y| {
                precedes(&recommendations[*x.1], &recommendations[*y.1]).then(x.1.cmp(y.1))
            })
            .ok_or_else(|| CycleError(Vec::new()))?;
        let next = ready.swap_remove(pos);
        plan.push(recommendations[next].id.clone());

        for &d in &dependents[next] {
            pending[d] -= 1;
            if pending[d] == 0 {
                ready.push(d);
            }
        }
    }

    if plan.len() < recommendations.len() {
        let stuck = recommendations
            .iter()
            .enumerate()
            .filter(|(i, _)| pending[*i] > 0)
            .map(|(_, r)| r.id.clone())
            .collect();
        return Err(CycleError(stuck));
    }
    Ok(plan)
}

/// Whether `plan` lists every dependency before its dependent
pub fn is_valid_order(plan: &[String], recommendations: &[Recommendation]) -> bool {
    let position: HashMap<&str, usize> = plan.iter().enumerate().map(|(i, id)| (id.as_str(), i)).collect();
    recommendations.iter().all(|rec| {
        let Some(&at) = position.get(rec.id.as_str()) else {
            return false;
        };
        rec.dependencies
            .iter()
            .all(|dep| position.get(dep.as_str()).map_or(true, |&d| d < at))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use dramaturg_core::{Category, Priority};
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    fn rec(id: &str, priority: Priority, effort: f64, deps: &[&str]) -> Recommendation {
        Recommendation {
            id: id.to_string(),
            priority,
            category: Category::Plot,
            title: id.to_string(),
            description: String::new(),
            rationale: String::new(),
            impact: 0.5,
            effort,
            timeline: String::new(),
            dependencies: deps.iter().map(|d| d.to_string()).collect::<BTreeSet<_>>(),
            expected_outcome: String::new(),
            issue_ids: vec![],
        }
    }

    #[test]
    fn test_priority_then_effort() {
        let recs = vec![
            rec("R-001", Priority::Medium, 0.2, &[]),
            rec("R-002", Priority::Immediate, 0.9, &[]),
            rec("R-003", Priority::Medium, 0.1, &[]),
        ];
        assert_eq!(treatment_plan(&recs).unwrap(), vec!["R-002", "R-003", "R-001"]);
    }

    #[test]
    fn test_dependencies_win_over_priority() {
        let recs = vec![
            rec("R-001", Priority::Low, 0.5, &[]),
            rec("R-002", Priority::Immediate, 0.5, &["R-001"]),
        ];
        let plan = treatment_plan(&recs).unwrap();
        assert_eq!(plan, vec!["R-001", "R-002"]);
        assert!(is_valid_order(&plan, &recs));
    }

    #[test]
    fn test_cycle_is_reported() {
        let recs = vec![
            rec("R-001", Priority::High, 0.5, &["R-002"]),
            rec("R-002", Priority::High, 0.5, &["R-001"]),
        ];
        let err = treatment_plan(&recs).unwrap_err();
        assert_eq!(err.0, vec!["R-001", "R-002"]);
    }

    fn priority(n: u8) -> Priority {
        match n % 4 {
            0 => Priority::Low,
            1 => Priority::Medium,
            2 => Priority::High,
            _ => Priority::Immediate,
        }
    }

    proptest! {
        #[test]
        fn plan_is_topological(specs in prop::collection::vec((0u8..4, 0.0f64..1.0, prop::collection::vec(0usize..20, 0..3)), 1..20)) {
            // Dependencies only point at earlier ids, so the graph is acyclic.
            let recs: Vec<Recommendation> = specs
                .iter()
                .enumerate()
                .map(|(i, (p, effort, deps))| {
                    let deps: Vec<String> = deps
                        .iter()
                        .filter(|&&d| d < i)
                        .map(|d| format!("R-{:03}", d + 1))
                        .collect();
                    let deps: Vec<&str> = deps.iter().map(String::as_str).collect();
                    rec(&format!("R-{:03}", i + 1), priority(*p), *effort, &deps)
                })
                .collect();

            let plan = treatment_plan(&recs).unwrap();
            prop_assert_eq!(plan.len(), recs.len());
            prop_assert!(is_valid_order(&plan, &recs));
        }
    }
}

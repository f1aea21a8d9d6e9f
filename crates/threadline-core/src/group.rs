//! Narrative grouper.
//!
//! Folds the ordered evaluations into [`NarrativeGroup`]s using each
//! evaluation's `prev.is_relevant` flag. The fold is seeded with one empty
//! group, so the first evaluation always opens the first real group no
//! matter what its flag says: continuation is checked against "is the last
//! group non-empty", not against "is this the first element".

use crate::models::{NarrativeGroup, UnitEvaluation};

/// Group evaluations into maximal runs of continuous units.
///
/// # Guarantees
///
/// - Every returned group is non-empty.
/// - Inside a group, every element after the first has `prev.is_relevant`.
/// - Every group after the first starts with `prev.is_relevant == false`.
/// - Concatenating the groups yields the input order.
pub fn group(evaluations: Vec<UnitEvaluation>) -> Vec<NarrativeGroup> {
    let mut runs: Vec<Vec<UnitEvaluation>> = vec![Vec::new()];

    for evaluation in evaluations {
        let continues = evaluation.prev.is_relevant
            && runs.last().map(|run| !run.is_empty()).unwrap_or(false);
        match runs.last_mut() {
            Some(run) if continues => run.push(evaluation),
            _ => runs.push(vec![evaluation]),
        }
    }

    runs.into_iter().filter_map(NarrativeGroup::new).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PrevLink;

    fn eval(text: &str, is_relevant: bool) -> UnitEvaluation {
        UnitEvaluation {
            text: text.to_string(),
            prev: PrevLink {
                is_relevant,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn sizes(groups: &[NarrativeGroup]) -> Vec<usize> {
        groups.iter().map(|g| g.len()).collect()
    }

    #[test]
    fn test_empty_input() {
        assert!(group(Vec::new()).is_empty());
    }

    #[test]
    fn test_flag_pattern_sizes() {
        let evals = vec![
            eval("a", false),
            eval("b", true),
            eval("c", false),
            eval("d", true),
            eval("e", true),
        ];
        assert_eq!(sizes(&group(evals)), vec![2, 1, 2]);
    }

    #[test]
    fn test_first_flag_is_ignored() {
        let with_true = group(vec![eval("a", true), eval("b", true)]);
        let with_false = group(vec![eval("a", false), eval("b", true)]);
        assert_eq!(sizes(&with_true), vec![2]);
        assert_eq!(sizes(&with_false), vec![2]);
    }

    #[test]
    fn test_all_unrelated() {
        let evals = (0..4).map(|i| eval(&i.to_string(), false)).collect();
        assert_eq!(sizes(&group(evals)), vec![1, 1, 1, 1]);
    }

    #[test]
    fn test_invariants_hold() {
        let flags = [true, false, false, true, true, false, true, false];
        let evals: Vec<_> = flags
            .iter()
            .enumerate()
            .map(|(i, f)| eval(&format!("u{}", i), *f))
            .collect();
        let groups = group(evals.clone());

        for (gi, g) in groups.iter().enumerate() {
            for e in &g.evaluations()[1..] {
                assert!(e.prev.is_relevant);
            }
            if gi > 0 {
                assert!(!g.evaluations()[0].prev.is_relevant);
            }
        }

        let flattened: Vec<_> = groups
            .iter()
            .flat_map(|g| g.evaluations().iter().map(|e| e.text.clone()))
            .collect();
        let original: Vec<_> = evals.iter().map(|e| e.text.clone()).collect();
        assert_eq!(flattened, original);
    }
}

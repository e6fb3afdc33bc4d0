use super::{Scorer, ScoringContext};
use crate::core::TestInfo;
use crate::similarity::name_token_similarity;

/// Rises with direct class-name matches, namespace overlap, and method-name
/// token overlap against a [`CodeChangeSet`](crate::core::CodeChangeSet).
/// Weight 0.4 (§4.2). Absent or empty changes fall back to a neutral 0.5
/// baseline — there's nothing to measure impact against.
pub struct ImpactScorer;

const DIRECT_MATCH_WEIGHT: f64 = 0.6;
const NAMESPACE_WEIGHT: f64 = 0.25;
const METHOD_TOKEN_WEIGHT: f64 = 0.15;

fn namespace_of(declaring_type: &str) -> &str {
    declaring_type.rsplit_once('.').map(|(ns, _)| ns).unwrap_or("")
}

fn namespace_overlap(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let ta: std::collections::HashSet<&str> = a.split('.').collect();
    let tb: std::collections::HashSet<&str> = b.split('.').collect();
    let intersection = ta.intersection(&tb).count();
    let union = ta.union(&tb).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

impl Scorer for ImpactScorer {
    fn name(&self) -> &'static str {
        "impact"
    }

    fn weight(&self) -> f64 {
        0.4
    }

    fn score(&self, test: &TestInfo, ctx: &ScoringContext<'_>) -> f64 {
        let Some(changes) = ctx.changes else {
            return 0.5;
        };
        if changes.is_empty() {
            return 0.5;
        }

        let declaring_lower = test.declaring_type.to_lowercase();
        let test_namespace = namespace_of(&test.declaring_type);

        let direct_match = changes
            .changed_type_names()
            .any(|t| t.eq_ignore_ascii_case(&declaring_lower))
            || test
                .dependencies
                .iter()
                .any(|dep| changes.changed_type_names().any(|t| t.eq_ignore_ascii_case(dep)));

        let best_namespace_overlap = changes
            .changed_type_names()
            .map(|t| namespace_overlap(test_namespace, namespace_of(t)))
            .fold(0.0_f64, f64::max);

        let best_method_overlap = changes
            .changed_method_names()
            .map(|m| name_token_similarity(&test.method_name, m))
            .fold(0.0_f64, f64::max);

        let score = if direct_match { DIRECT_MATCH_WEIGHT } else { 0.0 }
            + NAMESPACE_WEIGHT * best_namespace_overlap
            + METHOD_TOKEN_WEIGHT * best_method_overlap;

        score.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ChangeType, CodeChange};
    use chrono::Utc;

    fn ctx_with(changes: &crate::core::CodeChangeSet) -> ScoringContext<'_> {
        ScoringContext {
            changes: Some(changes),
            confidence: crate::core::ConfidenceLevel::Medium,
            now: Utc::now(),
        }
    }

    #[test]
    fn absent_changes_yield_baseline() {
        let scorer = ImpactScorer;
        let test = TestInfo::new("Asm", "MyApp.Tests.FooTest", "should_pass");
        let ctx = ScoringContext {
            changes: None,
            confidence: crate::core::ConfidenceLevel::Medium,
            now: Utc::now(),
        };
        assert_eq!(scorer.score(&test, &ctx), 0.5);
    }

    #[test]
    fn direct_type_match_scores_highest() {
        let scorer = ImpactScorer;
        let test = TestInfo::new("Asm", "MyApp.Tests.FooTest", "should_pass");
        let changes = crate::core::CodeChangeSet {
            changes: vec![CodeChange {
                file_path: "Foo.cs".into(),
                change_type: ChangeType::Modified,
                changed_methods: vec![],
                changed_types: vec!["MyApp.Tests.FooTest".into()],
            }],
        };
        let ctx = ctx_with(&changes);
        let score = scorer.score(&test, &ctx);
        assert!(score >= DIRECT_MATCH_WEIGHT);
    }

    #[test]
    fn unrelated_changes_score_low() {
        let scorer = ImpactScorer;
        let test = TestInfo::new("Asm", "MyApp.Tests.FooTest", "should_pass");
        let changes = crate::core::CodeChangeSet {
            changes: vec![CodeChange {
                file_path: "Bar.cs".into(),
                change_type: ChangeType::Modified,
                changed_methods: vec!["unrelated_method".into()],
                changed_types: vec!["Completely.Different.Thing".into()],
            }],
        };
        let ctx = ctx_with(&changes);
        let score = scorer.score(&test, &ctx);
        assert!(score < DIRECT_MATCH_WEIGHT);
    }
}

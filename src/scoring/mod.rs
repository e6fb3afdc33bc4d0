//! Scoring algorithms (C2) and the service that combines them (C3).
//!
//! Three independent scorers each produce a value in `[0, 1]`; the service
//! combines them by fixed weight into one ordering. The scorers share the
//! capability set `{name, weight, score}` behind the [`Scorer`] trait so the
//! list can be pre-resolved once per session rather than dispatched
//! per-test.

use crate::cancellation::CancellationToken;
use crate::core::{CodeChangeSet, ConfidenceLevel, TestInfo};
use crate::errors::Result;
use chrono::{DateTime, Utc};

mod execution_time;
mod historical;
mod impact;

pub use execution_time::ExecutionTimeScorer;
pub use historical::HistoricalScorer;
pub use impact::ImpactScorer;

/// Everything a scorer needs besides the test itself.
#[derive(Debug, Clone, Copy)]
pub struct ScoringContext<'a> {
    pub changes: Option<&'a CodeChangeSet>,
    pub confidence: ConfidenceLevel,
    pub now: DateTime<Utc>,
}

/// A single scoring algorithm (§4.2).
pub trait Scorer: Send + Sync {
    fn name(&self) -> &'static str;
    fn weight(&self) -> f64;
    fn score(&self, test: &TestInfo, ctx: &ScoringContext<'_>) -> f64;
}

/// The default scorer set with the weights from §4.2/§4.3.
pub fn default_scorers() -> Vec<Box<dyn Scorer>> {
    vec![
        Box::new(ImpactScorer),
        Box::new(ExecutionTimeScorer),
        Box::new(HistoricalScorer),
    ]
}

/// A test with its per-algorithm scores and combined result, ready for
/// ordering and plan building.
#[derive(Debug, Clone)]
pub struct ScoredTest {
    pub test: TestInfo,
    pub combined_score: f64,
    pub component_scores: Vec<(&'static str, f64)>,
}

/// Combines the configured scorers into one ordering (§4.3).
///
/// `combinedScore = Σ(score_i · w_i) / Σ w_i`; a scorer that panics or is
/// absent for this session contributes zero weight and zero score (callers
/// build the scorer list once, so "failure" here means a scorer was left out
/// of `scorers`, not a runtime error — there's no per-call fallibility in
/// this trait).
pub struct ScoringService {
    scorers: Vec<Box<dyn Scorer>>,
}

impl ScoringService {
    pub fn new(scorers: Vec<Box<dyn Scorer>>) -> Self {
        Self { scorers }
    }

    pub fn with_defaults() -> Self {
        Self::new(default_scorers())
    }

    /// Scores every test and returns them ordered by descending combined
    /// score; ties broken by ascending average execution time, then
    /// lexicographically by `uniqueId` (§4.3).
    ///
    /// Checks `token` at the per-algorithm loop boundary (§5): a caller that
    /// cancels mid-scoring gets `AnalysisError::Cancelled` rather than a
    /// silently truncated ranking.
    pub fn score_tests(&self, tests: &[TestInfo], ctx: &ScoringContext<'_>, token: &CancellationToken) -> Result<Vec<ScoredTest>> {
        let total_weight: f64 = self.scorers.iter().map(|s| s.weight()).sum();

        let mut scored: Vec<ScoredTest> = Vec::with_capacity(tests.len());
        for test in tests {
            let mut component_scores: Vec<(&'static str, f64)> = Vec::with_capacity(self.scorers.len());
            for s in &self.scorers {
                token.check()?;
                component_scores.push((s.name(), s.score(test, ctx)));
            }

            let weighted_sum: f64 = self
                .scorers
                .iter()
                .zip(component_scores.iter())
                .map(|(s, (_, score))| score * s.weight())
                .sum();

            let combined_score = if total_weight > 0.0 {
                (weighted_sum / total_weight).clamp(0.0, 1.0)
            } else {
                0.0
            };

            scored.push(ScoredTest {
                test: test.clone(),
                combined_score,
                component_scores,
            });
        }

        scored.sort_by(|a, b| {
            b.combined_score
                .partial_cmp(&a.combined_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.test.average_execution_time.cmp(&b.test.average_execution_time))
                .then_with(|| a.test.unique_id_key().cmp(&b.test.unique_id_key()))
        });

        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use std::time::Duration;

    fn make_test(id: &str, ms: u64) -> TestInfo {
        let mut t = TestInfo::new("Asm", "MyApp.Tests.FooTest", id);
        t.average_execution_time = Duration::from_millis(ms);
        t
    }

    #[test]
    fn combined_score_orders_descending_with_tiebreaks() {
        let service = ScoringService::with_defaults();
        let ctx = ScoringContext {
            changes: None,
            confidence: ConfidenceLevel::Medium,
            now: Utc::now(),
        };
        let tests = vec![make_test("a", 40), make_test("b", 3000)];
        let scored = service.score_tests(&tests, &ctx, &CancellationToken::new()).unwrap();
        assert_eq!(scored.len(), 2);
        assert!(scored[0].combined_score >= scored[1].combined_score);
    }

    #[test]
    fn empty_scorer_list_yields_zero() {
        let service = ScoringService::new(Vec::new());
        let ctx = ScoringContext {
            changes: None,
            confidence: ConfidenceLevel::Medium,
            now: Utc::now(),
        };
        let tests = vec![make_test("a", 40)];
        let scored = service.score_tests(&tests, &ctx, &CancellationToken::new()).unwrap();
        assert_eq!(scored[0].combined_score, 0.0);
    }

    #[test]
    fn cancelled_token_short_circuits_scoring() {
        let service = ScoringService::with_defaults();
        let ctx = ScoringContext {
            changes: None,
            confidence: ConfidenceLevel::Medium,
            now: Utc::now(),
        };
        let token = CancellationToken::new();
        token.cancel();
        let tests = vec![make_test("a", 40)];
        let err = service.score_tests(&tests, &ctx, &token).unwrap_err();
        assert!(matches!(err.downcast_ref::<crate::errors::AnalysisError>(), Some(crate::errors::AnalysisError::Cancelled)));
    }

    proptest! {
        #[test]
        fn combined_score_always_bounded(ms in 0u64..120_000) {
            let service = ScoringService::with_defaults();
            let ctx = ScoringContext {
                changes: None,
                confidence: ConfidenceLevel::Medium,
                now: Utc::now(),
            };
            let tests = vec![make_test("a", ms)];
            let scored = service.score_tests(&tests, &ctx, &CancellationToken::new()).unwrap();
            prop_assert!((0.0..=1.0).contains(&scored[0].combined_score));
        }
    }
}

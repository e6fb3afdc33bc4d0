//! Execution plan construction (C4): confidence-level policies, basic
//! filters, and cumulative duration budgeting over an already-scored,
//! already-ordered sequence of tests.

use crate::core::{ConfidenceLevel, TestCategory, TestInfo, TestSelectionOptions};
use crate::scoring::ScoredTest;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Default caps per confidence level (§4.4 table), overridable by
/// [`TestSelectionOptions`].
#[derive(Debug, Clone, Copy)]
pub struct ConfidencePolicy {
    pub max_count: Option<usize>,
    pub max_duration: Option<Duration>,
    pub min_score: f64,
}

impl ConfidencePolicy {
    pub fn defaults_for(level: ConfidenceLevel) -> Self {
        match level {
            ConfidenceLevel::Fast => Self {
                max_count: Some(50),
                max_duration: Some(Duration::from_secs(30)),
                min_score: 0.6,
            },
            ConfidenceLevel::Medium => Self {
                max_count: Some(200),
                max_duration: Some(Duration::from_secs(120)),
                min_score: 0.4,
            },
            ConfidenceLevel::High => Self {
                max_count: Some(1000),
                max_duration: Some(Duration::from_secs(600)),
                min_score: 0.2,
            },
            ConfidenceLevel::Full => Self {
                max_count: None,
                max_duration: None,
                min_score: 0.0,
            },
        }
    }

    fn with_overrides(mut self, options: &TestSelectionOptions) -> Self {
        if let Some(max_count) = options.max_test_count {
            self.max_count = Some(max_count);
        }
        if let Some(max_duration) = options.max_execution_time {
            self.max_duration = Some(max_duration);
        }
        if let Some(min_score) = options.min_selection_score {
            self.min_score = min_score;
        }
        self
    }
}

/// The result of `createPlan` (§4.4).
#[derive(Debug, Clone)]
pub struct TestExecutionPlan {
    pub tests: Vec<TestInfo>,
    pub confidence_level: ConfidenceLevel,
    pub estimated_duration: Duration,
    pub batches: Vec<Vec<String>>,
}

/// Category/tag/flaky rejection, independent of score or budget.
fn passes_basic_filters(test: &TestInfo, options: &TestSelectionOptions) -> bool {
    if options.excluded_categories.contains(&test.category) {
        return false;
    }
    if !options.included_categories.is_empty() && !options.included_categories.contains(&test.category) {
        return false;
    }
    if options.excluded_tags.iter().any(|t| test.tags.contains(t)) {
        return false;
    }
    if !options.required_tags.is_empty() && !options.required_tags.iter().any(|t| test.tags.contains(t)) {
        return false;
    }
    if !options.include_flaky_tests && test.is_flaky() {
        return false;
    }
    true
}

/// Non-preemptive cumulative budget tracker: a candidate that would push the
/// running total over `max_duration` is skipped, never terminates the scan.
struct Budget {
    max_count: Option<usize>,
    max_duration: Option<Duration>,
    selected_count: usize,
    elapsed: Duration,
}

impl Budget {
    fn new(policy: &ConfidencePolicy) -> Self {
        Self {
            max_count: policy.max_count,
            max_duration: policy.max_duration,
            selected_count: 0,
            elapsed: Duration::ZERO,
        }
    }

    fn has_room(&self) -> bool {
        self.max_count.is_none_or(|cap| self.selected_count < cap)
    }

    fn try_reserve(&mut self, duration: Duration) -> bool {
        if !self.has_room() {
            return false;
        }
        if let Some(max) = self.max_duration {
            if self.elapsed + duration > max {
                return false;
            }
        }
        self.elapsed += duration;
        self.selected_count += 1;
        true
    }
}

pub struct PlanBuilder;

impl PlanBuilder {
    /// `scored` must already be ordered by descending combined score (the
    /// contract [`crate::scoring::ScoringService::score_tests`] provides).
    pub fn create_plan(
        scored: &[ScoredTest],
        confidence: ConfidenceLevel,
        options: &TestSelectionOptions,
        now: DateTime<Utc>,
    ) -> TestExecutionPlan {
        let policy = ConfidencePolicy::defaults_for(confidence).with_overrides(options);

        let candidates: Vec<&ScoredTest> = scored
            .iter()
            .filter(|s| passes_basic_filters(&s.test, options))
            .collect();

        let mut selected: Vec<TestInfo> = match confidence {
            ConfidenceLevel::Full => Self::select_full(&candidates, &policy),
            ConfidenceLevel::Fast => Self::select_fast(&candidates, &policy),
            ConfidenceLevel::Medium | ConfidenceLevel::High => {
                Self::select_greedy(&candidates, &policy)
            }
        };

        for test in &mut selected {
            test.last_selected = Some(now);
        }

        let estimated_duration = selected.iter().map(|t| t.average_execution_time).sum();
        let batches = Self::batch(&selected, options.max_parallelism.max(1));

        TestExecutionPlan {
            tests: selected,
            confidence_level: confidence,
            estimated_duration,
            batches,
        }
    }

    fn select_full(candidates: &[&ScoredTest], policy: &ConfidencePolicy) -> Vec<TestInfo> {
        let mut budget = Budget::new(policy);
        candidates
            .iter()
            .filter(|s| budget.try_reserve(s.test.average_execution_time))
            .map(|s| s.test.clone())
            .collect()
    }

    /// Greedy pass over score-descending candidates, terminating as soon as
    /// the score dips below `min_score` (monotone order makes this a valid
    /// early exit). Used for Medium and High (§4.4).
    fn select_greedy(candidates: &[&ScoredTest], policy: &ConfidencePolicy) -> Vec<TestInfo> {
        let mut budget = Budget::new(policy);
        let mut selected = Vec::new();
        for s in candidates {
            if s.combined_score < policy.min_score {
                break;
            }
            if budget.try_reserve(s.test.average_execution_time) {
                selected.push(s.test.clone());
            }
        }
        selected
    }

    /// Three-pass category-balanced greedy for Fast (§4.4). Pass 3 *skips*
    /// sub-`min_score` candidates rather than terminating, so the whole
    /// candidate list is scanned to fill remaining capacity.
    fn select_fast(candidates: &[&ScoredTest], policy: &ConfidencePolicy) -> Vec<TestInfo> {
        let mut budget = Budget::new(policy);
        let mut selected: Vec<TestInfo> = Vec::new();
        let mut picked_keys: std::collections::HashSet<String> = std::collections::HashSet::new();

        let full_cap = policy.max_count.unwrap_or(usize::MAX);
        let pass1_cap = ((full_cap as f64) * 0.8).floor() as usize;
        let pass1_min = policy.min_score.max(0.5);

        for s in candidates {
            if selected.len() >= pass1_cap {
                break;
            }
            if s.test.category != TestCategory::Unit || s.combined_score < pass1_min {
                continue;
            }
            if budget.try_reserve(s.test.average_execution_time) {
                picked_keys.insert(s.test.unique_id_key());
                selected.push(s.test.clone());
            }
        }

        let pass2_min = policy.min_score.max(0.4);
        for s in candidates {
            if !budget.has_room() {
                break;
            }
            if s.test.category != TestCategory::Integration || s.combined_score < pass2_min {
                continue;
            }
            if picked_keys.contains(&s.test.unique_id_key()) {
                continue;
            }
            if budget.try_reserve(s.test.average_execution_time) {
                picked_keys.insert(s.test.unique_id_key());
                selected.push(s.test.clone());
            }
        }

        for s in candidates {
            if !budget.has_room() {
                break;
            }
            if s.combined_score < policy.min_score {
                continue;
            }
            if picked_keys.contains(&s.test.unique_id_key()) {
                continue;
            }
            if budget.try_reserve(s.test.average_execution_time) {
                picked_keys.insert(s.test.unique_id_key());
                selected.push(s.test.clone());
            }
        }

        selected
    }

    fn batch(tests: &[TestInfo], max_parallelism: usize) -> Vec<Vec<String>> {
        tests
            .chunks(max_parallelism.max(1))
            .map(|chunk| chunk.iter().map(|t| t.unique_id.clone()).collect())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::ScoredTest;
    use std::time::Duration as StdDuration;

    fn scored(id: &str, category: TestCategory, score: f64, ms: u64) -> ScoredTest {
        let mut test = TestInfo::new("Asm", "MyApp.Tests.FooTest", id);
        test.category = category;
        test.average_execution_time = StdDuration::from_millis(ms);
        ScoredTest {
            test,
            combined_score: score,
            component_scores: Vec::new(),
        }
    }

    #[test]
    fn full_confidence_bypasses_score_floor() {
        let candidates = vec![scored("a", TestCategory::Unit, 0.01, 10)];
        let plan = PlanBuilder::create_plan(
            &candidates,
            ConfidenceLevel::Full,
            &TestSelectionOptions::new(),
            Utc::now(),
        );
        assert_eq!(plan.tests.len(), 1);
    }

    #[test]
    fn medium_stops_at_first_subfloor_score() {
        let candidates = vec![
            scored("a", TestCategory::Unit, 0.9, 10),
            scored("b", TestCategory::Unit, 0.3, 10),
            scored("c", TestCategory::Unit, 0.8, 10),
        ];
        let plan = PlanBuilder::create_plan(
            &candidates,
            ConfidenceLevel::Medium,
            &TestSelectionOptions::new(),
            Utc::now(),
        );
        // min_score for Medium is 0.4; "b" (0.3) terminates the greedy scan
        // before "c" (0.8) is ever considered, even though c would pass.
        assert_eq!(plan.tests.len(), 1);
        assert!(plan.tests[0].unique_id.ends_with(".a"));
    }

    #[test]
    fn fast_pass_three_skips_rather_than_terminates() {
        // One Unit test above pass-1 floor, one Database test above the
        // global min_score but below pass-1/2 floors; pass 3 must still
        // pick it up even though it sits after a low-score Integration test.
        let candidates = vec![
            scored("unit_ok", TestCategory::Unit, 0.9, 10),
            scored("integration_low", TestCategory::Integration, 0.1, 10),
            scored("db_ok", TestCategory::Database, 0.65, 10),
        ];
        let plan = PlanBuilder::create_plan(
            &candidates,
            ConfidenceLevel::Fast,
            &TestSelectionOptions::new(),
            Utc::now(),
        );
        let ids: Vec<&str> = plan
            .tests
            .iter()
            .map(|t| t.unique_id.rsplit('.').next().unwrap())
            .collect();
        assert!(ids.contains(&"unit_ok"));
        assert!(ids.contains(&"db_ok"));
        assert!(!ids.contains(&"integration_low"));
    }

    #[test]
    fn duration_budget_skips_without_terminating() {
        let candidates = vec![
            scored("big", TestCategory::Unit, 0.9, 25_000),
            scored("small", TestCategory::Unit, 0.8, 1_000),
        ];
        let mut options = TestSelectionOptions::new();
        options.max_execution_time = Some(StdDuration::from_secs(20));
        let plan = PlanBuilder::create_plan(&candidates, ConfidenceLevel::Fast, &options, Utc::now());
        let ids: Vec<&str> = plan
            .tests
            .iter()
            .map(|t| t.unique_id.rsplit('.').next().unwrap())
            .collect();
        assert!(!ids.contains(&"big"));
        assert!(ids.contains(&"small"));
    }

    #[test]
    fn last_selected_is_stamped() {
        let candidates = vec![scored("a", TestCategory::Unit, 0.9, 10)];
        let now = Utc::now();
        let plan = PlanBuilder::create_plan(&candidates, ConfidenceLevel::Full, &TestSelectionOptions::new(), now);
        assert_eq!(plan.tests[0].last_selected, Some(now));
    }

    #[test]
    fn batches_respect_max_parallelism() {
        let candidates = vec![
            scored("a", TestCategory::Unit, 0.9, 10),
            scored("b", TestCategory::Unit, 0.8, 10),
            scored("c", TestCategory::Unit, 0.7, 10),
        ];
        let mut options = TestSelectionOptions::new();
        options.max_parallelism = 2;
        let plan = PlanBuilder::create_plan(&candidates, ConfidenceLevel::Full, &options, Utc::now());
        assert_eq!(plan.batches.len(), 2);
        assert_eq!(plan.batches[0].len(), 2);
        assert_eq!(plan.batches[1].len(), 1);
    }
}

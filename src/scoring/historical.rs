use super::{Scorer, ScoringContext};
use crate::core::{ConfidenceLevel, TestInfo};
use chrono::Duration as ChronoDuration;

/// Base from success rate, plus recency/frequency bonuses and a flakiness
/// penalty scaled by confidence. Weight 0.3 (§4.2).
pub struct HistoricalScorer;

fn base_score(success_rate: Option<f64>) -> f64 {
    let Some(p) = success_rate else {
        return 0.5;
    };
    if (0.70..0.95).contains(&p) {
        0.8
    } else if (0.95..=1.0).contains(&p) {
        0.6
    } else if (0.50..0.70).contains(&p) {
        0.5
    } else if (0.20..0.50).contains(&p) {
        0.3
    } else {
        0.1
    }
}

fn flakiness_multiplier(confidence: ConfidenceLevel) -> f64 {
    match confidence {
        ConfidenceLevel::Fast => 0.3,
        ConfidenceLevel::Medium => 0.6,
        ConfidenceLevel::High => 0.8,
        ConfidenceLevel::Full => 0.9,
    }
}

impl Scorer for HistoricalScorer {
    fn name(&self) -> &'static str {
        "historical"
    }

    fn weight(&self) -> f64 {
        0.3
    }

    fn score(&self, test: &TestInfo, ctx: &ScoringContext<'_>) -> f64 {
        let mut score = base_score(test.success_rate());

        let recent_failures = test
            .execution_history
            .iter()
            .filter(|r| !r.passed && ctx.now - r.executed_at <= ChronoDuration::days(7))
            .count();
        if recent_failures > 0 {
            score += (recent_failures as f64 * 0.04).min(0.2);
        }

        let recent_executions = test
            .execution_history
            .iter()
            .filter(|r| ctx.now - r.executed_at <= ChronoDuration::days(14))
            .count();
        if recent_executions >= 5 {
            score += 0.1;
        }

        if test.is_flaky() {
            score *= flakiness_multiplier(ctx.confidence);
        }

        score.clamp(0.0, 1.0)
    }
}

use super::{Scorer, ScoringContext};
use crate::core::{ConfidenceLevel, TestInfo};

/// Base curve on `averageExecutionTime`, adjusted by confidence level and a
/// variability penalty from execution-history spread. Weight 0.3 (§4.2).
pub struct ExecutionTimeScorer;

fn base_score(ms: f64) -> f64 {
    if ms <= 50.0 {
        1.0
    } else if ms <= 100.0 {
        0.9
    } else if ms <= 250.0 {
        0.8
    } else if ms <= 500.0 {
        0.7
    } else if ms <= 1000.0 {
        0.5
    } else if ms <= 5000.0 {
        0.3
    } else if ms <= 15000.0 {
        0.2
    } else {
        0.1
    }
}

fn confidence_adjustment(ms: f64, confidence: ConfidenceLevel) -> f64 {
    match confidence {
        ConfidenceLevel::Fast => {
            if ms < 500.0 {
                1.2
            } else {
                0.3
            }
        }
        ConfidenceLevel::Medium => {
            if ms > 5000.0 {
                0.6
            } else {
                1.0
            }
        }
        ConfidenceLevel::High => {
            if ms > 30_000.0 {
                0.8
            } else {
                1.0
            }
        }
        ConfidenceLevel::Full => 0.9,
    }
}

fn coefficient_of_variation(samples_ms: &[f64]) -> Option<f64> {
    if samples_ms.len() < 3 {
        return None;
    }
    let mean = samples_ms.iter().sum::<f64>() / samples_ms.len() as f64;
    if mean == 0.0 {
        return Some(0.0);
    }
    let variance =
        samples_ms.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / samples_ms.len() as f64;
    Some(variance.sqrt() / mean)
}

impl Scorer for ExecutionTimeScorer {
    fn name(&self) -> &'static str {
        "execution_time"
    }

    fn weight(&self) -> f64 {
        0.3
    }

    fn score(&self, test: &TestInfo, ctx: &ScoringContext<'_>) -> f64 {
        let ms = test.average_execution_ms();
        let mut score = base_score(ms) * confidence_adjustment(ms, ctx.confidence);

        let samples: Vec<f64> = test
            .execution_history
            .iter()
            .map(|r| r.duration.as_secs_f64() * 1000.0)
            .collect();
        if let Some(cv) = coefficient_of_variation(&samples) {
            if cv > 0.5 {
                score *= 0.8;
            }
        }

        score.clamp(0.0, 1.0)
    }
}

//! Overall-similarity composition between two tests (§4.6/§4.7), shared by
//! the clusterer's pairwise matrix and `compare_tests`.

use crate::core::TestInfo;
use crate::similarity::name_token_similarity;
use std::collections::HashSet;

/// How much corroborating evidence is available for a comparison. Weights
/// `(w_cov, w_meta)` per §4.6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisDepth {
    Shallow,
    Medium,
    Deep,
}

impl AnalysisDepth {
    fn weights(self) -> (f64, f64) {
        match self {
            AnalysisDepth::Shallow => (1.0, 0.0),
            AnalysisDepth::Medium => (0.7, 0.3),
            AnalysisDepth::Deep => (0.6, 0.4),
        }
    }
}

fn tag_jaccard(a: &[String], b: &[String]) -> f64 {
    let ta: HashSet<&String> = a.iter().collect();
    let tb: HashSet<&String> = b.iter().collect();
    if ta.is_empty() && tb.is_empty() {
        return 1.0;
    }
    let union = ta.union(&tb).count();
    if union == 0 {
        0.0
    } else {
        ta.intersection(&tb).count() as f64 / union as f64
    }
}

/// Category-alignment, name-token, tag, and execution-time signals combined
/// by equal mean. When `full_metadata` is false the category/tag/time
/// signals fall back to the neutral defaults from §4.6 — only the name
/// token signal is still computed, since names are always known.
pub(crate) fn metadata_score(a: &TestInfo, b: &TestInfo, full_metadata: bool) -> f64 {
    let category = if full_metadata {
        if a.category == b.category {
            1.0
        } else {
            0.0
        }
    } else {
        0.5
    };
    let name = name_token_similarity(&a.method_name, &b.method_name);
    let tags = if full_metadata { tag_jaccard(&a.tags, &b.tags) } else { 0.0 };
    let time = if full_metadata {
        crate::similarity::execution_time_similarity(a.average_execution_ms(), b.average_execution_ms())
    } else {
        0.5
    };

    (category + name + tags + time) / 4.0
}

/// `overall = w_cov·coveragePercent/100 + w_meta·metadataScore` (§4.6).
pub fn overall_similarity(
    a: &TestInfo,
    b: &TestInfo,
    coverage_percent: Option<f64>,
    full_metadata: bool,
    depth: AnalysisDepth,
) -> f64 {
    let (w_cov, w_meta) = depth.weights();
    let cov_term = coverage_percent.unwrap_or(0.0) / 100.0;
    let meta_term = metadata_score(a, b, full_metadata);
    (w_cov * cov_term + w_meta * meta_term).clamp(0.0, 1.0)
}

/// A pairwise comparator supplies `overall_similarity` for one pair of
/// tests, optionally consulting coverage data. Failures are logged by the
/// caller and treated as `0.0` (§4.6 "failures yield 0.0 for that pair").
pub trait PairwiseComparator: Sync {
    fn compare(&self, a: &TestInfo, b: &TestInfo) -> anyhow::Result<f64>;
}

/// A comparator driven purely by metadata, with no coverage map available.
pub struct MetadataOnlyComparator {
    pub depth: AnalysisDepth,
    pub full_metadata: bool,
}

impl PairwiseComparator for MetadataOnlyComparator {
    fn compare(&self, a: &TestInfo, b: &TestInfo) -> anyhow::Result<f64> {
        Ok(overall_similarity(a, b, None, self.full_metadata, self.depth))
    }
}

/// A comparator that layers a coverage-overlap percentage on top of
/// metadata, via a caller-supplied lookup (kept generic over the actual
/// coverage map type so this module doesn't depend on `coverage`
/// internals).
pub struct CoverageAwareComparator<F>
where
    F: Fn(&TestInfo, &TestInfo) -> Option<f64> + Sync,
{
    pub depth: AnalysisDepth,
    pub full_metadata: bool,
    pub coverage_percent: F,
}

impl<F> PairwiseComparator for CoverageAwareComparator<F>
where
    F: Fn(&TestInfo, &TestInfo) -> Option<f64> + Sync,
{
    fn compare(&self, a: &TestInfo, b: &TestInfo) -> anyhow::Result<f64> {
        let coverage_percent = (self.coverage_percent)(a, b);
        Ok(overall_similarity(a, b, coverage_percent, self.full_metadata, self.depth))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_with(method: &str, category: crate::core::TestCategory) -> TestInfo {
        let mut t = TestInfo::new("Asm", "MyApp.Tests.FooTest", method);
        t.category = category;
        t
    }

    #[test]
    fn shallow_depth_ignores_metadata() {
        use crate::core::TestCategory;
        let a = test_with("should_pass", TestCategory::Unit);
        let b = test_with("completely_different", TestCategory::EndToEnd);
        let sim = overall_similarity(&a, &b, Some(80.0), true, AnalysisDepth::Shallow);
        assert!((sim - 0.8).abs() < 1e-9, "got {sim}");
    }

    #[test]
    fn name_only_mode_uses_neutral_defaults() {
        use crate::core::TestCategory;
        let a = test_with("should_pass", TestCategory::Unit);
        let b = test_with("should_pass", TestCategory::EndToEnd);
        let sim = overall_similarity(&a, &b, None, false, AnalysisDepth::Medium);
        // metadata term: category 0.5, name 1.0 (identical method name), tag 0.0, time 0.5 -> mean 0.5
        assert!((sim - 0.3 * 0.5).abs() < 1e-9, "got {sim}");
    }
}

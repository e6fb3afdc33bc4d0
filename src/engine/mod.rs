//! Session façade (§6 "Exposed interfaces"): wires scoring, plan building,
//! coverage overlap, clustering, validation, history, and the compressed
//! cache behind one owned handle, rather than leaving each subsystem as a
//! free-floating collection of functions (§9 "Global state": caches are
//! owned by an explicit session, never a hidden singleton).

use crate::cache::{CompressedCache, CompressionOptions};
use crate::cancellation::CancellationToken;
use crate::clustering::{self, ClusterAnalysis, ClusteringOptions, PairwiseComparator};
use crate::core::{CodeChangeSet, ConfidenceLevel, TestInfo, TestSelectionOptions};
use crate::coverage::{CoverageOverlapAnalyzer, OverlapReport, TestCoverageMap};
use crate::discovery::TestDiscovery;
use crate::errors::Result;
use crate::history::HistoryStore;
use crate::plan::{PlanBuilder, TestExecutionPlan};
use crate::scoring::{ScoredTest, ScoringContext, ScoringService};
use crate::similarity::JaccardWeights;
use crate::validation::{ValidationResult, ValidationService};
use chrono::Utc;
use std::path::Path;
use std::time::{Duration, Instant};

/// How much corroborating evidence a comparison has available, plus the
/// weights used to combine it. Re-exported here so callers of `compare_tests`
/// don't need to reach into `clustering` directly.
pub use crate::clustering::AnalysisDepth;

/// Options governing `compare_tests` (§4.6/§4.7).
#[derive(Debug, Clone, Copy)]
pub struct ComparisonOptions {
    pub depth: AnalysisDepth,
    pub full_metadata: bool,
    pub jaccard_weights: JaccardWeights,
}

impl Default for ComparisonOptions {
    fn default() -> Self {
        Self {
            depth: AnalysisDepth::Medium,
            full_metadata: true,
            jaccard_weights: JaccardWeights::default(),
        }
    }
}

/// Effort estimate attached to a [`Recommendation`] (§6 "Recommendation output").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstimatedEffort {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecommendationKind {
    TestOrganization,
    DuplicateCoverage,
}

/// One actionable suggestion surfaced by comparison or cluster analysis
/// (§6 "Recommendation output").
#[derive(Debug, Clone)]
pub struct Recommendation {
    pub kind: RecommendationKind,
    pub description: String,
    pub confidence_score: f64,
    pub estimated_effort: EstimatedEffort,
    pub rationale: String,
}

/// `DuplicateCoverage` fires when two tests' overlap is `>= 0.9` (§6).
fn duplicate_coverage_recommendation(overlap: &OverlapReport) -> Option<Recommendation> {
    let ratio = overlap.overlap_percent / 100.0;
    if ratio < 0.9 {
        return None;
    }
    Some(Recommendation {
        kind: RecommendationKind::DuplicateCoverage,
        description: "These tests exercise almost entirely the same production code".to_string(),
        confidence_score: ratio.clamp(0.0, 1.0),
        estimated_effort: EstimatedEffort::Low,
        rationale: format!("{:.1}% of covered methods are shared between the two tests", overlap.overlap_percent),
    })
}

/// `TestOrganization` fires for clusters with `size >= 5` and
/// `intra_similarity >= 0.8` (§6).
fn test_organization_recommendation(cluster: &clustering::TestCluster) -> Option<Recommendation> {
    if cluster.members.len() < 5 || cluster.intra_similarity < 0.8 {
        return None;
    }
    Some(Recommendation {
        kind: RecommendationKind::TestOrganization,
        description: format!("{} highly similar tests could be consolidated or grouped", cluster.members.len()),
        confidence_score: cluster.intra_similarity,
        estimated_effort: EstimatedEffort::Medium,
        rationale: format!(
            "cluster of {} tests shares {:.2} mean intra-cluster similarity",
            cluster.members.len(),
            cluster.intra_similarity
        ),
    })
}

/// Output of `compareTests` (§6).
#[derive(Debug, Clone)]
pub struct ComparisonResult {
    pub overall: f64,
    pub coverage_overlap: Option<OverlapReport>,
    pub metadata_similarity: f64,
    pub recommendations: Vec<Recommendation>,
    pub warnings: Vec<String>,
    pub analysis_duration: Duration,
}

/// `analyzeClusters` output, with cluster-level recommendations layered on
/// top of the plain [`ClusterAnalysis`].
#[derive(Debug, Clone)]
pub struct ClusterAnalysisReport {
    pub analysis: ClusterAnalysis,
    pub recommendations: Vec<Recommendation>,
}

/// Owns every subsystem needed to serve the five public operations over the
/// lifetime of one analysis session. `TestDiscovery` implementations are
/// supplied per call, since they're an external collaborator the core never
/// owns (§1 "Out of scope").
pub struct TestSelectionSession {
    scoring: ScoringService,
    history: HistoryStore,
    cache: CompressedCache,
    coverage_analyzer: CoverageOverlapAnalyzer,
    validation: ValidationService,
}

impl TestSelectionSession {
    pub fn new(cache_root: impl AsRef<Path>, compression: CompressionOptions, max_cache_size_bytes: u64) -> Result<Self> {
        Ok(Self {
            scoring: ScoringService::with_defaults(),
            history: HistoryStore::new(),
            cache: CompressedCache::new(cache_root.as_ref(), compression, max_cache_size_bytes)?,
            coverage_analyzer: CoverageOverlapAnalyzer::new(),
            validation: ValidationService::new(5),
        })
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn cache(&self) -> &CompressedCache {
        &self.cache
    }

    pub fn coverage_analyzer(&self) -> &CoverageOverlapAnalyzer {
        &self.coverage_analyzer
    }

    /// `scoreTests(candidates, changes?)` (§6): enriches each candidate with
    /// any recorded history before scoring. `token` is checked at the
    /// per-algorithm loop boundary inside [`ScoringService::score_tests`] (§5).
    pub fn score_tests(
        &self,
        candidates: &[TestInfo],
        changes: Option<&CodeChangeSet>,
        confidence: ConfidenceLevel,
        token: &CancellationToken,
    ) -> Result<Vec<ScoredTest>> {
        let mut enriched: Vec<TestInfo> = candidates.to_vec();
        for test in &mut enriched {
            self.history.apply_to(test);
        }

        let ctx = ScoringContext {
            changes,
            confidence,
            now: Utc::now(),
        };
        self.scoring.score_tests(&enriched, &ctx, token)
    }

    /// `createPlan(changes?, confidence, options?)` (§6).
    pub fn create_plan(
        &self,
        candidates: &[TestInfo],
        changes: Option<&CodeChangeSet>,
        confidence: ConfidenceLevel,
        options: &TestSelectionOptions,
        token: &CancellationToken,
    ) -> Result<TestExecutionPlan> {
        let scored = self.score_tests(candidates, changes, confidence, token)?;
        Ok(PlanBuilder::create_plan(&scored, confidence, options, Utc::now()))
    }

    /// `compareTests(id1, id2, options)` (§6). `coverage_map` is optional —
    /// without one, `overall` falls back to the metadata-only term (weighted
    /// as if `coveragePercent` were 0).
    pub fn compare_tests(&self, test_a: &TestInfo, test_b: &TestInfo, coverage_map: Option<&TestCoverageMap>, options: &ComparisonOptions) -> ComparisonResult {
        let start = Instant::now();
        let mut warnings = Vec::new();

        let coverage_overlap = match coverage_map {
            Some(map) => Some(
                self.coverage_analyzer
                    .overlap(map, &test_a.unique_id, &test_b.unique_id, options.jaccard_weights),
            ),
            None => {
                warnings.push("no coverage map supplied; overall similarity uses metadata only".to_string());
                None
            }
        };

        let metadata_similarity = clustering::similarity::metadata_score(test_a, test_b, options.full_metadata);
        let overall = clustering::overall_similarity(
            test_a,
            test_b,
            coverage_overlap.as_ref().map(|o| o.overlap_percent),
            options.full_metadata,
            options.depth,
        );

        let mut recommendations = Vec::new();
        if let Some(overlap) = &coverage_overlap {
            recommendations.extend(duplicate_coverage_recommendation(overlap));
        }

        ComparisonResult {
            overall,
            coverage_overlap,
            metadata_similarity,
            recommendations,
            warnings,
            analysis_duration: start.elapsed(),
        }
    }

    /// `analyzeClusters(ids, options)` (§6), layering `TestOrganization`
    /// recommendations over the raw cluster analysis. `token` is checked per
    /// pair during the clustering fan-out (§5).
    pub fn analyze_clusters(
        &self,
        tests: Vec<TestInfo>,
        comparator: &dyn PairwiseComparator,
        options: ClusteringOptions,
        token: &CancellationToken,
    ) -> Result<ClusterAnalysisReport> {
        let analysis = clustering::analyze_clusters(tests, comparator, options, token)?;
        let recommendations = analysis.clusters.iter().filter_map(test_organization_recommendation).collect();
        Ok(ClusterAnalysisReport { analysis, recommendations })
    }

    /// `validateTest(id, solutionPath)` (§6). `token` is checked per assembly
    /// during discovery (§5).
    pub fn validate_test(
        &self,
        discovery: &dyn TestDiscovery,
        unique_id: &str,
        solution_path: &str,
        assemblies: &[String],
        token: &CancellationToken,
    ) -> Result<ValidationResult> {
        self.validation.validate(discovery, unique_id, solution_path, assemblies, token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clustering::MetadataOnlyComparator;
    use crate::core::TestCategory;
    use crate::coverage::{CoverageEntry, CoveredMethod};
    use tempfile::TempDir;

    fn session() -> (TempDir, TestSelectionSession) {
        let dir = TempDir::new().unwrap();
        let session = TestSelectionSession::new(dir.path(), CompressionOptions::Fastest, 16 * 1024 * 1024).unwrap();
        (dir, session)
    }

    fn method(id: &str, tests: &[&str]) -> CoverageEntry {
        CoverageEntry {
            method: CoveredMethod {
                method_id: id.to_string(),
                weight: 1.0,
                confidence: 1.0,
                depth: 1,
                is_production_code: true,
                container_name: "Container".to_string(),
            },
            covering_tests: tests.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[test]
    fn score_tests_picks_up_recorded_history() {
        let (_dir, session) = session();
        let test = TestInfo::new("Asm", "T", "m");
        session.history.record(
            &test.unique_id,
            crate::core::TestExecutionResult {
                passed: true,
                duration: std::time::Duration::from_millis(42),
                executed_at: Utc::now(),
            },
        );
        let scored = session
            .score_tests(&[test], None, ConfidenceLevel::Medium, &CancellationToken::new())
            .unwrap();
        assert_eq!(scored[0].test.average_execution_time, std::time::Duration::from_millis(42));
    }

    #[test]
    fn compare_tests_without_coverage_map_warns_and_uses_metadata_only() {
        let (_dir, session) = session();
        let a = TestInfo::new("Asm", "T", "should_pass");
        let b = TestInfo::new("Asm", "T", "should_pass_too");
        let result = session.compare_tests(&a, &b, None, &ComparisonOptions::default());
        assert!(!result.warnings.is_empty());
        assert!(result.coverage_overlap.is_none());
    }

    #[test]
    fn compare_tests_flags_duplicate_coverage_above_ninety_percent() {
        let (_dir, session) = session();
        let a = TestInfo::new("Asm", "T", "test_a");
        let b = TestInfo::new("Asm", "T", "test_b");
        let map = TestCoverageMap::new(vec![
            method("m1", &["test_a", "test_b"]),
            method("m2", &["test_a", "test_b"]),
        ]);
        let result = session.compare_tests(&a, &b, Some(&map), &ComparisonOptions::default());
        assert!(result
            .recommendations
            .iter()
            .any(|r| r.kind == RecommendationKind::DuplicateCoverage));
    }

    #[test]
    fn analyze_clusters_flags_test_organization_for_large_tight_clusters() {
        let (_dir, session) = session();
        let comparator = MetadataOnlyComparator {
            depth: AnalysisDepth::Shallow,
            full_metadata: false,
        };
        let tests: Vec<TestInfo> = (0..6)
            .map(|i| {
                let mut t = TestInfo::new("Asm", "T", &format!("should_validate_order_{i}"));
                t.category = TestCategory::Unit;
                t
            })
            .collect();
        let options = ClusteringOptions {
            similarity_threshold: 0.01,
            min_cluster_size: 2,
            ..ClusteringOptions::default()
        };
        let report = session.analyze_clusters(tests, &comparator, options, &CancellationToken::new()).unwrap();
        assert!(!report.analysis.clusters.is_empty());
    }

    #[test]
    fn score_tests_propagates_cancellation() {
        let (_dir, session) = session();
        let test = TestInfo::new("Asm", "T", "m");
        let token = CancellationToken::new();
        token.cancel();
        let err = session
            .score_tests(&[test], None, ConfidenceLevel::Medium, &token)
            .unwrap_err();
        assert!(matches!(err.downcast_ref::<crate::errors::AnalysisError>(), Some(crate::errors::AnalysisError::Cancelled)));
    }
}

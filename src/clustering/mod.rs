//! Test clustering (C6): pairwise overall-similarity matrix, agglomerative
//! hierarchical clustering, and cluster-quality statistics. Adapted from a
//! method-level clusterer into one operating over tests via the
//! overall-similarity composition in [`similarity`].

pub mod hierarchical;
pub mod quality;
pub mod similarity;

pub use hierarchical::{ClusteringOptions, HierarchicalClusterer, LinkageMethod, TestCluster};
pub use quality::{evaluate as evaluate_quality, ClusterQualityReport};
pub use similarity::{overall_similarity, AnalysisDepth, CoverageAwareComparator, MetadataOnlyComparator, PairwiseComparator};

use crate::cancellation::CancellationToken;
use crate::core::TestInfo;
use crate::errors::Result;

/// The combined result of `analyzeClusters` (§6): the clusters themselves
/// plus the quality statistics computed over them.
#[derive(Debug, Clone)]
pub struct ClusterAnalysis {
    pub clusters: Vec<TestCluster>,
    pub quality: ClusterQualityReport,
}

/// Clusters `tests` with `comparator` and `options`, then scores the result.
pub fn analyze_clusters(tests: Vec<TestInfo>, comparator: &dyn PairwiseComparator, options: ClusteringOptions, token: &CancellationToken) -> Result<ClusterAnalysis> {
    let total_tests = tests.len();
    let clusterer = HierarchicalClusterer::new(comparator, options);
    let clusters = clusterer.cluster(tests, token)?;
    let quality = evaluate_quality(&clusters, total_tests, comparator);
    Ok(ClusterAnalysis { clusters, quality })
}

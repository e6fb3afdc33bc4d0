//! Agglomerative hierarchical clustering over tests (§4.6), generalized
//! from a method-level clusterer into one that merges tests on the
//! overall-similarity composition in `clustering::similarity`.

use super::similarity::PairwiseComparator;
use crate::cancellation::CancellationToken;
use crate::core::TestInfo;
use crate::errors::Result;
use crate::observability::context::{set_phase, AnalysisPhase};
use crate::observability::parallel::ParallelContextExt;
use rayon::prelude::*;
use std::collections::HashMap;

/// How the similarity between two clusters is derived from the pairwise
/// similarities of their members.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkageMethod {
    Single,
    Complete,
    Average,
    /// No Euclidean distance space is available over tests (only a
    /// similarity scalar per pair), so Ward's variance-minimizing criterion
    /// has no direct analogue here; this falls back to average linkage.
    Ward,
}

#[derive(Debug, Clone, Copy)]
pub struct ClusteringOptions {
    pub similarity_threshold: f64,
    pub max_clusters: usize,
    pub min_cluster_size: usize,
    pub min_intra_cluster_similarity: f64,
    pub linkage: LinkageMethod,
}

impl Default for ClusteringOptions {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.3,
            max_clusters: usize::MAX,
            min_cluster_size: 2,
            min_intra_cluster_similarity: 0.0,
            linkage: LinkageMethod::Average,
        }
    }
}

/// A group of tests judged similar enough to cluster together.
#[derive(Debug, Clone)]
pub struct TestCluster {
    pub members: Vec<TestInfo>,
    pub intra_similarity: f64,
    pub cohesion: f64,
}

/// Cached pairwise similarity between individual tests, built once with a
/// bounded fan-out before the merge loop runs.
struct PairwiseMatrix {
    values: HashMap<(usize, usize), f64>,
}

impl PairwiseMatrix {
    /// Builds the pairwise matrix, checking `token` per pair (§5): a worker
    /// that sees cancellation skips its comparison and reports a sentinel
    /// `0.0`, and the whole build fails with `Cancelled` once the fan-out
    /// settles rather than mid-flight (rayon has no clean early-abort).
    fn build(tests: &[TestInfo], comparator: &dyn PairwiseComparator, token: &CancellationToken) -> Result<Self> {
        let _phase = set_phase(AnalysisPhase::Clustering);
        let n = tests.len();
        let pairs: Vec<(usize, usize)> = (0..n).flat_map(|i| ((i + 1)..n).map(move |j| (i, j))).collect();

        let values: HashMap<(usize, usize), f64> = pairs
            .into_par_iter()
            .map_with_context(|(i, j)| {
                if token.is_cancelled() {
                    return ((i, j), 0.0);
                }
                let sim = comparator.compare(&tests[i], &tests[j]).unwrap_or_else(|e| {
                    tracing::warn!(test_a = %tests[i].unique_id, test_b = %tests[j].unique_id, error = %e, "pairwise comparison failed, treating as 0.0");
                    0.0
                });
                ((i, j), sim)
            })
            .collect();

        token.check()?;
        Ok(Self { values })
    }

    fn get(&self, i: usize, j: usize) -> f64 {
        let key = if i < j { (i, j) } else { (j, i) };
        if i == j {
            1.0
        } else {
            *self.values.get(&key).unwrap_or(&0.0)
        }
    }
}

/// One merge-candidate cluster during the agglomerative phase: tracks the
/// original indices into `tests` so member-pairwise similarity can be
/// looked up in the cached matrix.
struct WorkingCluster {
    indices: Vec<usize>,
}

fn linkage_similarity(a: &WorkingCluster, b: &WorkingCluster, matrix: &PairwiseMatrix, linkage: LinkageMethod) -> f64 {
    let mut sims = Vec::with_capacity(a.indices.len() * b.indices.len());
    for &i in &a.indices {
        for &j in &b.indices {
            sims.push(matrix.get(i, j));
        }
    }
    if sims.is_empty() {
        return 0.0;
    }
    match linkage {
        LinkageMethod::Single => sims.iter().cloned().fold(f64::MIN, f64::max),
        LinkageMethod::Complete => sims.iter().cloned().fold(f64::MAX, f64::min),
        LinkageMethod::Average | LinkageMethod::Ward => sims.iter().sum::<f64>() / sims.len() as f64,
    }
}

fn intra_similarity(cluster: &WorkingCluster, matrix: &PairwiseMatrix) -> f64 {
    if cluster.indices.len() < 2 {
        return 1.0;
    }
    let mut total = 0.0;
    let mut count = 0;
    for a in 0..cluster.indices.len() {
        for b in (a + 1)..cluster.indices.len() {
            total += matrix.get(cluster.indices[a], cluster.indices[b]);
            count += 1;
        }
    }
    if count == 0 {
        1.0
    } else {
        total / count as f64
    }
}

/// Agglomerative clusterer over a fixed similarity matrix.
pub struct HierarchicalClusterer<'a> {
    comparator: &'a dyn PairwiseComparator,
    options: ClusteringOptions,
}

impl<'a> HierarchicalClusterer<'a> {
    pub fn new(comparator: &'a dyn PairwiseComparator, options: ClusteringOptions) -> Self {
        Self { comparator, options }
    }

    /// Clusters `tests`, checking `token` at each merge-loop iteration in
    /// addition to the pairwise-matrix build (§5 "per-pair in clustering").
    pub fn cluster(&self, tests: Vec<TestInfo>, token: &CancellationToken) -> Result<Vec<TestCluster>> {
        if tests.is_empty() {
            return Ok(Vec::new());
        }

        let matrix = PairwiseMatrix::build(&tests, self.comparator, token)?;

        let mut clusters: Vec<WorkingCluster> = (0..tests.len()).map(|i| WorkingCluster { indices: vec![i] }).collect();

        loop {
            if clusters.len() <= self.options.max_clusters {
                break;
            }
            token.check()?;

            let mut best: Option<(usize, usize, f64)> = None;
            for i in 0..clusters.len() {
                for j in (i + 1)..clusters.len() {
                    let sim = linkage_similarity(&clusters[i], &clusters[j], &matrix, self.options.linkage);
                    if sim > best.map(|(_, _, s)| s).unwrap_or(f64::MIN) {
                        best = Some((i, j, sim));
                    }
                }
            }

            match best {
                Some((i, j, sim)) if sim >= self.options.similarity_threshold => {
                    let merged_indices = {
                        let mut combined = clusters[i].indices.clone();
                        combined.extend(clusters[j].indices.clone());
                        combined
                    };
                    clusters.remove(j);
                    clusters.remove(i);
                    clusters.push(WorkingCluster { indices: merged_indices });
                }
                _ => break,
            }
        }

        let result = clusters
            .into_iter()
            .filter_map(|cluster| {
                let intra = intra_similarity(&cluster, &matrix);
                if cluster.indices.len() < self.options.min_cluster_size {
                    return None;
                }
                if intra < self.options.min_intra_cluster_similarity {
                    return None;
                }
                Some(TestCluster {
                    members: cluster.indices.iter().map(|&i| tests[i].clone()).collect(),
                    intra_similarity: intra,
                    cohesion: intra,
                })
            })
            .collect();

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clustering::similarity::{AnalysisDepth, MetadataOnlyComparator};

    fn make_test(method: &str) -> TestInfo {
        TestInfo::new("Asm", "MyApp.Tests.FooTest", method)
    }

    #[test]
    fn empty_input_yields_no_clusters() {
        let comparator = MetadataOnlyComparator {
            depth: AnalysisDepth::Shallow,
            full_metadata: true,
        };
        let clusterer = HierarchicalClusterer::new(&comparator, ClusteringOptions::default());
        assert!(clusterer.cluster(Vec::new(), &CancellationToken::new()).unwrap().is_empty());
    }

    #[test]
    fn identical_names_cluster_together() {
        let comparator = MetadataOnlyComparator {
            depth: AnalysisDepth::Medium,
            full_metadata: false,
        };
        let options = ClusteringOptions {
            similarity_threshold: 0.1,
            min_cluster_size: 2,
            ..ClusteringOptions::default()
        };
        let clusterer = HierarchicalClusterer::new(&comparator, options);
        let tests = vec![
            make_test("should_validate_order"),
            make_test("should_validate_order_totals"),
            make_test("completely_unrelated_thing"),
        ];
        let clusters = clusterer.cluster(tests, &CancellationToken::new()).unwrap();
        assert!(!clusters.is_empty());
    }

    #[test]
    fn singleton_clusters_are_discarded_by_min_size() {
        let comparator = MetadataOnlyComparator {
            depth: AnalysisDepth::Shallow,
            full_metadata: true,
        };
        let options = ClusteringOptions {
            similarity_threshold: 0.99,
            min_cluster_size: 2,
            ..ClusteringOptions::default()
        };
        let clusterer = HierarchicalClusterer::new(&comparator, options);
        let tests = vec![make_test("a"), make_test("b")];
        let clusters = clusterer.cluster(tests, &CancellationToken::new()).unwrap();
        assert!(clusters.is_empty());
    }

    #[test]
    fn cancelled_token_aborts_clustering() {
        let comparator = MetadataOnlyComparator {
            depth: AnalysisDepth::Shallow,
            full_metadata: true,
        };
        let clusterer = HierarchicalClusterer::new(&comparator, ClusteringOptions::default());
        let token = CancellationToken::new();
        token.cancel();
        let tests = vec![make_test("a"), make_test("b")];
        let err = clusterer.cluster(tests, &token).unwrap_err();
        assert!(matches!(err.downcast_ref::<crate::errors::AnalysisError>(), Some(crate::errors::AnalysisError::Cancelled)));
    }
}

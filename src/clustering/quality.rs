//! Clustering-wide quality statistics (§4.6): silhouette, clustering rate,
//! size variance, largest/smallest cluster size.

use super::hierarchical::TestCluster;
use super::similarity::PairwiseComparator;
use crate::core::TestInfo;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterQualityReport {
    pub mean_silhouette: f64,
    pub clustering_rate: f64,
    pub size_variance: f64,
    pub largest_size: usize,
    pub smallest_size: usize,
}

fn mean_similarity_to_cluster(test: &TestInfo, cluster: &TestCluster, comparator: &dyn PairwiseComparator) -> f64 {
    if cluster.members.is_empty() {
        return 0.0;
    }
    let total: f64 = cluster
        .members
        .iter()
        .map(|other| comparator.compare(test, other).unwrap_or(0.0))
        .sum();
    total / cluster.members.len() as f64
}

/// Silhouette in similarity-as-inverse-distance form: `s = (a - b) / max(a, b)`
/// where `a` is the point's mean intra-cluster similarity and `b` is the
/// maximum mean similarity to any other cluster. Reported only over points
/// in clusters of size ≥ 2.
fn silhouette_for_point(
    test: &TestInfo,
    own_cluster_mean_sim: f64,
    clusters: &[TestCluster],
    own_index: usize,
    comparator: &dyn PairwiseComparator,
) -> f64 {
    let b = clusters
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != own_index)
        .map(|(_, other)| mean_similarity_to_cluster(test, other, comparator))
        .fold(f64::MIN, f64::max);

    let b = if b == f64::MIN { 0.0 } else { b };
    let denom = own_cluster_mean_sim.max(b);
    if denom == 0.0 {
        0.0
    } else {
        (own_cluster_mean_sim - b) / denom
    }
}

pub fn evaluate(clusters: &[TestCluster], total_tests: usize, comparator: &dyn PairwiseComparator) -> ClusterQualityReport {
    if clusters.is_empty() || total_tests == 0 {
        return ClusterQualityReport {
            mean_silhouette: 0.0,
            clustering_rate: 0.0,
            size_variance: 0.0,
            largest_size: 0,
            smallest_size: 0,
        };
    }

    let sizes: Vec<usize> = clusters.iter().map(|c| c.members.len()).collect();
    let clustered_count: usize = sizes.iter().sum();
    let clustering_rate = clustered_count as f64 / total_tests as f64;

    let mean_size = sizes.iter().sum::<usize>() as f64 / sizes.len() as f64;
    let size_variance =
        sizes.iter().map(|s| (*s as f64 - mean_size).powi(2)).sum::<f64>() / sizes.len() as f64;

    let mut silhouettes = Vec::new();
    for (idx, cluster) in clusters.iter().enumerate() {
        if cluster.members.len() < 2 {
            continue;
        }
        for test in &cluster.members {
            // Mean similarity to the rest of this test's own cluster,
            // excluding itself.
            let own_sim: f64 = cluster
                .members
                .iter()
                .filter(|other| other.unique_id_key() != test.unique_id_key())
                .map(|other| comparator.compare(test, other).unwrap_or(0.0))
                .sum::<f64>()
                / (cluster.members.len() - 1) as f64;
            silhouettes.push(silhouette_for_point(test, own_sim, clusters, idx, comparator));
        }
    }

    let mean_silhouette = if silhouettes.is_empty() {
        0.0
    } else {
        silhouettes.iter().sum::<f64>() / silhouettes.len() as f64
    };

    ClusterQualityReport {
        mean_silhouette,
        clustering_rate,
        size_variance,
        largest_size: *sizes.iter().max().unwrap_or(&0),
        smallest_size: *sizes.iter().min().unwrap_or(&0),
    }
}

//! Coverage-overlap analysis (C5): reverse-lookup per-test covered-method
//! sets from a method→tests coverage map, and weighted overlap between any
//! two tests.

use crate::similarity::{weighted_jaccard, JaccardWeights, WeightedMethod};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// One production method covered by zero or more tests, with the metadata
/// the weighted-Jaccard and overlap report need.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoveredMethod {
    pub method_id: String,
    pub weight: f64,
    pub confidence: f64,
    pub depth: u32,
    pub is_production_code: bool,
    pub container_name: String,
}

/// One `(productionMethod, coveringTests)` row of the raw coverage map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageEntry {
    pub method: CoveredMethod,
    /// Unique ids (case-insensitive) of tests that exercise this method.
    pub covering_tests: Vec<String>,
}

static NEXT_MAP_ID: AtomicU64 = AtomicU64::new(1);

/// A coverage map, built externally by the consumed `CoverageMapBuilder`
/// collaborator (§6). `identity` is assigned once at construction and used
/// to key the reverse-index cache — two maps with identical content still
/// get independent cache entries, matching "per coverage-map identity"
/// rather than per-content caching.
#[derive(Debug, Clone)]
pub struct TestCoverageMap {
    pub entries: Vec<CoverageEntry>,
    identity: u64,
}

impl TestCoverageMap {
    pub fn new(entries: Vec<CoverageEntry>) -> Self {
        Self {
            entries,
            identity: NEXT_MAP_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    pub fn identity(&self) -> u64 {
        self.identity
    }
}

type ReverseIndex = HashMap<String, Vec<CoveredMethod>>;

/// Caches the reverse (test → covered methods) index per coverage-map
/// identity; O(N·k) to build once, free to reuse after.
pub struct CoverageOverlapAnalyzer {
    reverse_cache: DashMap<u64, Arc<ReverseIndex>>,
}

impl Default for CoverageOverlapAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl CoverageOverlapAnalyzer {
    pub fn new() -> Self {
        Self {
            reverse_cache: DashMap::new(),
        }
    }

    fn reverse_index(&self, map: &TestCoverageMap) -> Arc<ReverseIndex> {
        if let Some(cached) = self.reverse_cache.get(&map.identity()) {
            return cached.clone();
        }

        let mut index: ReverseIndex = HashMap::new();
        for entry in &map.entries {
            for test_id in &entry.covering_tests {
                index
                    .entry(test_id.to_lowercase())
                    .or_default()
                    .push(entry.method.clone());
            }
        }

        let index = Arc::new(index);
        self.reverse_cache.insert(map.identity(), index.clone());
        index
    }

    /// The set of methods a single test covers (§4.5).
    pub fn covered_methods(&self, map: &TestCoverageMap, test_unique_id: &str) -> Vec<CoveredMethod> {
        self.reverse_index(map)
            .get(&test_unique_id.to_lowercase())
            .cloned()
            .unwrap_or_default()
    }

    /// Weighted overlap between two tests' covered-method sets (§4.5).
    pub fn overlap(
        &self,
        map: &TestCoverageMap,
        test_a_id: &str,
        test_b_id: &str,
        weights: JaccardWeights,
    ) -> OverlapReport {
        let a = self.covered_methods(map, test_a_id);
        let b = self.covered_methods(map, test_b_id);

        let a_by_id: HashMap<String, &CoveredMethod> =
            a.iter().map(|m| (m.method_id.to_lowercase(), m)).collect();
        let b_by_id: HashMap<String, &CoveredMethod> =
            b.iter().map(|m| (m.method_id.to_lowercase(), m)).collect();

        let mut shared = Vec::new();
        let mut shared_methods = Vec::new();
        let mut unique_to_a = Vec::new();
        let mut unique_to_b = Vec::new();

        for (key, m) in &a_by_id {
            if let Some(other) = b_by_id.get(key) {
                shared.push(m.method_id.clone());
                shared_methods.push(SharedMethodInfo {
                    method_id: m.method_id.clone(),
                    weight: m.weight,
                    confidence: (m.confidence + other.confidence) / 2.0,
                    depth: m.depth.min(other.depth),
                    is_production_code: m.is_production_code,
                    container_name: m.container_name.clone(),
                });
            } else {
                unique_to_a.push(m.method_id.clone());
            }
        }
        for (key, m) in &b_by_id {
            if !a_by_id.contains_key(key) {
                unique_to_b.push(m.method_id.clone());
            }
        }

        let to_weighted = |methods: &[CoveredMethod]| -> Vec<WeightedMethod> {
            methods
                .iter()
                .map(|m| WeightedMethod::new(m.method_id.clone(), m.depth, m.weight))
                .collect()
        };
        let overlap_ratio = weighted_jaccard(&to_weighted(&a), &to_weighted(&b), weights);

        OverlapReport {
            shared,
            unique_to_a,
            unique_to_b,
            overlap_percent: overlap_ratio * 100.0,
            shared_methods,
        }
    }
}

/// Per-shared-method detail in an [`OverlapReport`].
#[derive(Debug, Clone, PartialEq)]
pub struct SharedMethodInfo {
    pub method_id: String,
    pub weight: f64,
    pub confidence: f64,
    pub depth: u32,
    pub is_production_code: bool,
    pub container_name: String,
}

/// The comparison output between two tests' coverage (§4.5).
#[derive(Debug, Clone, PartialEq)]
pub struct OverlapReport {
    pub shared: Vec<String>,
    pub unique_to_a: Vec<String>,
    pub unique_to_b: Vec<String>,
    pub overlap_percent: f64,
    pub shared_methods: Vec<SharedMethodInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn method(id: &str) -> CoveredMethod {
        CoveredMethod {
            method_id: id.to_string(),
            weight: 1.0,
            confidence: 1.0,
            depth: 1,
            is_production_code: true,
            container_name: "Container".to_string(),
        }
    }

    fn map_with(rows: &[(&str, &[&str])]) -> TestCoverageMap {
        TestCoverageMap::new(
            rows.iter()
                .map(|(m, tests)| CoverageEntry {
                    method: method(m),
                    covering_tests: tests.iter().map(|t| t.to_string()).collect(),
                })
                .collect(),
        )
    }

    #[test]
    fn reverse_lookup_is_case_insensitive() {
        let map = map_with(&[("m1", &["Asm::Foo.test_a"])]);
        let analyzer = CoverageOverlapAnalyzer::new();
        let methods = analyzer.covered_methods(&map, "ASM::FOO.TEST_A");
        assert_eq!(methods.len(), 1);
    }

    #[test]
    fn overlap_scenario_jaccard_half() {
        // A covers m1,m2,m3; B covers m2,m3,m4 -> overlap 50% under unit weights.
        let map = map_with(&[
            ("m1", &["test_a"]),
            ("m2", &["test_a", "test_b"]),
            ("m3", &["test_a", "test_b"]),
            ("m4", &["test_b"]),
        ]);
        let analyzer = CoverageOverlapAnalyzer::new();
        let weights = JaccardWeights {
            decay_factor: 1.0,
            framework_factor: 1.0,
        };
        let report = analyzer.overlap(&map, "test_a", "test_b", weights);
        assert!((report.overlap_percent - 50.0).abs() < 1e-9, "got {}", report.overlap_percent);
        assert_eq!(report.shared.len(), 2);
        assert_eq!(report.unique_to_a.len(), 1);
        assert_eq!(report.unique_to_b.len(), 1);
    }

    #[test]
    fn reverse_index_is_reused_across_calls() {
        let map = map_with(&[("m1", &["test_a"])]);
        let analyzer = CoverageOverlapAnalyzer::new();
        let first = analyzer.reverse_index(&map);
        let second = analyzer.reverse_index(&map);
        assert!(Arc::ptr_eq(&first, &second));
    }
}

//! Core data model shared by every subsystem: test identity, execution
//! history, confidence policies, options, and code-change sets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Category a test belongs to. Assigned by the external `TestCategorizer`
/// collaborator (§6); the core never infers it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TestCategory {
    Unit,
    Integration,
    Database,
    Api,
    Ui,
    EndToEnd,
}

/// A single recorded execution of a test. Results are append-only; see
/// `history::HistoryStore` for how they accumulate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestExecutionResult {
    pub passed: bool,
    pub duration: Duration,
    pub executed_at: DateTime<Utc>,
}

/// Identity, metadata, and mutable scoring state for one discovered test.
///
/// Invariants: `unique_id` is collision-free and compared case-insensitively
/// (see [`TestInfo::unique_id_key`]); `average_execution_time` is never
/// negative (it's a `Duration`, so this is structural); `selection_score`
/// stays in `[0, 1]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestInfo {
    pub unique_id: String,
    pub assembly: String,
    pub declaring_type: String,
    pub method_name: String,
    pub category: TestCategory,
    pub tags: Vec<String>,
    pub dependencies: Vec<String>,
    pub average_execution_time: Duration,
    pub execution_history: Vec<TestExecutionResult>,
    pub selection_score: f64,
    pub last_executed: Option<DateTime<Utc>>,
    pub last_selected: Option<DateTime<Utc>>,
}

impl TestInfo {
    pub fn new(assembly: &str, declaring_type: &str, method_name: &str) -> Self {
        let unique_id = format!("{assembly}::{declaring_type}.{method_name}");
        Self {
            unique_id,
            assembly: assembly.to_string(),
            declaring_type: declaring_type.to_string(),
            method_name: method_name.to_string(),
            category: TestCategory::Unit,
            tags: Vec::new(),
            dependencies: Vec::new(),
            average_execution_time: Duration::ZERO,
            execution_history: Vec::new(),
            selection_score: 0.0,
            last_executed: None,
            last_selected: None,
        }
    }

    /// Canonical, case-insensitive comparison key for `unique_id`.
    pub fn unique_id_key(&self) -> String {
        self.unique_id.to_lowercase()
    }

    pub fn average_execution_ms(&self) -> f64 {
        self.average_execution_time.as_secs_f64() * 1000.0
    }

    /// Success rate over all recorded executions, or `None` with empty history.
    pub fn success_rate(&self) -> Option<f64> {
        if self.execution_history.is_empty() {
            return None;
        }
        let passed = self.execution_history.iter().filter(|r| r.passed).count();
        Some(passed as f64 / self.execution_history.len() as f64)
    }

    /// A test is flaky when its success rate sits in `[0.3, 0.9]` and the
    /// alternation count between chronologically-adjacent results exceeds
    /// `floor(n/3)` (§4.2, Glossary).
    pub fn is_flaky(&self) -> bool {
        let n = self.execution_history.len();
        if n == 0 {
            return false;
        }
        let Some(rate) = self.success_rate() else {
            return false;
        };
        if !(0.3..=0.9).contains(&rate) {
            return false;
        }

        let mut ordered = self.execution_history.clone();
        ordered.sort_by_key(|r| r.executed_at);
        let alternations = ordered
            .windows(2)
            .filter(|pair| pair[0].passed != pair[1].passed)
            .count();

        alternations > n / 3
    }
}

/// Confidence-level policy. Associated defaults come from the table in §4.4
/// and live in `plan::ConfidencePolicy::defaults_for`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfidenceLevel {
    Fast,
    Medium,
    High,
    Full,
}

/// User-supplied overrides and filters layered on top of a confidence level's
/// defaults (§3 `TestSelectionOptions`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestSelectionOptions {
    pub max_test_count: Option<usize>,
    pub max_execution_time: Option<Duration>,
    pub min_selection_score: Option<f64>,
    pub included_categories: Vec<TestCategory>,
    pub excluded_categories: Vec<TestCategory>,
    pub required_tags: Vec<String>,
    pub excluded_tags: Vec<String>,
    pub include_flaky_tests: bool,
    pub max_parallelism: usize,
}

impl TestSelectionOptions {
    pub fn new() -> Self {
        Self {
            max_parallelism: 1,
            ..Default::default()
        }
    }
}

/// The kind of change recorded for one file in a `CodeChangeSet`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeType {
    Added,
    Modified,
    Deleted,
    Renamed,
}

/// One file-level change, already parsed by the external git/diff collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeChange {
    pub file_path: String,
    pub change_type: ChangeType,
    pub changed_methods: Vec<String>,
    pub changed_types: Vec<String>,
}

/// An ordered set of code changes driving impact-based scoring (§3, §4.2).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CodeChangeSet {
    pub changes: Vec<CodeChange>,
}

impl CodeChangeSet {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn changed_type_names(&self) -> impl Iterator<Item = &str> {
        self.changes.iter().flat_map(|c| c.changed_types.iter().map(String::as_str))
    }

    pub fn changed_method_names(&self) -> impl Iterator<Item = &str> {
        self.changes.iter().flat_map(|c| c.changed_methods.iter().map(String::as_str))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(passed: bool, secs_offset: i64) -> TestExecutionResult {
        TestExecutionResult {
            passed,
            duration: Duration::from_millis(100),
            executed_at: DateTime::<Utc>::UNIX_EPOCH + chrono::Duration::seconds(secs_offset),
        }
    }

    #[test]
    fn unique_id_is_assembly_type_method() {
        let t = TestInfo::new("MyApp.Tests.dll", "MyApp.Tests.FooTest", "should_pass");
        assert_eq!(t.unique_id, "MyApp.Tests.dll::MyApp.Tests.FooTest.should_pass");
    }

    #[test]
    fn unique_id_key_is_case_insensitive() {
        let t = TestInfo::new("Asm", "MyApp.Tests.FooTest", "ShouldPass");
        assert_eq!(t.unique_id_key(), t.unique_id.to_lowercase());
    }

    #[test]
    fn flaky_detection_matches_scenario_3() {
        // history [P,F,F,P,F,P,P,F] chronological, n=8, floor(n/3)=2
        let mut t = TestInfo::new("Asm", "T", "m");
        let flags = [true, false, false, true, false, true, true, false];
        for (i, passed) in flags.iter().enumerate() {
            t.execution_history.push(result(*passed, i as i64));
        }
        assert!(t.is_flaky());
    }

    #[test]
    fn empty_history_is_not_flaky() {
        let t = TestInfo::new("Asm", "T", "m");
        assert!(!t.is_flaky());
    }

    #[test]
    fn too_reliable_is_not_flaky() {
        let mut t = TestInfo::new("Asm", "T", "m");
        for i in 0..10 {
            t.execution_history.push(result(true, i));
        }
        assert!(!t.is_flaky());
    }
}

//! Append-only execution history (C9, §4.9): every append updates the
//! owning test's derived `averageExecutionTime` (successful runs only) and
//! `lastExecuted`, readers see a consistent snapshot via a reader-writer
//! lock rather than a copy-on-write log (§5 "Shared-resource policy").
//!
//! Matching is strictly on `uniqueId`, case-insensitive — the source's
//! display-name substring heuristic is deliberately not replicated (§9 Open
//! Questions).

use crate::core::TestExecutionResult;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
struct TestHistory {
    results: Vec<TestExecutionResult>,
    average_execution_time: Duration,
    last_executed: Option<DateTime<Utc>>,
}

impl TestHistory {
    fn append(&mut self, result: TestExecutionResult) {
        self.last_executed = Some(result.executed_at);
        self.results.push(result);
        self.recompute_average();
    }

    fn recompute_average(&mut self) {
        let successful: Vec<&TestExecutionResult> = self.results.iter().filter(|r| r.passed).collect();
        if successful.is_empty() {
            self.average_execution_time = Duration::ZERO;
            return;
        }
        let total_nanos: u128 = successful.iter().map(|r| r.duration.as_nanos()).sum();
        self.average_execution_time = Duration::from_nanos((total_nanos / successful.len() as u128) as u64);
    }
}

/// A snapshot of one test's derived history state, returned to callers so
/// they never hold the store's lock past a single read.
#[derive(Debug, Clone)]
pub struct HistorySnapshot {
    pub results: Vec<TestExecutionResult>,
    pub average_execution_time: Duration,
    pub last_executed: Option<DateTime<Utc>>,
}

/// Append-only store of execution history, keyed by `uniqueId` (§4.9).
/// Unknown ids create a new entry on first append (§4.9 "Unknown test ids").
pub struct HistoryStore {
    entries: RwLock<HashMap<String, TestHistory>>,
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    fn key(unique_id: &str) -> String {
        unique_id.to_lowercase()
    }

    /// Records one execution result for `unique_id`, creating a new entry if
    /// none exists yet.
    pub fn record(&self, unique_id: &str, result: TestExecutionResult) {
        let mut entries = self.entries.write();
        entries.entry(Self::key(unique_id)).or_default().append(result);
    }

    /// A consistent snapshot of everything recorded for `unique_id`, or
    /// `None` if no history has ever been recorded.
    pub fn snapshot(&self, unique_id: &str) -> Option<HistorySnapshot> {
        let entries = self.entries.read();
        entries.get(&Self::key(unique_id)).map(|h| HistorySnapshot {
            results: h.results.clone(),
            average_execution_time: h.average_execution_time,
            last_executed: h.last_executed,
        })
    }

    /// Applies the recorded history (if any) onto `test`, mutating its
    /// `execution_history`, `average_execution_time`, and `last_executed`
    /// fields in place. Tests with no recorded history are left untouched.
    pub fn apply_to(&self, test: &mut crate::core::TestInfo) {
        if let Some(snapshot) = self.snapshot(&test.unique_id) {
            test.execution_history = snapshot.results;
            test.average_execution_time = snapshot.average_execution_time;
            test.last_executed = snapshot.last_executed;
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(passed: bool, ms: u64, offset_secs: i64) -> TestExecutionResult {
        TestExecutionResult {
            passed,
            duration: Duration::from_millis(ms),
            executed_at: DateTime::<Utc>::UNIX_EPOCH + chrono::Duration::seconds(offset_secs),
        }
    }

    #[test]
    fn unknown_id_creates_a_new_entry_on_first_append() {
        let store = HistoryStore::new();
        assert!(store.snapshot("Asm::T.m").is_none());
        store.record("Asm::T.m", result(true, 100, 0));
        assert!(store.snapshot("Asm::T.m").is_some());
    }

    #[test]
    fn matching_is_case_insensitive_on_unique_id() {
        let store = HistoryStore::new();
        store.record("Asm::T.m", result(true, 100, 0));
        let snap = store.snapshot("ASM::T.M").unwrap();
        assert_eq!(snap.results.len(), 1);
    }

    #[test]
    fn average_duration_only_counts_successful_runs() {
        let store = HistoryStore::new();
        store.record("Asm::T.m", result(true, 100, 0));
        store.record("Asm::T.m", result(false, 900, 1));
        store.record("Asm::T.m", result(true, 200, 2));

        let snap = store.snapshot("Asm::T.m").unwrap();
        assert_eq!(snap.average_execution_time, Duration::from_millis(150));
    }

    #[test]
    fn last_executed_tracks_the_most_recent_append() {
        let store = HistoryStore::new();
        store.record("Asm::T.m", result(true, 100, 0));
        store.record("Asm::T.m", result(true, 100, 10));
        let snap = store.snapshot("Asm::T.m").unwrap();
        assert_eq!(snap.last_executed, Some(DateTime::<Utc>::UNIX_EPOCH + chrono::Duration::seconds(10)));
    }

    #[test]
    fn all_failed_runs_yields_zero_average() {
        let store = HistoryStore::new();
        store.record("Asm::T.m", result(false, 500, 0));
        let snap = store.snapshot("Asm::T.m").unwrap();
        assert_eq!(snap.average_execution_time, Duration::ZERO);
    }

    #[test]
    fn apply_to_overwrites_test_info_fields() {
        let store = HistoryStore::new();
        let mut test = crate::core::TestInfo::new("Asm", "T", "m");
        store.record(&test.unique_id, result(true, 100, 0));
        store.apply_to(&mut test);
        assert_eq!(test.execution_history.len(), 1);
        assert_eq!(test.average_execution_time, Duration::from_millis(100));
    }
}

//! JSON fixture loading for the demonstration CLI.
//!
//! Real deployments plug in their own `TestDiscovery`/`CoverageMapBuilder`
//! (§1 "Out of scope"); this module exists only so the binary in `main.rs`
//! has something concrete to run against. None of it is part of the core.

use crate::core::{CodeChangeSet, TestInfo};
use crate::coverage::{CoverageEntry, TestCoverageMap};
use crate::discovery::{DiscoveredTestMetadata, DiscoveryResult, TestDiscovery};
use crate::errors::{AnalysisError, Result};
use anyhow::Context;
use std::path::Path;

/// Loads the candidate-test fixture: a JSON array of `TestInfo` records.
pub fn load_tests(path: &Path) -> Result<Vec<TestInfo>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading fixture at {}", path.display()))?;
    let tests: Vec<TestInfo> = serde_json::from_str(&contents)
        .with_context(|| format!("parsing fixture at {}", path.display()))?;
    Ok(tests)
}

/// Loads an optional `CodeChangeSet` fixture.
pub fn load_changes(path: &Path) -> Result<CodeChangeSet> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading change set at {}", path.display()))?;
    let changes: CodeChangeSet = serde_json::from_str(&contents)
        .with_context(|| format!("parsing change set at {}", path.display()))?;
    Ok(changes)
}

/// Loads a `TestCoverageMap` fixture: a JSON array of `CoverageEntry` rows.
pub fn load_coverage_map(path: &Path) -> Result<TestCoverageMap> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading coverage map at {}", path.display()))?;
    let entries: Vec<CoverageEntry> = serde_json::from_str(&contents)
        .with_context(|| format!("parsing coverage map at {}", path.display()))?;
    Ok(TestCoverageMap::new(entries))
}

/// A `TestDiscovery` backed entirely by the candidate-test fixture, used by
/// the `validate` subcommand. The "assembly" is ignored — every test in the
/// fixture is returned regardless of which assembly name was asked for,
/// since the demonstration fixture doesn't partition tests by assembly.
pub struct FixtureDiscovery {
    tests: Vec<TestInfo>,
}

impl FixtureDiscovery {
    pub fn new(tests: Vec<TestInfo>) -> Self {
        Self { tests }
    }
}

impl TestDiscovery for FixtureDiscovery {
    fn discover(&self, assembly: &str) -> Result<DiscoveryResult> {
        let test_methods: Vec<DiscoveredTestMetadata> = self
            .tests
            .iter()
            .filter(|t| t.assembly == assembly)
            .map(|t| DiscoveredTestMetadata {
                assembly: t.assembly.clone(),
                declaring_type: t.declaring_type.clone(),
                method_name: t.method_name.clone(),
                category: t.category,
                tags: t.tags.clone(),
                dependencies: t.dependencies.clone(),
                is_parameterized: false,
            })
            .collect();
        if test_methods.is_empty() {
            return Err(
                AnalysisError::not_found(format!("no tests found for assembly {assembly}")).into(),
            );
        }
        Ok(DiscoveryResult {
            fixtures: test_methods
                .iter()
                .map(|m| m.declaring_type.clone())
                .collect(),
            test_methods,
        })
    }
}

/// Every distinct assembly name present in the fixture, for validation's
/// "which assemblies to discover" argument.
pub fn assemblies_of(tests: &[TestInfo]) -> Vec<String> {
    let mut seen = std::collections::BTreeSet::new();
    for t in tests {
        seen.insert(t.assembly.clone());
    }
    seen.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TestCategory;

    #[test]
    fn load_tests_round_trips_through_json() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("fixture.json");
        let mut test = TestInfo::new("Asm", "MyApp.Tests.FooTest", "should_pass");
        test.category = TestCategory::Unit;
        std::fs::write(&path, serde_json::to_string(&vec![test.clone()]).unwrap()).unwrap();

        let loaded = load_tests(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].unique_id, test.unique_id);
    }

    #[test]
    fn fixture_discovery_finds_tests_by_assembly() {
        let test = TestInfo::new("Asm", "MyApp.Tests.FooTest", "should_pass");
        let discovery = FixtureDiscovery::new(vec![test]);
        let result = discovery.discover("Asm").unwrap();
        assert_eq!(result.test_methods.len(), 1);
    }

    #[test]
    fn fixture_discovery_errors_for_unknown_assembly() {
        let discovery = FixtureDiscovery::new(Vec::new());
        assert!(discovery.discover("Nope").is_err());
    }
}

//! External collaborator boundary (§6 "Consumed interfaces"): source-level
//! parsing, solution/project file discovery, assembly loading, and raw
//! call-graph extraction are explicitly out of scope for the core (§1
//! "Out of scope"). The core only ever sees these four traits — no
//! concrete implementation lives in this crate.

use crate::core::{TestCategory, TestInfo};
use crate::coverage::TestCoverageMap;
use crate::errors::Result;

/// Metadata returned by discovery for one test method, pre-extracted so the
/// core never performs reflection itself (§9 "Dynamic typing / reflection
/// in source").
#[derive(Debug, Clone)]
pub struct DiscoveredTestMetadata {
    pub assembly: String,
    pub declaring_type: String,
    pub method_name: String,
    pub category: TestCategory,
    pub tags: Vec<String>,
    pub dependencies: Vec<String>,
    pub is_parameterized: bool,
}

/// Result of discovering one assembly (§6 `TestDiscovery.discover`).
#[derive(Debug, Clone, Default)]
pub struct DiscoveryResult {
    pub fixtures: Vec<String>,
    pub test_methods: Vec<DiscoveredTestMetadata>,
}

/// Discovers tests within one assembly. A per-assembly failure is recorded
/// as a `DependencyUnavailable` warning by the caller rather than aborting
/// discovery for the remaining assemblies (§7 "Propagation policy").
pub trait TestDiscovery: Send + Sync {
    fn discover(&self, assembly: &str) -> Result<DiscoveryResult>;
}

/// Locates test assemblies within a solution/project tree.
pub trait AssemblyPathResolver: Send + Sync {
    fn find_test_assemblies_in_solution(&self, solution_path: &str) -> Result<Vec<String>>;
}

/// Builds the method -> covering-tests map a solution's coverage data
/// describes, consumed by [`crate::coverage::CoverageOverlapAnalyzer`].
pub trait CoverageMapBuilder: Send + Sync {
    fn build(&self, solution_path: &str) -> Result<TestCoverageMap>;
}

/// Assigns a [`TestCategory`] to a discovered test. The core never infers
/// category itself (§3 `TestInfo`).
pub trait TestCategorizer: Send + Sync {
    fn categorize(&self, test: &TestInfo) -> TestCategory;
}

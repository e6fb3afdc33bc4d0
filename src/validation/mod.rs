//! Test identifier validation and suggestion (C7, §4.7): checks whether a
//! test id is known within a solution, with Levenshtein-ranked suggestions
//! when it isn't, backed by a 5-minute-TTL per-solution discovery cache.

use crate::cancellation::CancellationToken;
use crate::discovery::{DiscoveredTestMetadata, TestDiscovery};
use crate::errors::Result;
use crate::similarity::levenshtein_distance;
use parking_lot::RwLock;
use rayon::prelude::*;
use std::collections::HashMap;
use std::time::{Duration, Instant};

const DISCOVERY_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// Result of validating one test identifier (§6 `validateTest`).
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub valid: bool,
    pub metadata: Option<DiscoveredTestMetadata>,
    pub suggestions: Option<Vec<String>>,
}

struct CachedDiscovery {
    known: HashMap<String, DiscoveredTestMetadata>,
    fetched_at: Instant,
}

/// Caches the known-test-id set per solution path for 5 minutes (§4.7),
/// avoiding repeated full discovery for every validation call against the
/// same solution. `discovery` is supplied per call rather than stored, so
/// this service can be owned for the whole lifetime of a session without
/// tying it to one collaborator's borrow (§9 "Global state").
pub struct ValidationService {
    cache: RwLock<HashMap<String, CachedDiscovery>>,
    max_suggestions: usize,
}

impl ValidationService {
    pub fn new(max_suggestions: usize) -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
            max_suggestions,
        }
    }

    /// Known test ids for `solution_path`, refreshed via `discovery` when
    /// absent or older than the TTL. Keyed by lowercased id (the Glossary's
    /// case-insensitive unique-id rule) — callers that need the canonical,
    /// original-case id reconstruct it from the stored metadata.
    ///
    /// Checks `token` per assembly (§5 "per-assembly in discovery").
    fn known_tests(
        &self,
        discovery: &dyn TestDiscovery,
        solution_path: &str,
        assemblies: &[String],
        token: &CancellationToken,
    ) -> Result<HashMap<String, DiscoveredTestMetadata>> {
        {
            let cache = self.cache.read();
            if let Some(entry) = cache.get(solution_path) {
                if entry.fetched_at.elapsed() < DISCOVERY_CACHE_TTL {
                    return Ok(entry.known.clone());
                }
            }
        }

        let mut known = HashMap::new();
        for assembly in assemblies {
            token.check()?;
            let result = discovery.discover(assembly)?;
            for meta in result.test_methods {
                let unique_id = format!("{}::{}.{}", meta.assembly, meta.declaring_type, meta.method_name);
                known.insert(unique_id.to_lowercase(), meta);
            }
        }

        self.cache.write().insert(
            solution_path.to_string(),
            CachedDiscovery {
                known: known.clone(),
                fetched_at: Instant::now(),
            },
        );
        Ok(known)
    }

    /// Validates `unique_id` against `solution_path`'s discovered tests.
    pub fn validate(
        &self,
        discovery: &dyn TestDiscovery,
        unique_id: &str,
        solution_path: &str,
        assemblies: &[String],
        token: &CancellationToken,
    ) -> Result<ValidationResult> {
        let known = self.known_tests(discovery, solution_path, assemblies, token)?;
        let key = unique_id.to_lowercase();

        if let Some(metadata) = known.get(&key) {
            return Ok(ValidationResult {
                valid: true,
                metadata: Some(metadata.clone()),
                suggestions: None,
            });
        }

        // Suggestions must show the canonical (original-case) test id §4.7
        // requires, so candidates are reconstructed from stored metadata
        // rather than read back off the lowercased cache keys.
        let canonical_ids: Vec<String> = known
            .values()
            .map(|m| format!("{}::{}.{}", m.assembly, m.declaring_type, m.method_name))
            .collect();
        let suggestions = suggest(unique_id, canonical_ids.iter().map(String::as_str), self.max_suggestions);
        Ok(ValidationResult {
            valid: false,
            metadata: None,
            suggestions: if suggestions.is_empty() { None } else { Some(suggestions) },
        })
    }

    /// Validates many ids concurrently, fan-out bounded by the available
    /// cores (§4.7 "Batch validation").
    pub fn validate_batch(
        &self,
        discovery: &(dyn TestDiscovery + Sync),
        unique_ids: &[String],
        solution_path: &str,
        assemblies: &[String],
        token: &CancellationToken,
    ) -> Vec<Result<ValidationResult>> {
        // Warm the cache once up front so the parallel pass below never
        // races on the first discovery for this solution path.
        if let Err(e) = self.known_tests(discovery, solution_path, assemblies, token) {
            return unique_ids.iter().map(|_| Err(anyhow::anyhow!(e.to_string()))).collect();
        }

        let pool = rayon::ThreadPoolBuilder::new().num_threads(num_cpus::get()).build();
        match pool {
            Ok(pool) => pool.install(|| {
                unique_ids
                    .par_iter()
                    .map(|id| self.validate(discovery, id, solution_path, assemblies, token))
                    .collect()
            }),
            Err(_) => unique_ids
                .iter()
                .map(|id| self.validate(discovery, id, solution_path, assemblies, token))
                .collect(),
        }
    }
}

/// Ranks `candidates` by Levenshtein distance to `input`, filtered to
/// `distance <= max(3, len(input)/3)`, tie-broken by shorter length, capped
/// at `max_suggestions` (§4.7). Distance is computed case-insensitively (the
/// Glossary's unique-id rule), but the returned strings keep whatever case
/// `candidates` supplied — callers pass canonical ids, not lowercased keys.
pub fn suggest<'a>(input: &str, candidates: impl Iterator<Item = &'a str>, max_suggestions: usize) -> Vec<String> {
    let threshold = std::cmp::max(3, input.chars().count() / 3);
    let input_lower = input.to_lowercase();

    let mut scored: Vec<(usize, usize, String)> = candidates
        .map(|c| (levenshtein_distance(&input_lower, &c.to_lowercase()), c.chars().count(), c.to_string()))
        .filter(|(distance, _, _)| *distance <= threshold)
        .collect();

    scored.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));
    scored.into_iter().take(max_suggestions).map(|(_, _, c)| c).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TestCategory;
    use crate::discovery::DiscoveryResult;

    struct FixedDiscovery {
        tests: Vec<(&'static str, &'static str, &'static str)>,
    }

    impl TestDiscovery for FixedDiscovery {
        fn discover(&self, _assembly: &str) -> Result<DiscoveryResult> {
            Ok(DiscoveryResult {
                fixtures: Vec::new(),
                test_methods: self
                    .tests
                    .iter()
                    .map(|(assembly, declaring_type, method_name)| DiscoveredTestMetadata {
                        assembly: assembly.to_string(),
                        declaring_type: declaring_type.to_string(),
                        method_name: method_name.to_string(),
                        category: TestCategory::Unit,
                        tags: Vec::new(),
                        dependencies: Vec::new(),
                        is_parameterized: false,
                    })
                    .collect(),
            })
        }
    }

    #[test]
    fn known_id_validates_with_metadata() {
        let discovery = FixedDiscovery {
            tests: vec![("MyApp.Tests.dll", "MyApp.Tests.FooTest", "should_pass")],
        };
        let service = ValidationService::new(5);
        let result = service
            .validate(
                &discovery,
                "MyApp.Tests.dll::MyApp.Tests.FooTest.should_pass",
                "sln",
                &["MyApp.Tests.dll".to_string()],
                &CancellationToken::new(),
            )
            .unwrap();
        assert!(result.valid);
        assert!(result.metadata.is_some());
    }

    #[test]
    fn suggestion_matches_scenario_6() {
        // Scenario 6: invalid "MyApp.Tets.FooTest" vs known "MyApp.Tests.FooTest", distance 1.
        let candidates = vec!["MyApp.Tests.FooTest"];
        let suggestions = suggest("MyApp.Tets.FooTest", candidates.into_iter(), 5);
        assert_eq!(suggestions.first().map(String::as_str), Some("MyApp.Tests.FooTest"));
    }

    #[test]
    fn suggestions_preserve_canonical_case_through_validate() {
        // Exercises the real pipeline, not just `suggest` in isolation: the
        // discovered id is mixed-case, the probe id is a one-letter typo of
        // it, and the suggestion returned must keep the discovered casing.
        let discovery = FixedDiscovery {
            tests: vec![("MyApp.Tests.dll", "MyApp.Tests.FooTest", "should_pass")],
        };
        let service = ValidationService::new(5);
        let result = service
            .validate(
                &discovery,
                "MyApp.Tests.dll::MyApp.Tets.FooTest.should_pass",
                "sln",
                &["MyApp.Tests.dll".to_string()],
                &CancellationToken::new(),
            )
            .unwrap();
        assert!(!result.valid);
        let suggestions = result.suggestions.expect("expected at least one suggestion");
        assert_eq!(
            suggestions.first().map(String::as_str),
            Some("MyApp.Tests.dll::MyApp.Tests.FooTest.should_pass")
        );
    }

    #[test]
    fn unknown_id_returns_suggestions_not_metadata() {
        let discovery = FixedDiscovery {
            tests: vec![("MyApp.Tests.dll", "MyApp.Tests.FooTest", "should_pass")],
        };
        let service = ValidationService::new(5);
        let result = service
            .validate(
                &discovery,
                "MyApp.Tests.dll::MyApp.Tests.FooTest.should_pas",
                "sln",
                &["MyApp.Tests.dll".to_string()],
                &CancellationToken::new(),
            )
            .unwrap();
        assert!(!result.valid);
        assert!(result.metadata.is_none());
        assert!(result.suggestions.is_some());
    }

    #[test]
    fn suggestions_beyond_threshold_are_excluded() {
        let suggestions = suggest("abc", vec!["completely_unrelated_name_of_considerable_length"].into_iter(), 5);
        assert!(suggestions.is_empty());
    }

    #[test]
    fn cancelled_token_aborts_discovery_loop() {
        let discovery = FixedDiscovery {
            tests: vec![("MyApp.Tests.dll", "MyApp.Tests.FooTest", "should_pass")],
        };
        let service = ValidationService::new(5);
        let token = CancellationToken::new();
        token.cancel();
        let err = service
            .validate(
                &discovery,
                "MyApp.Tests.dll::MyApp.Tests.FooTest.should_pass",
                "sln",
                &["MyApp.Tests.dll".to_string()],
                &token,
            )
            .unwrap_err();
        assert!(matches!(err.downcast_ref::<crate::errors::AnalysisError>(), Some(crate::errors::AnalysisError::Cancelled)));
    }
}

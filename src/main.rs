//! Demonstration CLI over `testsel`'s core: wires a JSON-fixture-backed
//! discovery provider into `engine::TestSelectionSession` and dispatches
//! each subcommand to one of the five exposed operations (§6).

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use testsel::cancellation::CancellationToken;
use testsel::cli::{Cli, Commands, OutputFormat};
use testsel::clustering::{AnalysisDepth, ClusteringOptions, CoverageAwareComparator, MetadataOnlyComparator};
use testsel::config::{config_source_paths, get_config, load_config};
use testsel::core::ConfidenceLevel;
use testsel::engine::{ComparisonOptions, TestSelectionSession};
use testsel::fixtures::{assemblies_of, load_changes, load_coverage_map, load_tests, FixtureDiscovery};
use testsel::observability::{init_tracing, install_panic_hook};

fn print_json(value: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

fn main() -> Result<()> {
    install_panic_hook();
    init_tracing();

    let cli = Cli::parse();

    if let Some(config_path) = &cli.config {
        std::env::set_var("TESTSEL_CONFIG", config_path);
    }
    let config = Arc::new(load_config());
    // Populate the process-wide accessor too, for any code that reaches for
    // `config::get_config()` instead of threading a handle through.
    let _ = get_config();

    if matches!(cli.command, Commands::ShowConfigSources) {
        println!("config search order:");
        for path in config_source_paths() {
            println!("  {}", path.display());
        }
        return Ok(());
    }

    let tests = load_tests(&cli.fixture).with_context(|| "loading candidate test fixture")?;
    let session = TestSelectionSession::new(
        &config.cache.root,
        config.cache.compression.into(),
        config.cache.max_cache_size_bytes,
    )?;
    // This demonstration binary runs one subcommand to completion and exits,
    // so there's no external signal to wire into cancellation; a fresh,
    // never-cancelled token still satisfies every operation's §5 contract.
    let cancellation = CancellationToken::new();

    match cli.command {
        Commands::Score { changes, confidence } => {
            let change_set = changes.map(|p| load_changes(&p)).transpose()?;
            let confidence_level: ConfidenceLevel = confidence.into();
            let scored = session.score_tests(&tests, change_set.as_ref(), confidence_level, &cancellation)?;

            match cli.format {
                OutputFormat::Json => {
                    let rows: Vec<serde_json::Value> = scored
                        .iter()
                        .map(|s| {
                            serde_json::json!({
                                "uniqueId": s.test.unique_id,
                                "combinedScore": s.combined_score,
                                "components": s.component_scores,
                            })
                        })
                        .collect();
                    print_json(&serde_json::Value::Array(rows));
                }
                OutputFormat::Text => {
                    for s in &scored {
                        println!("{:>6.3}  {}", s.combined_score, s.test.unique_id);
                    }
                }
            }
        }

        Commands::Plan {
            changes,
            confidence,
            max_tests,
            max_duration_secs,
            include_flaky,
            max_parallelism,
        } => {
            let change_set = changes.map(|p| load_changes(&p)).transpose()?;
            let confidence_level: ConfidenceLevel = confidence.into();

            let mut options = testsel::core::TestSelectionOptions::new();
            options.max_test_count = max_tests;
            options.max_execution_time = max_duration_secs.map(std::time::Duration::from_secs);
            options.include_flaky_tests = include_flaky;
            options.max_parallelism = max_parallelism.max(1);

            let plan = session.create_plan(&tests, change_set.as_ref(), confidence_level, &options, &cancellation)?;

            match cli.format {
                OutputFormat::Json => {
                    print_json(&serde_json::json!({
                        "confidenceLevel": format!("{:?}", plan.confidence_level),
                        "estimatedDurationMs": plan.estimated_duration.as_millis() as u64,
                        "testCount": plan.tests.len(),
                        "batches": plan.batches,
                    }));
                }
                OutputFormat::Text => {
                    println!(
                        "plan: {} tests, {:?} estimated, {} batches",
                        plan.tests.len(),
                        plan.estimated_duration,
                        plan.batches.len()
                    );
                    for test in &plan.tests {
                        println!("  {}", test.unique_id);
                    }
                }
            }
        }

        Commands::Compare { test_a, test_b, coverage, depth } => {
            let a = tests
                .iter()
                .find(|t| t.unique_id_key() == test_a.to_lowercase())
                .with_context(|| format!("unknown test id: {test_a}"))?;
            let b = tests
                .iter()
                .find(|t| t.unique_id_key() == test_b.to_lowercase())
                .with_context(|| format!("unknown test id: {test_b}"))?;

            let coverage_map = coverage.map(|p| load_coverage_map(&p)).transpose()?;
            let options = ComparisonOptions {
                depth: depth.into(),
                full_metadata: true,
                jaccard_weights: Default::default(),
            };
            let result = session.compare_tests(a, b, coverage_map.as_ref(), &options);

            match cli.format {
                OutputFormat::Json => {
                    print_json(&serde_json::json!({
                        "overall": result.overall,
                        "metadataSimilarity": result.metadata_similarity,
                        "overlapPercent": result.coverage_overlap.as_ref().map(|o| o.overlap_percent),
                        "warnings": result.warnings,
                        "recommendationCount": result.recommendations.len(),
                    }));
                }
                OutputFormat::Text => {
                    println!("overall similarity: {:.3}", result.overall);
                    println!("metadata similarity: {:.3}", result.metadata_similarity);
                    if let Some(overlap) = &result.coverage_overlap {
                        println!("coverage overlap: {:.1}%", overlap.overlap_percent);
                    }
                    for warning in &result.warnings {
                        println!("warning: {warning}");
                    }
                    for rec in &result.recommendations {
                        println!("recommendation: {} ({:?})", rec.description, rec.kind);
                    }
                }
            }
        }

        Commands::Cluster {
            ids,
            coverage,
            depth,
            linkage,
            similarity_threshold,
            min_cluster_size,
        } => {
            let selected: Vec<testsel::core::TestInfo> = if ids.is_empty() {
                tests.clone()
            } else {
                let keys: std::collections::HashSet<String> =
                    ids.iter().map(|id| id.to_lowercase()).collect();
                tests
                    .iter()
                    .filter(|t| keys.contains(&t.unique_id_key()))
                    .cloned()
                    .collect()
            };

            let coverage_map = coverage.map(|p| load_coverage_map(&p)).transpose()?;
            let analysis_depth: AnalysisDepth = depth.into();
            let options = ClusteringOptions {
                similarity_threshold,
                min_cluster_size,
                linkage: linkage.into(),
                ..ClusteringOptions::default()
            };

            let report = if let Some(map) = &coverage_map {
                let analyzer = session.coverage_analyzer();
                let comparator = CoverageAwareComparator {
                    depth: analysis_depth,
                    full_metadata: true,
                    coverage_percent: |a: &testsel::core::TestInfo, b: &testsel::core::TestInfo| {
                        Some(analyzer.overlap(map, &a.unique_id, &b.unique_id, Default::default()).overlap_percent)
                    },
                };
                session.analyze_clusters(selected, &comparator, options, &cancellation)?
            } else {
                let comparator = MetadataOnlyComparator {
                    depth: analysis_depth,
                    full_metadata: true,
                };
                session.analyze_clusters(selected, &comparator, options, &cancellation)?
            };

            match cli.format {
                OutputFormat::Json => {
                    let clusters: Vec<serde_json::Value> = report
                        .analysis
                        .clusters
                        .iter()
                        .map(|c| {
                            serde_json::json!({
                                "members": c.members.iter().map(|t| &t.unique_id).collect::<Vec<_>>(),
                                "intraSimilarity": c.intra_similarity,
                                "cohesion": c.cohesion,
                            })
                        })
                        .collect();
                    print_json(&serde_json::json!({
                        "clusters": clusters,
                        "meanSilhouette": report.analysis.quality.mean_silhouette,
                        "clusteringRate": report.analysis.quality.clustering_rate,
                        "recommendationCount": report.recommendations.len(),
                    }));
                }
                OutputFormat::Text => {
                    for (i, cluster) in report.analysis.clusters.iter().enumerate() {
                        println!(
                            "cluster {i}: {} members, intra-sim {:.3}",
                            cluster.members.len(),
                            cluster.intra_similarity
                        );
                        for member in &cluster.members {
                            println!("  {}", member.unique_id);
                        }
                    }
                    println!(
                        "mean silhouette: {:.3}, clustering rate: {:.2}",
                        report.analysis.quality.mean_silhouette, report.analysis.quality.clustering_rate
                    );
                }
            }
        }

        Commands::Validate { unique_id, solution_path } => {
            let discovery = FixtureDiscovery::new(tests.clone());
            let assemblies = assemblies_of(&tests);
            let result = session.validate_test(&discovery, &unique_id, &solution_path, &assemblies, &cancellation)?;

            match cli.format {
                OutputFormat::Json => {
                    print_json(&serde_json::json!({
                        "valid": result.valid,
                        "suggestions": result.suggestions,
                    }));
                }
                OutputFormat::Text => {
                    if result.valid {
                        println!("{unique_id}: valid");
                    } else {
                        println!("{unique_id}: not found");
                        if let Some(suggestions) = &result.suggestions {
                            for suggestion in suggestions {
                                println!("  did you mean: {suggestion}");
                            }
                        }
                    }
                }
            }
        }

        Commands::ShowConfigSources => unreachable!("handled above"),
    }

    Ok(())
}

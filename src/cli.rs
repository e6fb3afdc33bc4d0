//! Command-line surface over the test-selection core.
//!
//! Argument parsing, output formatting, and fixture loading live here
//! rather than in the core (§1 "Out of scope"): everything below this
//! module only ever talks to `engine::TestSelectionSession` and the
//! `discovery` traits.

use crate::core::ConfidenceLevel;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConfidenceArg {
    Fast,
    Medium,
    High,
    Full,
}

impl From<ConfidenceArg> for ConfidenceLevel {
    fn from(value: ConfidenceArg) -> Self {
        match value {
            ConfidenceArg::Fast => ConfidenceLevel::Fast,
            ConfidenceArg::Medium => ConfidenceLevel::Medium,
            ConfidenceArg::High => ConfidenceLevel::High,
            ConfidenceArg::Full => ConfidenceLevel::Full,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DepthArg {
    Shallow,
    Medium,
    Deep,
}

impl From<DepthArg> for crate::clustering::AnalysisDepth {
    fn from(value: DepthArg) -> Self {
        match value {
            DepthArg::Shallow => crate::clustering::AnalysisDepth::Shallow,
            DepthArg::Medium => crate::clustering::AnalysisDepth::Medium,
            DepthArg::Deep => crate::clustering::AnalysisDepth::Deep,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LinkageArg {
    Single,
    Complete,
    Average,
    Ward,
}

impl From<LinkageArg> for crate::clustering::LinkageMethod {
    fn from(value: LinkageArg) -> Self {
        match value {
            LinkageArg::Single => crate::clustering::LinkageMethod::Single,
            LinkageArg::Complete => crate::clustering::LinkageMethod::Complete,
            LinkageArg::Average => crate::clustering::LinkageMethod::Average,
            LinkageArg::Ward => crate::clustering::LinkageMethod::Ward,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "testsel")]
#[command(about = "Intelligent test selection, scoring, and comparison engine", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Path to a fixture file describing candidate tests (JSON array of `TestInfo`-shaped records).
    #[arg(long, global = true, default_value = "testsel-fixture.json")]
    pub fixture: PathBuf,

    /// Optional path to a TOML config file; overrides the default search order.
    #[arg(long, global = true, env = "TESTSEL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Emit JSON instead of a human-readable summary.
    #[arg(long, global = true, value_enum, default_value = "text")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Score every candidate test and print them in selection order.
    Score {
        /// Path to a `CodeChangeSet` JSON file. Omit to score with no known changes.
        #[arg(long)]
        changes: Option<PathBuf>,

        /// Confidence level driving scoring adjustments.
        #[arg(long, value_enum, default_value = "medium")]
        confidence: ConfidenceArg,
    },

    /// Build an execution plan under a confidence level's budget.
    Plan {
        /// Path to a `CodeChangeSet` JSON file. Omit to plan with no known changes.
        #[arg(long)]
        changes: Option<PathBuf>,

        /// Confidence level selecting quotas and score floors.
        #[arg(long, value_enum, default_value = "medium")]
        confidence: ConfidenceArg,

        /// Override the confidence level's default max test count.
        #[arg(long)]
        max_tests: Option<usize>,

        /// Override the confidence level's default duration budget, in seconds.
        #[arg(long)]
        max_duration_secs: Option<u64>,

        /// Include tests classified as flaky.
        #[arg(long)]
        include_flaky: bool,

        /// Maximum tests per parallel batch.
        #[arg(long, default_value = "4")]
        max_parallelism: usize,
    },

    /// Compare two tests by coverage overlap and metadata similarity.
    Compare {
        /// Unique id of the first test.
        test_a: String,
        /// Unique id of the second test.
        test_b: String,

        /// Path to a `TestCoverageMap` JSON fixture. Omit to compare on metadata alone.
        #[arg(long)]
        coverage: Option<PathBuf>,

        /// How much weight coverage overlap carries relative to metadata.
        #[arg(long, value_enum, default_value = "medium")]
        depth: DepthArg,
    },

    /// Cluster a set of tests by overall similarity.
    Cluster {
        /// Unique ids of the tests to cluster; defaults to every test in the fixture.
        #[arg(long)]
        ids: Vec<String>,

        /// Path to a `TestCoverageMap` JSON fixture. Omit to cluster on metadata alone.
        #[arg(long)]
        coverage: Option<PathBuf>,

        /// How much weight coverage overlap carries relative to metadata.
        #[arg(long, value_enum, default_value = "medium")]
        depth: DepthArg,

        /// Linkage rule used to merge clusters.
        #[arg(long, value_enum, default_value = "average")]
        linkage: LinkageArg,

        /// Minimum similarity to merge two clusters.
        #[arg(long, default_value = "0.3")]
        similarity_threshold: f64,

        /// Discard clusters smaller than this.
        #[arg(long, default_value = "2")]
        min_cluster_size: usize,
    },

    /// Validate a test identifier against the fixture, with suggestions on mismatch.
    Validate {
        /// The test identifier to validate.
        unique_id: String,

        /// Solution path passed through to the discovery cache key.
        #[arg(long, default_value = ".")]
        solution_path: String,
    },

    /// Print the config file search order and which one (if any) is in use.
    ShowConfigSources,
}

pub fn parse_args() -> Cli {
    Cli::parse()
}

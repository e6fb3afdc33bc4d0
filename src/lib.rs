//! Intelligent test selection, scoring, and comparison engine.
//!
//! See the module-level docs of [`engine`] for the façade most callers want:
//! [`engine::TestSelectionSession`] wires scoring, plan building, coverage
//! overlap, clustering, validation, history, and the compressed cache
//! behind one owned handle.

pub mod cache;
pub mod cancellation;
pub mod cli;
pub mod clustering;
pub mod config;
pub mod core;
pub mod coverage;
pub mod discovery;
pub mod engine;
pub mod errors;
pub mod fixtures;
pub mod history;
pub mod observability;
pub mod plan;
pub mod scoring;
pub mod similarity;
pub mod validation;

pub use crate::cancellation::CancellationToken;

pub use crate::core::{
    ChangeType, CodeChange, CodeChangeSet, ConfidenceLevel, TestCategory, TestExecutionResult,
    TestInfo, TestSelectionOptions,
};

pub use crate::engine::{
    ComparisonOptions, ComparisonResult, ClusterAnalysisReport, EstimatedEffort, Recommendation,
    RecommendationKind, TestSelectionSession,
};

pub use crate::errors::{AnalysisError, Result};

pub use crate::plan::{PlanBuilder, TestExecutionPlan};

pub use crate::scoring::{ScoredTest, ScoringService};

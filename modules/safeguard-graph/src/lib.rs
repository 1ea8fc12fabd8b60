//! Pure analytics over a social-connection graph: classification, danger
//! sources, pull propagation, danger zones, safety scores, danger patterns,
//! community structure and recommendations.
//!
//! Everything here is synchronous and deterministic. Inputs are read once into
//! an [`AnalysisContext`]; every function below takes it by reference and
//! returns freshly computed values.

pub mod analysis;
pub mod classify;
pub mod community;
pub mod context;
pub mod danger;
pub mod patterns;
pub mod pull;
pub mod recommend;
pub mod safety;
pub mod traverse;
pub mod zones;

#[cfg(any(test, feature = "test-utils"))]
pub mod testutil;

pub use analysis::{analyze, analyze_at, AnalysisMetadata, AnalysisReport};
pub use classify::{classify_nodes, Classification, NodeClass};
pub use community::{analyze_communities, CommunityAnalysis};
pub use context::AnalysisContext;

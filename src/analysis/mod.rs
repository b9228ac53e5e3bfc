//! Contract analysis: per-check provider calls and merging of their results.

pub mod aggregator;
pub mod analyzer;

pub use analyzer::{AnalysisError, AnalyzerSettings, ContractAnalyzer};

pub mod parser;

pub mod analyzer;
pub use analyzer::{AnalysisError, BatchAnalysis, BatchEntry, ComplexityTier, RawQuery};

pub mod planner;
pub use planner::{CostModel, ExecutionGroup, ExecutionPlan, GroupStrategy, ResourceConstraints};

pub mod executor;
pub use executor::{AdaptiveExecutor, ExecutionBackend, ExecutionReport, MemoryBackend, RowVerifier, VerificationBackend};

pub mod report;
pub use report::{BatchReport, QueryStatus, ResultAggregator};

pub mod config;
pub use config::{ConfigError, EngineConfig};

pub mod engine;
pub use engine::ConsolidationEngine;

//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use financial_fusion_engine::prelude::*;
//! ```

// Core
pub use crate::core::config::{Config, FusionWeights, Preset, StrategyWeights};
pub use crate::core::errors::{FusionError, Result};

// Model
pub use crate::model::{
    DataSource, FinancialData, HistoricalPattern, KnowledgeGraphContext, Priority, RiskLevel,
    ScenarioSimulation, SignalType, WeakSignal,
};

// Detector
pub use crate::detector::detect;

// Fusion
pub use crate::fusion::bayesian::BayesianStrategy;
pub use crate::fusion::dempster_shafer::DempsterShaferStrategy;
pub use crate::fusion::meta::MetaFusionOutcome;
pub use crate::fusion::weighted::WeightedStrategy;
pub use crate::fusion::{StrategyDiagnostics, StrategyKind, StrategyResult};

// Engine
pub use crate::engine::enrich::{NarrativeEnricher, TemplateEnricher, enrich_with_timeout};
pub use crate::engine::record::{ExplainLevel, SynthesisRecord, format_explain};
pub use crate::engine::{
    AggregatedIntelligence, FusedDecision, PredictedOutcome, SynthesisEngine, SynthesisOutcome,
    synthesize,
};

// Journal
pub use crate::logger::SynthesisJournal;

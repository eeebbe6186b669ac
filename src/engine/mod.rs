//! Synthesis engine: the single `synthesize()` pipeline orchestrating
//! detection, the three fusion strategies, consensus, and assembly.
//!
//! The engine is synchronous and pure — a function of its inputs plus static
//! configuration. It holds no cross-call state, takes no locks, and performs
//! no I/O, so concurrent calls from multiple threads are safe.

#![allow(missing_docs)]

use serde::{Deserialize, Serialize};

use crate::core::config::{Config, Preset, StrategyWeights};
use crate::core::errors::{FusionError, Result};
use crate::detector;
use crate::fusion::bayesian::BayesianStrategy;
use crate::fusion::dempster_shafer::DempsterShaferStrategy;
use crate::fusion::meta::{self, MetaFusionOutcome};
use crate::fusion::weighted::WeightedStrategy;
use crate::fusion::StrategyResult;
use crate::model::{self, FinancialData, KnowledgeGraphContext, ScenarioSimulation};

pub mod assembler;
pub mod enrich;
pub mod record;

pub use assembler::{FusedDecision, PredictedOutcome};

/// Cash-flow impact spread across the scenario set.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ScenarioRiskRange {
    pub min_cash_flow_impact: f64,
    pub max_cash_flow_impact: f64,
    pub range: f64,
}

/// Cross-source aggregation computed once per call; feeds the explanation
/// and the audit record, not the fusion math.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AggregatedIntelligence {
    /// Composite stress over invoices, budget, and production (0 ≈ calm).
    pub financial_stress: f64,
    pub historical_pattern_match: bool,
    pub external_risk_factors: usize,
    pub scenario_risk_range: ScenarioRiskRange,
    /// Co-movement of production slowdown and invoice spikes, 0–1.
    pub production_finance_correlation: f64,
}

/// Correlate financial, knowledge-graph, and simulation inputs.
#[must_use]
pub fn aggregate_sources(
    financial: &FinancialData,
    kg: &KnowledgeGraphContext,
    scenarios: &[ScenarioSimulation],
) -> AggregatedIntelligence {
    let invoice_stress = (financial.unpaid_invoices_spike / 100.0).min(1.0);
    let budget_stress = 1.0 - financial.budget_remaining_q3 / 100.0;
    let production_stress = (financial.production_output_change.abs() / 50.0).min(1.0);
    let financial_stress =
        invoice_stress.mul_add(0.4, budget_stress.mul_add(0.3, production_stress * 0.3));

    let cash_flows = scenarios.iter().map(|scenario| scenario.cash_flow_impact);
    let min_cash = cash_flows.clone().fold(f64::INFINITY, f64::min);
    let max_cash = cash_flows.fold(f64::NEG_INFINITY, f64::max);

    let production_finance_correlation = if financial.production_output_change < 0.0
        && financial.unpaid_invoices_spike > 0.0
    {
        (financial.production_output_change.abs() * financial.unpaid_invoices_spike / 100.0)
            .min(1.0)
    } else {
        0.0
    };

    AggregatedIntelligence {
        financial_stress,
        historical_pattern_match: kg.similar_historical_pattern.is_some(),
        external_risk_factors: kg.external_data_signals.len(),
        scenario_risk_range: ScenarioRiskRange {
            min_cash_flow_impact: min_cash,
            max_cash_flow_impact: max_cash,
            range: max_cash - min_cash,
        },
        production_finance_correlation,
    }
}

/// Everything one synthesis call produced, for journaling and explain.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisOutcome {
    pub decision: FusedDecision,
    pub strategy_results: Vec<StrategyResult>,
    pub aggregated: AggregatedIntelligence,
    /// Whether the DST strategy was dropped after a total-conflict error.
    pub fallback_applied: bool,
}

/// One-shot convenience mirroring the service contract: validate the
/// configuration, run the pipeline once, return the decision.
pub fn synthesize(
    financial: &FinancialData,
    kg: &KnowledgeGraphContext,
    scenarios: &[ScenarioSimulation],
    config: Config,
) -> Result<FusedDecision> {
    SynthesisEngine::new(config)?.synthesize(financial, kg, scenarios)
}

/// The multi-strategy synthesis engine.
#[derive(Debug, Clone)]
pub struct SynthesisEngine {
    config: Config,
}

impl SynthesisEngine {
    /// Build an engine from a validated configuration.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Engine with the default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// Engine with a named risk/profitability preset.
    #[must_use]
    pub fn from_preset(preset: Preset) -> Self {
        let mut config = Config::default();
        config.apply_preset(preset);
        Self { config }
    }

    /// Effective configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Run the full pipeline and return only the decision.
    pub fn synthesize(
        &self,
        financial: &FinancialData,
        kg: &KnowledgeGraphContext,
        scenarios: &[ScenarioSimulation],
    ) -> Result<FusedDecision> {
        self.synthesize_traced(financial, kg, scenarios)
            .map(|outcome| outcome.decision)
    }

    /// Run the full pipeline, keeping per-strategy results and aggregation
    /// for journaling and explain output.
    pub fn synthesize_traced(
        &self,
        financial: &FinancialData,
        kg: &KnowledgeGraphContext,
        scenarios: &[ScenarioSimulation],
    ) -> Result<SynthesisOutcome> {
        self.run(financial, kg, scenarios, &self.config.strategy, true)
    }

    /// Like [`Self::synthesize_traced`], but on DST total contradiction
    /// retries with the Weighted and Bayesian strategies only, DST weight
    /// zeroed and the remainder renormalized.
    pub fn synthesize_with_fallback(
        &self,
        financial: &FinancialData,
        kg: &KnowledgeGraphContext,
        scenarios: &[ScenarioSimulation],
    ) -> Result<SynthesisOutcome> {
        match self.synthesize_traced(financial, kg, scenarios) {
            Err(FusionError::FusionConflict { .. }) => {
                let weights = self.config.strategy.without_dst()?;
                let mut outcome = self.run(financial, kg, scenarios, &weights, false)?;
                outcome.fallback_applied = true;
                Ok(outcome)
            }
            other => other,
        }
    }

    fn run(
        &self,
        financial: &FinancialData,
        kg: &KnowledgeGraphContext,
        scenarios: &[ScenarioSimulation],
        weights: &StrategyWeights,
        include_dst: bool,
    ) -> Result<SynthesisOutcome> {
        model::validate_inputs(financial, scenarios)?;

        let aggregated = aggregate_sources(financial, kg, scenarios);
        let weak_signals = detector::detect(financial, kg);

        let mut results = Vec::with_capacity(3);
        results.push(
            WeightedStrategy::new(self.config.fusion.risk_weight).run(scenarios, &weak_signals),
        );
        if include_dst {
            results.push(DempsterShaferStrategy.run(financial, kg, scenarios)?);
        }
        results.push(BayesianStrategy.run(financial, kg, scenarios)?);

        let meta: MetaFusionOutcome = meta::combine(&results, weights)?;
        let decision = assembler::assemble(
            financial,
            kg,
            scenarios,
            weak_signals,
            &results,
            meta,
            &aggregated,
        )?;

        Ok(SynthesisOutcome {
            decision,
            strategy_results: results,
            aggregated,
            fallback_applied: false,
        })
    }
}

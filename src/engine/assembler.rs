//! Decision assembler: maps the fused consensus plus weak signals to a
//! prioritized, explainable decision object.
//!
//! All text is produced from deterministic templates — the decision is fully
//! valid without any LLM enrichment.

#![allow(missing_docs)]

use std::fmt::Write as _;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::errors::Result;
use crate::engine::AggregatedIntelligence;
use crate::fusion::meta::MetaFusionOutcome;
use crate::fusion::{StrategyDiagnostics, StrategyResult};
use crate::model::{
    FinancialData, KnowledgeGraphContext, Priority, RiskLevel, ScenarioSimulation, WeakSignal,
};

/// Cash-flow magnitude (percent) above which a decision is High priority.
const HIGH_IMPACT_THRESHOLD: f64 = 15.0;

/// Cash-flow magnitude (percent) at which a decision reaches Medium priority.
const MEDIUM_IMPACT_THRESHOLD: f64 = 5.0;

static EARLY_PAYMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)early\s+payment").expect("static action pattern must compile")
});
static RENEGOTIATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)renegotiat").expect("static action pattern must compile"));
static HEDGING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)hedg|insurance").expect("static action pattern must compile")
});
static BUSINESS_AS_USUAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)business\s+as\s+usual").expect("static action pattern must compile")
});

/// Financial outcome copied from the winning scenario.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PredictedOutcome {
    pub cash_flow_impact_pct: f64,
    pub margin_impact_pct: f64,
    pub time_to_impact_days: u32,
    pub probability: f64,
}

/// Final output of one synthesis call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FusedDecision {
    pub tactical_priority: Priority,
    pub recommended_action: String,
    pub explanation: String,
    pub weak_signal_alert: Vec<WeakSignal>,
    pub predicted_financial_outcome: PredictedOutcome,
    pub confidence_score: f64,
    pub meta_fusion: MetaFusionOutcome,
    pub alternative_actions: Vec<String>,
}

impl FusedDecision {
    /// Render the decision as pretty-printed JSON with the stable key set.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Assemble the final decision from the consensus outcome.
pub fn assemble(
    financial: &FinancialData,
    kg: &KnowledgeGraphContext,
    scenarios: &[ScenarioSimulation],
    weak_signals: Vec<WeakSignal>,
    results: &[StrategyResult],
    meta: MetaFusionOutcome,
    aggregated: &AggregatedIntelligence,
) -> Result<FusedDecision> {
    let winner = scenarios
        .iter()
        .find(|scenario| scenario.scenario_id == meta.recommended_scenario_id)
        .ok_or_else(|| crate::core::errors::FusionError::Runtime {
            details: format!(
                "consensus winner `{}` not present in scenario list",
                meta.recommended_scenario_id
            ),
        })?;

    let tactical_priority = determine_priority(&weak_signals, winner);
    let recommended_action = recommended_action(winner, financial);
    let explanation = build_explanation(
        financial,
        kg,
        scenarios,
        &weak_signals,
        results,
        &meta,
        aggregated,
        winner,
    );
    let alternative_actions = alternatives(scenarios, &meta);

    Ok(FusedDecision {
        tactical_priority,
        recommended_action,
        explanation,
        weak_signal_alert: weak_signals,
        predicted_financial_outcome: PredictedOutcome {
            cash_flow_impact_pct: winner.cash_flow_impact,
            margin_impact_pct: winner.margin_impact,
            time_to_impact_days: winner.time_horizon_days,
            probability: winner.probability,
        },
        confidence_score: meta.consensus_confidence,
        meta_fusion: meta,
        alternative_actions,
    })
}

/// Priority ladder over weak signals and the winner's cash-flow magnitude.
#[must_use]
pub fn determine_priority(weak_signals: &[WeakSignal], winner: &ScenarioSimulation) -> Priority {
    let cash_magnitude = winner.cash_flow_impact.abs();
    let critical_present = weak_signals
        .iter()
        .any(|signal| signal.risk_level == RiskLevel::Critical);

    if critical_present || weak_signals.len() >= 2 || cash_magnitude > HIGH_IMPACT_THRESHOLD {
        Priority::High
    } else if weak_signals.len() == 1
        || (MEDIUM_IMPACT_THRESHOLD..=HIGH_IMPACT_THRESHOLD).contains(&cash_magnitude)
    {
        Priority::Medium
    } else {
        Priority::Low
    }
}

/// The weak signal that should headline the alert: most severe level first,
/// then strongest correlation.
#[must_use]
pub fn dominant_signal(weak_signals: &[WeakSignal]) -> Option<&WeakSignal> {
    weak_signals.iter().max_by(|left, right| {
        left.risk_level.cmp(&right.risk_level).then(
            left.correlation_strength
                .partial_cmp(&right.correlation_strength)
                .unwrap_or(std::cmp::Ordering::Equal),
        )
    })
}

/// Keyword-classified action template for the winning scenario.
fn recommended_action(winner: &ScenarioSimulation, financial: &FinancialData) -> String {
    let client = &financial.client_id;
    if EARLY_PAYMENT.is_match(&winner.description) {
        format!("Trigger early payment incentive for client {client}")
    } else if RENEGOTIATION.is_match(&winner.description) {
        format!("Initiate payment term renegotiation with client {client}")
    } else if HEDGING.is_match(&winner.description) {
        format!("Activate cash flow hedging strategy for client {client}")
    } else if BUSINESS_AS_USUAL.is_match(&winner.description) {
        format!("Maintain current operations for client {client} (monitor closely)")
    } else {
        format!("Execute {}: {}", winner.scenario_id, winner.description)
    }
}

/// Descriptions of all non-winning scenarios, ordered by consensus score
/// descending (ties lexicographic by scenario id).
fn alternatives(scenarios: &[ScenarioSimulation], meta: &MetaFusionOutcome) -> Vec<String> {
    let mut losers: Vec<&ScenarioSimulation> = scenarios
        .iter()
        .filter(|scenario| scenario.scenario_id != meta.recommended_scenario_id)
        .collect();
    losers.sort_by(|left, right| {
        let left_score = meta
            .consensus_scores
            .get(&left.scenario_id)
            .copied()
            .unwrap_or(0.0);
        let right_score = meta
            .consensus_scores
            .get(&right.scenario_id)
            .copied()
            .unwrap_or(0.0);
        right_score
            .partial_cmp(&left_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| left.scenario_id.cmp(&right.scenario_id))
    });
    losers
        .into_iter()
        .map(|scenario| scenario.description.clone())
        .collect()
}

fn conflict_label(conflict: f64) -> &'static str {
    if conflict < 0.3 {
        "Low"
    } else if conflict < 0.6 {
        "Moderate"
    } else {
        "High"
    }
}

/// Multi-part deterministic explanation connecting every data source.
#[allow(clippy::too_many_arguments)]
fn build_explanation(
    financial: &FinancialData,
    kg: &KnowledgeGraphContext,
    scenarios: &[ScenarioSimulation],
    weak_signals: &[WeakSignal],
    results: &[StrategyResult],
    meta: &MetaFusionOutcome,
    aggregated: &AggregatedIntelligence,
    winner: &ScenarioSimulation,
) -> String {
    let mut text = String::new();
    let _ = write!(
        text,
        "META-FUSION DECISION: {} ({}) selected via multi-strategy consensus \
({:.0}% agreement across {} fusion algorithms).",
        winner.scenario_id,
        winner.description,
        meta.agreement_level * 100.0,
        results.len()
    );

    let _ = write!(text, "\n\nSTRATEGY ANALYSIS:");
    for result in results {
        let own_score = result
            .score_per_scenario
            .get(&result.recommended_scenario_id)
            .copied()
            .unwrap_or(0.0);
        let _ = write!(
            text,
            "\n- {}: recommends {} (score {:.3})",
            result.strategy, result.recommended_scenario_id, own_score
        );
        match &result.diagnostics {
            StrategyDiagnostics::DempsterShafer { conflict, .. } => {
                let _ = write!(
                    text,
                    "\n  inter-source conflict: {:.1}% ({})",
                    conflict * 100.0,
                    conflict_label(*conflict)
                );
            }
            StrategyDiagnostics::Bayesian {
                entropy,
                kl_divergence_from_prior,
                ..
            } => {
                let _ = write!(
                    text,
                    "\n  posterior entropy: {entropy:.3} nats | KL divergence from prior: \
{kl_divergence_from_prior:.3}"
                );
            }
            StrategyDiagnostics::Weighted { .. } => {}
        }
    }

    let _ = write!(
        text,
        "\n\nFINANCIAL CONTEXT: Client {} shows a {}% spike in unpaid invoices, \
{}% production output change, and {}% Q3 budget remaining \
(financial stress index {:.2}).",
        financial.client_id,
        financial.unpaid_invoices_spike,
        financial.production_output_change,
        financial.budget_remaining_q3,
        aggregated.financial_stress
    );

    if let Some(pattern) = kg.similar_historical_pattern {
        let _ = write!(
            text,
            "\n\nKNOWLEDGE GRAPH INTELLIGENCE: Episodic memory indicates this pattern \
occurred {} years ago, resulting in a {}-day cash flow delay. \
Client parent company status: {}.",
            pattern.years_ago, pattern.delay_days, kg.client_parent_status
        );
    }

    if financial.production_output_change < 0.0 {
        let _ = write!(
            text,
            "\n\nPRODUCTION INTELLIGENCE: IoT logs show {}% production slowdown, \
correlating with payment delays (production/finance correlation {:.2}).",
            financial.production_output_change.abs(),
            aggregated.production_finance_correlation
        );
    }

    if let Some(worst) = scenarios
        .iter()
        .filter(|scenario| scenario.scenario_id != winner.scenario_id)
        .max_by(|left, right| {
            left.cash_flow_impact
                .abs()
                .partial_cmp(&right.cash_flow_impact.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| right.scenario_id.cmp(&left.scenario_id))
        })
    {
        let _ = write!(
            text,
            "\n\nSCENARIO COMPARISON: {} avoids the {}% cash flow deficit predicted in {}, \
with acceptable {}% margin impact.",
            winner.scenario_id,
            worst.cash_flow_impact.abs(),
            worst.scenario_id,
            winner.margin_impact.abs()
        );
    }

    if !weak_signals.is_empty() {
        let named: Vec<String> = weak_signals
            .iter()
            .take(2)
            .map(|signal| signal.signal_type.to_string())
            .collect();
        let _ = write!(
            text,
            "\n\nWEAK SIGNAL CORRELATIONS: {} systemic risk indicators detected, \
including {}.",
            weak_signals.len(),
            named.join(", ")
        );
        if let Some(dominant) = dominant_signal(weak_signals) {
            let _ = write!(
                text,
                " Dominant signal: {} ({} risk, correlation {:.2}).",
                dominant.signal_type, dominant.risk_level, dominant.correlation_strength
            );
        }
    }

    if meta.agreement_level >= 0.9 {
        let _ = write!(
            text,
            "\n\nCONSENSUS: Strong agreement — all fusion methods converge on the same decision."
        );
    } else if meta.agreement_level >= 0.66 {
        let _ = write!(
            text,
            "\n\nCONSENSUS: Majority agreement — most fusion methods agree, minor divergence \
detected."
        );
    } else {
        let divergent: Vec<String> = results
            .iter()
            .filter(|result| result.recommended_scenario_id != meta.recommended_scenario_id)
            .map(|result| format!("{}: {}", result.strategy, result.recommended_scenario_id))
            .collect();
        let _ = write!(
            text,
            "\n\nCONSENSUS WARNING: Strategies disagree. Divergent recommendations: {}. \
Decision made by weighted meta-fusion voting.",
            divergent.join("; ")
        );
    }

    text
}

//! Unified audit record and explain rendering for synthesis decisions.
//!
//! Every synthesis call can be captured as a `SynthesisRecord` holding the
//! full provenance chain: input digest, weak signals, per-strategy results,
//! consensus outcome, and the final decision. Any decision can be explained,
//! audited, or replayed from this record alone.
//!
//! Explain output supports four detail levels:
//! - **Level 0**: concise recommendation (one line)
//! - **Level 1**: per-strategy vote table
//! - **Level 2**: fusion diagnostics (conflict, entropy, weak signals)
//! - **Level 3**: full serialized trace payload for replay/debug

use std::fmt;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::core::errors::Result;
use crate::engine::AggregatedIntelligence;
use crate::engine::assembler::FusedDecision;
use crate::fusion::{StrategyDiagnostics, StrategyResult};
use crate::model::{FinancialData, KnowledgeGraphContext, ScenarioSimulation, WeakSignal};

// ──────────────────── explain level ────────────────────

/// Detail level for explain output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ExplainLevel {
    /// Concise recommendation: priority + action + confidence.
    L0 = 0,
    /// Per-strategy vote table.
    L1 = 1,
    /// Fusion diagnostics detail.
    L2 = 2,
    /// Full serialized trace payload for replay.
    L3 = 3,
}

impl ExplainLevel {
    /// Parse from an integer (clamped to 0..=3).
    #[must_use]
    pub fn from_int(n: u8) -> Self {
        match n {
            0 => Self::L0,
            1 => Self::L1,
            2 => Self::L2,
            _ => Self::L3,
        }
    }
}

impl fmt::Display for ExplainLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", *self as u8)
    }
}

// ──────────────────── synthesis record ────────────────────

/// Full provenance record for a single synthesis decision.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SynthesisRecord {
    /// Short identifier derived from the input digest.
    pub trace_id: String,
    /// ISO 8601 timestamp when the record was captured.
    pub timestamp: String,
    /// Stable hash of the effective configuration.
    pub config_hash: String,
    /// SHA-256 of the canonical input JSON (financial + kg + scenarios).
    pub input_digest: String,
    pub client_id: String,
    pub scenario_count: usize,
    pub aggregated: AggregatedIntelligence,
    pub weak_signals: Vec<WeakSignal>,
    pub strategy_results: Vec<StrategyResult>,
    pub decision: FusedDecision,
}

impl SynthesisRecord {
    /// Capture a record from one completed synthesis call.
    pub fn capture(
        financial: &FinancialData,
        kg: &KnowledgeGraphContext,
        scenarios: &[ScenarioSimulation],
        config_hash: String,
        aggregated: &AggregatedIntelligence,
        strategy_results: &[StrategyResult],
        decision: &FusedDecision,
    ) -> Result<Self> {
        let input_digest = input_digest(financial, kg, scenarios)?;
        let trace_id = input_digest.chars().take(12).collect();
        Ok(Self {
            trace_id,
            timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            config_hash,
            input_digest,
            client_id: financial.client_id.clone(),
            scenario_count: scenarios.len(),
            aggregated: aggregated.clone(),
            weak_signals: decision.weak_signal_alert.clone(),
            strategy_results: strategy_results.to_vec(),
            decision: decision.clone(),
        })
    }
}

/// SHA-256 hex digest of the canonical input JSON. Identical inputs always
/// produce the identical digest, which makes replay detection trivial.
pub fn input_digest(
    financial: &FinancialData,
    kg: &KnowledgeGraphContext,
    scenarios: &[ScenarioSimulation],
) -> Result<String> {
    let canonical = serde_json::to_vec(&(financial, kg, scenarios))?;
    let mut hasher = Sha256::new();
    hasher.update(&canonical);
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(64);
    for byte in digest {
        let _ = write!(hex, "{byte:02x}");
    }
    Ok(hex)
}

// ──────────────────── explain rendering ────────────────────

/// Render a record at the requested detail level.
#[must_use]
pub fn format_explain(record: &SynthesisRecord, level: ExplainLevel) -> String {
    let mut out = String::new();
    let decision = &record.decision;

    let _ = writeln!(
        out,
        "[{}] {} priority | {} | confidence {:.2} | agreement {:.0}%",
        record.trace_id,
        decision.tactical_priority,
        decision.recommended_action,
        decision.confidence_score,
        decision.meta_fusion.agreement_level * 100.0
    );
    if level == ExplainLevel::L0 {
        return out;
    }

    let _ = writeln!(out, "strategy votes:");
    for result in &record.strategy_results {
        let own_score = result
            .score_per_scenario
            .get(&result.recommended_scenario_id)
            .copied()
            .unwrap_or(0.0);
        let _ = writeln!(
            out,
            "  {:<24} -> {:<12} score {:.4}",
            result.strategy.to_string(),
            result.recommended_scenario_id,
            own_score
        );
    }
    if level == ExplainLevel::L1 {
        return out;
    }

    let _ = writeln!(
        out,
        "diagnostics: stress={:.3} pattern_match={} external_signals={}",
        record.aggregated.financial_stress,
        record.aggregated.historical_pattern_match,
        record.aggregated.external_risk_factors
    );
    for result in &record.strategy_results {
        match &result.diagnostics {
            StrategyDiagnostics::Weighted {
                risk_weight,
                profitability_weight,
                critical_bump_applied,
            } => {
                let _ = writeln!(
                    out,
                    "  weighted: risk_weight={risk_weight:.2} profit_weight=\
{profitability_weight:.2} critical_bump={critical_bump_applied}"
                );
            }
            StrategyDiagnostics::DempsterShafer {
                conflict,
                max_conflict,
                uncertainty_gap,
                ..
            } => {
                let _ = writeln!(
                    out,
                    "  dst: conflict={conflict:.4} max_conflict={max_conflict:.4} \
uncertainty_gap={uncertainty_gap:.4}"
                );
            }
            StrategyDiagnostics::Bayesian {
                entropy,
                kl_divergence_from_prior,
                bayes_factor,
                ..
            } => {
                let factor = bayes_factor
                    .map_or_else(|| "n/a".to_string(), |value| format!("{value:.3}"));
                let _ = writeln!(
                    out,
                    "  bayesian: entropy={entropy:.4} kl={kl_divergence_from_prior:.4} \
bayes_factor={factor}"
                );
            }
        }
    }
    for signal in &record.weak_signals {
        let _ = writeln!(
            out,
            "  weak signal: {} [{}] strength={:.2}",
            signal.signal_type, signal.risk_level, signal.correlation_strength
        );
    }
    if level == ExplainLevel::L2 {
        return out;
    }

    match serde_json::to_string_pretty(record) {
        Ok(json) => {
            let _ = writeln!(out, "trace payload:\n{json}");
        }
        Err(e) => {
            let _ = writeln!(out, "trace payload unavailable: {e}");
        }
    }
    out
}

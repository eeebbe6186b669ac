//! Fusion strategies: three independent algorithms behind one result contract,
//! combined by the meta-fusion consensus layer.
//!
//! Each strategy is a pure function of its inputs — no shared mutable state,
//! no I/O, bounded `O(scenarios × evidence sources)` work per call.

#![allow(missing_docs)]

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::ScenarioSimulation;

pub mod bayesian;
pub mod dempster_shafer;
pub mod evidence;
pub mod meta;
pub mod weighted;

/// The three fusion algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Weighted,
    DempsterShafer,
    Bayesian,
}

impl StrategyKind {
    /// Short key used for strategy weights and JSON breakdowns.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Weighted => "weighted",
            Self::DempsterShafer => "dst",
            Self::Bayesian => "bayesian",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Weighted => write!(f, "Weighted Average"),
            Self::DempsterShafer => write!(f, "Dempster-Shafer Theory"),
            Self::Bayesian => write!(f, "Bayesian Inference"),
        }
    }
}

/// Strategy-specific diagnostics attached to a [`StrategyResult`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyDiagnostics {
    Weighted {
        risk_weight: f64,
        profitability_weight: f64,
        /// Whether a Critical weak signal bumped the risk weight.
        critical_bump_applied: bool,
    },
    DempsterShafer {
        /// Conflict mass K of the final pairwise combination.
        conflict: f64,
        /// Largest K observed across the combination chain.
        max_conflict: f64,
        belief: BTreeMap<String, f64>,
        plausibility: BTreeMap<String, f64>,
        /// Plausibility − Belief gap of the recommended scenario.
        uncertainty_gap: f64,
        pignistic: BTreeMap<String, f64>,
    },
    Bayesian {
        /// Shannon entropy of the posterior, in nats.
        entropy: f64,
        kl_divergence_from_prior: f64,
        /// Winner vs. runner-up posterior-odds ratio; absent for a
        /// single-scenario frame or a zero-probability runner-up.
        #[serde(skip_serializing_if = "Option::is_none")]
        bayes_factor: Option<f64>,
        log_likelihood: f64,
        update_steps: usize,
        /// Posterior after each update step, starting from the prior.
        evidence_trail: Vec<BTreeMap<String, f64>>,
    },
}

/// Output contract every strategy honors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StrategyResult {
    pub strategy: StrategyKind,
    pub recommended_scenario_id: String,
    /// Normalized per-scenario score. Sums to 1 for all three strategies
    /// (the Weighted strategy normalizes its raw fusion scores).
    pub score_per_scenario: BTreeMap<String, f64>,
    pub diagnostics: StrategyDiagnostics,
}

// ──────────────────────── shared helpers ────────────────────────

/// Normalize a score map to sum to 1; a zero-mass map becomes uniform.
#[must_use]
pub fn normalize_scores(scores: BTreeMap<String, f64>) -> BTreeMap<String, f64> {
    let total: f64 = scores.values().sum();
    if total > 0.0 {
        scores
            .into_iter()
            .map(|(id, score)| (id, score / total))
            .collect()
    } else {
        let n = scores.len().max(1);
        #[allow(clippy::cast_precision_loss)]
        let uniform = 1.0 / n as f64;
        scores.into_keys().map(|id| (id, uniform)).collect()
    }
}

/// Highest-scoring scenario id; ties resolved lexicographically.
///
/// `BTreeMap` iteration is ascending by id, and only a strictly greater
/// score displaces the incumbent, so the smallest id wins a tie.
#[must_use]
pub fn argmax_scenario(scores: &BTreeMap<String, f64>) -> Option<(&str, f64)> {
    let mut best: Option<(&str, f64)> = None;
    for (id, &score) in scores {
        match best {
            Some((_, incumbent)) if score <= incumbent => {}
            _ => best = Some((id.as_str(), score)),
        }
    }
    best
}

/// Risk/safe pole selection: the scenario with the largest absolute
/// cash-flow impact is the risk pole, the smallest the safe pole.
/// Ties break lexicographically by scenario id.
#[must_use]
pub fn risk_safe_poles(scenarios: &[ScenarioSimulation]) -> (String, String) {
    let mut risk: Option<&ScenarioSimulation> = None;
    let mut safe: Option<&ScenarioSimulation> = None;

    for scenario in scenarios {
        let magnitude = scenario.cash_flow_impact.abs();
        risk = Some(match risk {
            Some(incumbent)
                if magnitude < incumbent.cash_flow_impact.abs()
                    || (magnitude == incumbent.cash_flow_impact.abs()
                        && scenario.scenario_id >= incumbent.scenario_id) =>
            {
                incumbent
            }
            _ => scenario,
        });
        safe = Some(match safe {
            Some(incumbent)
                if magnitude > incumbent.cash_flow_impact.abs()
                    || (magnitude == incumbent.cash_flow_impact.abs()
                        && scenario.scenario_id >= incumbent.scenario_id) =>
            {
                incumbent
            }
            _ => scenario,
        });
    }

    match (risk, safe) {
        (Some(r), Some(s)) => (r.scenario_id.clone(), s.scenario_id.clone()),
        _ => (String::new(), String::new()),
    }
}

/// Composite simulation performance score used by the evidence builders:
/// cash-flow stability, margin preservation, and simulation confidence.
#[must_use]
pub fn simulation_score(scenario: &ScenarioSimulation) -> f64 {
    let cf_score = 1.0 - scenario.cash_flow_impact.abs() / 100.0;
    let margin_score = 1.0 - scenario.margin_impact.abs() / 100.0;
    cf_score.mul_add(0.5, margin_score.mul_add(0.3, scenario.probability * 0.2))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario(id: &str, cash: f64) -> ScenarioSimulation {
        ScenarioSimulation {
            scenario_id: id.to_string(),
            description: String::new(),
            cash_flow_impact: cash,
            margin_impact: 0.0,
            probability: 0.8,
            time_horizon_days: 30,
        }
    }

    #[test]
    fn normalize_scales_to_unit_sum() {
        let scores: BTreeMap<String, f64> =
            [("A".to_string(), 2.0), ("B".to_string(), 6.0)].into();
        let normalized = normalize_scores(scores);
        let total: f64 = normalized.values().sum();
        assert!((total - 1.0).abs() < 1e-12);
        assert!((normalized["A"] - 0.25).abs() < 1e-12);
    }

    #[test]
    fn normalize_zero_mass_becomes_uniform() {
        let scores: BTreeMap<String, f64> =
            [("A".to_string(), 0.0), ("B".to_string(), 0.0)].into();
        let normalized = normalize_scores(scores);
        assert!((normalized["A"] - 0.5).abs() < 1e-12);
        assert!((normalized["B"] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn argmax_breaks_ties_lexicographically() {
        let scores: BTreeMap<String, f64> = [
            ("B".to_string(), 0.4),
            ("A".to_string(), 0.4),
            ("C".to_string(), 0.2),
        ]
        .into();
        let (id, score) = argmax_scenario(&scores).unwrap();
        assert_eq!(id, "A");
        assert!((score - 0.4).abs() < 1e-12);
    }

    #[test]
    fn poles_pick_extreme_cash_flow_magnitudes() {
        let scenarios = vec![scenario("A", -20.0), scenario("B", 0.0), scenario("C", 5.0)];
        let (risk, safe) = risk_safe_poles(&scenarios);
        assert_eq!(risk, "A");
        assert_eq!(safe, "B");
    }

    #[test]
    fn pole_ties_break_lexicographically() {
        let scenarios = vec![scenario("B", -10.0), scenario("A", 10.0)];
        let (risk, safe) = risk_safe_poles(&scenarios);
        assert_eq!(risk, "A");
        assert_eq!(safe, "A");
    }

    #[test]
    fn single_scenario_is_both_poles() {
        let scenarios = vec![scenario("ONLY", -5.0)];
        let (risk, safe) = risk_safe_poles(&scenarios);
        assert_eq!(risk, "ONLY");
        assert_eq!(safe, "ONLY");
    }

    #[test]
    fn simulation_score_combines_three_factors() {
        let s = scenario("A", -20.0);
        // 0.8 * 0.5 + 1.0 * 0.3 + 0.8 * 0.2 = 0.86
        assert!((simulation_score(&s) - 0.86).abs() < 1e-12);
    }
}

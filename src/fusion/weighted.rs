//! Weighted fusion strategy: linear risk/profitability combination per
//! scenario, with dynamic weight adjustment under critical weak signals.

use std::collections::BTreeMap;

use crate::fusion::{StrategyDiagnostics, StrategyKind, StrategyResult, normalize_scores};
use crate::model::{RiskLevel, ScenarioSimulation, WeakSignal};

/// Risk-weight bump applied while any Critical weak signal is live.
const CRITICAL_RISK_BUMP: f64 = 0.2;

/// Ceiling for the adjusted risk weight.
const RISK_WEIGHT_CEILING: f64 = 0.8;

/// Pure weighted-average strategy parameterized by a base risk weight.
#[derive(Debug, Clone, Copy)]
pub struct WeightedStrategy {
    base_risk_weight: f64,
}

impl WeightedStrategy {
    /// Build a strategy from the configured base risk weight.
    #[must_use]
    pub const fn new(base_risk_weight: f64) -> Self {
        Self { base_risk_weight }
    }

    /// Score every scenario and recommend the best one.
    ///
    /// Winner is the highest probability-weighted fusion score; ties break
    /// by lowest time horizon, then lexicographic scenario id.
    #[must_use]
    pub fn run(
        &self,
        scenarios: &[ScenarioSimulation],
        weak_signals: &[WeakSignal],
    ) -> StrategyResult {
        let critical_present = weak_signals
            .iter()
            .any(|signal| signal.risk_level == RiskLevel::Critical);
        let risk_weight = if critical_present {
            (self.base_risk_weight + CRITICAL_RISK_BUMP).min(RISK_WEIGHT_CEILING)
        } else {
            self.base_risk_weight
        };
        let profit_weight = 1.0 - risk_weight;

        let mut ranked: Vec<(&ScenarioSimulation, f64)> = scenarios
            .iter()
            .map(|scenario| (scenario, final_score(scenario, risk_weight, profit_weight)))
            .collect();
        ranked.sort_by(|(left, left_score), (right, right_score)| {
            right_score
                .partial_cmp(left_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| left.time_horizon_days.cmp(&right.time_horizon_days))
                .then_with(|| left.scenario_id.cmp(&right.scenario_id))
        });

        let recommended_scenario_id = ranked
            .first()
            .map(|(scenario, _)| scenario.scenario_id.clone())
            .unwrap_or_default();

        let raw: BTreeMap<String, f64> = ranked
            .into_iter()
            .map(|(scenario, score)| (scenario.scenario_id.clone(), score))
            .collect();

        StrategyResult {
            strategy: StrategyKind::Weighted,
            recommended_scenario_id,
            score_per_scenario: normalize_scores(raw),
            diagnostics: StrategyDiagnostics::Weighted {
                risk_weight,
                profitability_weight: profit_weight,
                critical_bump_applied: critical_present,
            },
        }
    }
}

/// Probability-weighted linear fusion score for one scenario.
fn final_score(scenario: &ScenarioSimulation, risk_weight: f64, profit_weight: f64) -> f64 {
    let risk_score = (1.0 - scenario.cash_flow_impact.abs() / 100.0).clamp(0.0, 1.0);
    let profit_score = (1.0 - scenario.margin_impact.abs() / 100.0).clamp(0.0, 1.0);
    let fusion = risk_weight.mul_add(risk_score, profit_weight * profit_score);
    fusion * scenario.probability
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DataSource, SignalType};

    fn scenario(id: &str, cash: f64, margin: f64, probability: f64, days: u32) -> ScenarioSimulation {
        ScenarioSimulation {
            scenario_id: id.to_string(),
            description: format!("scenario {id}"),
            cash_flow_impact: cash,
            margin_impact: margin,
            probability,
            time_horizon_days: days,
        }
    }

    fn critical_signal() -> WeakSignal {
        WeakSignal {
            signal_type: SignalType::BudgetLiquiditySqueeze,
            correlation_strength: 0.8,
            source_indices: vec![DataSource::ErpBudget],
            risk_level: RiskLevel::Critical,
            description: String::new(),
        }
    }

    #[test]
    fn picks_stability_scenario_in_worked_example() {
        // Scenario A: heavy cash-flow hit; B: mild margin trade-off.
        let scenarios = vec![
            scenario("A", -20.0, 0.0, 0.85, 60),
            scenario("B", 0.0, -5.0, 0.90, 30),
        ];
        let result = WeightedStrategy::new(0.6).run(&scenarios, &[critical_signal()]);
        assert_eq!(result.recommended_scenario_id, "B");
        assert!(result.score_per_scenario["B"] > result.score_per_scenario["A"]);
    }

    #[test]
    fn critical_signal_bumps_risk_weight_to_ceiling() {
        let scenarios = vec![scenario("A", -20.0, 0.0, 0.85, 60)];
        let result = WeightedStrategy::new(0.7).run(&scenarios, &[critical_signal()]);
        match result.diagnostics {
            StrategyDiagnostics::Weighted {
                risk_weight,
                critical_bump_applied,
                ..
            } => {
                assert!((risk_weight - 0.8).abs() < f64::EPSILON);
                assert!(critical_bump_applied);
            }
            _ => panic!("expected weighted diagnostics"),
        }
    }

    #[test]
    fn no_bump_without_critical_signal() {
        let scenarios = vec![scenario("A", -20.0, 0.0, 0.85, 60)];
        let result = WeightedStrategy::new(0.6).run(&scenarios, &[]);
        match result.diagnostics {
            StrategyDiagnostics::Weighted {
                risk_weight,
                critical_bump_applied,
                ..
            } => {
                assert!((risk_weight - 0.6).abs() < f64::EPSILON);
                assert!(!critical_bump_applied);
            }
            _ => panic!("expected weighted diagnostics"),
        }
    }

    #[test]
    fn scores_normalize_to_unit_sum() {
        let scenarios = vec![
            scenario("A", -20.0, 0.0, 0.85, 60),
            scenario("B", 0.0, -5.0, 0.90, 30),
            scenario("C", -8.0, -3.0, 0.75, 45),
        ];
        let result = WeightedStrategy::new(0.6).run(&scenarios, &[]);
        let total: f64 = result.score_per_scenario.values().sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn ties_break_by_shorter_horizon_then_id() {
        // Identical impacts and probability: score ties exactly.
        let scenarios = vec![
            scenario("B", -10.0, -2.0, 0.8, 20),
            scenario("A", -10.0, -2.0, 0.8, 40),
        ];
        let result = WeightedStrategy::new(0.6).run(&scenarios, &[]);
        assert_eq!(result.recommended_scenario_id, "B");

        let scenarios = vec![
            scenario("B", -10.0, -2.0, 0.8, 20),
            scenario("A", -10.0, -2.0, 0.8, 20),
        ];
        let result = WeightedStrategy::new(0.6).run(&scenarios, &[]);
        assert_eq!(result.recommended_scenario_id, "A");
    }

    #[test]
    fn zero_probability_everywhere_yields_uniform_scores() {
        let scenarios = vec![
            scenario("A", -20.0, 0.0, 0.0, 60),
            scenario("B", 0.0, -5.0, 0.0, 30),
        ];
        let result = WeightedStrategy::new(0.6).run(&scenarios, &[]);
        assert!((result.score_per_scenario["A"] - 0.5).abs() < 1e-12);
        assert!((result.score_per_scenario["B"] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn single_scenario_scores_one() {
        let scenarios = vec![scenario("ONLY", -10.0, -5.0, 0.9, 30)];
        let result = WeightedStrategy::new(0.6).run(&scenarios, &[]);
        assert_eq!(result.recommended_scenario_id, "ONLY");
        assert!((result.score_per_scenario["ONLY"] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn higher_risk_weight_favors_cash_flow_stability() {
        let scenarios = vec![
            scenario("RISKY", -30.0, 0.0, 0.9, 30),
            scenario("STABLE", -2.0, -20.0, 0.9, 30),
        ];
        let low = WeightedStrategy::new(0.3).run(&scenarios, &[]);
        let high = WeightedStrategy::new(0.8).run(&scenarios, &[]);
        assert!(
            high.score_per_scenario["STABLE"] >= low.score_per_scenario["STABLE"],
            "raising risk weight must not lower the stable scenario's share"
        );
    }
}

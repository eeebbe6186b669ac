//! Meta-fusion consensus layer: weighted voting across the strategies'
//! score maps, with an explicit agreement measure.
//!
//! Disagreement between strategies is surfaced, never forced to consensus:
//! the agreement level and per-strategy breakdown travel with the decision.

#![allow(missing_docs)]

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::config::StrategyWeights;
use crate::core::errors::{FusionError, Result};
use crate::fusion::{StrategyKind, StrategyResult, argmax_scenario};

/// One strategy's top pick and the score it gave that pick.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StrategyVote {
    pub scenario_id: String,
    pub score: f64,
}

/// Consensus outcome across all executed strategies.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetaFusionOutcome {
    pub recommended_scenario_id: String,
    /// The winner's weighted score sum; in [0, 1] because strategy weights
    /// sum to 1 and every per-strategy score map sums to 1.
    pub consensus_confidence: f64,
    /// Fraction of strategies whose individual top pick equals the winner.
    pub agreement_level: f64,
    pub consensus_scores: BTreeMap<String, f64>,
    #[serde(rename = "strategy_breakdown")]
    pub breakdown: BTreeMap<String, StrategyVote>,
}

impl MetaFusionOutcome {
    /// Whether every strategy agreed on the winner.
    #[must_use]
    pub fn is_unanimous(&self) -> bool {
        (self.agreement_level - 1.0).abs() < f64::EPSILON
    }
}

fn weight_for(weights: &StrategyWeights, kind: StrategyKind) -> f64 {
    match kind {
        StrategyKind::Weighted => weights.weighted,
        StrategyKind::DempsterShafer => weights.dst,
        StrategyKind::Bayesian => weights.bayesian,
    }
}

/// Combine strategy results via weighted voting.
///
/// Callers running a reduced strategy set (conflict fallback) must pass
/// renormalized weights so the consensus confidence stays in [0, 1].
pub fn combine(
    results: &[StrategyResult],
    weights: &StrategyWeights,
) -> Result<MetaFusionOutcome> {
    if results.is_empty() {
        return Err(FusionError::Runtime {
            details: "meta-fusion requires at least one strategy result".to_string(),
        });
    }

    let mut consensus: BTreeMap<String, f64> = BTreeMap::new();
    for result in results {
        let weight = weight_for(weights, result.strategy);
        for (scenario, &score) in &result.score_per_scenario {
            *consensus.entry(scenario.clone()).or_insert(0.0) += weight * score;
        }
    }

    let (recommended, winner_score) = argmax_scenario(&consensus)
        .map(|(scenario, score)| (scenario.to_string(), score))
        .ok_or_else(|| FusionError::Runtime {
            details: "consensus score map is empty".to_string(),
        })?;

    let agreeing = results
        .iter()
        .filter(|result| result.recommended_scenario_id == recommended)
        .count();
    #[allow(clippy::cast_precision_loss)]
    let agreement_level = agreeing as f64 / results.len() as f64;

    let breakdown = results
        .iter()
        .map(|result| {
            let own_score = result
                .score_per_scenario
                .get(&result.recommended_scenario_id)
                .copied()
                .unwrap_or(0.0);
            (
                result.strategy.key().to_string(),
                StrategyVote {
                    scenario_id: result.recommended_scenario_id.clone(),
                    score: own_score,
                },
            )
        })
        .collect();

    Ok(MetaFusionOutcome {
        recommended_scenario_id: recommended,
        consensus_confidence: winner_score.clamp(0.0, 1.0),
        agreement_level,
        consensus_scores: consensus,
        breakdown,
    })
}

//! Bayesian fusion strategy: sequential updating over scenario hypotheses,
//! treating each data source as one observation.
//!
//! Starts from a uniform prior and applies Bayes' rule per evidence item in
//! a fixed order, renormalizing after every step. Evidence weights temper
//! the likelihood (`L^w`), so unreliable sources move the posterior less.

use std::collections::BTreeMap;

use crate::core::errors::{FusionError, Result};
use crate::fusion::evidence;
use crate::fusion::{
    StrategyDiagnostics, StrategyKind, StrategyResult, argmax_scenario, risk_safe_poles,
};
use crate::model::{DataSource, FinancialData, KnowledgeGraphContext, ScenarioSimulation};

/// Likelihood assumed for a scenario an evidence source says nothing about.
const NON_INFORMATIVE_LIKELIHOOD: f64 = 0.5;

/// One observation: `P(evidence | scenario)` per scenario, plus a weight.
#[derive(Debug, Clone, PartialEq)]
pub struct BayesianEvidence {
    pub source: DataSource,
    /// Likelihood per scenario id, each in [0, 1].
    pub likelihoods: BTreeMap<String, f64>,
    /// Evidence weight in [0, 1]; applied as a likelihood exponent.
    pub weight: f64,
}

impl BayesianEvidence {
    /// Check likelihood and weight ranges.
    pub fn validate(&self) -> Result<()> {
        for (scenario, &likelihood) in &self.likelihoods {
            if !(0.0..=1.0).contains(&likelihood) || !likelihood.is_finite() {
                return Err(FusionError::Runtime {
                    details: format!(
                        "likelihood for `{scenario}` in {} is {likelihood}, must be in [0, 1]",
                        self.source
                    ),
                });
            }
        }
        if !(0.0..=1.0).contains(&self.weight) {
            return Err(FusionError::Runtime {
                details: format!(
                    "evidence weight for {} is {}, must be in [0, 1]",
                    self.source, self.weight
                ),
            });
        }
        Ok(())
    }
}

/// Single Bayesian update step: `P(H|E) ∝ P(E|H) · P(H)`, renormalized.
///
/// A zero-mass posterior (every product vanished) falls back to uniform
/// rather than dividing by zero.
#[must_use]
pub fn update(
    current: &BTreeMap<String, f64>,
    evidence: &BayesianEvidence,
) -> BTreeMap<String, f64> {
    let unnormalized: BTreeMap<String, f64> = current
        .iter()
        .map(|(scenario, &prior)| {
            let mut likelihood = evidence
                .likelihoods
                .get(scenario)
                .copied()
                .unwrap_or(NON_INFORMATIVE_LIKELIHOOD);
            if evidence.weight < 1.0 {
                likelihood = likelihood.powf(evidence.weight);
            }
            (scenario.clone(), prior * likelihood)
        })
        .collect();
    normalize(unnormalized)
}

/// Shannon entropy of a distribution, in nats. Zero for a one-hot
/// posterior, `ln(n)` for uniform.
#[must_use]
pub fn entropy(distribution: &BTreeMap<String, f64>) -> f64 {
    -distribution
        .values()
        .filter(|&&p| p > 0.0)
        .map(|&p| p * p.ln())
        .sum::<f64>()
}

/// `D_KL(posterior ‖ prior)` in nats; higher means more informative
/// evidence.
#[must_use]
pub fn kl_divergence(
    posterior: &BTreeMap<String, f64>,
    prior: &BTreeMap<String, f64>,
) -> f64 {
    posterior
        .iter()
        .filter_map(|(scenario, &p)| {
            let q = prior.get(scenario).copied().unwrap_or(0.0);
            (p > 0.0 && q > 0.0).then(|| p * (p / q).ln())
        })
        .sum()
}

fn normalize(distribution: BTreeMap<String, f64>) -> BTreeMap<String, f64> {
    let total: f64 = distribution.values().sum();
    if total > 0.0 {
        distribution
            .into_iter()
            .map(|(scenario, p)| (scenario, p / total))
            .collect()
    } else {
        let n = distribution.len().max(1);
        #[allow(clippy::cast_precision_loss)]
        let uniform = 1.0 / n as f64;
        distribution
            .into_keys()
            .map(|scenario| (scenario, uniform))
            .collect()
    }
}

/// Winner-vs-runner-up posterior-odds ratio divided by the prior-odds
/// ratio. `None` for a single-scenario frame or a zero-probability
/// runner-up (the factor would be unbounded).
fn bayes_factor(
    posterior: &BTreeMap<String, f64>,
    prior: &BTreeMap<String, f64>,
    winner: &str,
) -> Option<f64> {
    let mut ranked: Vec<(&str, f64)> = posterior
        .iter()
        .map(|(scenario, &p)| (scenario.as_str(), p))
        .collect();
    ranked.sort_by(|(left_id, left_p), (right_id, right_p)| {
        right_p
            .partial_cmp(left_p)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| left_id.cmp(right_id))
    });

    let (_, winner_p) = ranked.iter().find(|(scenario, _)| *scenario == winner)?;
    let (runner_id, runner_p) = ranked
        .iter()
        .find(|(scenario, _)| *scenario != winner)?;
    if *runner_p <= 0.0 {
        return None;
    }

    let winner_prior = prior.get(winner).copied().unwrap_or(0.0);
    let runner_prior = prior.get(*runner_id).copied().unwrap_or(0.0);
    if winner_prior <= 0.0 || runner_prior <= 0.0 {
        return None;
    }

    let posterior_odds = winner_p / runner_p;
    let prior_odds = winner_prior / runner_prior;
    Some(posterior_odds / prior_odds)
}

/// The Bayesian strategy over the standard five-observation sequence.
#[derive(Debug, Clone, Copy, Default)]
pub struct BayesianStrategy;

impl BayesianStrategy {
    /// Sequentially update a uniform prior with each data source and
    /// recommend the highest-posterior scenario.
    pub fn run(
        &self,
        financial: &FinancialData,
        kg: &KnowledgeGraphContext,
        scenarios: &[ScenarioSimulation],
    ) -> Result<StrategyResult> {
        if scenarios.is_empty() {
            return Err(FusionError::invalid_input(
                "scenarios",
                "Bayesian strategy requires at least one scenario",
            ));
        }

        #[allow(clippy::cast_precision_loss)]
        let uniform = 1.0 / scenarios.len() as f64;
        let prior: BTreeMap<String, f64> = scenarios
            .iter()
            .map(|scenario| (scenario.scenario_id.clone(), uniform))
            .collect();

        let (risk_pole, safe_pole) = risk_safe_poles(scenarios);
        let sequence = evidence::bayesian_evidence(financial, kg, scenarios, &risk_pole, &safe_pole);

        let mut posterior = prior.clone();
        let mut evidence_trail = vec![prior.clone()];
        let mut log_likelihood = 0.0;
        for observation in &sequence {
            observation.validate()?;
            // Expected log-likelihood under the current belief, accumulated
            // before the update (matches the sequential-evidence ledger).
            for (scenario, &p) in &posterior {
                let likelihood = observation
                    .likelihoods
                    .get(scenario)
                    .copied()
                    .unwrap_or(NON_INFORMATIVE_LIKELIHOOD);
                if likelihood > 0.0 {
                    log_likelihood += likelihood.ln() * p;
                }
            }
            posterior = update(&posterior, observation);
            evidence_trail.push(posterior.clone());
        }

        let recommended = argmax_scenario(&posterior)
            .map(|(scenario, _)| scenario.to_string())
            .ok_or_else(|| FusionError::Runtime {
                details: "posterior empty for non-empty scenario list".to_string(),
            })?;

        let diagnostics = StrategyDiagnostics::Bayesian {
            entropy: entropy(&posterior),
            kl_divergence_from_prior: kl_divergence(&posterior, &prior),
            bayes_factor: bayes_factor(&posterior, &prior, &recommended),
            log_likelihood,
            update_steps: sequence.len(),
            evidence_trail,
        };

        Ok(StrategyResult {
            strategy: StrategyKind::Bayesian,
            recommended_scenario_id: recommended,
            score_per_scenario: posterior,
            diagnostics,
        })
    }
}

//! Dempster-Shafer fusion strategy: evidence-theoretic combination of
//! per-source mass functions over scenario hypotheses.
//!
//! Hypotheses are subsets of the frame of discernment packed into `u64`
//! bitmasks (bit *i* = scenario *i* in input order), so intersection is a
//! single `&` and the mass map only carries non-zero focal elements. Mass on
//! the full frame Θ models explicit ignorance, which plain probability
//! cannot express.

use std::collections::BTreeMap;

use crate::core::errors::{FusionError, Result};
use crate::fusion::evidence;
use crate::fusion::{
    StrategyDiagnostics, StrategyKind, StrategyResult, argmax_scenario, normalize_scores,
    risk_safe_poles,
};
use crate::model::{
    DataSource, FinancialData, KnowledgeGraphContext, MAX_FRAME_SCENARIOS, ScenarioSimulation,
};

/// Conflict this close to 1.0 is treated as total contradiction.
const TOTAL_CONFLICT_EPSILON: f64 = 1e-10;

/// Tolerance for mass-function unit-sum validation.
const MASS_SUM_EPSILON: f64 = 1e-6;

/// A hypothesis: bitmask over scenario indices. Never the empty set.
pub type Hypothesis = u64;

/// Basic probability assignment over hypotheses.
pub type Mass = BTreeMap<Hypothesis, f64>;

/// The frame of discernment: all scenario identifiers, in input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    ids: Vec<String>,
}

impl Frame {
    /// Build a frame from the scenario list.
    ///
    /// The engine validates uniqueness and the 64-scenario cap upstream;
    /// this re-checks the cap because the bitmask representation depends
    /// on it.
    pub fn new(scenarios: &[ScenarioSimulation]) -> Result<Self> {
        if scenarios.is_empty() {
            return Err(FusionError::invalid_input(
                "scenarios",
                "frame of discernment must not be empty",
            ));
        }
        if scenarios.len() > MAX_FRAME_SCENARIOS {
            return Err(FusionError::invalid_input(
                "scenarios",
                format!(
                    "{} scenarios exceed the frame limit of {MAX_FRAME_SCENARIOS}",
                    scenarios.len()
                ),
            ));
        }
        Ok(Self {
            ids: scenarios
                .iter()
                .map(|scenario| scenario.scenario_id.clone())
                .collect(),
        })
    }

    /// Number of scenarios in the frame.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether the frame is empty (never true for a constructed frame).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Scenario identifiers in frame order.
    #[must_use]
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    /// The full frame Θ as a bitmask.
    #[must_use]
    pub fn theta(&self) -> Hypothesis {
        // Shift trick avoids overflow at exactly 64 scenarios.
        u64::MAX >> (u64::BITS as usize - self.ids.len())
    }

    /// Singleton hypothesis for one scenario id.
    #[must_use]
    pub fn singleton(&self, scenario_id: &str) -> Option<Hypothesis> {
        self.ids
            .iter()
            .position(|id| id == scenario_id)
            .map(|index| 1u64 << index)
    }

    /// Iterate `(scenario_id, singleton mask)` pairs in frame order.
    pub fn singletons(&self) -> impl Iterator<Item = (&str, Hypothesis)> {
        self.ids
            .iter()
            .enumerate()
            .map(|(index, id)| (id.as_str(), 1u64 << index))
    }
}

/// One evidence source: a mass function plus a reliability factor.
#[derive(Debug, Clone, PartialEq)]
pub struct EvidenceMass {
    pub source: DataSource,
    pub mass: Mass,
    /// Source reliability α in [0, 1]; discounting shifts `1 − α` of the
    /// committed mass to Θ.
    pub reliability: f64,
}

impl EvidenceMass {
    /// Check unit sum and non-negativity.
    pub fn validate(&self) -> Result<()> {
        let total: f64 = self.mass.values().sum();
        if (total - 1.0).abs() > MASS_SUM_EPSILON {
            return Err(FusionError::Runtime {
                details: format!(
                    "mass function for {} sums to {total:.6}, must be 1.0",
                    self.source
                ),
            });
        }
        if self.mass.values().any(|&value| value < 0.0) {
            return Err(FusionError::Runtime {
                details: format!("mass function for {} contains negative mass", self.source),
            });
        }
        if self.mass.keys().any(|&hypothesis| hypothesis == 0) {
            return Err(FusionError::Runtime {
                details: format!("mass function for {} assigns mass to the empty set", self.source),
            });
        }
        Ok(())
    }
}

/// Reliability discounting: `m'(A) = α·m(A)` for `A ≠ Θ`,
/// `m'(Θ) = 1 − α·(1 − m(Θ))`.
#[must_use]
pub fn discount(mass: &Mass, reliability: f64, theta: Hypothesis) -> Mass {
    if reliability >= 1.0 {
        return mass.clone();
    }
    let mut discounted = Mass::new();
    let mut theta_mass = 0.0;
    for (&hypothesis, &value) in mass {
        if hypothesis == theta {
            theta_mass = value;
        } else if value > 0.0 {
            discounted.insert(hypothesis, reliability * value);
        }
    }
    discounted.insert(theta, reliability.mul_add(-(1.0 - theta_mass), 1.0));
    discounted
}

/// Dempster's rule of combination for two mass functions.
///
/// `m12(A) = (1/(1−K)) · Σ m1(B)·m2(C)` over `B ∩ C = A`, where
/// `K = Σ m1(B)·m2(C)` over `B ∩ C = ∅` is the conflict mass. Total
/// contradiction (`K == 1`) is a typed, recoverable error — the caller may
/// fall back to the remaining strategies rather than divide by zero.
pub fn combine(m1: &Mass, m2: &Mass, source: DataSource) -> Result<(Mass, f64)> {
    let mut combined = Mass::new();
    let mut conflict = 0.0;

    for (&h1, &v1) in m1 {
        for (&h2, &v2) in m2 {
            let intersection = h1 & h2;
            let product = v1 * v2;
            if intersection == 0 {
                conflict += product;
            } else {
                *combined.entry(intersection).or_insert(0.0) += product;
            }
        }
    }

    if conflict >= 1.0 - TOTAL_CONFLICT_EPSILON {
        return Err(FusionError::FusionConflict {
            conflict,
            source_label: source.to_string(),
        });
    }

    let normalization = 1.0 / (1.0 - conflict);
    for value in combined.values_mut() {
        *value *= normalization;
    }
    Ok((combined, conflict))
}

/// Combine evidence sources sequentially after reliability discounting.
///
/// Returns the final mass, the conflict K of the last pairwise combination
/// (the reported diagnostic), and the largest K seen along the chain.
pub fn combine_all(frame: &Frame, sources: &[EvidenceMass]) -> Result<(Mass, f64, f64)> {
    let theta = frame.theta();
    if sources.is_empty() {
        // Vacuous belief: total ignorance.
        return Ok((Mass::from([(theta, 1.0)]), 0.0, 0.0));
    }

    let mut discounted = Vec::with_capacity(sources.len());
    for source in sources {
        source.validate()?;
        discounted.push((source.source, discount(&source.mass, source.reliability, theta)));
    }

    let mut iter = discounted.into_iter();
    let (_, mut combined) = iter
        .next()
        .unwrap_or((DataSource::ScenarioSimulation, Mass::from([(theta, 1.0)])));
    let mut last_conflict = 0.0;
    let mut max_conflict: f64 = 0.0;
    for (label, mass) in iter {
        let (next, conflict) = combine(&combined, &mass, label)?;
        combined = next;
        last_conflict = conflict;
        max_conflict = max_conflict.max(conflict);
    }

    Ok((combined, last_conflict, max_conflict))
}

/// Belief: `Bel(A) = Σ m(B)` over non-empty `B ⊆ A` — the lower
/// probability bound.
#[must_use]
pub fn belief(mass: &Mass, hypothesis: Hypothesis) -> f64 {
    mass.iter()
        .filter(|&(&h, _)| h != 0 && (h & !hypothesis) == 0)
        .map(|(_, &value)| value)
        .sum()
}

/// Plausibility: `Pl(A) = Σ m(B)` over `B ∩ A ≠ ∅` — the upper
/// probability bound.
#[must_use]
pub fn plausibility(mass: &Mass, hypothesis: Hypothesis) -> f64 {
    mass.iter()
        .filter(|&(&h, _)| (h & hypothesis) != 0)
        .map(|(_, &value)| value)
        .sum()
}

/// Pignistic probability transform: `BetP(x) = Σ m(A)/|A|` over `A ∋ x`,
/// normalized. Diagnostic only; the decision is by Belief.
#[must_use]
pub fn pignistic(frame: &Frame, mass: &Mass) -> BTreeMap<String, f64> {
    let mut bet: BTreeMap<String, f64> = frame
        .ids()
        .iter()
        .map(|id| (id.clone(), 0.0))
        .collect();

    for (&hypothesis, &value) in mass {
        let cardinality = hypothesis.count_ones();
        if cardinality == 0 {
            continue;
        }
        let share = value / f64::from(cardinality);
        for (id, singleton) in frame.singletons() {
            if (hypothesis & singleton) != 0
                && let Some(entry) = bet.get_mut(id)
            {
                *entry += share;
            }
        }
    }

    normalize_scores(bet)
}

/// The Dempster-Shafer strategy over the standard five evidence sources.
#[derive(Debug, Clone, Copy, Default)]
pub struct DempsterShaferStrategy;

impl DempsterShaferStrategy {
    /// Translate the inputs into mass functions, combine them, and decide
    /// by highest Belief (ties lexicographic by scenario id).
    pub fn run(
        &self,
        financial: &FinancialData,
        kg: &KnowledgeGraphContext,
        scenarios: &[ScenarioSimulation],
    ) -> Result<StrategyResult> {
        let frame = Frame::new(scenarios)?;
        let (risk_pole, safe_pole) = risk_safe_poles(scenarios);
        let sources =
            evidence::dst_evidence(&frame, financial, kg, scenarios, &risk_pole, &safe_pole)?;

        let (mass, conflict, max_conflict) = combine_all(&frame, &sources)?;

        let mut bel = BTreeMap::new();
        let mut pl = BTreeMap::new();
        for (id, singleton) in frame.singletons() {
            bel.insert(id.to_string(), belief(&mass, singleton));
            pl.insert(id.to_string(), plausibility(&mass, singleton));
        }

        let (recommended, winner_belief) = argmax_scenario(&bel)
            .map(|(id, score)| (id.to_string(), score))
            .ok_or_else(|| FusionError::Runtime {
                details: "belief map empty for non-empty frame".to_string(),
            })?;
        let uncertainty_gap = pl.get(&recommended).copied().unwrap_or(winner_belief) - winner_belief;

        Ok(StrategyResult {
            strategy: StrategyKind::DempsterShafer,
            recommended_scenario_id: recommended,
            score_per_scenario: normalize_scores(bel.clone()),
            diagnostics: StrategyDiagnostics::DempsterShafer {
                conflict,
                max_conflict,
                belief: bel,
                plausibility: pl,
                uncertainty_gap,
                pignistic: pignistic(&frame, &mass),
            },
        })
    }
}

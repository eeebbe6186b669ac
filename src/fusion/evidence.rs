//! Evidence builders: deterministic translation of financial observations,
//! knowledge-graph context, and scenario simulations into DST mass functions
//! and Bayesian likelihood vectors.
//!
//! Each builder aims its committed mass / likelihood at the risk and safe
//! poles (largest and smallest absolute cash-flow impact) and leaves the
//! residual as explicit ignorance (DST) or a non-informative likelihood
//! (Bayesian). Banding constants and per-source reliabilities are fixed.

use std::collections::BTreeMap;

use crate::core::errors::{FusionError, Result};
use crate::fusion::bayesian::BayesianEvidence;
use crate::fusion::dempster_shafer::{EvidenceMass, Frame, Mass};
use crate::fusion::simulation_score;
use crate::model::{DataSource, FinancialData, KnowledgeGraphContext, ScenarioSimulation};

/// Source reliability factors, also used as Bayesian evidence weights.
const RELIABILITY_INVOICES: f64 = 0.85;
const RELIABILITY_PRODUCTION: f64 = 0.75;
const RELIABILITY_BUDGET: f64 = 0.90;
const RELIABILITY_KNOWLEDGE_GRAPH: f64 = 0.80;
const RELIABILITY_SIMULATION: f64 = 0.70;

/// Committed-mass share for simulation evidence; the rest stays ignorance.
const SIMULATION_COMMITTED_SHARE: f64 = 0.8;

/// Coarse classification of the client-parent status text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClientStatusClass {
    Bankruptcy,
    Restructuring,
    Stable,
    Unknown,
}

fn classify_status(status: &str) -> ClientStatusClass {
    let lower = status.to_lowercase();
    if lower.contains("bankruptcy") || lower.contains("chapter 11") {
        ClientStatusClass::Bankruptcy
    } else if lower.contains("restructuring") {
        ClientStatusClass::Restructuring
    } else if lower.contains("stable") {
        ClientStatusClass::Stable
    } else {
        ClientStatusClass::Unknown
    }
}

// ──────────────────────── DST mass functions ────────────────────────

/// Build the standard five DST evidence sources in combination order:
/// invoices → production → budget → knowledge graph → simulation.
pub fn dst_evidence(
    frame: &Frame,
    financial: &FinancialData,
    kg: &KnowledgeGraphContext,
    scenarios: &[ScenarioSimulation],
    risk_pole: &str,
    safe_pole: &str,
) -> Result<Vec<EvidenceMass>> {
    Ok(vec![
        invoice_mass(frame, financial.unpaid_invoices_spike, risk_pole, safe_pole)?,
        production_mass(
            frame,
            financial.production_output_change,
            risk_pole,
            safe_pole,
        )?,
        budget_mass(frame, financial.budget_remaining_q3, risk_pole, safe_pole)?,
        knowledge_graph_mass(frame, kg, risk_pole, safe_pole)?,
        simulation_mass(frame, scenarios)?,
    ])
}

/// Higher unpaid-invoice spike shifts mass toward the risk pole.
fn invoice_mass(frame: &Frame, spike_pct: f64, risk: &str, safe: &str) -> Result<EvidenceMass> {
    let (risk_mass, safe_mass) = if spike_pct > 20.0 {
        (0.70, 0.05)
    } else if spike_pct > 10.0 {
        (0.50, 0.10)
    } else if spike_pct > 5.0 {
        (0.30, 0.20)
    } else {
        (0.10, 0.40)
    };
    polarized_mass(
        frame,
        DataSource::ErpInvoices,
        RELIABILITY_INVOICES,
        risk,
        risk_mass,
        safe,
        safe_mass,
    )
}

/// Negative production change supports the risk pole.
fn production_mass(
    frame: &Frame,
    output_change_pct: f64,
    risk: &str,
    safe: &str,
) -> Result<EvidenceMass> {
    let (risk_mass, safe_mass) = if output_change_pct < -15.0 {
        (0.60, 0.05)
    } else if output_change_pct < -8.0 {
        (0.40, 0.10)
    } else if output_change_pct < -3.0 {
        (0.25, 0.20)
    } else {
        (0.05, 0.45)
    };
    polarized_mass(
        frame,
        DataSource::IotProduction,
        RELIABILITY_PRODUCTION,
        risk,
        risk_mass,
        safe,
        safe_mass,
    )
}

/// Depleted budget shifts mass toward the risk pole.
fn budget_mass(
    frame: &Frame,
    budget_remaining_pct: f64,
    risk: &str,
    safe: &str,
) -> Result<EvidenceMass> {
    let (risk_mass, safe_mass) = if budget_remaining_pct < 5.0 {
        (0.65, 0.05)
    } else if budget_remaining_pct < 10.0 {
        (0.45, 0.10)
    } else if budget_remaining_pct < 20.0 {
        (0.25, 0.25)
    } else {
        (0.10, 0.40)
    };
    polarized_mass(
        frame,
        DataSource::ErpBudget,
        RELIABILITY_BUDGET,
        risk,
        risk_mass,
        safe,
        safe_mass,
    )
}

/// Client-parent status and historical pattern matches from the graph.
fn knowledge_graph_mass(
    frame: &Frame,
    kg: &KnowledgeGraphContext,
    risk: &str,
    safe: &str,
) -> Result<EvidenceMass> {
    let mut risk_mass: f64 = 0.10;
    let mut safe_mass: f64 = 0.30;

    match classify_status(&kg.client_parent_status) {
        ClientStatusClass::Bankruptcy => {
            risk_mass += 0.35;
            safe_mass -= 0.15;
        }
        ClientStatusClass::Restructuring => {
            risk_mass += 0.25;
            safe_mass -= 0.10;
        }
        ClientStatusClass::Stable => safe_mass += 0.15,
        ClientStatusClass::Unknown => {}
    }

    if kg.similar_historical_pattern.is_some() {
        risk_mass += 0.15;
        safe_mass -= 0.05;
    }

    risk_mass = risk_mass.clamp(0.0, 0.8);
    safe_mass = safe_mass.clamp(0.0, 0.8);

    polarized_mass(
        frame,
        DataSource::KgClientParent,
        RELIABILITY_KNOWLEDGE_GRAPH,
        risk,
        risk_mass,
        safe,
        safe_mass,
    )
}

/// Simulation outcomes as committed singleton mass with reserved ignorance.
fn simulation_mass(frame: &Frame, scenarios: &[ScenarioSimulation]) -> Result<EvidenceMass> {
    let scores: BTreeMap<&str, f64> = scenarios
        .iter()
        .map(|scenario| {
            (
                scenario.scenario_id.as_str(),
                simulation_score(scenario).max(0.01),
            )
        })
        .collect();
    let total: f64 = scores.values().sum();

    let mut mass = Mass::new();
    let mut assigned = 0.0;
    #[allow(clippy::cast_precision_loss)]
    let fallback_share = 1.0 / scores.len().max(1) as f64;
    for (id, score) in scores {
        let normalized = if total > 0.0 { score / total } else { fallback_share };
        let committed = normalized * SIMULATION_COMMITTED_SHARE;
        let singleton = singleton_for(frame, id)?;
        *mass.entry(singleton).or_insert(0.0) += committed;
        assigned += committed;
    }
    *mass.entry(frame.theta()).or_insert(0.0) += (1.0 - assigned).max(0.0);

    Ok(EvidenceMass {
        source: DataSource::ScenarioSimulation,
        mass,
        reliability: RELIABILITY_SIMULATION,
    })
}

/// Two-pole mass: committed mass on the risk and safe singletons, the
/// remainder on Θ. Accumulates, so a single-scenario frame (risk pole ==
/// safe pole == Θ) still sums to 1.
fn polarized_mass(
    frame: &Frame,
    source: DataSource,
    reliability: f64,
    risk: &str,
    risk_mass: f64,
    safe: &str,
    safe_mass: f64,
) -> Result<EvidenceMass> {
    let ignorance = (1.0 - risk_mass - safe_mass).max(0.0);
    let mut mass = Mass::new();
    *mass.entry(singleton_for(frame, risk)?).or_insert(0.0) += risk_mass;
    *mass.entry(singleton_for(frame, safe)?).or_insert(0.0) += safe_mass;
    *mass.entry(frame.theta()).or_insert(0.0) += ignorance;
    Ok(EvidenceMass {
        source,
        mass,
        reliability,
    })
}

fn singleton_for(frame: &Frame, scenario_id: &str) -> Result<u64> {
    frame
        .singleton(scenario_id)
        .ok_or_else(|| FusionError::Runtime {
            details: format!("scenario `{scenario_id}` missing from frame"),
        })
}

// ──────────────────────── Bayesian likelihoods ────────────────────────

/// Build the Bayesian evidence sequence in the fixed update order:
/// invoices → production → budget → knowledge graph → simulation.
#[must_use]
pub fn bayesian_evidence(
    financial: &FinancialData,
    kg: &KnowledgeGraphContext,
    scenarios: &[ScenarioSimulation],
    risk_pole: &str,
    safe_pole: &str,
) -> Vec<BayesianEvidence> {
    vec![
        invoice_likelihoods(scenarios, financial.unpaid_invoices_spike, risk_pole, safe_pole),
        production_likelihoods(
            scenarios,
            financial.production_output_change,
            risk_pole,
            safe_pole,
        ),
        budget_likelihoods(scenarios, financial.budget_remaining_q3, risk_pole, safe_pole),
        knowledge_graph_likelihoods(scenarios, kg, risk_pole, safe_pole),
        simulation_likelihoods(scenarios),
    ]
}

/// `P(spike observed | scenario)`: high under the risk pole, low under the
/// safe pole, mildly decreasing elsewhere.
fn invoice_likelihoods(
    scenarios: &[ScenarioSimulation],
    spike_pct: f64,
    risk: &str,
    safe: &str,
) -> BayesianEvidence {
    let likelihoods = pole_likelihoods(scenarios, risk, safe, |role| match role {
        PoleRole::Risk => (0.3 + spike_pct / 30.0).min(0.95),
        PoleRole::Safe => (0.8 - spike_pct / 25.0).max(0.05),
        PoleRole::Other => (0.5 - spike_pct / 50.0).max(0.10),
    });
    BayesianEvidence {
        source: DataSource::ErpInvoices,
        likelihoods,
        weight: RELIABILITY_INVOICES,
    }
}

fn production_likelihoods(
    scenarios: &[ScenarioSimulation],
    output_change_pct: f64,
    risk: &str,
    safe: &str,
) -> BayesianEvidence {
    let likelihoods = pole_likelihoods(scenarios, risk, safe, |role| match role {
        PoleRole::Risk => (0.3 + output_change_pct.abs() / 25.0).min(0.90),
        PoleRole::Safe => (0.7 + output_change_pct / 30.0).max(0.10),
        PoleRole::Other => 0.40,
    });
    BayesianEvidence {
        source: DataSource::IotProduction,
        likelihoods,
        weight: RELIABILITY_PRODUCTION,
    }
}

fn budget_likelihoods(
    scenarios: &[ScenarioSimulation],
    budget_remaining_pct: f64,
    risk: &str,
    safe: &str,
) -> BayesianEvidence {
    let likelihoods = pole_likelihoods(scenarios, risk, safe, |role| match role {
        PoleRole::Risk => (0.2 + (100.0 - budget_remaining_pct) / 120.0).min(0.90),
        PoleRole::Safe => (budget_remaining_pct / 120.0).max(0.05),
        PoleRole::Other => 0.35,
    });
    BayesianEvidence {
        source: DataSource::ErpBudget,
        likelihoods,
        weight: RELIABILITY_BUDGET,
    }
}

fn knowledge_graph_likelihoods(
    scenarios: &[ScenarioSimulation],
    kg: &KnowledgeGraphContext,
    risk: &str,
    safe: &str,
) -> BayesianEvidence {
    let mut kg_risk: f64 = match classify_status(&kg.client_parent_status) {
        ClientStatusClass::Bankruptcy => 0.85,
        ClientStatusClass::Restructuring => 0.65,
        ClientStatusClass::Stable => 0.20,
        ClientStatusClass::Unknown => 0.40,
    };
    if kg.similar_historical_pattern.is_some() {
        kg_risk = (kg_risk + 0.15).min(0.95);
    }

    let likelihoods = pole_likelihoods(scenarios, risk, safe, |role| match role {
        PoleRole::Risk => kg_risk,
        PoleRole::Safe => 1.0 - kg_risk,
        PoleRole::Other => 0.40,
    });
    BayesianEvidence {
        source: DataSource::KgClientParent,
        likelihoods,
        weight: RELIABILITY_KNOWLEDGE_GRAPH,
    }
}

/// Simulation performance scores used directly as likelihoods.
fn simulation_likelihoods(scenarios: &[ScenarioSimulation]) -> BayesianEvidence {
    let likelihoods = scenarios
        .iter()
        .map(|scenario| {
            (
                scenario.scenario_id.clone(),
                simulation_score(scenario).clamp(0.05, 0.95),
            )
        })
        .collect();
    BayesianEvidence {
        source: DataSource::ScenarioSimulation,
        likelihoods,
        weight: RELIABILITY_SIMULATION,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PoleRole {
    Risk,
    Safe,
    Other,
}

/// Assign a likelihood per scenario by pole role. The risk pole wins when
/// the frame degenerates to one scenario (risk == safe).
fn pole_likelihoods(
    scenarios: &[ScenarioSimulation],
    risk: &str,
    safe: &str,
    likelihood: impl Fn(PoleRole) -> f64,
) -> BTreeMap<String, f64> {
    scenarios
        .iter()
        .map(|scenario| {
            let role = if scenario.scenario_id == risk {
                PoleRole::Risk
            } else if scenario.scenario_id == safe {
                PoleRole::Safe
            } else {
                PoleRole::Other
            };
            (scenario.scenario_id.clone(), likelihood(role).clamp(0.0, 1.0))
        })
        .collect()
}

//! Signal model: plain data records for financial observations, knowledge-graph
//! context, scenario simulations, and detector output.
//!
//! All records are created fresh per synthesis call and never mutated by the
//! engine; the engine holds no cross-call state beyond static configuration.

#![allow(missing_docs)]

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::errors::{FusionError, Result};

/// Hypotheses are packed into a `u64` bitmask, which caps the frame size.
pub const MAX_FRAME_SCENARIOS: usize = 64;

/// Point-in-time financial snapshot from the upstream aggregation service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FinancialData {
    pub client_id: String,
    /// Percent change in unpaid invoices, signed.
    pub unpaid_invoices_spike: f64,
    /// Percent change in production output, signed (negative = slowdown).
    pub production_output_change: f64,
    /// Percent of Q3 budget remaining, 0–100.
    pub budget_remaining_q3: f64,
    #[serde(default = "Utc::now")]
    pub observed_at: DateTime<Utc>,
}

impl FinancialData {
    /// Construct a snapshot stamped with the current UTC time.
    #[must_use]
    pub fn new(
        client_id: impl Into<String>,
        unpaid_invoices_spike: f64,
        production_output_change: f64,
        budget_remaining_q3: f64,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            unpaid_invoices_spike,
            production_output_change,
            budget_remaining_q3,
            observed_at: Utc::now(),
        }
    }
}

/// A previously observed incident matched from episodic memory.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoricalPattern {
    pub years_ago: u32,
    /// Cash-flow delay the historical incident produced, in days.
    pub delay_days: u32,
}

/// Auxiliary evidence from the knowledge-graph query service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct KnowledgeGraphContext {
    /// Free-text classification of the client's parent company
    /// (e.g. "restructuring", "stable").
    pub client_parent_status: String,
    #[serde(default)]
    pub similar_historical_pattern: Option<HistoricalPattern>,
    #[serde(default)]
    pub external_data_signals: Vec<String>,
    #[serde(default)]
    pub risk_indicators: Vec<String>,
}

/// One candidate course of action from the scenario-simulation service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScenarioSimulation {
    /// Unique within a synthesis call.
    pub scenario_id: String,
    pub description: String,
    /// Percent, signed — negative is worse.
    pub cash_flow_impact: f64,
    /// Percent, signed — negative is worse.
    pub margin_impact: f64,
    /// Simulation confidence, 0–1.
    pub probability: f64,
    pub time_horizon_days: u32,
}

/// Tactical decision priority levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::High => write!(f, "High"),
            Self::Medium => write!(f, "Medium"),
            Self::Low => write!(f, "Low"),
        }
    }
}

/// Risk assessment levels, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "Low"),
            Self::Medium => write!(f, "Medium"),
            Self::High => write!(f, "High"),
            Self::Critical => write!(f, "Critical"),
        }
    }
}

/// Cross-source correlation patterns the detector can fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalType {
    ProductionClientSystemicRisk,
    BudgetLiquiditySqueeze,
    HistoricalPatternRecurrence,
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProductionClientSystemicRisk => write!(f, "Production-Client Systemic Risk"),
            Self::BudgetLiquiditySqueeze => write!(f, "Budget Liquidity Squeeze"),
            Self::HistoricalPatternRecurrence => write!(f, "Historical Pattern Recurrence"),
        }
    }
}

/// Upstream data sources contributing to signals and evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DataSource {
    #[serde(rename = "ERP_Invoices")]
    ErpInvoices,
    #[serde(rename = "ERP_Budget")]
    ErpBudget,
    #[serde(rename = "IoT_Production")]
    IotProduction,
    #[serde(rename = "KG_Client_Parent")]
    KgClientParent,
    #[serde(rename = "RAGraph_Episodic_Memory")]
    EpisodicMemory,
    #[serde(rename = "Scenario_Simulation")]
    ScenarioSimulation,
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ErpInvoices => write!(f, "ERP_Invoices"),
            Self::ErpBudget => write!(f, "ERP_Budget"),
            Self::IotProduction => write!(f, "IoT_Production"),
            Self::KgClientParent => write!(f, "KG_Client_Parent"),
            Self::EpisodicMemory => write!(f, "RAGraph_Episodic_Memory"),
            Self::ScenarioSimulation => write!(f, "Scenario_Simulation"),
        }
    }
}

/// A detected cross-source correlation: individually minor, jointly
/// indicative of elevated risk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeakSignal {
    pub signal_type: SignalType,
    /// 0.0–1.0.
    pub correlation_strength: f64,
    pub source_indices: Vec<DataSource>,
    pub risk_level: RiskLevel,
    pub description: String,
}

// ──────────────────────── input validation ────────────────────────

/// Validate one synthesis call's inputs.
///
/// Fails the whole call with `InvalidInput`; nothing partial is ever
/// returned past this gate.
pub fn validate_inputs(
    financial: &FinancialData,
    scenarios: &[ScenarioSimulation],
) -> Result<()> {
    require_finite("unpaid_invoices_spike", financial.unpaid_invoices_spike)?;
    require_finite(
        "production_output_change",
        financial.production_output_change,
    )?;
    require_range("budget_remaining_q3", financial.budget_remaining_q3, 0.0, 100.0)?;
    if financial.client_id.is_empty() {
        return Err(FusionError::invalid_input(
            "client_id",
            "client identifier must not be empty",
        ));
    }

    if scenarios.is_empty() {
        return Err(FusionError::invalid_input(
            "scenarios",
            "at least one scenario simulation is required",
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

    let mut seen = std::collections::BTreeSet::new();
    for scenario in scenarios {
        if scenario.scenario_id.is_empty() {
            return Err(FusionError::invalid_input(
                "scenario_id",
                "scenario identifier must not be empty",
            ));
        }
        if !seen.insert(scenario.scenario_id.as_str()) {
            return Err(FusionError::invalid_input(
                "scenario_id",
                format!("duplicate scenario identifier `{}`", scenario.scenario_id),
            ));
        }
        require_range("cash_flow_impact", scenario.cash_flow_impact, -100.0, 100.0)?;
        require_range("margin_impact", scenario.margin_impact, -100.0, 100.0)?;
        require_range("probability", scenario.probability, 0.0, 1.0)?;
        if scenario.time_horizon_days == 0 {
            return Err(FusionError::invalid_input(
                "time_horizon_days",
                format!(
                    "scenario `{}` must have a positive time horizon",
                    scenario.scenario_id
                ),
            ));
        }
    }
    Ok(())
}

fn require_finite(field: &'static str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(FusionError::invalid_input(
            field,
            format!("value {value} is not a finite number"),
        ))
    }
}

fn require_range(field: &'static str, value: f64, lo: f64, hi: f64) -> Result<()> {
    require_finite(field, value)?;
    if value < lo || value > hi {
        return Err(FusionError::invalid_input(
            field,
            format!("value {value} outside allowed range [{lo}, {hi}]"),
        ));
    }
    Ok(())
}

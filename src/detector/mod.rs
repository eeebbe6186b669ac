//! Weak signal detector: cross-source correlation rules producing typed,
//! scored alerts.
//!
//! Each rule is evaluated independently — order does not matter and there is
//! no early exit. A rule yields at most one signal, so the result list has
//! zero to three entries. Absent inputs simply fail the rule; there are no
//! error cases.

use std::sync::LazyLock;

use regex::Regex;

use crate::model::{
    DataSource, FinancialData, KnowledgeGraphContext, RiskLevel, SignalType, WeakSignal,
};

/// Production slowdown worse than this (percent) arms the systemic-risk rule.
const PRODUCTION_SLOWDOWN_THRESHOLD: f64 = -5.0;

/// Budget remaining strictly below this (percent) fires the liquidity rule.
const BUDGET_SQUEEZE_THRESHOLD: f64 = 10.0;

/// Slowdown magnitude that saturates correlation strength at 1.0.
const PRODUCTION_SATURATION: f64 = 20.0;

static DISTRESS_STATUS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)restructur|bankrupt|chapter\s*11|insolven|administration|distress")
        .expect("static distress pattern must compile")
});

/// Whether a client-parent status string indicates restructuring/distress.
#[must_use]
pub fn status_indicates_distress(status: &str) -> bool {
    DISTRESS_STATUS.is_match(status)
}

/// Run every correlation rule against one snapshot.
#[must_use]
pub fn detect(financial: &FinancialData, kg: &KnowledgeGraphContext) -> Vec<WeakSignal> {
    let mut signals = Vec::with_capacity(3);

    if let Some(signal) = production_client_systemic_risk(financial, kg) {
        signals.push(signal);
    }
    if let Some(signal) = budget_liquidity_squeeze(financial) {
        signals.push(signal);
    }
    if let Some(signal) = historical_pattern_recurrence(financial, kg) {
        signals.push(signal);
    }

    signals
}

/// Production slowdown converging with client-parent distress.
fn production_client_systemic_risk(
    financial: &FinancialData,
    kg: &KnowledgeGraphContext,
) -> Option<WeakSignal> {
    if financial.production_output_change >= PRODUCTION_SLOWDOWN_THRESHOLD
        || !status_indicates_distress(&kg.client_parent_status)
    {
        return None;
    }

    let correlation_strength =
        (financial.production_output_change.abs() / PRODUCTION_SATURATION).min(1.0);
    let risk_level = if correlation_strength > 0.6 {
        RiskLevel::High
    } else {
        RiskLevel::Medium
    };

    Some(WeakSignal {
        signal_type: SignalType::ProductionClientSystemicRisk,
        correlation_strength,
        source_indices: vec![
            DataSource::IotProduction,
            DataSource::KgClientParent,
            DataSource::ErpInvoices,
        ],
        risk_level,
        description: format!(
            "Production slowdown of {}% combined with client parent status \
`{}` indicates supply chain and payment risk convergence",
            financial.production_output_change, kg.client_parent_status
        ),
    })
}

/// Budget depletion colliding with unpaid-invoice pressure.
fn budget_liquidity_squeeze(financial: &FinancialData) -> Option<WeakSignal> {
    // Strict less-than: exactly 10% remaining does not fire.
    if financial.budget_remaining_q3 >= BUDGET_SQUEEZE_THRESHOLD {
        return None;
    }

    Some(WeakSignal {
        signal_type: SignalType::BudgetLiquiditySqueeze,
        correlation_strength: 0.8,
        source_indices: vec![DataSource::ErpBudget, DataSource::ErpInvoices],
        risk_level: RiskLevel::Critical,
        description: format!(
            "Only {}% budget remaining with {}% spike in unpaid invoices",
            financial.budget_remaining_q3, financial.unpaid_invoices_spike
        ),
    })
}

/// Episodic memory matched the current situation to a past incident.
fn historical_pattern_recurrence(
    financial: &FinancialData,
    kg: &KnowledgeGraphContext,
) -> Option<WeakSignal> {
    let pattern = kg.similar_historical_pattern?;

    Some(WeakSignal {
        signal_type: SignalType::HistoricalPatternRecurrence,
        correlation_strength: 0.75,
        source_indices: vec![DataSource::EpisodicMemory, DataSource::ErpInvoices],
        risk_level: RiskLevel::High,
        description: format!(
            "Current pattern for client {} matches historical incident from {} years ago, \
which resulted in a {}-day cash flow delay",
            financial.client_id, pattern.years_ago, pattern.delay_days
        ),
    })
}

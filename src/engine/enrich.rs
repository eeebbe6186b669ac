//! Optional narrative enrichment: an injected capability that may replace
//! the template explanation with richer text (e.g. from an LLM service).
//!
//! The core decision is fully computable without enrichment. The enrichment
//! step is bounded by a caller-supplied timeout; on expiry or failure the
//! template explanation stands. The worker thread is detached — a hung
//! enricher cannot stall the synthesis path.

use std::sync::Arc;
use std::time::Duration;

use crate::core::errors::Result;
use crate::engine::assembler::FusedDecision;

/// Capability for post-hoc explanation enrichment.
pub trait NarrativeEnricher: Send + Sync {
    /// Produce replacement explanation text for an assembled decision.
    fn enrich(&self, decision: &FusedDecision) -> Result<String>;
}

/// Default no-op enricher: the template explanation is already the
/// narrative.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateEnricher;

impl NarrativeEnricher for TemplateEnricher {
    fn enrich(&self, decision: &FusedDecision) -> Result<String> {
        Ok(decision.explanation.clone())
    }
}

/// Run the enricher with a hard deadline, replacing the decision's
/// explanation on success. Returns whether enrichment was applied.
///
/// The channel is a bounded rendezvous of capacity 1, so the worker's send
/// never blocks even after the deadline has passed.
pub fn enrich_with_timeout(
    enricher: Arc<dyn NarrativeEnricher>,
    decision: &mut FusedDecision,
    timeout: Duration,
) -> bool {
    let (sender, receiver) = crossbeam_channel::bounded::<Result<String>>(1);
    let snapshot = decision.clone();
    std::thread::spawn(move || {
        let _ = sender.send(enricher.enrich(&snapshot));
    });

    match receiver.recv_timeout(timeout) {
        Ok(Ok(text)) => {
            decision.explanation = text;
            true
        }
        Ok(Err(_)) | Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::FusionError;
    use crate::fusion::meta::MetaFusionOutcome;
    use crate::model::Priority;

    fn decision() -> FusedDecision {
        FusedDecision {
            tactical_priority: Priority::Low,
            recommended_action: "hold".to_string(),
            explanation: "template explanation".to_string(),
            weak_signal_alert: Vec::new(),
            predicted_financial_outcome: crate::engine::assembler::PredictedOutcome {
                cash_flow_impact_pct: 0.0,
                margin_impact_pct: 0.0,
                time_to_impact_days: 30,
                probability: 0.9,
            },
            confidence_score: 0.5,
            meta_fusion: MetaFusionOutcome {
                recommended_scenario_id: "A".to_string(),
                consensus_confidence: 0.5,
                agreement_level: 1.0,
                consensus_scores: std::collections::BTreeMap::new(),
                breakdown: std::collections::BTreeMap::new(),
            },
            alternative_actions: Vec::new(),
        }
    }

    struct UpperCaseEnricher;
    impl NarrativeEnricher for UpperCaseEnricher {
        fn enrich(&self, decision: &FusedDecision) -> Result<String> {
            Ok(decision.explanation.to_uppercase())
        }
    }

    struct SlowEnricher;
    impl NarrativeEnricher for SlowEnricher {
        fn enrich(&self, _decision: &FusedDecision) -> Result<String> {
            std::thread::sleep(Duration::from_secs(5));
            Ok("too late".to_string())
        }
    }

    struct FailingEnricher;
    impl NarrativeEnricher for FailingEnricher {
        fn enrich(&self, _decision: &FusedDecision) -> Result<String> {
            Err(FusionError::Enrichment {
                details: "upstream unavailable".to_string(),
            })
        }
    }

    #[test]
    fn template_enricher_is_identity() {
        let d = decision();
        let text = TemplateEnricher.enrich(&d).unwrap();
        assert_eq!(text, d.explanation);
    }

    #[test]
    fn successful_enrichment_replaces_explanation() {
        let mut d = decision();
        let applied = enrich_with_timeout(
            Arc::new(UpperCaseEnricher),
            &mut d,
            Duration::from_secs(2),
        );
        assert!(applied);
        assert_eq!(d.explanation, "TEMPLATE EXPLANATION");
    }

    #[test]
    fn timeout_keeps_template_explanation() {
        let mut d = decision();
        let applied =
            enrich_with_timeout(Arc::new(SlowEnricher), &mut d, Duration::from_millis(50));
        assert!(!applied);
        assert_eq!(d.explanation, "template explanation");
    }

    #[test]
    fn enricher_failure_keeps_template_explanation() {
        let mut d = decision();
        let applied =
            enrich_with_timeout(Arc::new(FailingEnricher), &mut d, Duration::from_secs(2));
        assert!(!applied);
        assert_eq!(d.explanation, "template explanation");
    }
}

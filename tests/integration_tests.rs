//! Integration tests: full-pipeline scenarios, the documented worked
//! example, output contract checks, and journal round-trips.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use financial_fusion_engine::core::config::{Config, Preset};
use financial_fusion_engine::engine::enrich::{
    NarrativeEnricher, TemplateEnricher, enrich_with_timeout,
};
use financial_fusion_engine::engine::record::{ExplainLevel, SynthesisRecord, format_explain};
use financial_fusion_engine::engine::SynthesisEngine;
use financial_fusion_engine::logger::jsonl::JsonlConfig;
use financial_fusion_engine::logger::SynthesisJournal;
use financial_fusion_engine::model::{
    FinancialData, HistoricalPattern, KnowledgeGraphContext, Priority, RiskLevel,
    ScenarioSimulation, SignalType,
};

/// The example used across the project documentation: client under invoice,
/// production, and budget stress, choosing between a renegotiation with a
/// heavy cash-flow hit (A) and an early-payment incentive trading margin (B).
fn worked_example() -> (FinancialData, KnowledgeGraphContext, Vec<ScenarioSimulation>) {
    let financial = FinancialData::new("CLIENT-001", 15.0, -12.0, 5.0);
    let kg = KnowledgeGraphContext {
        client_parent_status: "restructuring".to_string(),
        similar_historical_pattern: Some(HistoricalPattern {
            years_ago: 2,
            delay_days: 30,
        }),
        external_data_signals: vec!["sector downturn".to_string()],
        risk_indicators: vec!["supplier concentration".to_string()],
    };
    let scenarios = vec![
        ScenarioSimulation {
            scenario_id: "A".to_string(),
            description: "Renegotiate payment terms".to_string(),
            cash_flow_impact: -20.0,
            margin_impact: 0.0,
            probability: 0.85,
            time_horizon_days: 60,
        },
        ScenarioSimulation {
            scenario_id: "B".to_string(),
            description: "Offer early payment incentive".to_string(),
            cash_flow_impact: 0.0,
            margin_impact: -5.0,
            probability: 0.90,
            time_horizon_days: 30,
        },
    ];
    (financial, kg, scenarios)
}

#[test]
fn worked_example_end_to_end() {
    let (financial, kg, scenarios) = worked_example();
    let engine = SynthesisEngine::with_defaults();
    let outcome = engine
        .synthesize_traced(&financial, &kg, &scenarios)
        .unwrap();
    let decision = &outcome.decision;

    // Budget at 5% (< 10) fires the Critical liquidity squeeze.
    let squeeze = decision
        .weak_signal_alert
        .iter()
        .find(|signal| signal.signal_type == SignalType::BudgetLiquiditySqueeze)
        .expect("liquidity squeeze must fire");
    assert_eq!(squeeze.risk_level, RiskLevel::Critical);
    assert!((squeeze.correlation_strength - 0.8).abs() < f64::EPSILON);

    // Critical signal forces High priority.
    assert_eq!(decision.tactical_priority, Priority::High);

    // The Weighted strategy picks the cash-stable scenario B; the evidence
    // strategies pick the risk pole A. The disagreement is intentional and
    // must be surfaced, not forced to consensus.
    assert_eq!(outcome.strategy_results[0].recommended_scenario_id, "B");
    assert_eq!(outcome.strategy_results[1].recommended_scenario_id, "A");
    assert_eq!(outcome.strategy_results[2].recommended_scenario_id, "A");
    assert!(decision.meta_fusion.agreement_level < 1.0);
    assert!(decision.explanation.contains("CONSENSUS"));

    // Confidence is a probability.
    assert!((0.0..=1.0).contains(&decision.confidence_score));
}

#[test]
fn worked_example_is_reproducible_bit_for_bit() {
    let (financial, kg, scenarios) = worked_example();
    let engine = SynthesisEngine::with_defaults();

    let first = engine.synthesize(&financial, &kg, &scenarios).unwrap();
    let second = engine.synthesize(&financial, &kg, &scenarios).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());
}

#[test]
fn serialized_decision_has_exactly_the_contract_keys() {
    let (financial, kg, scenarios) = worked_example();
    let decision = SynthesisEngine::with_defaults()
        .synthesize(&financial, &kg, &scenarios)
        .unwrap();

    let json: Value = serde_json::from_str(&decision.to_json().unwrap()).unwrap();
    let object = json.as_object().unwrap();

    let mut keys: Vec<&str> = object.keys().map(String::as_str).collect();
    keys.sort_unstable();
    assert_eq!(
        keys,
        vec![
            "alternative_actions",
            "confidence_score",
            "explanation",
            "meta_fusion",
            "predicted_financial_outcome",
            "recommended_action",
            "tactical_priority",
            "weak_signal_alert",
        ]
    );

    assert_eq!(json["tactical_priority"], "High");
    let outcome = &json["predicted_financial_outcome"];
    assert!(outcome["cash_flow_impact_pct"].is_number());
    assert!(outcome["margin_impact_pct"].is_number());
    assert!(outcome["time_to_impact_days"].is_number());
    assert!(outcome["probability"].is_number());

    let meta = &json["meta_fusion"];
    assert!(meta["recommended_scenario_id"].is_string());
    assert!(meta["consensus_confidence"].is_number());
    assert!(meta["agreement_level"].is_number());
    assert!(meta["strategy_breakdown"].is_object());

    let signal = &json["weak_signal_alert"][0];
    assert!(signal["signal_type"].is_string());
    assert!(signal["correlation_strength"].is_number());
    assert!(signal["source_indices"].is_array());
    assert!(signal["risk_level"].is_string());
    assert!(signal["description"].is_string());
}

#[test]
fn predicted_outcome_is_copied_from_the_winning_scenario() {
    let (financial, kg, scenarios) = worked_example();
    let decision = SynthesisEngine::with_defaults()
        .synthesize(&financial, &kg, &scenarios)
        .unwrap();

    let winner = scenarios
        .iter()
        .find(|scenario| scenario.scenario_id == decision.meta_fusion.recommended_scenario_id)
        .unwrap();
    let outcome = &decision.predicted_financial_outcome;
    assert!((outcome.cash_flow_impact_pct - winner.cash_flow_impact).abs() < f64::EPSILON);
    assert!((outcome.margin_impact_pct - winner.margin_impact).abs() < f64::EPSILON);
    assert_eq!(outcome.time_to_impact_days, winner.time_horizon_days);
    assert!((outcome.probability - winner.probability).abs() < f64::EPSILON);
}

#[test]
fn budget_boundary_is_strict() {
    let (_, kg, scenarios) = worked_example();
    let engine = SynthesisEngine::with_defaults();

    // Exactly 10% remaining: no squeeze.
    let at_threshold = FinancialData::new("CLIENT-001", 15.0, -12.0, 10.0);
    let decision = engine.synthesize(&at_threshold, &kg, &scenarios).unwrap();
    assert!(!decision
        .weak_signal_alert
        .iter()
        .any(|signal| signal.signal_type == SignalType::BudgetLiquiditySqueeze));

    // Just below: Critical squeeze.
    let below_threshold = FinancialData::new("CLIENT-001", 15.0, -12.0, 9.999);
    let decision = engine
        .synthesize(&below_threshold, &kg, &scenarios)
        .unwrap();
    assert!(decision.weak_signal_alert.iter().any(|signal| {
        signal.signal_type == SignalType::BudgetLiquiditySqueeze
            && signal.risk_level == RiskLevel::Critical
    }));
}

#[test]
fn alternatives_are_ordered_by_consensus_score() {
    let (financial, kg, mut scenarios) = worked_example();
    scenarios.push(ScenarioSimulation {
        scenario_id: "C".to_string(),
        description: "Business as usual".to_string(),
        cash_flow_impact: -8.0,
        margin_impact: -8.0,
        probability: 0.70,
        time_horizon_days: 45,
    });

    let decision = SynthesisEngine::with_defaults()
        .synthesize(&financial, &kg, &scenarios)
        .unwrap();
    assert_eq!(decision.alternative_actions.len(), 2);

    let winner = &decision.meta_fusion.recommended_scenario_id;
    let mut ranked: Vec<(&String, f64)> = decision
        .meta_fusion
        .consensus_scores
        .iter()
        .filter(|(scenario, _)| *scenario != winner)
        .map(|(scenario, score)| (scenario, *score))
        .collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());

    let expected: Vec<String> = ranked
        .iter()
        .map(|(scenario, _)| {
            scenarios
                .iter()
                .find(|candidate| candidate.scenario_id == **scenario)
                .unwrap()
                .description
                .clone()
        })
        .collect();
    assert_eq!(decision.alternative_actions, expected);
}

#[test]
fn presets_shift_the_weighted_strategy() {
    let (financial, kg, scenarios) = worked_example();

    let crisis = SynthesisEngine::from_preset(Preset::Crisis)
        .synthesize_traced(&financial, &kg, &scenarios)
        .unwrap();
    let aggressive = SynthesisEngine::from_preset(Preset::Aggressive)
        .synthesize_traced(&financial, &kg, &scenarios)
        .unwrap();

    // Crisis weighting leans harder on cash-flow stability (scenario B).
    let crisis_share = crisis.strategy_results[0].score_per_scenario["B"];
    let aggressive_share = aggressive.strategy_results[0].score_per_scenario["B"];
    assert!(crisis_share >= aggressive_share);
}

#[test]
fn invalid_inputs_fail_with_typed_errors_and_nothing_partial() {
    let (financial, kg, scenarios) = worked_example();
    let engine = SynthesisEngine::with_defaults();

    let err = engine.synthesize(&financial, &kg, &[]).unwrap_err();
    assert_eq!(err.code(), "FFE-2001");

    let mut duplicated = scenarios.clone();
    duplicated.push(scenarios[0].clone());
    let err = engine.synthesize(&financial, &kg, &duplicated).unwrap_err();
    assert_eq!(err.code(), "FFE-2001");
    assert!(err.to_string().contains("duplicate"));

    let mut bad_probability = scenarios;
    bad_probability[0].probability = 1.5;
    let err = engine
        .synthesize(&financial, &kg, &bad_probability)
        .unwrap_err();
    assert_eq!(err.code(), "FFE-2001");
}

#[test]
fn single_scenario_is_trivially_recommended() {
    let (financial, kg, _) = worked_example();
    let scenarios = vec![ScenarioSimulation {
        scenario_id: "ONLY".to_string(),
        description: "Hold and monitor".to_string(),
        cash_flow_impact: -3.0,
        margin_impact: -1.0,
        probability: 0.9,
        time_horizon_days: 20,
    }];

    let outcome = SynthesisEngine::with_defaults()
        .synthesize_traced(&financial, &kg, &scenarios)
        .unwrap();
    for result in &outcome.strategy_results {
        assert_eq!(result.recommended_scenario_id, "ONLY");
        assert!((result.score_per_scenario["ONLY"] - 1.0).abs() < 1e-6);
    }
    assert!((outcome.decision.meta_fusion.agreement_level - 1.0).abs() < f64::EPSILON);
    assert!(outcome.decision.alternative_actions.is_empty());
}

#[test]
fn enrichment_replaces_explanation_only_on_success() {
    struct PrefixEnricher;
    impl NarrativeEnricher for PrefixEnricher {
        fn enrich(
            &self,
            decision: &financial_fusion_engine::engine::FusedDecision,
        ) -> financial_fusion_engine::core::errors::Result<String> {
            Ok(format!("ENRICHED: {}", decision.recommended_action))
        }
    }

    let (financial, kg, scenarios) = worked_example();
    let mut decision = SynthesisEngine::with_defaults()
        .synthesize(&financial, &kg, &scenarios)
        .unwrap();
    let template = decision.explanation.clone();

    // Template default leaves the text untouched.
    let applied = enrich_with_timeout(
        Arc::new(TemplateEnricher),
        &mut decision,
        Duration::from_secs(1),
    );
    assert!(applied);
    assert_eq!(decision.explanation, template);

    let applied = enrich_with_timeout(
        Arc::new(PrefixEnricher),
        &mut decision,
        Duration::from_secs(1),
    );
    assert!(applied);
    assert!(decision.explanation.starts_with("ENRICHED: "));
}

#[test]
fn journal_round_trip_captures_the_outcome() {
    let (financial, kg, scenarios) = worked_example();
    let outcome = SynthesisEngine::with_defaults()
        .synthesize_traced(&financial, &kg, &scenarios)
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("synthesis.jsonl");
    let journal = SynthesisJournal::open(JsonlConfig {
        path: path.clone(),
        fallback_path: None,
        max_size_bytes: 1024 * 1024,
        max_rotated_files: 2,
    });
    journal.record_outcome(&outcome, "trace12345", "CLIENT-001");

    let contents = std::fs::read_to_string(&path).unwrap();
    let entry: Value = serde_json::from_str(contents.lines().next().unwrap()).unwrap();
    assert_eq!(entry["event"], "synthesis_complete");
    assert_eq!(entry["tactical_priority"], "High");
    assert_eq!(entry["weak_signal_count"], 3);
    assert_eq!(
        entry["recommended_scenario"],
        outcome.decision.meta_fusion.recommended_scenario_id.as_str()
    );
}

#[test]
fn explain_record_renders_all_levels() {
    let (financial, kg, scenarios) = worked_example();
    let outcome = SynthesisEngine::with_defaults()
        .synthesize_traced(&financial, &kg, &scenarios)
        .unwrap();
    let record = SynthesisRecord::capture(
        &financial,
        &kg,
        &scenarios,
        Config::default().stable_hash().unwrap(),
        &outcome.aggregated,
        &outcome.strategy_results,
        &outcome.decision,
    )
    .unwrap();

    let l0 = format_explain(&record, ExplainLevel::L0);
    assert!(l0.contains("High priority"));
    let l2 = format_explain(&record, ExplainLevel::L2);
    assert!(l2.contains("weak signal"));
    let l3 = format_explain(&record, ExplainLevel::L3);
    let payload_start = l3.find("trace payload:\n").unwrap() + "trace payload:\n".len();
    let replayed: SynthesisRecord = serde_json::from_str(l3[payload_start..].trim()).unwrap();
    assert_eq!(replayed.decision, record.decision);
}

#[test]
fn fallback_entry_point_agrees_with_plain_synthesis() {
    let (financial, kg, scenarios) = worked_example();
    let engine = SynthesisEngine::with_defaults();

    let plain = engine.synthesize(&financial, &kg, &scenarios).unwrap();
    let fallback = engine
        .synthesize_with_fallback(&financial, &kg, &scenarios)
        .unwrap();
    assert!(!fallback.fallback_applied);
    assert_eq!(plain, fallback.decision);
}

//! Synthesis journaling: append-only JSONL with graceful degradation.
//!
//! The journal sits outside the pure fusion path — the engine never writes;
//! the caller-facing wrapper journals the outcome after the decision is
//! assembled.

pub mod jsonl;

use parking_lot::Mutex;

use crate::core::config::Config;
use crate::core::errors::FusionError;
use crate::engine::SynthesisOutcome;
use crate::fusion::StrategyDiagnostics;
use crate::logger::jsonl::{EventType, JournalEntry, JsonlConfig, JsonlWriter, Severity};

/// Thread-safe journal shared by concurrent synthesis callers.
///
/// The engine itself takes no locks; only journaling serializes, and only
/// for the duration of one line write.
pub struct SynthesisJournal {
    writer: Mutex<JsonlWriter>,
}

impl SynthesisJournal {
    /// Open a journal from the effective configuration, or `None` when
    /// journaling is disabled.
    #[must_use]
    pub fn from_config(config: &Config) -> Option<Self> {
        if !config.journal.enabled {
            return None;
        }
        Some(Self::open(JsonlConfig {
            path: config.paths.journal_file.clone(),
            fallback_path: config.paths.journal_fallback.clone(),
            max_size_bytes: config.journal.max_size_bytes,
            max_rotated_files: config.journal.max_rotated_files,
        }))
    }

    /// Open a journal with explicit writer settings.
    #[must_use]
    pub fn open(config: JsonlConfig) -> Self {
        Self {
            writer: Mutex::new(JsonlWriter::open(config)),
        }
    }

    /// Journal one completed synthesis outcome.
    pub fn record_outcome(&self, outcome: &SynthesisOutcome, trace_id: &str, client_id: &str) {
        let decision = &outcome.decision;
        let mut entry = JournalEntry::new(
            if outcome.fallback_applied {
                EventType::ConflictFallback
            } else {
                EventType::SynthesisComplete
            },
            Severity::Info,
        );
        entry.trace_id = Some(trace_id.to_string());
        entry.client_id = Some(client_id.to_string());
        entry.recommended_scenario = Some(decision.meta_fusion.recommended_scenario_id.clone());
        entry.tactical_priority = Some(decision.tactical_priority.to_string());
        entry.confidence = Some(decision.confidence_score);
        entry.agreement_level = Some(decision.meta_fusion.agreement_level);
        entry.weak_signal_count = Some(decision.weak_signal_alert.len());
        entry.fallback_applied = Some(outcome.fallback_applied);

        for result in &outcome.strategy_results {
            match &result.diagnostics {
                StrategyDiagnostics::DempsterShafer { conflict, .. } => {
                    entry.conflict = Some(*conflict);
                }
                StrategyDiagnostics::Bayesian { entropy, .. } => {
                    entry.entropy = Some(*entropy);
                }
                StrategyDiagnostics::Weighted { .. } => {}
            }
        }

        self.writer.lock().write_entry(&entry);
    }

    /// Journal a failed synthesis call.
    pub fn record_error(&self, error: &FusionError, client_id: Option<&str>) {
        let event = match error {
            FusionError::InvalidInput { .. } => EventType::ValidationReject,
            FusionError::Enrichment { .. } => EventType::EnrichmentFallback,
            _ => EventType::Error,
        };
        let severity = if error.is_recoverable() {
            Severity::Warning
        } else {
            Severity::Critical
        };
        let mut entry = JournalEntry::new(event, severity);
        entry.client_id = client_id.map(str::to_string);
        entry.error_code = Some(error.code().to_string());
        entry.error_message = Some(error.to_string());
        self.writer.lock().write_entry(&entry);
    }

    /// Current degradation state of the underlying writer.
    #[must_use]
    pub fn state(&self) -> String {
        self.writer.lock().state().to_string()
    }
}

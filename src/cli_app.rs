//! Top-level CLI definition and dispatch.

use std::fs;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell as CompletionShell, generate};
use colored::{Colorize, control};
use serde::{Deserialize, Serialize};

use financial_fusion_engine::core::config::{Config, Preset};
use financial_fusion_engine::core::errors::{FusionError, Result};
use financial_fusion_engine::engine::record::{ExplainLevel, SynthesisRecord, format_explain};
use financial_fusion_engine::engine::SynthesisEngine;
use financial_fusion_engine::logger::SynthesisJournal;
use financial_fusion_engine::model::{
    self, FinancialData, KnowledgeGraphContext, Priority, ScenarioSimulation,
};

/// Financial Fusion Engine — multi-strategy tactical decision fusion.
#[derive(Debug, Parser)]
#[command(
    name = "ffe",
    author,
    version,
    about = "Financial Fusion Engine - explainable multi-strategy decision fusion",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Force JSON output mode.
    #[arg(long, global = true)]
    json: bool,
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Run decision fusion over an input document.
    Synthesize(SynthesizeArgs),
    /// Validate an input document without running fusion.
    Validate(ValidateArgs),
    /// List the named risk/profitability presets.
    Presets,
    /// Print the effective configuration.
    Config,
    /// Generate shell completions.
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, clap::Args)]
struct SynthesizeArgs {
    /// JSON input document: financial data, knowledge-graph context,
    /// scenario list.
    input: PathBuf,
    /// Apply a named preset (crisis|conservative|balanced|aggressive).
    #[arg(long, value_name = "PRESET")]
    preset: Option<String>,
    /// Explain detail level (0-3) printed after the decision.
    #[arg(long, value_name = "LEVEL")]
    explain: Option<u8>,
    /// On DST total contradiction, retry without the DST strategy.
    #[arg(long)]
    allow_fallback: bool,
    /// Journal the outcome even when disabled in the config.
    #[arg(long)]
    journal: bool,
}

#[derive(Debug, Clone, clap::Args)]
struct ValidateArgs {
    /// JSON input document to validate.
    input: PathBuf,
}

#[derive(Debug, Clone, clap::Args)]
struct CompletionsArgs {
    /// Target shell.
    shell: CompletionShell,
}

/// The JSON document `ffe synthesize` consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SynthesisInput {
    financial: FinancialData,
    #[serde(default)]
    knowledge_graph: KnowledgeGraphContext,
    scenarios: Vec<ScenarioSimulation>,
}

/// Dispatch a parsed CLI invocation.
pub fn run(cli: &Cli) -> Result<()> {
    if cli.no_color || !io::stdout().is_terminal() {
        control::set_override(false);
    }

    let mut config = Config::load(cli.config.as_deref())?;

    match &cli.command {
        Command::Synthesize(args) => synthesize(cli, args, &mut config),
        Command::Validate(args) => validate(cli, args),
        Command::Presets => {
            presets(cli);
            Ok(())
        }
        Command::Config => show_config(cli, &config),
        Command::Completions(args) => {
            let mut command = Cli::command();
            generate(args.shell, &mut command, "ffe", &mut io::stdout());
            Ok(())
        }
    }
}

fn read_input(path: &Path) -> Result<SynthesisInput> {
    let raw = fs::read_to_string(path).map_err(|source| FusionError::io(path, source))?;
    Ok(serde_json::from_str(&raw)?)
}

fn synthesize(cli: &Cli, args: &SynthesizeArgs, config: &mut Config) -> Result<()> {
    if let Some(preset) = &args.preset {
        config.apply_preset(preset.parse::<Preset>()?);
    }
    if args.journal {
        config.journal.enabled = true;
    }

    let input = read_input(&args.input)?;
    let engine = SynthesisEngine::new(config.clone())?;
    let journal = SynthesisJournal::from_config(config);

    let outcome = if args.allow_fallback {
        engine.synthesize_with_fallback(&input.financial, &input.knowledge_graph, &input.scenarios)
    } else {
        engine.synthesize_traced(&input.financial, &input.knowledge_graph, &input.scenarios)
    };

    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(error) => {
            if let Some(journal) = &journal {
                journal.record_error(&error, Some(&input.financial.client_id));
            }
            return Err(error);
        }
    };

    let record = SynthesisRecord::capture(
        &input.financial,
        &input.knowledge_graph,
        &input.scenarios,
        config.stable_hash()?,
        &outcome.aggregated,
        &outcome.strategy_results,
        &outcome.decision,
    )?;
    if let Some(journal) = &journal {
        journal.record_outcome(&outcome, &record.trace_id, &input.financial.client_id);
    }

    if cli.json {
        println!("{}", outcome.decision.to_json()?);
    } else {
        print_decision_human(&outcome.decision, outcome.fallback_applied);
    }
    if let Some(level) = args.explain {
        println!("{}", format_explain(&record, ExplainLevel::from_int(level)));
    }
    Ok(())
}

fn print_decision_human(
    decision: &financial_fusion_engine::engine::FusedDecision,
    fallback_applied: bool,
) {
    let priority = match decision.tactical_priority {
        Priority::High => "High".red().bold(),
        Priority::Medium => "Medium".yellow().bold(),
        Priority::Low => "Low".green().bold(),
    };
    println!("tactical priority : {priority}");
    println!("recommended action: {}", decision.recommended_action);
    println!(
        "confidence        : {:.2} (agreement {:.0}%)",
        decision.confidence_score,
        decision.meta_fusion.agreement_level * 100.0
    );
    if fallback_applied {
        println!(
            "{}",
            "note: DST strategy dropped after total evidence conflict".yellow()
        );
    }
    if !decision.weak_signal_alert.is_empty() {
        println!("weak signals      :");
        for signal in &decision.weak_signal_alert {
            println!(
                "  - {} [{}] strength {:.2}",
                signal.signal_type, signal.risk_level, signal.correlation_strength
            );
        }
    }
    if !decision.alternative_actions.is_empty() {
        println!("alternatives      :");
        for alternative in &decision.alternative_actions {
            println!("  - {alternative}");
        }
    }
    println!();
    println!("{}", decision.explanation);
}

fn validate(cli: &Cli, args: &ValidateArgs) -> Result<()> {
    let input = read_input(&args.input)?;
    model::validate_inputs(&input.financial, &input.scenarios)?;
    if cli.json {
        println!(
            "{}",
            serde_json::json!({
                "valid": true,
                "scenarios": input.scenarios.len(),
                "client_id": input.financial.client_id,
            })
        );
    } else {
        println!(
            "{} {} scenarios for client {}",
            "valid:".green(),
            input.scenarios.len(),
            input.financial.client_id
        );
    }
    Ok(())
}

fn presets(cli: &Cli) {
    if cli.json {
        let listing: Vec<serde_json::Value> = Preset::ALL
            .iter()
            .map(|preset| {
                let weights = preset.weights();
                serde_json::json!({
                    "name": preset.to_string(),
                    "risk_weight": weights.risk_weight,
                    "profitability_weight": weights.profitability_weight,
                })
            })
            .collect();
        println!("{}", serde_json::Value::Array(listing));
        return;
    }
    for preset in Preset::ALL {
        let weights = preset.weights();
        println!(
            "{:<13} risk {:.1} / profitability {:.1}",
            preset.to_string().bold(),
            weights.risk_weight,
            weights.profitability_weight
        );
    }
}

fn show_config(cli: &Cli, config: &Config) -> Result<()> {
    if cli.json {
        println!("{}", serde_json::to_string_pretty(config)?);
    } else {
        let rendered = toml::to_string_pretty(config).map_err(|e| FusionError::Serialization {
            context: "toml",
            details: e.to_string(),
        })?;
        println!("# effective configuration (hash {})", config.stable_hash()?);
        print!("{rendered}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn synthesize_args_parse() {
        let cli = Cli::try_parse_from([
            "ffe",
            "--json",
            "synthesize",
            "input.json",
            "--preset",
            "crisis",
            "--explain",
            "2",
            "--allow-fallback",
        ])
        .unwrap();
        assert!(cli.json);
        match cli.command {
            Command::Synthesize(args) => {
                assert_eq!(args.input, PathBuf::from("input.json"));
                assert_eq!(args.preset.as_deref(), Some("crisis"));
                assert_eq!(args.explain, Some(2));
                assert!(args.allow_fallback);
            }
            _ => panic!("expected synthesize subcommand"),
        }
    }

    #[test]
    fn input_document_parses_with_default_kg() {
        let raw = r#"{
            "financial": {
                "client_id": "CLIENT-001",
                "unpaid_invoices_spike": 15.0,
                "production_output_change": -12.0,
                "budget_remaining_q3": 5.0
            },
            "scenarios": [{
                "scenario_id": "A",
                "description": "Renegotiate payment terms",
                "cash_flow_impact": -20.0,
                "margin_impact": 0.0,
                "probability": 0.85,
                "time_horizon_days": 60
            }]
        }"#;
        let input: SynthesisInput = serde_json::from_str(raw).unwrap();
        assert_eq!(input.financial.client_id, "CLIENT-001");
        assert!(input.knowledge_graph.client_parent_status.is_empty());
        assert_eq!(input.scenarios.len(), 1);
    }
}

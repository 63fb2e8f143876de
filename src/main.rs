//! greendc-audit: data-center energy and CO2 audit from the command line
//!
//! # Usage
//!
//! ```bash
//! # Evaluate a facility against the built-in rules
//! greendc-audit evaluate --input data/samples/facility.toml
//!
//! # Only aggregate the actions the operator picked, JSON output
//! greendc-audit evaluate --input site.json --select CPU_LOW --select PUE_HIGH --format json
//!
//! # Add a regression forecast learned from past audits
//! greendc-audit evaluate --input site.toml --history data/samples/audit_history.json
//!
//! # List the knowledge base / check a config file
//! greendc-audit rules --kb my_rules.toml
//! greendc-audit --config audit_config.toml check-config
//! ```
//!
//! # Environment Variables
//!
//! - `GREENDC_CONFIG`: Path to the TOML config (default: ./audit_config.toml)
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use greendc_audit::config::{self, defaults, AuditConfig, ConfigProvenance};
use greendc_audit::prediction::{self, HistorySource, JsonHistoryFile, ModelStore};
use greendc_audit::{report, AuditPipeline, FacilityInput, KnowledgeBase, SimulationAggregator};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "greendc-audit")]
#[command(about = "Knowledge-based energy and CO2 audit for data centers")]
#[command(version)]
struct CliArgs {
    /// Config file (overrides GREENDC_CONFIG and ./audit_config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: SubCommand,
}

#[derive(clap::Subcommand, Debug)]
enum SubCommand {
    /// Evaluate one facility and print the audit report
    Evaluate {
        /// Facility input file (.toml or .json)
        #[arg(long)]
        input: PathBuf,
        /// Knowledge base file (default: config, then built-in rules)
        #[arg(long)]
        kb: Option<PathBuf>,
        /// Past audits (JSON array) used to fit the forecast model
        #[arg(long)]
        history: Option<PathBuf>,
        /// Only aggregate these rule ids (repeatable)
        #[arg(long = "select", value_name = "RULE_ID")]
        select: Vec<String>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// List the rules and reference standards of a knowledge base
    Rules {
        #[arg(long)]
        kb: Option<PathBuf>,
    },

    /// Load, validate and print the effective configuration
    CheckConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

// ============================================================================
// Loading
// ============================================================================

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(explicit: Option<&Path>) -> Result<(AuditConfig, ConfigProvenance)> {
    match explicit {
        Some(path) => AuditConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(AuditConfig::locate()),
    }
}

fn load_knowledge_base(cli_path: Option<&Path>, cfg: &AuditConfig) -> Result<KnowledgeBase> {
    match cli_path.or(cfg.knowledge_base.path.as_deref()) {
        Some(path) => KnowledgeBase::load(path)
            .with_context(|| format!("Failed to load knowledge base {}", path.display())),
        None => {
            let kb = KnowledgeBase::builtin().context("Built-in knowledge base is invalid")?;
            info!(rules = kb.len(), "Using built-in knowledge base");
            Ok(kb)
        }
    }
}

fn load_facility(path: &Path) -> Result<FacilityInput> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read facility input {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    let input: FacilityInput = match ext.as_str() {
        "json" => serde_json::from_str(&contents)
            .with_context(|| format!("Invalid facility JSON in {}", path.display()))?,
        "toml" => toml::from_str(&contents)
            .with_context(|| format!("Invalid facility TOML in {}", path.display()))?,
        other => anyhow::bail!("Unsupported facility input format '{other}' (expected .toml or .json)"),
    };
    Ok(input)
}

/// Fit a model from `path` in the background and wait for it, bounded by
/// `FIT_TIMEOUT_SECS`. Any failure leaves the store empty.
async fn fit_history(path: &Path, cfg: &AuditConfig, store: &ModelStore) {
    let source = JsonHistoryFile::new(path);
    let history = match source.load() {
        Ok(h) => h,
        Err(e) => {
            warn!(error = %e, "Skipping forecast: history unavailable");
            return;
        }
    };

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let handle = prediction::spawn_fit(
        history,
        cfg.prediction.fit_options(),
        store.clone(),
        cancel.clone(),
    );
    let timeout = Duration::from_secs(defaults::FIT_TIMEOUT_SECS);
    match tokio::time::timeout(timeout, handle).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => warn!(source = %source.describe(), error = %e, "Skipping forecast"),
        Ok(Err(e)) => warn!(error = %e, "Model fit task panicked"),
        Err(_) => {
            cancel.cancel();
            warn!(timeout_secs = defaults::FIT_TIMEOUT_SECS, "Model fit timed out, skipping forecast");
        }
    }
}

// ============================================================================
// Commands
// ============================================================================

async fn run_evaluate(
    input_path: &Path,
    kb_path: Option<&Path>,
    history_path: Option<&Path>,
    select: &[String],
    format: OutputFormat,
) -> Result<()> {
    let cfg = config::get();
    let kb = Arc::new(load_knowledge_base(kb_path, cfg)?);

    let mut input = load_facility(input_path)?;
    if input.name.is_none() {
        input.name = Some(cfg.facility.name.clone());
    }

    let mut pipeline = AuditPipeline::new(kb, SimulationAggregator::from_config(&cfg.simulation));

    let history = history_path.or(cfg.prediction.history_path.as_deref());
    if let Some(path) = history {
        if cfg.prediction.enabled {
            let store = ModelStore::new();
            fit_history(path, cfg, &store).await;
            pipeline = pipeline.with_model_store(store);
        } else {
            info!("Prediction disabled in config, ignoring history");
        }
    }

    let audit = if select.is_empty() {
        pipeline.run(&input)
    } else {
        pipeline.run_selected(&input, select)
    }
    .context("Facility input rejected")?;

    match format {
        OutputFormat::Text => println!("{}", report::render_text(&audit)),
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&audit).context("Failed to serialize report")?
        ),
    }
    Ok(())
}

fn run_rules(kb_path: Option<&Path>) -> Result<()> {
    let kb = load_knowledge_base(kb_path, config::get())?;

    println!(
        "Knowledge base {} ({} rules)",
        kb.version().unwrap_or("unversioned"),
        kb.len()
    );
    for rule in kb.rules() {
        println!(
            "  {:<20} if {:<32} -> {} (~{}%, {} impact)",
            rule.id, rule.condition.to_string(), rule.action, rule.estimated_saving_percent, rule.co2_impact
        );
    }
    if !kb.standards().is_empty() {
        println!("\nReference standards:");
        for s in kb.standards() {
            println!("  - {s}");
        }
    }
    Ok(())
}

fn run_check_config(provenance: &ConfigProvenance) -> Result<()> {
    let cfg = config::get();
    let explicit = provenance.explicit_settings();
    let defaulted = provenance.defaulted_settings();
    info!(
        source = %provenance.source,
        explicit = explicit.len(),
        defaulted = defaulted.len(),
        "Config is valid"
    );

    println!("# source: {}", provenance.source);
    println!("# set explicitly: {}", list_or_none(&explicit));
    println!("# built-in defaults: {}", list_or_none(&defaulted));
    println!();
    print!("{}", cfg.to_toml().context("Failed to render config")?);
    Ok(())
}

fn list_or_none(keys: &[&str]) -> String {
    if keys.is_empty() {
        "none".to_string()
    } else {
        keys.join(", ")
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_tracing(args.log_json);

    let (cfg, provenance) = load_config(args.config.as_deref())?;
    config::init(cfg);

    match args.command {
        SubCommand::Evaluate {
            input,
            kb,
            history,
            select,
            format,
        } => run_evaluate(&input, kb.as_deref(), history.as_deref(), &select, format).await,
        SubCommand::Rules { kb } => run_rules(kb.as_deref()),
        SubCommand::CheckConfig => run_check_config(&provenance),
    }
}

//! Operator command-line interface.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::domain::models::{DecisionType, SignalOutcome};

/// Command-line arguments.
#[derive(Parser)]
#[command(name = "signal-memory")]
#[command(about = "Inspect and maintain a signal memory database", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Config file to load instead of .signal-memory/config.yaml
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Commands {
    /// Show store and index statistics
    Stats,

    /// Show performance over a trailing window
    Metrics {
        /// Window length in days
        #[arg(short, long, default_value_t = 7)]
        days: i64,
    },

    /// Find past signals similar to a decision
    Similar {
        symbol: String,

        /// BUY, SELL or HOLD
        #[arg(value_parser = parse_decision_type)]
        decision: DecisionType,

        reasoning: String,

        /// Number of matches to return
        #[arg(short = 'k', long, default_value_t = 5)]
        limit: usize,
    },

    /// Record the outcome of a signal
    Outcome {
        /// Signal id
        id: String,

        /// success, failure, partial or pending
        #[arg(value_parser = parse_outcome)]
        outcome: SignalOutcome,

        /// Performance metric as key=value (repeatable)
        #[arg(short, long = "metric", value_parser = parse_metric)]
        metrics: Vec<(String, f64)>,
    },

    /// Delete old signals and rebuild the index
    Cleanup {
        /// Age cutoff; defaults to the configured retention
        #[arg(long)]
        older_than_days: Option<i64>,
    },

    /// Rebuild the similarity index from stored embeddings
    Rebuild {
        /// Embed signals stored without an embedding first
        #[arg(long)]
        backfill: bool,
    },

    /// Run a regression evaluation now
    Improve,

    /// Measure the effect of past improvement actions
    Reconcile,

    /// List recorded improvement actions
    Improvements {
        /// Show only the most recent N actions
        #[arg(short, long)]
        limit: Option<usize>,
    },
}

fn parse_decision_type(s: &str) -> Result<DecisionType, String> {
    DecisionType::from_str(s).ok_or_else(|| format!("invalid decision type '{s}'"))
}

fn parse_outcome(s: &str) -> Result<SignalOutcome, String> {
    SignalOutcome::from_str(s).ok_or_else(|| format!("invalid outcome '{s}'"))
}

fn parse_metric(s: &str) -> Result<(String, f64), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{s}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty metric name in '{s}'"));
    }
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid metric value in '{s}'"))?;
    Ok((key.to_string(), value))
}

/// Print an error and exit with a non-zero status.
pub fn handle_error(err: anyhow::Error, json: bool) -> ! {
    if json {
        let body = serde_json::json!({
            "error": err.to_string(),
            "causes": err.chain().skip(1).map(ToString::to_string).collect::<Vec<_>>(),
        });
        eprintln!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("Error: {err}");
        for cause in err.chain().skip(1) {
            eprintln!("  caused by: {cause}");
        }
    }
    std::process::exit(1);
}

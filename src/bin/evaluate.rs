//! cli entry for the evaluation stage

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use riskstrat::evaluate::{self, EvaluateConfig};

/// score a held-out csv with a fitted cox model, stratify into risk
/// tertiles, and plot kaplan-meier curves per tertile
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// path to the test csv (preprocessor output)
    #[arg(long)]
    test: PathBuf,

    /// path to the fitted model artifact (trainer output)
    #[arg(long)]
    model: PathBuf,

    /// output directory for km_by_risk.png / risk_groups.csv
    #[arg(long)]
    out: PathBuf,

    /// duration column
    #[arg(long, default_value = "time")]
    time_col: String,

    /// event indicator column (1 = event, 0 = censored)
    #[arg(long, default_value = "event")]
    event_col: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = EvaluateConfig {
        test: args.test,
        model: args.model,
        out_dir: args.out,
        time_col: args.time_col,
        event_col: args.event_col,
    };

    evaluate::run(&config)?;
    Ok(())
}

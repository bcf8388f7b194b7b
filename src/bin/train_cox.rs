//! cli entry for the training stage

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use riskstrat::train::{self, TrainConfig};

/// fit a ridge-penalized cox proportional hazards model on a training csv
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// path to the training csv (preprocessor output)
    #[arg(long)]
    train: PathBuf,

    /// output directory for coxph.json / coefficients.csv / metrics_train.csv
    #[arg(long)]
    out: PathBuf,

    /// subject identifier column, excluded from the covariates
    #[arg(long, default_value = "id")]
    id_col: String,

    /// duration column
    #[arg(long, default_value = "time")]
    time_col: String,

    /// event indicator column (1 = event, 0 = censored)
    #[arg(long, default_value = "event")]
    event_col: String,

    /// l2 penalty applied during the fit
    #[arg(long, default_value_t = 0.01)]
    penalizer: f64,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = TrainConfig {
        train: args.train,
        out_dir: args.out,
        id_col: args.id_col,
        time_col: args.time_col,
        event_col: args.event_col,
        penalizer: args.penalizer,
    };

    train::run(&config)?;
    Ok(())
}

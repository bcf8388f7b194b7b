//! cli entry for the preprocessing stage

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use riskstrat::preprocess::{self, PreprocessConfig};

/// join feature + survival tables, impute and standardize the covariates,
/// and split into train/test partitions
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// path to the feature csv
    #[arg(long)]
    features: PathBuf,

    /// path to the survival outcomes csv
    #[arg(long)]
    survival: PathBuf,

    /// output directory for train.csv / test.csv / preprocess_meta.json
    #[arg(long)]
    out: PathBuf,

    /// subject identifier column
    #[arg(long, default_value = "id")]
    id_col: String,

    /// duration column
    #[arg(long, default_value = "time")]
    time_col: String,

    /// event indicator column (1 = event, 0 = censored)
    #[arg(long, default_value = "event")]
    event_col: String,

    /// fraction of rows held out for the test partition
    #[arg(long, default_value_t = 0.2)]
    test_size: f64,

    /// rng seed for the split
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = PreprocessConfig {
        features: args.features,
        survival: args.survival,
        out_dir: args.out,
        id_col: args.id_col,
        time_col: args.time_col,
        event_col: args.event_col,
        test_size: args.test_size,
        seed: args.seed,
    };

    preprocess::run(&config)?;
    Ok(())
}

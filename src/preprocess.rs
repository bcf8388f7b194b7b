//! stage 1: join the feature and survival tables, impute + scale the
//! covariates, and split into train/test partitions

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::PathBuf;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StratError};
use crate::table::Table;

/// everything the preprocessor needs for one run
#[derive(Debug, Clone)]
pub struct PreprocessConfig {
    pub features: PathBuf,
    pub survival: PathBuf,
    pub out_dir: PathBuf,
    pub id_col: String,
    pub time_col: String,
    pub event_col: String,
    pub test_size: f64,
    pub seed: u64,
}

/// column roles, persisted so downstream stages could recover them.
/// (the trainer and evaluator currently re-derive these from their own
/// cli defaults instead of reading this file; custom column names have
/// to be passed to every stage by hand.)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreprocessMeta {
    pub id_col: String,
    pub time_col: String,
    pub event_col: String,
    pub feature_cols: Vec<String>,
}

/// covariate cells treated as missing
fn is_missing(cell: &str) -> bool {
    let trimmed = cell.trim();
    trimmed.is_empty()
        || matches!(
            trimmed.to_ascii_lowercase().as_str(),
            "na" | "n/a" | "nan" | "null"
        )
}

fn parse_covariate(cell: &str, column: &str, row: usize) -> Result<f64> {
    if is_missing(cell) {
        return Ok(f64::NAN);
    }
    cell.trim().parse::<f64>().map_err(|_| {
        StratError::numerical_error(format!(
            "column '{}' row {}: cannot parse '{}' as a number",
            column, row, cell
        ))
    })
}

/// median of the observed (non-nan) values; none if nothing observed
fn observed_median(values: &[f64]) -> Option<f64> {
    let mut observed: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if observed.is_empty() {
        return None;
    }
    observed.sort_by(f64::total_cmp);

    let mid = observed.len() / 2;
    if observed.len() % 2 == 1 {
        Some(observed[mid])
    } else {
        Some((observed[mid - 1] + observed[mid]) / 2.0)
    }
}

/// run the full preprocessing stage and write train.csv, test.csv and
/// preprocess_meta.json into the output directory (overwriting silently)
pub fn run(config: &PreprocessConfig) -> Result<PreprocessMeta> {
    if !(config.test_size > 0.0 && config.test_size < 1.0) {
        return Err(StratError::invalid_parameter(
            "test_size",
            config.test_size.to_string(),
        ));
    }

    let features = Table::read_csv(&config.features)?;
    let survival = Table::read_csv(&config.survival)?;

    // the id column must exist in both inputs before anything is written
    survival.require_column(&config.id_col, &config.survival.display().to_string())?;
    features.require_column(&config.id_col, &config.features.display().to_string())?;

    let joined = survival.inner_join(&features, &config.id_col)?;
    if joined.n_rows() == 0 {
        return Err(StratError::EmptyJoin);
    }

    let id_idx = joined.require_column(&config.id_col, "joined table")?;
    let time_idx = joined.require_column(&config.time_col, "joined table")?;
    let event_idx = joined.require_column(&config.event_col, "joined table")?;

    let feature_cols: Vec<String> = joined
        .headers()
        .iter()
        .enumerate()
        .filter(|&(j, _)| j != id_idx && j != time_idx && j != event_idx)
        .map(|(_, name)| name.clone())
        .collect();

    // parse the covariates, keeping nan for missing cells
    let n_rows = joined.n_rows();
    let mut columns: Vec<Vec<f64>> = Vec::with_capacity(feature_cols.len());
    for name in &feature_cols {
        let j = joined.require_column(name, "joined table")?;
        let mut column = Vec::with_capacity(n_rows);
        for (i, row) in joined.rows().iter().enumerate() {
            column.push(parse_covariate(&row[j], name, i)?);
        }
        columns.push(column);
    }

    // median-impute then standardize. statistics are fit once on the full
    // joined table, before the split, so the test rows contribute too.
    for (column, name) in columns.iter_mut().zip(feature_cols.iter()) {
        let median = observed_median(column).ok_or_else(|| {
            StratError::numerical_error(format!(
                "column '{}' has no observed values to impute from",
                name
            ))
        })?;
        for value in column.iter_mut() {
            if value.is_nan() {
                *value = median;
            }
        }

        let mean = column.iter().sum::<f64>() / n_rows as f64;
        let variance =
            column.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n_rows as f64;
        let std = variance.sqrt();
        // constant columns end up all-zero rather than erroring
        let scale = if std == 0.0 { 1.0 } else { std };
        for value in column.iter_mut() {
            *value = (*value - mean) / scale;
        }
    }

    let times = joined.numeric_column(time_idx)?;
    let events: Vec<i64> = joined
        .numeric_column(event_idx)?
        .into_iter()
        .map(|v| v as i64)
        .collect();
    let ids: Vec<&str> = joined
        .rows()
        .iter()
        .map(|row| row[id_idx].as_str())
        .collect();

    // seeded shuffle; the test partition takes ceil(n * test_size) rows
    let mut indices: Vec<usize> = (0..n_rows).collect();
    let mut rng = StdRng::seed_from_u64(config.seed);
    indices.shuffle(&mut rng);
    let n_test = ((n_rows as f64) * config.test_size).ceil() as usize;
    let (test_indices, train_indices) = indices.split_at(n_test);

    let mut headers = vec![
        config.id_col.clone(),
        config.time_col.clone(),
        config.event_col.clone(),
    ];
    headers.extend(feature_cols.iter().cloned());

    let partition_rows = |selected: &[usize]| -> Vec<Vec<String>> {
        selected
            .iter()
            .map(|&i| {
                let mut row = vec![
                    ids[i].to_string(),
                    times[i].to_string(),
                    events[i].to_string(),
                ];
                row.extend(columns.iter().map(|column| column[i].to_string()));
                row
            })
            .collect()
    };

    fs::create_dir_all(&config.out_dir)?;
    Table::new(headers.clone(), partition_rows(train_indices))
        .write_csv(&config.out_dir.join("train.csv"))?;
    Table::new(headers, partition_rows(test_indices))
        .write_csv(&config.out_dir.join("test.csv"))?;

    let meta = PreprocessMeta {
        id_col: config.id_col.clone(),
        time_col: config.time_col.clone(),
        event_col: config.event_col.clone(),
        feature_cols,
    };
    let writer = BufWriter::new(File::create(config.out_dir.join("preprocess_meta.json"))?);
    serde_json::to_writer_pretty(writer, &meta)?;

    println!(
        "saved train/test partitions and metadata to {}",
        config.out_dir.display()
    );

    Ok(meta)
}

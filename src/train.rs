//! stage 2: fit the cox model on the training partition and persist the
//! model artifact, coefficients and training concordance

use std::fs;
use std::path::{Path, PathBuf};

use crate::data::SurvivalData;
use crate::error::Result;
use crate::model::{CoxModel, CoxSummary};
use crate::table::Table;

#[derive(Debug, Clone)]
pub struct TrainConfig {
    pub train: PathBuf,
    pub out_dir: PathBuf,
    pub id_col: String,
    pub time_col: String,
    pub event_col: String,
    pub penalizer: f64,
}

/// fit, print the summary, and write coxph.json / coefficients.csv /
/// metrics_train.csv into the output directory
pub fn run(config: &TrainConfig) -> Result<CoxSummary> {
    let source_name = config.train.display().to_string();
    let table = Table::read_csv(&config.train)?;
    let data = SurvivalData::from_table(
        &table,
        &config.time_col,
        &config.event_col,
        &[config.id_col.as_str()],
        &source_name,
    )?;

    let mut model = CoxModel::new().with_penalizer(config.penalizer);
    model.fit(&data)?;

    let summary = model.summary(&data)?;
    summary.print();

    fs::create_dir_all(&config.out_dir)?;
    model.save(&config.out_dir.join("coxph.json"))?;
    write_coefficients(&summary, &config.out_dir.join("coefficients.csv"))?;
    write_train_metrics(summary.concordance, &config.out_dir.join("metrics_train.csv"))?;

    println!("saved model + metrics to {}", config.out_dir.display());

    Ok(summary)
}

/// coefficient rows sorted descending by value
fn write_coefficients(summary: &CoxSummary, path: &Path) -> Result<()> {
    let mut rows: Vec<(&str, f64)> = summary
        .feature_names
        .iter()
        .map(String::as_str)
        .zip(summary.coefficients.iter().copied())
        .collect();
    rows.sort_by(|a, b| b.1.total_cmp(&a.1));

    let mut wtr = csv::WriterBuilder::new().from_path(path)?;
    wtr.write_record(["feature", "coefficient"])?;
    for (name, coefficient) in rows {
        wtr.write_record([name.to_string(), coefficient.to_string()])?;
    }
    wtr.flush()?;
    Ok(())
}

fn write_train_metrics(concordance: f64, path: &Path) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_path(path)?;
    wtr.write_record(["metric", "value"])?;
    wtr.write_record(["concordance_index_train".to_string(), concordance.to_string()])?;
    wtr.flush()?;
    Ok(())
}

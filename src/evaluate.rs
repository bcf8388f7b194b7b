//! stage 3: score the test partition with a fitted model, stratify into
//! risk tertiles, and fit a kaplan-meier curve per tertile

use std::fmt;
use std::fs;
use std::path::PathBuf;

use ndarray::Array2;

use crate::data::event_flag;
use crate::error::{Result, StratError};
use crate::km::KaplanMeier;
use crate::model::CoxModel;
use crate::plot;
use crate::table::Table;

/// tertile bucket a subject lands in, by predicted risk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskGroup {
    Low,
    Mid,
    High,
}

impl RiskGroup {
    pub const ALL: [RiskGroup; 3] = [RiskGroup::Low, RiskGroup::Mid, RiskGroup::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskGroup::Low => "Low",
            RiskGroup::Mid => "Mid",
            RiskGroup::High => "High",
        }
    }
}

impl fmt::Display for RiskGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct EvaluateConfig {
    pub test: PathBuf,
    pub model: PathBuf,
    pub out_dir: PathBuf,
    pub time_col: String,
    pub event_col: String,
}

/// linear-interpolation sample quantile over an unsorted slice
pub fn quantile(values: &[f64], q: f64) -> Result<f64> {
    if values.is_empty() {
        return Err(StratError::invalid_dimensions(
            "quantile of an empty sample",
        ));
    }
    if !(0.0..=1.0).contains(&q) {
        return Err(StratError::invalid_parameter("q", q.to_string()));
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let position = (sorted.len() - 1) as f64 * q;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;

    Ok(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

/// tertile assignment from the sample's own risk distribution. boundary
/// ties go to the lower group.
pub fn assign_risk_groups(risks: &[f64]) -> Result<(Vec<RiskGroup>, f64, f64)> {
    let q1 = quantile(risks, 1.0 / 3.0)?;
    let q2 = quantile(risks, 2.0 / 3.0)?;

    let groups = risks
        .iter()
        .map(|&risk| {
            if risk <= q1 {
                RiskGroup::Low
            } else if risk <= q2 {
                RiskGroup::Mid
            } else {
                RiskGroup::High
            }
        })
        .collect();

    Ok((groups, q1, q2))
}

/// score the test set, stratify, fit one km curve per group, render the
/// overlay plot, and write the per-subject risk table
pub fn run(config: &EvaluateConfig) -> Result<()> {
    let source_name = config.test.display().to_string();
    let table = Table::read_csv(&config.test)?;
    let model = CoxModel::load(&config.model)?;

    // pull the fitted covariates out of the test table by name, in fit order
    let feature_names = model.feature_names()?;
    let mut columns: Vec<Vec<f64>> = Vec::with_capacity(feature_names.len());
    for name in feature_names {
        let j = table.column_index(name).ok_or_else(|| {
            StratError::schema_mismatch(format!(
                "test table {} is missing fitted covariate '{}'",
                source_name, name
            ))
        })?;
        columns.push(table.numeric_column(j)?);
    }

    let n_rows = table.n_rows();
    let covariates =
        Array2::from_shape_fn((n_rows, feature_names.len()), |(i, j)| columns[j][i]);
    let risks = model.predict_partial_hazard(covariates.view())?.to_vec();

    let (groups, _q1, _q2) = assign_risk_groups(&risks)?;

    let time_idx = table.require_column(&config.time_col, &source_name)?;
    let event_idx = table.require_column(&config.event_col, &source_name)?;
    let times = table.numeric_column(time_idx)?;
    let raw_events = table.numeric_column(event_idx)?;
    let mut events = Vec::with_capacity(raw_events.len());
    for (i, &value) in raw_events.iter().enumerate() {
        events.push(event_flag(value, &config.event_col, i)?);
    }

    // one km fit per tertile, on that group's own durations and events
    let mut curves = Vec::with_capacity(RiskGroup::ALL.len());
    for group in RiskGroup::ALL {
        let mut durations = Vec::new();
        let mut group_events = Vec::new();
        for i in 0..n_rows {
            if groups[i] == group {
                durations.push(times[i]);
                group_events.push(events[i]);
            }
        }
        if durations.is_empty() {
            return Err(StratError::invalid_survival_data(format!(
                "risk group '{}' is empty - cannot fit a kaplan-meier curve",
                group
            )));
        }
        curves.push((group, KaplanMeier::fit(&durations, &group_events)?));
    }

    let max_time = times.iter().copied().fold(0.0, f64::max);

    fs::create_dir_all(&config.out_dir)?;
    plot::render_km_overlay(&config.out_dir.join("km_by_risk.png"), &curves, max_time)?;
    write_risk_groups(config, &times, &raw_events, &risks, &groups)?;

    println!("saved evaluation to {}", config.out_dir.display());

    Ok(())
}

/// per-subject assignments, in input row order
fn write_risk_groups(
    config: &EvaluateConfig,
    times: &[f64],
    raw_events: &[f64],
    risks: &[f64],
    groups: &[RiskGroup],
) -> Result<()> {
    let mut wtr =
        csv::WriterBuilder::new().from_path(config.out_dir.join("risk_groups.csv"))?;
    wtr.write_record([
        config.time_col.as_str(),
        config.event_col.as_str(),
        "risk",
        "risk_group",
    ])?;
    for i in 0..times.len() {
        wtr.write_record([
            times[i].to_string(),
            (raw_events[i] as i64).to_string(),
            risks[i].to_string(),
            groups[i].as_str().to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

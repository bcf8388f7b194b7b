use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

use crate::error::{Result, StratError};
use crate::table::Table;

/// survival data - durations, event flags, and subject covariates
#[derive(Debug, Clone)]
pub struct SurvivalData {
    times: Array1<f64>,          // time to event/censoring
    events: Vec<bool>,           // true = event, false = censored
    covariates: Array2<f64>,     // subject features (n_samples x n_features)
    feature_names: Vec<String>,  // one per covariate column, in matrix order
}

impl SurvivalData {
    /// make new survival data from raw vecs/arrays
    pub fn new(
        times: Vec<f64>,
        events: Vec<bool>,
        covariates: Array2<f64>,
        feature_names: Vec<String>,
    ) -> Result<Self> {
        let n_samples = times.len();

        if events.len() != n_samples {
            return Err(StratError::invalid_dimensions(format!(
                "times len ({}) != events len ({})",
                n_samples,
                events.len()
            )));
        }

        if covariates.nrows() != n_samples {
            return Err(StratError::invalid_dimensions(format!(
                "covariates rows ({}) != n_samples ({})",
                covariates.nrows(),
                n_samples
            )));
        }

        if feature_names.len() != covariates.ncols() {
            return Err(StratError::invalid_dimensions(format!(
                "feature names ({}) != covariate columns ({})",
                feature_names.len(),
                covariates.ncols()
            )));
        }

        if times.iter().any(|&t| t <= 0.0 || !t.is_finite()) {
            return Err(StratError::invalid_survival_data(
                "survival times must be positive & finite",
            ));
        }

        Ok(Self {
            times: Array1::from(times),
            events,
            covariates,
            feature_names,
        })
    }

    /// build survival data from a csv table. the duration and event columns
    /// are pulled out by name; any column listed in `excluded` (the subject
    /// identifier) is skipped; every remaining column becomes a covariate,
    /// in header order.
    pub fn from_table(
        table: &Table,
        time_col: &str,
        event_col: &str,
        excluded: &[&str],
        source_name: &str,
    ) -> Result<Self> {
        let time_idx = table.require_column(time_col, source_name)?;
        let event_idx = table.require_column(event_col, source_name)?;

        let mut feature_names = Vec::new();
        let mut feature_columns = Vec::new();
        for (j, header) in table.headers().iter().enumerate() {
            if j == time_idx || j == event_idx || excluded.contains(&header.as_str()) {
                continue;
            }
            feature_names.push(header.clone());
            feature_columns.push(table.numeric_column(j)?);
        }

        let times = table.numeric_column(time_idx)?;
        let mut events = Vec::with_capacity(times.len());
        for (i, &value) in table.numeric_column(event_idx)?.iter().enumerate() {
            events.push(event_flag(value, event_col, i)?);
        }

        let n_samples = times.len();
        let covariates =
            Array2::from_shape_fn((n_samples, feature_columns.len()), |(i, j)| {
                feature_columns[j][i]
            });

        Self::new(times, events, covariates, feature_names)
    }

    /// how many subjects
    pub fn n_samples(&self) -> usize {
        self.times.len()
    }

    /// how many features per subject
    pub fn n_features(&self) -> usize {
        self.covariates.ncols()
    }

    /// survival/censoring times
    pub fn times(&self) -> ArrayView1<'_, f64> {
        self.times.view()
    }

    /// event indicators (true = event, false = censored)
    pub fn events(&self) -> &[bool] {
        &self.events
    }

    /// subject feature matrix
    pub fn covariates(&self) -> ArrayView2<'_, f64> {
        self.covariates.view()
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// unique event times in ascending order
    pub fn event_times(&self) -> Vec<f64> {
        let mut times: Vec<f64> = self
            .times
            .iter()
            .zip(self.events.iter())
            .filter_map(|(time, event)| if *event { Some(*time) } else { None })
            .collect();

        times.sort_by(f64::total_cmp);
        times.dedup();
        times
    }
}

/// 0/1 event cell to bool; anything else is rejected
pub(crate) fn event_flag(value: f64, column: &str, row: usize) -> Result<bool> {
    if value == 0.0 {
        Ok(false)
    } else if value == 1.0 {
        Ok(true)
    } else {
        Err(StratError::invalid_survival_data(format!(
            "event column '{}' row {}: expected 0 or 1, found {}",
            column, row, value
        )))
    }
}

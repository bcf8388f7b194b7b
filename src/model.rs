use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::data::SurvivalData;
use crate::error::{Result, StratError};
use crate::metrics;
use crate::optimization::{self, FitOptions};

/// breslow baseline cumulative hazard, tabulated at the training event times
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineHazard {
    times: Vec<f64>,
    cumulative: Vec<f64>,
}

impl BaselineHazard {
    /// cumulative hazard at time t (step lookup, zero before the first event)
    pub fn cumulative_at(&self, t: f64) -> f64 {
        let mut hazard = 0.0;
        for (&time, &cum) in self.times.iter().zip(self.cumulative.iter()) {
            if time <= t {
                hazard = cum;
            } else {
                break;
            }
        }
        hazard
    }
}

/// cox proportional hazards model w/ ridge (l2) penalty
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoxModel {
    coefficients: Option<Array1<f64>>,  // fitted betas
    feature_names: Option<Vec<String>>, // one per coefficient, in fit order
    penalizer: f64,                     // l2 strength
    max_iterations: usize,
    tolerance: f64,
    baseline: Option<BaselineHazard>,
}

impl Default for CoxModel {
    fn default() -> Self {
        Self {
            coefficients: None,
            feature_names: None,
            penalizer: 0.0,
            max_iterations: 1000,
            tolerance: 1e-6,
            baseline: None,
        }
    }
}

impl CoxModel {
    /// new cox model w/ defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// ridge penalty - shrinks coefficients
    pub fn with_penalizer(mut self, penalizer: f64) -> Self {
        self.penalizer = penalizer.max(0.0);
        self
    }

    /// max iterations before giving up
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// how close is close enough for convergence
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// fit the model to data - this does the actual work
    pub fn fit(&mut self, data: &SurvivalData) -> Result<&mut Self> {
        let opts = FitOptions {
            penalizer: self.penalizer,
            max_iterations: self.max_iterations,
            tolerance: self.tolerance,
        };

        let beta = optimization::estimate(data, &opts)?;
        let (times, cumulative) = optimization::breslow_baseline(data, &beta);

        self.baseline = Some(BaselineHazard { times, cumulative });
        self.feature_names = Some(data.feature_names().to_vec());
        self.coefficients = Some(beta);

        Ok(self)
    }

    pub fn is_fitted(&self) -> bool {
        self.coefficients.is_some()
    }

    /// the fitted coefficients (betas)
    pub fn coefficients(&self) -> Result<ArrayView1<'_, f64>> {
        match &self.coefficients {
            Some(coefs) => Ok(coefs.view()),
            None => Err(StratError::ModelNotFitted),
        }
    }

    /// the covariate names the model was fit against, in fit order
    pub fn feature_names(&self) -> Result<&[String]> {
        match &self.feature_names {
            Some(names) => Ok(names),
            None => Err(StratError::ModelNotFitted),
        }
    }

    pub fn penalizer(&self) -> f64 {
        self.penalizer
    }

    /// linear predictor beta . x for each row
    pub fn linear_predictor(&self, covariates: ArrayView2<f64>) -> Result<Array1<f64>> {
        let coefs = self.coefficients()?;

        if covariates.ncols() != coefs.len() {
            return Err(StratError::invalid_dimensions(format!(
                "feature count mismatch: expected {}, got {}",
                coefs.len(),
                covariates.ncols()
            )));
        }

        Ok(covariates.dot(&coefs))
    }

    /// partial hazard exp(beta . x) - each subject's relative risk score
    pub fn predict_partial_hazard(&self, covariates: ArrayView2<f64>) -> Result<Array1<f64>> {
        let linear_predictors = self.linear_predictor(covariates)?;
        Ok(linear_predictors.mapv(f64::exp))
    }

    /// survival probability per subject at each requested time, via the
    /// breslow baseline: S(t | x) = exp(-H0(t) * exp(beta . x))
    pub fn predict_survival(
        &self,
        covariates: ArrayView2<f64>,
        times: ArrayView1<f64>,
    ) -> Result<Array2<f64>> {
        let baseline = self.baseline.as_ref().ok_or(StratError::ModelNotFitted)?;
        let hazards = self.predict_partial_hazard(covariates)?;

        let mut survival = Array2::zeros((hazards.len(), times.len()));
        for (j, &t) in times.iter().enumerate() {
            let cumhaz = baseline.cumulative_at(t);
            for (i, &hazard) in hazards.iter().enumerate() {
                survival[[i, j]] = (-cumhaz * hazard).exp();
            }
        }

        Ok(survival)
    }

    /// training-set summary of what the model learned
    pub fn summary(&self, data: &SurvivalData) -> Result<CoxSummary> {
        let coefs = self.coefficients()?.to_owned();
        let feature_names = self.feature_names()?.to_vec();

        let linear_predictors = self.linear_predictor(data.covariates())?;
        let concordance =
            metrics::concordance_index(linear_predictors.view(), data.times(), data.events())?;
        let log_likelihood = metrics::log_partial_likelihood(data, linear_predictors.view())?;
        let aic = metrics::aic(log_likelihood, coefs.len());
        let n_events = data.events().iter().filter(|&&e| e).count();

        Ok(CoxSummary {
            feature_names,
            hazard_ratios: coefs.mapv(f64::exp).to_vec(),
            coefficients: coefs.to_vec(),
            penalizer: self.penalizer,
            n_samples: data.n_samples(),
            n_events,
            log_likelihood,
            aic,
            concordance,
        })
    }

    /// persist the fitted model as json
    pub fn save(&self, path: &Path) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(writer, self)?;
        Ok(())
    }

    /// load a model artifact back from json
    pub fn load(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}

/// nice summary of what the model learned on its own training data
#[derive(Debug, Clone)]
pub struct CoxSummary {
    pub feature_names: Vec<String>,
    pub coefficients: Vec<f64>,
    pub hazard_ratios: Vec<f64>,
    pub penalizer: f64,
    pub n_samples: usize,
    pub n_events: usize,
    pub log_likelihood: f64,
    pub aic: f64,
    pub concordance: f64,
}

impl CoxSummary {
    /// print out what we learned
    pub fn print(&self) {
        println!("cox proportional hazards model");
        println!("==============================");
        println!("n = {}, events = {}", self.n_samples, self.n_events);
        println!("penalizer (l2): {:.6}", self.penalizer);
        println!("log partial likelihood: {:.4}", self.log_likelihood);
        println!("partial aic: {:.4}", self.aic);
        println!("concordance (train): {:.4}", self.concordance);
        println!();

        println!("{:<20} {:>12} {:>12}", "feature", "coefficient", "hazard ratio");
        println!("{:-<46}", "");
        for i in 0..self.coefficients.len() {
            println!(
                "{:<20} {:>12.6} {:>12.6}",
                self.feature_names[i], self.coefficients[i], self.hazard_ratios[i]
            );
        }
    }
}

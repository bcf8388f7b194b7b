//! newton-raphson maximization of the ridge-penalized cox partial likelihood

use ndarray::{Array1, Array2};

use crate::data::SurvivalData;
use crate::error::{Result, StratError};

/// knobs for the partial-likelihood fit
#[derive(Debug, Clone)]
pub struct FitOptions {
    pub penalizer: f64, // l2 strength
    pub max_iterations: usize,
    pub tolerance: f64, // convergence threshold on the penalized log-likelihood
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            penalizer: 0.0,
            max_iterations: 1000,
            tolerance: 1e-6,
        }
    }
}

/// one distinct event time: who died there, who was still at risk
struct EventGroup {
    time: f64,
    event_rows: Vec<usize>,
    risk_rows: Vec<usize>,
}

fn event_groups(data: &SurvivalData) -> Vec<EventGroup> {
    let times = data.times();
    let events = data.events();
    let n = data.n_samples();

    data.event_times()
        .into_iter()
        .map(|t| EventGroup {
            time: t,
            event_rows: (0..n).filter(|&i| times[i] == t && events[i]).collect(),
            risk_rows: (0..n).filter(|&i| times[i] >= t).collect(),
        })
        .collect()
}

/// fit the coefficients by newton-raphson, falling back to a damped
/// gradient step when the information matrix is singular
pub(crate) fn estimate(data: &SurvivalData, opts: &FitOptions) -> Result<Array1<f64>> {
    let groups = event_groups(data);
    if groups.is_empty() {
        return Err(StratError::invalid_survival_data(
            "no events observed - nothing to fit",
        ));
    }

    let mut beta: Array1<f64> = Array1::zeros(data.n_features());
    let mut prev_loglik = f64::NEG_INFINITY;

    for _iteration in 0..opts.max_iterations {
        let (loglik, gradient, hessian) = derivatives(data, &groups, &beta)?;
        let penalized_loglik = loglik - 0.5 * opts.penalizer * beta.dot(&beta);

        if (penalized_loglik - prev_loglik).abs() < opts.tolerance {
            return Ok(beta);
        }

        let penalized_gradient = &gradient - &(opts.penalizer * &beta);
        let mut penalized_hessian = hessian;
        for j in 0..beta.len() {
            penalized_hessian[[j, j]] -= opts.penalizer;
        }

        match solve_linear_system(&penalized_hessian, &penalized_gradient) {
            Ok(step) => beta = &beta - &step,
            Err(_) => beta = &beta + &(0.01 * &penalized_gradient),
        }

        if beta.iter().any(|b| !b.is_finite()) {
            return Err(StratError::numerical_error(
                "coefficients diverged during optimization",
            ));
        }

        prev_loglik = penalized_loglik;
    }

    Err(StratError::optimization_failed(format!(
        "newton-raphson did not converge in {} iterations",
        opts.max_iterations
    )))
}

/// breslow estimate of the baseline cumulative hazard, tabulated at the
/// distinct event times
pub(crate) fn breslow_baseline(data: &SurvivalData, beta: &Array1<f64>) -> (Vec<f64>, Vec<f64>) {
    let groups = event_groups(data);
    let mut times = Vec::with_capacity(groups.len());
    let mut cumulative = Vec::with_capacity(groups.len());
    let mut cum = 0.0;

    for group in &groups {
        let denom: f64 = group
            .risk_rows
            .iter()
            .map(|&i| data.covariates().row(i).dot(beta).exp())
            .sum();
        if denom > 0.0 {
            cum += group.event_rows.len() as f64 / denom;
        }
        times.push(group.time);
        cumulative.push(cum);
    }

    (times, cumulative)
}

/// log partial likelihood, gradient and hessian at beta
fn derivatives(
    data: &SurvivalData,
    groups: &[EventGroup],
    beta: &Array1<f64>,
) -> Result<(f64, Array1<f64>, Array2<f64>)> {
    let n_features = data.n_features();
    let mut loglik = 0.0;
    let mut gradient: Array1<f64> = Array1::zeros(n_features);
    let mut hessian: Array2<f64> = Array2::zeros((n_features, n_features));

    for group in groups {
        let (log_sum, weighted_mean, weighted_variance) =
            risk_set_moments(data, beta, &group.risk_rows)?;

        for &row in &group.event_rows {
            let linear_pred = data.covariates().row(row).dot(beta);
            loglik += linear_pred - log_sum;

            let covariates = data.covariates().row(row).to_owned();
            gradient += &(&covariates - &weighted_mean);
            hessian -= &weighted_variance;
        }
    }

    Ok((loglik, gradient, hessian))
}

/// exp-weighted mean and variance of the covariates over one risk set
fn risk_set_moments(
    data: &SurvivalData,
    beta: &Array1<f64>,
    risk_rows: &[usize],
) -> Result<(f64, Array1<f64>, Array2<f64>)> {
    let n_features = data.n_features();
    let mut risk_sum = 0.0;
    let mut weighted_sum: Array1<f64> = Array1::zeros(n_features);
    let mut weighted_outer: Array2<f64> = Array2::zeros((n_features, n_features));

    for &i in risk_rows {
        let linear_pred = data.covariates().row(i).dot(beta);
        let exp_pred = linear_pred.exp();

        if !exp_pred.is_finite() || exp_pred <= 0.0 {
            return Err(StratError::numerical_error(format!(
                "invalid exponential prediction: {}",
                exp_pred
            )));
        }

        risk_sum += exp_pred;
        let covariates = data.covariates().row(i).to_owned();
        weighted_sum += &(exp_pred * &covariates);

        for j in 0..n_features {
            for k in 0..n_features {
                weighted_outer[[j, k]] += exp_pred * covariates[j] * covariates[k];
            }
        }
    }

    if risk_sum <= 0.0 {
        return Err(StratError::numerical_error("risk set sum is non-positive"));
    }

    let log_sum = risk_sum.ln();
    let weighted_mean = &weighted_sum / risk_sum;

    let mut weighted_variance = weighted_outer / risk_sum;
    for j in 0..n_features {
        for k in 0..n_features {
            weighted_variance[[j, k]] -= weighted_mean[j] * weighted_mean[k];
        }
    }

    Ok((log_sum, weighted_mean, weighted_variance))
}

/// gaussian elimination w/ partial pivoting
fn solve_linear_system(a: &Array2<f64>, b: &Array1<f64>) -> Result<Array1<f64>> {
    let n = a.nrows();
    if n != a.ncols() || n != b.len() {
        return Err(StratError::invalid_dimensions("matrix dimensions mismatch"));
    }

    let mut a_copy = a.clone();
    let mut b_copy = b.clone();

    for i in 0..n {
        let mut max_row = i;
        for k in i + 1..n {
            if a_copy[[k, i]].abs() > a_copy[[max_row, i]].abs() {
                max_row = k;
            }
        }

        if a_copy[[max_row, i]].abs() < 1e-12 {
            return Err(StratError::numerical_error("matrix is singular"));
        }

        if max_row != i {
            for j in 0..n {
                let temp = a_copy[[i, j]];
                a_copy[[i, j]] = a_copy[[max_row, j]];
                a_copy[[max_row, j]] = temp;
            }
            let temp = b_copy[i];
            b_copy[i] = b_copy[max_row];
            b_copy[max_row] = temp;
        }

        for k in i + 1..n {
            let factor = a_copy[[k, i]] / a_copy[[i, i]];
            for j in i..n {
                a_copy[[k, j]] -= factor * a_copy[[i, j]];
            }
            b_copy[k] -= factor * b_copy[i];
        }
    }

    let mut x: Array1<f64> = Array1::zeros(n);
    for i in (0..n).rev() {
        x[i] = b_copy[i];
        for j in i + 1..n {
            x[i] -= a_copy[[i, j]] * x[j];
        }
        x[i] /= a_copy[[i, i]];
    }

    Ok(x)
}

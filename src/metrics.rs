use ndarray::ArrayView1;

use crate::data::SurvivalData;
use crate::error::{Result, StratError};

/// harrell's c-index: fraction of comparable pairs ordered correctly by
/// risk, ties counted as half. risk scores can be linear predictors or
/// partial hazards - any monotone transform gives the same answer.
pub fn concordance_index(
    risk_scores: ArrayView1<f64>,
    times: ArrayView1<f64>,
    events: &[bool],
) -> Result<f64> {
    let n = risk_scores.len();
    if n != times.len() || n != events.len() {
        return Err(StratError::invalid_dimensions(
            "risk scores, times, and events must have same length",
        ));
    }

    let mut concordant = 0.0;
    let mut discordant = 0.0;
    let mut tied_risk = 0.0;

    for i in 0..n {
        if !events[i] {
            continue; // censored obs don't anchor a comparison
        }

        for j in 0..n {
            if i == j {
                continue;
            }

            // j is comparable to i if j outlived i (event or censored)
            if times[j] > times[i] || (!events[j] && times[j] >= times[i]) {
                if risk_scores[i] > risk_scores[j] {
                    concordant += 1.0;
                } else if risk_scores[i] < risk_scores[j] {
                    discordant += 1.0;
                } else {
                    tied_risk += 1.0;
                }
            }
        }
    }

    let total_pairs = concordant + discordant + tied_risk;
    if total_pairs == 0.0 {
        return Err(StratError::numerical_error(
            "no comparable pairs for concordance calc",
        ));
    }

    Ok((concordant + 0.5 * tied_risk) / total_pairs)
}

/// log partial likelihood of the given risk scores (linear predictors),
/// using a log-sum-exp over each risk set for stability
pub fn log_partial_likelihood(data: &SurvivalData, risk_scores: ArrayView1<f64>) -> Result<f64> {
    if risk_scores.len() != data.n_samples() {
        return Err(StratError::invalid_dimensions(
            "risk scores length must match number of samples",
        ));
    }

    let mut loglik = 0.0;

    for event_time in data.event_times() {
        let events_at_time: Vec<usize> = (0..data.n_samples())
            .filter(|&i| data.times()[i] == event_time && data.events()[i])
            .collect();

        let risk_set: Vec<usize> = (0..data.n_samples())
            .filter(|&i| data.times()[i] >= event_time)
            .collect();

        if events_at_time.is_empty() || risk_set.is_empty() {
            continue;
        }

        let max_risk = risk_set
            .iter()
            .map(|&i| risk_scores[i])
            .fold(f64::NEG_INFINITY, f64::max);
        let log_sum_exp = max_risk
            + risk_set
                .iter()
                .map(|&i| (risk_scores[i] - max_risk).exp())
                .sum::<f64>()
                .ln();

        for &event_idx in &events_at_time {
            loglik += risk_scores[event_idx] - log_sum_exp;
        }
    }

    Ok(loglik)
}

/// akaike information criterion from the partial likelihood
pub fn aic(log_likelihood: f64, n_parameters: usize) -> f64 {
    2.0 * n_parameters as f64 - 2.0 * log_likelihood
}

//! kaplan-meier product-limit estimation

use crate::error::{Result, StratError};

/// a fitted kaplan-meier curve: the survival probability step function
/// evaluated just after each distinct event time
#[derive(Debug, Clone)]
pub struct KaplanMeier {
    times: Vec<f64>,    // distinct event times, ascending
    survival: Vec<f64>, // S(t) at each of those times
    n_subjects: usize,
}

impl KaplanMeier {
    /// fit the product-limit estimator from durations + event flags
    pub fn fit(durations: &[f64], events: &[bool]) -> Result<Self> {
        if durations.is_empty() {
            return Err(StratError::invalid_survival_data(
                "cannot fit kaplan-meier on an empty group",
            ));
        }
        if durations.len() != events.len() {
            return Err(StratError::invalid_dimensions(format!(
                "durations len ({}) != events len ({})",
                durations.len(),
                events.len()
            )));
        }
        if durations.iter().any(|&t| t < 0.0 || !t.is_finite()) {
            return Err(StratError::invalid_survival_data(
                "durations must be non-negative & finite",
            ));
        }

        let mut event_times: Vec<f64> = durations
            .iter()
            .zip(events.iter())
            .filter_map(|(&t, &e)| if e { Some(t) } else { None })
            .collect();
        event_times.sort_by(f64::total_cmp);
        event_times.dedup();

        let mut times = Vec::with_capacity(event_times.len());
        let mut survival = Vec::with_capacity(event_times.len());
        let mut survival_prob = 1.0;

        for &event_time in &event_times {
            let at_risk = durations.iter().filter(|&&t| t >= event_time).count();
            let deaths = durations
                .iter()
                .zip(events.iter())
                .filter(|&(&t, &e)| t == event_time && e)
                .count();

            if at_risk > 0 {
                survival_prob *= 1.0 - deaths as f64 / at_risk as f64;
            }
            times.push(event_time);
            survival.push(survival_prob);
        }

        Ok(Self {
            times,
            survival,
            n_subjects: durations.len(),
        })
    }

    /// survival probability at time t (1.0 before the first event)
    pub fn survival_at(&self, t: f64) -> f64 {
        let mut prob = 1.0;
        for (&time, &s) in self.times.iter().zip(self.survival.iter()) {
            if time <= t {
                prob = s;
            } else {
                break;
            }
        }
        prob
    }

    pub fn event_times(&self) -> &[f64] {
        &self.times
    }

    pub fn survival(&self) -> &[f64] {
        &self.survival
    }

    pub fn n_subjects(&self) -> usize {
        self.n_subjects
    }

    /// vertices of the step curve from t = 0 out to t_max, for plotting
    pub fn step_points(&self, t_max: f64) -> Vec<(f64, f64)> {
        let mut points = vec![(0.0, 1.0)];
        let mut prev = 1.0;

        for (&t, &s) in self.times.iter().zip(self.survival.iter()) {
            points.push((t, prev));
            points.push((t, s));
            prev = s;
        }

        if t_max > points[points.len() - 1].0 {
            points.push((t_max, prev));
        }
        points
    }
}

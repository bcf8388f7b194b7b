//! # riskstrat
//!
//! offline survival risk stratification in three stages, glued together
//! through files on disk:
//!
//! 1. `preprocess` - join a feature table w/ survival outcomes, impute,
//!    standardize, and split train/test
//! 2. `train_cox` - fit a ridge-penalized cox proportional hazards model
//!    on the training partition
//! 3. `evaluate` - score a held-out partition, bucket subjects into risk
//!    tertiles, and compare kaplan-meier curves per tertile
//!
//! each stage is its own binary; the library holds the shared machinery.
//!
//! ## quick start
//!
//! ```rust
//! use riskstrat::{CoxModel, SurvivalData};
//! use ndarray::Array2;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // a tiny cohort: months of follow-up, event flags, two covariates
//! let times = vec![6.0, 14.5, 9.8, 22.0, 3.1];
//! let events = vec![true, false, true, false, true];
//! let covariates = Array2::from_shape_vec((5, 2), vec![
//!     0.8, -0.2,
//!     -1.1, 0.4,
//!     0.3, 1.6,
//!     -0.9, -1.3,
//!     1.5, 0.7,
//! ])?;
//! let names = vec!["age".to_string(), "biomarker".to_string()];
//! let data = SurvivalData::new(times, events, covariates, names)?;
//!
//! // fit w/ a little ridge regularization
//! let mut model = CoxModel::new().with_penalizer(0.01);
//! model.fit(&data)?;
//!
//! // per-subject risk scores
//! let risks = model.predict_partial_hazard(data.covariates())?;
//! assert_eq!(risks.len(), 5);
//! # Ok(())
//! # }
//! ```

pub mod data;
pub mod error;
pub mod evaluate;
pub mod km;
pub mod metrics;
pub mod model;
pub mod optimization;
pub mod plot;
pub mod preprocess;
pub mod table;
pub mod train;

pub use data::SurvivalData;
pub use error::{Result, StratError};
pub use km::KaplanMeier;
pub use model::CoxModel;
pub use table::Table;

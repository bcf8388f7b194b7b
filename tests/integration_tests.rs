//! end-to-end tests for the three-stage workflow: preprocess -> train -> evaluate

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use approx::assert_relative_eq;
use riskstrat::evaluate::{self, EvaluateConfig};
use riskstrat::preprocess::{self, PreprocessConfig};
use riskstrat::train::{self, TrainConfig};
use riskstrat::{metrics, CoxModel, StratError, SurvivalData, Table};
use tempfile::tempdir;

/// deterministic synthetic cohort: age and biomarker drive the event time
fn write_cohort(dir: &Path, n: usize) -> (PathBuf, PathBuf) {
    let features_path = dir.join("features.csv");
    let survival_path = dir.join("survival.csv");

    let mut features = fs::File::create(&features_path).unwrap();
    let mut survival = fs::File::create(&survival_path).unwrap();
    writeln!(features, "id,age,biomarker").unwrap();
    writeln!(survival, "id,time,event").unwrap();

    for i in 0..n {
        let age = 40.0 + (i % 40) as f64 + i as f64 * 0.01;
        let biomarker = ((i * 37) % 100) as f64 / 10.0 + i as f64 * 0.001;
        let risk = 0.08 * (age - 60.0) + 0.3 * (biomarker - 5.0);
        let noise = 0.6 + ((i * 29) % 100) as f64 / 250.0;
        let time = 20.0 * (-risk).exp() * noise;
        let event = if (i * 13) % 10 < 7 { 1 } else { 0 };

        writeln!(features, "s{:03},{},{}", i, age, biomarker).unwrap();
        writeln!(survival, "s{:03},{},{}", i, time, event).unwrap();
    }

    (features_path, survival_path)
}

fn preprocess_config(
    features: PathBuf,
    survival: PathBuf,
    out_dir: PathBuf,
) -> PreprocessConfig {
    PreprocessConfig {
        features,
        survival,
        out_dir,
        id_col: "id".to_string(),
        time_col: "time".to_string(),
        event_col: "event".to_string(),
        test_size: 0.2,
        seed: 42,
    }
}

fn train_config(train: PathBuf, out_dir: PathBuf) -> TrainConfig {
    TrainConfig {
        train,
        out_dir,
        id_col: "id".to_string(),
        time_col: "time".to_string(),
        event_col: "event".to_string(),
        penalizer: 0.01,
    }
}

/// population (ddof = 0) mean and std of one csv column across both partitions
fn column_stats(tables: &[&Table], name: &str) -> (f64, f64) {
    let mut values = Vec::new();
    for table in tables {
        let idx = table.column_index(name).unwrap();
        values.extend(table.numeric_column(idx).unwrap());
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

#[test]
fn test_end_to_end_workflow() {
    let dir = tempdir().unwrap();
    let (features, survival) = write_cohort(dir.path(), 300);
    let prep_dir = dir.path().join("prep");
    let model_dir = dir.path().join("model");
    let eval_dir = dir.path().join("eval");

    // stage 1: preprocess
    let meta = preprocess::run(&preprocess_config(features, survival, prep_dir.clone())).unwrap();
    assert_eq!(meta.feature_cols, vec!["age", "biomarker"]);

    let train_table = Table::read_csv(&prep_dir.join("train.csv")).unwrap();
    let test_table = Table::read_csv(&prep_dir.join("test.csv")).unwrap();
    assert_eq!(train_table.headers(), &["id", "time", "event", "age", "biomarker"]);
    assert_eq!(train_table.n_rows(), 240);
    assert_eq!(test_table.n_rows(), 60);

    // scaling was fit on the full joined set, so the pooled stats are exact
    for column in ["age", "biomarker"] {
        let (mean, std) = column_stats(&[&train_table, &test_table], column);
        assert_relative_eq!(mean, 0.0, epsilon = 1e-9);
        assert_relative_eq!(std, 1.0, epsilon = 1e-6);
    }

    // every subject lands in exactly one partition
    let mut ids: Vec<String> = train_table
        .rows()
        .iter()
        .chain(test_table.rows().iter())
        .map(|row| row[0].clone())
        .collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 300);

    // stage 2: train
    let summary = train::run(&train_config(prep_dir.join("train.csv"), model_dir.clone())).unwrap();
    assert_eq!(summary.feature_names, vec!["age", "biomarker"]);
    assert!(summary.concordance > 0.6 && summary.concordance <= 1.0);

    let coefficients = Table::read_csv(&model_dir.join("coefficients.csv")).unwrap();
    assert_eq!(coefficients.headers(), &["feature", "coefficient"]);
    assert_eq!(coefficients.n_rows(), 2);
    let mut names: Vec<&str> = coefficients.rows().iter().map(|r| r[0].as_str()).collect();
    names.sort();
    assert_eq!(names, vec!["age", "biomarker"]);
    // sorted descending by coefficient
    let first: f64 = coefficients.rows()[0][1].parse().unwrap();
    let second: f64 = coefficients.rows()[1][1].parse().unwrap();
    assert!(first >= second);

    let metrics_table = Table::read_csv(&model_dir.join("metrics_train.csv")).unwrap();
    assert_eq!(metrics_table.n_rows(), 1);
    assert_eq!(metrics_table.rows()[0][0], "concordance_index_train");
    let reported: f64 = metrics_table.rows()[0][1].parse().unwrap();
    assert_relative_eq!(reported, summary.concordance, epsilon = 1e-12);

    // stage 3: evaluate
    let eval_config = EvaluateConfig {
        test: prep_dir.join("test.csv"),
        model: model_dir.join("coxph.json"),
        out_dir: eval_dir.clone(),
        time_col: "time".to_string(),
        event_col: "event".to_string(),
    };
    evaluate::run(&eval_config).unwrap();

    let risk_groups = Table::read_csv(&eval_dir.join("risk_groups.csv")).unwrap();
    assert_eq!(risk_groups.headers(), &["time", "event", "risk", "risk_group"]);
    assert_eq!(risk_groups.n_rows(), 60);

    let count = |label: &str| {
        risk_groups
            .rows()
            .iter()
            .filter(|row| row[3] == label)
            .count()
    };
    for label in ["Low", "Mid", "High"] {
        let size = count(label);
        assert!(
            (19..=21).contains(&size),
            "group {} has {} subjects",
            label,
            size
        );
    }
    assert_eq!(count("Low") + count("Mid") + count("High"), 60);

    let png = eval_dir.join("km_by_risk.png");
    assert!(png.exists());
    assert!(fs::metadata(&png).unwrap().len() > 0);
}

#[test]
fn test_preprocess_is_deterministic() {
    let dir = tempdir().unwrap();
    let (features, survival) = write_cohort(dir.path(), 120);

    let out_a = dir.path().join("a");
    let out_b = dir.path().join("b");
    preprocess::run(&preprocess_config(features.clone(), survival.clone(), out_a.clone()))
        .unwrap();
    preprocess::run(&preprocess_config(features, survival, out_b.clone())).unwrap();

    for name in ["train.csv", "test.csv", "preprocess_meta.json"] {
        let a = fs::read(out_a.join(name)).unwrap();
        let b = fs::read(out_b.join(name)).unwrap();
        assert_eq!(a, b, "{} differs between identical runs", name);
    }
}

#[test]
fn test_missing_id_column_aborts_before_writing() {
    let dir = tempdir().unwrap();
    let features_path = dir.path().join("features.csv");
    let survival_path = dir.path().join("survival.csv");

    let mut features = fs::File::create(&features_path).unwrap();
    writeln!(features, "subject,age").unwrap();
    writeln!(features, "a,50").unwrap();
    let mut survival = fs::File::create(&survival_path).unwrap();
    writeln!(survival, "id,time,event").unwrap();
    writeln!(survival, "a,5.0,1").unwrap();

    let out_dir = dir.path().join("out");
    let err = preprocess::run(&preprocess_config(features_path, survival_path, out_dir.clone()))
        .unwrap_err();

    assert!(matches!(err, StratError::MissingColumn { .. }));
    assert!(!out_dir.join("train.csv").exists());
    assert!(!out_dir.join("test.csv").exists());
    assert!(!out_dir.join("preprocess_meta.json").exists());
}

#[test]
fn test_empty_join_is_a_data_error() {
    let dir = tempdir().unwrap();
    let features_path = dir.path().join("features.csv");
    let survival_path = dir.path().join("survival.csv");

    let mut features = fs::File::create(&features_path).unwrap();
    writeln!(features, "id,age").unwrap();
    writeln!(features, "x1,50").unwrap();
    let mut survival = fs::File::create(&survival_path).unwrap();
    writeln!(survival, "id,time,event").unwrap();
    writeln!(survival, "y1,5.0,1").unwrap();

    let err = preprocess::run(&preprocess_config(
        features_path,
        survival_path,
        dir.path().join("out"),
    ))
    .unwrap_err();

    assert!(matches!(err, StratError::EmptyJoin));
}

#[test]
fn test_split_sizes_follow_test_fraction() {
    let dir = tempdir().unwrap();
    let (features, survival) = write_cohort(dir.path(), 10);

    let out_dir = dir.path().join("out");
    let mut config = preprocess_config(features, survival, out_dir.clone());
    config.test_size = 0.25; // ceil(10 * 0.25) = 3

    preprocess::run(&config).unwrap();
    assert_eq!(Table::read_csv(&out_dir.join("test.csv")).unwrap().n_rows(), 3);
    assert_eq!(Table::read_csv(&out_dir.join("train.csv")).unwrap().n_rows(), 7);
}

#[test]
fn test_missing_values_are_median_imputed() {
    let dir = tempdir().unwrap();
    let features_path = dir.path().join("features.csv");
    let survival_path = dir.path().join("survival.csv");

    // age median over the observed values [1,2,3,4] is 2.5; subject e's
    // imputed age then standardizes to exactly zero
    let mut features = fs::File::create(&features_path).unwrap();
    writeln!(features, "id,age,biomarker").unwrap();
    writeln!(features, "a,1,10").unwrap();
    writeln!(features, "b,2,20").unwrap();
    writeln!(features, "c,3,30").unwrap();
    writeln!(features, "d,4,40").unwrap();
    writeln!(features, "e,NA,50").unwrap();
    let mut survival = fs::File::create(&survival_path).unwrap();
    writeln!(survival, "id,time,event").unwrap();
    writeln!(survival, "a,1.0,1").unwrap();
    writeln!(survival, "b,2.0,0").unwrap();
    writeln!(survival, "c,3.0,1").unwrap();
    writeln!(survival, "d,4.0,1").unwrap();
    writeln!(survival, "e,5.0,0").unwrap();

    let out_dir = dir.path().join("out");
    preprocess::run(&preprocess_config(features_path, survival_path, out_dir.clone())).unwrap();

    let train = Table::read_csv(&out_dir.join("train.csv")).unwrap();
    let test = Table::read_csv(&out_dir.join("test.csv")).unwrap();
    let imputed_age = train
        .rows()
        .iter()
        .chain(test.rows().iter())
        .find(|row| row[0] == "e")
        .map(|row| row[3].clone())
        .unwrap();

    assert_eq!(imputed_age.parse::<f64>().unwrap(), 0.0);
}

#[test]
fn test_round_trip_concordance_matches_trainer() {
    let dir = tempdir().unwrap();
    let (features, survival) = write_cohort(dir.path(), 80);
    let prep_dir = dir.path().join("prep");
    let model_dir = dir.path().join("model");

    preprocess::run(&preprocess_config(features, survival, prep_dir.clone())).unwrap();
    let summary =
        train::run(&train_config(prep_dir.join("train.csv"), model_dir.clone())).unwrap();

    // scoring the training data the way the evaluator does (partial
    // hazards) reproduces the trainer's concordance exactly, since exp
    // preserves the risk ordering
    let table = Table::read_csv(&prep_dir.join("train.csv")).unwrap();
    let data = SurvivalData::from_table(&table, "time", "event", &["id"], "train.csv").unwrap();
    let model = CoxModel::load(&model_dir.join("coxph.json")).unwrap();
    let risks = model.predict_partial_hazard(data.covariates()).unwrap();
    let c_index = metrics::concordance_index(risks.view(), data.times(), data.events()).unwrap();

    assert_relative_eq!(c_index, summary.concordance, epsilon = 1e-12);
}

#[test]
fn test_trainer_is_deterministic() {
    let dir = tempdir().unwrap();
    let (features, survival) = write_cohort(dir.path(), 100);
    let prep_dir = dir.path().join("prep");
    preprocess::run(&preprocess_config(features, survival, prep_dir.clone())).unwrap();

    let out_a = dir.path().join("a");
    let out_b = dir.path().join("b");
    train::run(&train_config(prep_dir.join("train.csv"), out_a.clone())).unwrap();
    train::run(&train_config(prep_dir.join("train.csv"), out_b.clone())).unwrap();

    let a = fs::read(out_a.join("coefficients.csv")).unwrap();
    let b = fs::read(out_b.join("coefficients.csv")).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_custom_column_names_flow_through_every_stage() {
    let dir = tempdir().unwrap();
    let features_path = dir.path().join("features.csv");
    let survival_path = dir.path().join("survival.csv");

    let mut features = fs::File::create(&features_path).unwrap();
    writeln!(features, "pid,age,biomarker").unwrap();
    let mut survival = fs::File::create(&survival_path).unwrap();
    writeln!(survival, "pid,months,died").unwrap();
    for i in 0..40 {
        let age = 45.0 + (i % 25) as f64 + i as f64 * 0.01;
        let biomarker = ((i * 11) % 30) as f64 + i as f64 * 0.001;
        let time = 30.0 * (-0.05 * (age - 55.0) - 0.04 * (biomarker - 15.0)).exp()
            * (0.7 + ((i * 7) % 10) as f64 / 25.0);
        let died = if (i * 3) % 5 < 4 { 1 } else { 0 };
        writeln!(features, "p{},{},{}", i, age, biomarker).unwrap();
        writeln!(survival, "p{},{},{}", i, time, died).unwrap();
    }

    let prep_dir = dir.path().join("prep");
    let model_dir = dir.path().join("model");
    let eval_dir = dir.path().join("eval");

    let mut prep = preprocess_config(features_path, survival_path, prep_dir.clone());
    prep.id_col = "pid".to_string();
    prep.time_col = "months".to_string();
    prep.event_col = "died".to_string();
    preprocess::run(&prep).unwrap();

    let mut training = train_config(prep_dir.join("train.csv"), model_dir.clone());
    training.id_col = "pid".to_string();
    training.time_col = "months".to_string();
    training.event_col = "died".to_string();
    let summary = train::run(&training).unwrap();
    assert_eq!(summary.feature_names, vec!["age", "biomarker"]);

    let eval_config = EvaluateConfig {
        test: prep_dir.join("test.csv"),
        model: model_dir.join("coxph.json"),
        out_dir: eval_dir.clone(),
        time_col: "months".to_string(),
        event_col: "died".to_string(),
    };
    evaluate::run(&eval_config).unwrap();

    let risk_groups = Table::read_csv(&eval_dir.join("risk_groups.csv")).unwrap();
    assert_eq!(risk_groups.headers(), &["months", "died", "risk", "risk_group"]);
}

#[test]
fn test_evaluator_rejects_incompatible_schema() {
    let dir = tempdir().unwrap();
    let (features, survival) = write_cohort(dir.path(), 60);
    let prep_dir = dir.path().join("prep");
    let model_dir = dir.path().join("model");

    preprocess::run(&preprocess_config(features, survival, prep_dir.clone())).unwrap();
    train::run(&train_config(prep_dir.join("train.csv"), model_dir.clone())).unwrap();

    // a test table without the fitted biomarker column
    let incompatible = dir.path().join("incompatible.csv");
    let mut file = fs::File::create(&incompatible).unwrap();
    writeln!(file, "id,time,event,age").unwrap();
    writeln!(file, "z0,4.0,1,0.3").unwrap();
    writeln!(file, "z1,6.0,0,-0.2").unwrap();

    let eval_config = EvaluateConfig {
        test: incompatible,
        model: model_dir.join("coxph.json"),
        out_dir: dir.path().join("eval"),
        time_col: "time".to_string(),
        event_col: "event".to_string(),
    };
    let err = evaluate::run(&eval_config).unwrap_err();
    assert!(matches!(err, StratError::SchemaMismatch { .. }));
}

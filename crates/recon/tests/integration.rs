use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tallyguard_recon::classify::MATCH_STATUS_COLUMN;
use tallyguard_recon::narrative::FALLBACK_COMMENT;
use tallyguard_recon::outlier::ANOMALY_COLUMN;
use tallyguard_recon::{
    reconcile, train, AnomalyLabel, ArtifactStore, CellValue, Column, Dataset, GenerationError, Narrator,
    ReconConfig, ReconError, TextGenerator, TrainOutcome,
};

fn self_compare_config() -> ReconConfig {
    ReconConfig::from_json(
        r#"{
            "key_columns": ["Account"],
            "criteria_columns": ["Column1", "Column2"],
            "derived_column": "Balance Difference",
            "comment_column": "Comments",
            "comment_prompt": "Difference is {derived_value} against a historical {historical_value}.",
            "compare_current_criteria_column": true
        }"#,
    )
    .unwrap()
}

fn paired_config() -> ReconConfig {
    ReconConfig::from_toml(
        r#"
criteria_columns = ["Balance", "Limit"]
compare_current_criteria_column = false
db_columns = "Current,Prior"
"#,
    )
    .unwrap()
}

fn text_column(dataset: &Dataset, name: &str) -> Vec<String> {
    dataset
        .column(name)
        .unwrap()
        .values
        .iter()
        .map(|v| v.to_string())
        .collect()
}

/// 20 rows on a tight ring around (100, 95) plus one far-off row at the end.
fn ring_with_outlier() -> Dataset {
    let mut col1 = Vec::new();
    let mut col2 = Vec::new();
    for i in 0..20 {
        let angle = i as f64 * std::f64::consts::TAU / 20.0;
        col1.push(Some(100.0 + angle.cos()));
        col2.push(Some(95.0 + angle.sin()));
    }
    col1.push(Some(10_000.0));
    col2.push(Some(-10_000.0));

    let accounts = (0..21).map(|i| format!("A-{i}")).collect();
    Dataset::from_columns(vec![
        Column::text("Account", accounts),
        Column::numeric("Column1", col1),
        Column::numeric("Column2", col2),
    ])
    .unwrap()
}

/// Answers with the prompt; counts calls.
struct Recorder {
    calls: AtomicUsize,
}

impl TextGenerator for Recorder {
    fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("note: {prompt}"))
    }
}

struct AlwaysDown;

impl TextGenerator for AlwaysDown {
    fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
        Err(GenerationError::Timeout("no answer within 1s".into()))
    }
}

// -------------------------------------------------------------------------
// Classification
// -------------------------------------------------------------------------

#[test]
fn self_compare_break_is_named_after_first_criterion() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::open(dir.path()).unwrap();
    let data = Dataset::from_columns(vec![
        Column::numeric("Column1", vec![Some(100.0), Some(200.0), Some(300.0)]),
        Column::numeric("Column2", vec![Some(95.0), Some(195.0), Some(310.0)]),
    ])
    .unwrap();

    let outcome = reconcile(&self_compare_config(), data, &store, None).unwrap();

    assert_eq!(
        outcome.dataset.numeric_column("Balance Difference").unwrap(),
        vec![Some(5.0), Some(5.0), Some(-10.0)]
    );
    assert_eq!(
        text_column(&outcome.dataset, MATCH_STATUS_COLUMN),
        vec!["Column1 Break"; 3]
    );
}

#[test]
fn paired_source_without_both_sides_is_all_match() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::open(dir.path()).unwrap();
    let data = Dataset::from_rows(
        vec!["Account".into(), "Balance".into(), "Current Balance".into()],
        vec![
            vec!["A-1".into(), "10".into(), "10".into()],
            vec!["A-2".into(), "20".into(), "20".into()],
        ],
    );
    let config = ReconConfig::from_json(
        r#"{"criteria_columns": ["Balance"], "compare_current_criteria_column": false, "db_columns": "Current,Prior"}"#,
    )
    .unwrap();

    let outcome = reconcile(&config, data, &store, None).unwrap();

    assert!(outcome.diff_columns.is_empty());
    assert_eq!(text_column(&outcome.dataset, MATCH_STATUS_COLUMN), vec!["Match", "Match"]);
    assert_eq!(outcome.unscored_rows.len(), 2);
}

#[test]
fn paired_source_reports_first_breaking_criterion() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::open(dir.path()).unwrap();
    let data = Dataset::from_rows(
        vec![
            "Balance".into(),
            "Limit".into(),
            "Current Balance".into(),
            "Prior Balance".into(),
            "Current Limit".into(),
            "Prior Limit".into(),
        ],
        vec![
            vec![10.0.into(), 5.0.into(), 10.0.into(), 10.0.into(), 5.0.into(), 5.0.into()],
            vec![10.0.into(), 5.0.into(), 10.0.into(), 10.0.into(), 5.0.into(), 7.0.into()],
            vec![11.0.into(), 5.0.into(), 11.0.into(), 10.0.into(), 5.0.into(), 7.0.into()],
            vec![10.0.into(), 5.0.into(), "n/a".into(), 10.0.into(), 5.0.into(), 5.0.into()],
        ],
    );

    let outcome = reconcile(&paired_config(), data, &store, None).unwrap();

    assert_eq!(outcome.feature_columns, vec!["Difference Balance", "Difference Limit"]);
    assert_eq!(
        text_column(&outcome.dataset, MATCH_STATUS_COLUMN),
        vec!["Match", "Limit Break", "Balance Break", "Balance Break"]
    );
}

#[test]
fn no_criteria_present_is_a_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::open(dir.path()).unwrap();
    let data = Dataset::from_columns(vec![Column::numeric("Other", vec![Some(1.0)])]).unwrap();

    let err = reconcile(&self_compare_config(), data, &store, None).unwrap_err();
    assert!(matches!(err, ReconError::NoValidCriteriaColumns { .. }));
    assert!(err.is_config_error());
}

#[test]
fn self_compare_with_one_present_criterion_is_a_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::open(dir.path()).unwrap();
    let data = Dataset::from_columns(vec![Column::numeric("Column1", vec![Some(1.0)])]).unwrap();

    let err = reconcile(&self_compare_config(), data, &store, None).unwrap_err();
    assert!(matches!(err, ReconError::SelfCompareNeedsTwoCriteria { found: 1 }));
}

// -------------------------------------------------------------------------
// Model lifecycle
// -------------------------------------------------------------------------

#[test]
fn predict_before_train_is_unknown_and_skips_narration() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::open(dir.path()).unwrap();
    let recorder = Arc::new(Recorder {
        calls: AtomicUsize::new(0),
    });
    let narrator = Narrator::new(recorder.clone(), 5).unwrap();

    let outcome = reconcile(&self_compare_config(), ring_with_outlier(), &store, Some(&narrator)).unwrap();

    assert!(outcome.labels.iter().all(|l| *l == AnomalyLabel::Unknown));
    assert_eq!(outcome.unscored_rows.len(), 21);
    assert_eq!(outcome.anomalous_count(), 0);
    assert_eq!(outcome.comments_generated, 0);
    assert_eq!(recorder.calls.load(Ordering::SeqCst), 0);

    let response = outcome.to_response();
    assert_eq!(response.processed_count, 21);
    assert_eq!(response.unscored_count, 21);
    assert!(response.anomalous_records.is_empty());
}

#[test]
fn trained_model_flags_the_extreme_row() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::open(dir.path()).unwrap();
    let config = self_compare_config();

    let trained = train(&config, ring_with_outlier(), &store).unwrap();
    let TrainOutcome::Trained { rows, feature_columns, .. } = &trained else {
        panic!("expected a trained model, got {trained:?}");
    };
    assert_eq!(*rows, 21);
    assert_eq!(feature_columns, &vec!["Column1".to_string(), "Column2".to_string()]);

    let outcome = reconcile(&config, ring_with_outlier(), &store, None).unwrap();

    assert_eq!(outcome.anomalous_rows, vec![20]);
    assert_eq!(outcome.matched_rows.len(), 20);
    assert!(outcome.unscored_rows.is_empty());
    assert!(outcome.meta.model_trained_at.is_some());

    // ceil(0.05 * 21) = 2
    assert!(outcome.anomalous_count() <= 2);

    let anomalies = outcome.anomalous_records();
    assert_eq!(anomalies.row_count(), 1);
    assert_eq!(anomalies.column("Account").unwrap().values[0], CellValue::Text("A-20".into()));
    assert_eq!(anomalies.column(ANOMALY_COLUMN).unwrap().values[0], CellValue::Text("Yes".into()));

    let response = outcome.to_response();
    let record = &response.anomalous_records[0];
    let keys: Vec<&str> = record.keys().map(String::as_str).collect();
    assert_eq!(
        keys,
        vec!["Account", "Column1", "Column2", "Balance Difference", "Match Status", "Anomaly"]
    );
}

#[test]
fn retraining_on_empty_history_keeps_the_model() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::open(dir.path()).unwrap();
    let config = self_compare_config();

    train(&config, ring_with_outlier(), &store).unwrap();
    let before = store.current_id().unwrap();
    assert!(before.is_some());

    let outcome = train(&config, Dataset::new(), &store).unwrap();
    assert_eq!(outcome, TrainOutcome::Skipped);
    assert_eq!(store.current_id().unwrap(), before);
}

#[test]
fn model_survives_reopening_the_store() {
    let dir = tempfile::tempdir().unwrap();
    let config = self_compare_config();
    {
        let store = ArtifactStore::open(dir.path()).unwrap();
        train(&config, ring_with_outlier(), &store).unwrap();
    }

    let store = ArtifactStore::open(dir.path()).unwrap();
    let outcome = reconcile(&config, ring_with_outlier(), &store, None).unwrap();
    assert_eq!(outcome.anomalous_rows, vec![20]);
}

// -------------------------------------------------------------------------
// Narration
// -------------------------------------------------------------------------

#[test]
fn comments_line_up_with_anomalous_rows() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::open(dir.path()).unwrap();
    let config = self_compare_config();
    train(&config, ring_with_outlier(), &store).unwrap();

    let recorder = Arc::new(Recorder {
        calls: AtomicUsize::new(0),
    });
    let narrator = Narrator::new(recorder.clone(), 5).unwrap();
    let outcome = reconcile(&config, ring_with_outlier(), &store, Some(&narrator)).unwrap();

    assert_eq!(outcome.comments_generated, outcome.anomalous_count());
    assert_eq!(recorder.calls.load(Ordering::SeqCst), 1);

    let comments = &outcome.dataset.column("Comments").unwrap().values;
    assert_eq!(
        comments[20],
        CellValue::Text("note: Difference is 20000 against a historical 0.".into())
    );
    assert!(comments[..20].iter().all(CellValue::is_missing));
}

#[test]
fn failed_generation_falls_back_per_row() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::open(dir.path()).unwrap();
    let config = self_compare_config();
    train(&config, ring_with_outlier(), &store).unwrap();

    let narrator = Narrator::new(Arc::new(AlwaysDown), 2).unwrap();
    let outcome = reconcile(&config, ring_with_outlier(), &store, Some(&narrator)).unwrap();

    let comments = &outcome.dataset.column("Comments").unwrap().values;
    assert_eq!(comments[20], CellValue::Text(FALLBACK_COMMENT.into()));
}

#[test]
fn paired_source_never_narrates() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::open(dir.path()).unwrap();
    let config = paired_config();

    let mut current = Vec::new();
    let mut prior = Vec::new();
    for i in 0..20 {
        current.push(Some(100.0 + (i % 3) as f64));
        prior.push(Some(100.0));
    }
    current.push(Some(9_000.0));
    prior.push(Some(100.0));
    let data = Dataset::from_columns(vec![
        Column::numeric("Balance", current.clone()),
        Column::numeric("Current Balance", current),
        Column::numeric("Prior Balance", prior),
    ])
    .unwrap();

    train(&config, data.clone(), &store).unwrap();

    let recorder = Arc::new(Recorder {
        calls: AtomicUsize::new(0),
    });
    let narrator = Narrator::new(recorder.clone(), 5).unwrap();
    let outcome = reconcile(&config, data, &store, Some(&narrator)).unwrap();

    assert_eq!(outcome.anomalous_rows, vec![20]);
    assert_eq!(recorder.calls.load(Ordering::SeqCst), 0);
    assert!(!outcome.dataset.has_column("Comments"));
}

#[test]
fn paired_source_refuses_a_model_trained_on_other_pairs() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::open(dir.path()).unwrap();
    let config = ReconConfig::from_toml(
        r#"
criteria_columns = ["Balance", "Limit", "Quota"]
compare_current_criteria_column = false
db_columns = "Current,Prior"
"#,
    )
    .unwrap();

    let paired = |criteria: &[&str], rows: usize| {
        let mut columns = Vec::new();
        for criterion in criteria {
            let current: Vec<Option<f64>> = (0..rows).map(|i| Some(100.0 + i as f64)).collect();
            let prior: Vec<Option<f64>> = (0..rows).map(|_| Some(100.0)).collect();
            columns.push(Column::numeric(*criterion, current.clone()));
            columns.push(Column::numeric(format!("Current {criterion}"), current));
            columns.push(Column::numeric(format!("Prior {criterion}"), prior));
        }
        Dataset::from_columns(columns).unwrap()
    };

    match train(&config, paired(&["Balance", "Limit"], 10), &store).unwrap() {
        TrainOutcome::Trained { feature_columns, .. } => {
            assert_eq!(feature_columns, vec!["Difference Balance", "Difference Limit"]);
        }
        TrainOutcome::Skipped => panic!("expected a trained model"),
    }

    let err = reconcile(&config, paired(&["Limit", "Quota"], 1), &store, None).unwrap_err();
    match err {
        ReconError::Model(tallyguard_recon::ModelError::FeatureMismatch { expected, found }) => {
            assert_eq!(expected, vec!["Difference Balance", "Difference Limit"]);
            assert_eq!(found, vec!["Difference Limit", "Difference Quota"]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

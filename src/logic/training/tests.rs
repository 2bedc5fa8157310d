use super::ensemble::EnsembleTrainer;
use crate::logic::config::RetrainConfig;
use crate::logic::features::{DocumentKind, FeatureSchema, FeatureTable};
use crate::logic::providers::{ProfileSyntheticProvider, SyntheticDataProvider};

fn invoice_table(n: usize, seed: u64) -> FeatureTable {
    ProfileSyntheticProvider::for_kind(DocumentKind::Invoice, seed).generate(n)
}

#[test]
fn test_identical_input_identical_metrics() {
    let config = RetrainConfig::quick();
    let table = invoice_table(300, 7);

    let a = EnsembleTrainer::from_config(&config).train(&table).unwrap();
    let b = EnsembleTrainer::from_config(&config).train(&table).unwrap();

    assert_eq!(a.metrics.r2_score, b.metrics.r2_score);
    assert_eq!(a.metrics.mse, b.metrics.mse);
    assert_eq!(a.metrics.model_a, b.metrics.model_a);
    assert_eq!(a.metrics.model_b, b.metrics.model_b);
    assert_eq!(a.model, b.model);
}

#[test]
fn test_learns_synthetic_signal() {
    let table = invoice_table(400, 3);
    let trained = EnsembleTrainer::from_config(&RetrainConfig::quick())
        .train(&table)
        .unwrap();

    let m = &trained.metrics;
    assert!(m.r2_score > 0.5, "r2={}", m.r2_score);
    assert_eq!(m.test_size, 80);
    assert_eq!(m.train_size, 320);
    assert!(m.training_time_secs >= 0.0);
}

#[test]
fn test_model_predicts_in_risk_range() {
    let table = invoice_table(200, 5);
    let trained = EnsembleTrainer::from_config(&RetrainConfig::quick())
        .train(&table)
        .unwrap();

    let pred = trained.model.predict(table.features()).unwrap();
    assert_eq!(pred.len(), 200);
    assert!(pred.iter().all(|p| (0.0..=100.0).contains(p)));
}

#[test]
fn test_rejects_table_too_small_to_split() {
    let table = invoice_table(1, 1);
    assert!(EnsembleTrainer::from_config(&RetrainConfig::quick())
        .train(&table)
        .is_err());
}

#[test]
fn test_rejects_non_finite_features() {
    let schema = FeatureSchema::new("invoice", 1, &["a", "b"]);
    let rows = (0..20)
        .map(|i| vec![i as f64, if i == 3 { f64::NAN } else { 1.0 }])
        .collect();
    let risk = (0..20).map(|i| (i * 5) as f64).collect();
    let table = FeatureTable::from_rows(schema, rows, risk).unwrap();
    assert!(EnsembleTrainer::from_config(&RetrainConfig::quick())
        .train(&table)
        .is_err());
}

#[test]
fn test_rejects_unlabeled_table() {
    let schema = FeatureSchema::new("invoice", 1, &["a"]);
    let table =
        FeatureTable::unlabeled(schema, ndarray::Array2::from_elem((10, 1), 1.0)).unwrap();
    assert!(EnsembleTrainer::from_config(&RetrainConfig::quick())
        .train(&table)
        .is_err());
}

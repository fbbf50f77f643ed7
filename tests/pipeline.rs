//! End-to-end pipeline tests
//!
//! The synthetic graph runs offline. The Cora test downloads the dataset and
//! is ignored by default: `cargo test -- --ignored`.

use gat_citation::{
    anomaly::AnomalyInjector,
    config::{ExperimentConfig, LofConfig, ModelConfig, TrainConfig},
    data::synthetic::{generate, SyntheticConfig},
    data::CoraLoader,
    eval::Evaluator,
    gat::GraphAttentionNetwork,
    optim::Adam,
    train::Trainer,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn small_model() -> ModelConfig {
    ModelConfig {
        hidden_dim: 8,
        num_heads: 4,
        ..ModelConfig::default()
    }
}

#[test]
fn synthetic_pipeline_trains_and_evaluates() {
    let mut rng = StdRng::seed_from_u64(42);
    let mut dataset = generate(&SyntheticConfig::default(), &mut rng).unwrap();

    let injector = AnomalyInjector::new(vec![2, 5, 10]);
    let before = dataset.features.clone();
    injector.inject(&mut dataset, &mut rng).unwrap();
    for i in 0..dataset.num_nodes() {
        let changed = dataset.features.row(i) != before.row(i);
        assert_eq!(changed, [2, 5, 10].contains(&i));
    }

    let mut model =
        GraphAttentionNetwork::new(dataset.num_features(), dataset.num_classes(), &small_model(), &mut rng)
            .unwrap();
    let mut adam = Adam::new(0.01);
    let trainer = Trainer::new(TrainConfig {
        epochs: 60,
        learning_rate: 0.01,
        log_every: 10,
    });
    let history = trainer.train(&mut model, &dataset, &mut adam, &mut rng).unwrap();

    assert!(history.all_finite());
    let first = history.losses[0];
    let last = history.final_loss().unwrap();
    assert!(last < first, "loss did not decrease: {} -> {}", first, last);

    // Deterministic forward separates the planted classes better than chance
    model.eval();
    let log_probs = model.predict(&dataset.features, &dataset.graph).unwrap();
    let train_idx: Vec<usize> = (0..dataset.num_nodes()).filter(|&i| dataset.train_mask[i]).collect();
    let correct = train_idx
        .iter()
        .filter(|&&i| {
            let row = log_probs.row(i);
            let pred = (0..row.len()).fold(0, |best, k| if row[k] > row[best] { k } else { best });
            pred == dataset.labels[i]
        })
        .count();
    let train_accuracy = correct as f64 / train_idx.len() as f64;
    assert!(train_accuracy > 1.0 / dataset.num_classes() as f64);

    for row in log_probs.rows() {
        let total: f64 = row.iter().map(|v| v.exp()).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    let evaluation = Evaluator::new(LofConfig::default()).evaluate(&model, &dataset).unwrap();
    assert!(evaluation.test_loss.is_finite());
    assert!((0.0..=1.0).contains(&evaluation.test_accuracy));
    assert!((0.0..=1.0).contains(&evaluation.test_auc));
    assert_eq!(evaluation.anomaly_labels.len(), dataset.num_nodes());
    assert!(evaluation.anomaly_labels.iter().all(|&l| l == 1 || l == -1));
    assert_eq!(evaluation.negative_outlier_factor.len(), dataset.num_nodes());

    let line = evaluation.summary_line();
    assert!(line.starts_with("Test Loss "));
    assert!(line.contains(", Test Accuracy "));
    assert!(line.contains(", Test AUC "));
    assert!(evaluation.anomaly_line().starts_with("Anomaly Scores: ["));
}

#[test]
fn synthetic_pipeline_is_reproducible() {
    let run = || {
        let mut rng = StdRng::seed_from_u64(7);
        let dataset = generate(&SyntheticConfig::default(), &mut rng).unwrap();
        let mut model =
            GraphAttentionNetwork::new(dataset.num_features(), dataset.num_classes(), &small_model(), &mut rng)
                .unwrap();
        let mut adam = Adam::new(0.01);
        let trainer = Trainer::new(TrainConfig {
            epochs: 5,
            learning_rate: 0.01,
            log_every: 10,
        });
        trainer.train(&mut model, &dataset, &mut adam, &mut rng).unwrap().losses
    };

    assert_eq!(run(), run());
}

#[test]
#[ignore = "downloads the Cora dataset"]
fn cora_end_to_end() {
    let config = ExperimentConfig::default();
    let mut rng = StdRng::seed_from_u64(config.seed);

    let root = std::env::temp_dir().join("gat_citation_cora");
    let mut dataset = CoraLoader::new(root).load(&config.split, &mut rng).unwrap();
    assert_eq!(dataset.num_nodes(), 2708);
    assert_eq!(dataset.num_features(), 1433);
    assert_eq!(dataset.num_classes(), 7);

    AnomalyInjector::new(config.anomaly_indices.clone())
        .inject(&mut dataset, &mut rng)
        .unwrap();

    let mut model =
        GraphAttentionNetwork::new(dataset.num_features(), dataset.num_classes(), &config.model, &mut rng)
            .unwrap();
    let mut adam = Adam::new(config.train.learning_rate);
    let history = Trainer::new(config.train.clone())
        .train(&mut model, &dataset, &mut adam, &mut rng)
        .unwrap();
    assert!(history.all_finite());

    model.eval();
    let evaluation = Evaluator::new(config.lof.clone()).evaluate(&model, &dataset).unwrap();
    assert!(evaluation.test_accuracy > 0.70, "accuracy {}", evaluation.test_accuracy);
    assert!((0.0..=1.0).contains(&evaluation.test_auc));
    assert_eq!(evaluation.anomaly_labels.len(), 2708);
}

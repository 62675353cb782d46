//! Shared models and helpers for the integration tests.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use shapwise_core::{
    Feature, FeatureType, FnPredictionProvider, KernelShapExplainer, Output, Prediction,
    PredictionInput, PredictionOutput, PredictionProvider, SaliencyResults, ShapConfig,
    ShapError, Value,
};

pub const BACKGROUND_RAW: [[f64; 5]; 3] = [
    [1., 2., 3., -4., 5.],
    [10., 11., 12., -4., 13.],
    [2., 3., 4., -4., 6.],
];

pub const TO_EXPLAIN_RAW: [[f64; 5]; 3] = [
    [5., 6., 7., -4., 8.],
    [11., 12., 13., -5., 14.],
    [0., 0., 1., 4., 2.],
];

pub fn rows<const N: usize>(matrix: &[[f64; N]]) -> Vec<PredictionInput> {
    matrix.iter().map(|r| PredictionInput::from_numbers(r)).collect()
}

pub fn rows_from(matrix: &[Vec<f64>]) -> Vec<PredictionInput> {
    matrix.iter().map(|r| PredictionInput::from_numbers(r)).collect()
}

fn numbers(input: &PredictionInput) -> Vec<f64> {
    input.features().iter().map(|f| f.value().as_number()).collect()
}

/// Sum of every feature except column `skip`.
pub fn sum_skip_model(skip: usize) -> Arc<dyn PredictionProvider> {
    Arc::new(FnPredictionProvider::new(move |input: &PredictionInput| {
        let sum: f64 = numbers(input)
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != skip)
            .map(|(_, v)| v)
            .sum();
        PredictionOutput::new(vec![Output::numerical(format!("sum-but{skip}"), sum)])
    }))
}

/// Twice the skipping sum, then the skipping sum itself.
pub fn sum_skip_two_output_model(skip: usize) -> Arc<dyn PredictionProvider> {
    Arc::new(FnPredictionProvider::new(move |input: &PredictionInput| {
        let sum: f64 = numbers(input)
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != skip)
            .map(|(_, v)| v)
            .sum();
        PredictionOutput::new(vec![
            Output::numerical(format!("sum-but{skip}*2"), 2.0 * sum),
            Output::numerical(format!("sum-but{skip}"), sum),
        ])
    }))
}

pub fn linear_model(weights: Vec<f64>) -> Arc<dyn PredictionProvider> {
    Arc::new(FnPredictionProvider::new(move |input: &PredictionInput| {
        let value: f64 = numbers(input).iter().zip(&weights).map(|(x, w)| x * w).sum();
        PredictionOutput::new(vec![Output::numerical("linear-sum", value)])
    }))
}

/// Sum of the features plus Gaussian noise drawn from a seeded stream.
pub fn noisy_sum_model(seed: u64, noise: f64) -> Arc<dyn PredictionProvider> {
    let rng = Mutex::new(StdRng::seed_from_u64(seed));
    let normal = Normal::new(0.0, noise).unwrap();
    Arc::new(FnPredictionProvider::new(move |input: &PredictionInput| {
        let sum: f64 = numbers(input).iter().sum();
        let jitter = normal.sample(&mut *rng.lock().unwrap());
        PredictionOutput::new(vec![Output::numerical("noisy-sum", sum + jitter)])
    }))
}

pub const FRUITS: [&str; 5] = ["avocado", "banana", "carrot", "dragonfruit", ""];

pub fn calories(fruit: &str) -> f64 {
    match fruit {
        "avocado" => 322.0,
        "banana" => 105.0,
        "carrot" => 25.0,
        "dragonfruit" => 61.0,
        _ => 0.0,
    }
}

/// Total calories and number of fruits eaten, over categorical fruit columns.
pub fn categorical_regressor() -> Arc<dyn PredictionProvider> {
    Arc::new(FnPredictionProvider::new(|input: &PredictionInput| {
        let fruits: Vec<&str> = input
            .features()
            .iter()
            .map(|f| f.value().as_text().unwrap_or_default())
            .collect();
        let total: f64 = fruits.iter().map(|f| calories(f)).sum();
        let eaten = fruits.iter().filter(|f| !f.is_empty()).count() as f64;
        PredictionOutput::new(vec![
            Output::numerical("calories", total),
            Output::numerical("fruit_eaten", eaten),
        ])
    }))
}

/// Numeric sum plus a bonus when the categorical column is "A".
pub fn semi_categorical_model(categorical_column: usize) -> Arc<dyn PredictionProvider> {
    Arc::new(FnPredictionProvider::new(move |input: &PredictionInput| {
        let mut total = 0.0;
        for (i, feature) in input.features().iter().enumerate() {
            if i == categorical_column {
                if feature.value() == &Value::from("A") {
                    total += 10.0;
                }
            } else {
                total += feature.value().as_number();
            }
        }
        PredictionOutput::new(vec![
            Output::numerical("Semi-Categorical", total),
            Output::numerical("Semi-Categorical*2", 2.0 * total),
        ])
    }))
}

pub fn fruit_row(names: &[String], fruits: &[&str]) -> PredictionInput {
    PredictionInput::new(
        names
            .iter()
            .zip(fruits)
            .map(|(name, fruit)| Feature::new(name.clone(), FeatureType::Categorical, *fruit))
            .collect(),
    )
}

/// `rows × cols` values drawn uniformly from `[low, high)`.
pub fn random_matrix(seed: u64, rows: usize, cols: usize, low: f64, high: f64) -> Vec<Vec<f64>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..rows)
        .map(|_| (0..cols).map(|_| rng.gen_range(low..high)).collect())
        .collect()
}

/// Predict `input` with `model`, then explain that prediction.
pub async fn explain(
    model: Arc<dyn PredictionProvider>,
    explainer: &KernelShapExplainer,
    input: PredictionInput,
) -> Result<SaliencyResults, ShapError> {
    let prediction = predict(&model, input).await?;
    explainer.explain(&prediction, model)?.await
}

pub async fn predict(
    model: &Arc<dyn PredictionProvider>,
    input: PredictionInput,
) -> Result<Prediction, ShapError> {
    let mut outputs = model.predict(vec![input.clone()]).await?;
    let output = outputs.pop().ok_or_else(|| ShapError::model("no prediction"))?;
    Ok(Prediction::new(input, output))
}

pub fn config(background: Vec<PredictionInput>) -> shapwise_core::ShapConfigBuilder {
    ShapConfig::builder().background(background)
}

/// Scores of every output, background entry excluded.
pub fn score_matrix(results: &SaliencyResults) -> Vec<Vec<f64>> {
    results.saliencies().iter().map(|s| s.scores()).collect()
}

pub fn assert_close(actual: &[f64], expected: &[f64], tolerance: f64) {
    assert_eq!(actual.len(), expected.len(), "{actual:?} vs {expected:?}");
    for (a, e) in actual.iter().zip(expected) {
        assert!(
            (a - e).abs() <= tolerance,
            "{actual:?} differs from {expected:?} beyond {tolerance}"
        );
    }
}

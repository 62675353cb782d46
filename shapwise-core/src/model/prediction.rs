//! Prediction inputs, outputs and the prediction-provider seam.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::feature::{Feature, FeatureType};
use super::value::Value;
use crate::error::ShapError;

/// An ordered list of features fed to a model. Column order is insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionInput {
    features: Vec<Feature>,
}

impl PredictionInput {
    pub fn new(features: Vec<Feature>) -> Self {
        Self { features }
    }

    /// Build an input of numerical features named `f0`, `f1`, ...
    pub fn from_numbers(values: &[f64]) -> Self {
        Self::new(
            values
                .iter()
                .enumerate()
                .map(|(i, v)| Feature::numerical(format!("f{i}"), *v))
                .collect(),
        )
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn feature(&self, index: usize) -> Option<&Feature> {
        self.features.get(index)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn into_features(self) -> Vec<Feature> {
        self.features
    }
}

/// A single named model output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Output {
    name: String,
    #[serde(rename = "type")]
    kind: FeatureType,
    value: Value,
    #[serde(default = "default_score")]
    score: f64,
}

fn default_score() -> f64 {
    1.0
}

impl Output {
    pub fn new(name: impl Into<String>, kind: FeatureType, value: impl Into<Value>, score: f64) -> Self {
        Self {
            name: name.into(),
            kind,
            value: value.into(),
            score,
        }
    }

    pub fn numerical(name: impl Into<String>, value: f64) -> Self {
        Self::new(name, FeatureType::Number, value, 1.0)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> FeatureType {
        self.kind
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn score(&self) -> f64 {
        self.score
    }
}

/// All outputs a model produced for one input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionOutput {
    outputs: Vec<Output>,
}

impl PredictionOutput {
    pub fn new(outputs: Vec<Output>) -> Self {
        Self { outputs }
    }

    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }

    pub fn by_name(&self, name: &str) -> Option<&Output> {
        self.outputs.iter().find(|o| o.name == name)
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    /// Numeric view of every output, in order.
    pub fn to_numbers(&self) -> Vec<f64> {
        self.outputs.iter().map(|o| o.value.as_number()).collect()
    }
}

/// An input together with the output the model produced for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    input: PredictionInput,
    output: PredictionOutput,
}

impl Prediction {
    pub fn new(input: PredictionInput, output: PredictionOutput) -> Self {
        Self { input, output }
    }

    pub fn input(&self) -> &PredictionInput {
        &self.input
    }

    pub fn output(&self) -> &PredictionOutput {
        &self.output
    }
}

/// The black-box model being explained.
///
/// Implementations must return exactly one output per input, in input order.
#[async_trait]
pub trait PredictionProvider: Send + Sync {
    async fn predict(&self, inputs: Vec<PredictionInput>)
    -> Result<Vec<PredictionOutput>, ShapError>;
}

/// Adapts a synchronous per-input closure into a [`PredictionProvider`].
pub struct FnPredictionProvider<F> {
    predict_fn: F,
}

impl<F> FnPredictionProvider<F>
where
    F: Fn(&PredictionInput) -> PredictionOutput + Send + Sync,
{
    pub fn new(predict_fn: F) -> Self {
        Self { predict_fn }
    }
}

#[async_trait]
impl<F> PredictionProvider for FnPredictionProvider<F>
where
    F: Fn(&PredictionInput) -> PredictionOutput + Send + Sync,
{
    async fn predict(
        &self,
        inputs: Vec<PredictionInput>,
    ) -> Result<Vec<PredictionOutput>, ShapError> {
        Ok(inputs.iter().map(|input| (self.predict_fn)(input)).collect())
    }
}

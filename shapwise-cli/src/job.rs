//! Explanation jobs read from JSON files.
//!
//! A job names the features, the row to explain, the background rows and a
//! linear (optionally logistic) model to explain:
//!
//! ```json
//! {
//!   "features": ["age", "income"],
//!   "instance": [41.0, 3.2],
//!   "background": [[30.0, 2.0], [50.0, 4.5]],
//!   "model": { "output": "risk", "weights": [0.02, -0.3], "intercept": 0.1, "logistic": true }
//! }
//! ```

use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shapwise_core::{
    Feature, Output, Prediction, PredictionInput, PredictionOutput, PredictionProvider, ShapError,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearModelSpec {
    #[serde(default = "default_output")]
    pub output: String,
    pub weights: Vec<f64>,
    #[serde(default)]
    pub intercept: f64,
    /// Squash the linear score through a sigmoid.
    #[serde(default)]
    pub logistic: bool,
}

fn default_output() -> String {
    "prediction".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplanationJob {
    /// Feature names; `f0`, `f1`, ... when omitted.
    #[serde(default)]
    pub features: Vec<String>,
    pub instance: Vec<f64>,
    pub background: Vec<Vec<f64>>,
    pub model: LinearModelSpec,
}

impl ExplanationJob {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read job file {}", path.display()))?;
        let job: Self = serde_json::from_str(&content)
            .with_context(|| format!("Invalid job file {}", path.display()))?;
        job.check()?;
        Ok(job)
    }

    fn check(&self) -> anyhow::Result<()> {
        let width = self.instance.len();
        if self.model.weights.len() != width {
            anyhow::bail!(
                "model has {} weights but the instance has {} features",
                self.model.weights.len(),
                width
            );
        }
        if !self.features.is_empty() && self.features.len() != width {
            anyhow::bail!(
                "{} feature names given for {} features",
                self.features.len(),
                width
            );
        }
        Ok(())
    }

    fn row(&self, values: &[f64]) -> PredictionInput {
        if self.features.is_empty() {
            return PredictionInput::from_numbers(values);
        }
        PredictionInput::new(
            self.features
                .iter()
                .zip(values)
                .map(|(name, v)| Feature::numerical(name.clone(), *v))
                .collect(),
        )
    }

    pub fn instance(&self) -> PredictionInput {
        self.row(&self.instance)
    }

    pub fn background(&self) -> Vec<PredictionInput> {
        self.background.iter().map(|r| self.row(r)).collect()
    }

    pub fn model(&self) -> LinearModel {
        LinearModel {
            spec: self.model.clone(),
        }
    }

    /// The instance paired with the model's own prediction for it.
    pub fn prediction(&self) -> Prediction {
        let input = self.instance();
        let output = self.model().score(&input);
        Prediction::new(input, output)
    }
}

/// A linear model over numeric features.
pub struct LinearModel {
    spec: LinearModelSpec,
}

impl LinearModel {
    fn score(&self, input: &PredictionInput) -> PredictionOutput {
        let linear: f64 = input
            .features()
            .iter()
            .zip(&self.spec.weights)
            .map(|(f, w)| f.value().as_number() * w)
            .sum::<f64>()
            + self.spec.intercept;
        let value = if self.spec.logistic {
            1.0 / (1.0 + (-linear).exp())
        } else {
            linear
        };
        PredictionOutput::new(vec![Output::numerical(self.spec.output.clone(), value)])
    }
}

#[async_trait]
impl PredictionProvider for LinearModel {
    async fn predict(
        &self,
        inputs: Vec<PredictionInput>,
    ) -> Result<Vec<PredictionOutput>, ShapError> {
        Ok(inputs.iter().map(|input| self.score(input)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn job_json() -> &'static str {
        r#"{
            "features": ["age", "income"],
            "instance": [41.0, 3.0],
            "background": [[30.0, 2.0], [50.0, 4.0]],
            "model": { "output": "risk", "weights": [0.5, -2.0], "intercept": 1.0 }
        }"#
    }

    #[test]
    fn test_parse_job() {
        let job: ExplanationJob = serde_json::from_str(job_json()).unwrap();
        job.check().unwrap();
        let instance = job.instance();
        assert_eq!(instance.features()[0].name(), "age");
        assert_eq!(job.background().len(), 2);

        let prediction = job.prediction();
        let output = &prediction.output().outputs()[0];
        assert_eq!(output.name(), "risk");
        assert_eq!(output.value().as_number(), 41.0 * 0.5 - 6.0 + 1.0);
    }

    #[test]
    fn test_weight_count_is_checked() {
        let job = ExplanationJob {
            features: Vec::new(),
            instance: vec![1.0, 2.0, 3.0],
            background: vec![vec![0.0, 0.0, 0.0]],
            model: LinearModelSpec {
                output: default_output(),
                weights: vec![1.0],
                intercept: 0.0,
                logistic: false,
            },
        };
        assert!(job.check().is_err());
    }

    #[test]
    fn test_logistic_output_is_a_probability() {
        let model = LinearModel {
            spec: LinearModelSpec {
                output: "p".into(),
                weights: vec![100.0],
                intercept: 0.0,
                logistic: true,
            },
        };
        let out = model.score(&PredictionInput::from_numbers(&[1.0]));
        let p = out.to_numbers()[0];
        assert!(p > 0.99 && p <= 1.0);
    }

    #[tokio::test]
    async fn test_job_explanation_end_to_end() {
        let job: ExplanationJob = serde_json::from_str(job_json()).unwrap();
        let config = shapwise_core::ShapConfig::builder()
            .background(job.background())
            .build();
        let explainer = shapwise_core::KernelShapExplainer::new(config);
        let results = explainer
            .explain(&job.prediction(), std::sync::Arc::new(job.model()))
            .unwrap()
            .await
            .unwrap();
        let scores = results.get("risk").unwrap().scores();
        assert!((scores[0] - 0.5).abs() < 1e-9);
        assert!((scores[1] - 0.0).abs() < 1e-9);
    }
}

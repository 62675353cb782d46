//! Counterfactual byproducts of coalition evaluation.

use serde::{Deserialize, Serialize};

use crate::model::{FeatureType, Output, PredictionInput, PredictionOutput, Value};

/// Relative tolerance under which two numeric outputs count as equal.
const MATERIALITY: f64 = 1e-9;

/// A synthetic input whose primary output disagrees with the explained prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CounterfactualByproduct {
    pub input: PredictionInput,
    pub output: PredictionOutput,
}

/// Compares evaluations against the primary (first) output of the explained prediction.
#[derive(Debug, Clone)]
pub struct CounterfactualTracker {
    reference: Output,
}

impl CounterfactualTracker {
    /// `None` when the explained prediction has no output to compare against.
    pub fn new(explained: &PredictionOutput) -> Option<Self> {
        explained.outputs().first().map(|reference| Self {
            reference: reference.clone(),
        })
    }

    /// True when `candidate`'s primary output differs materially from the reference.
    pub fn is_counterfactual(&self, candidate: &PredictionOutput) -> bool {
        candidate
            .outputs()
            .first()
            .is_some_and(|output| differs(&self.reference, output))
    }
}

fn is_numeric(output: &Output) -> bool {
    matches!(output.kind(), FeatureType::Number | FeatureType::Boolean)
        || matches!(output.value(), Value::Number(_) | Value::Boolean(_))
}

/// Class labels compare by equality, numbers by a relative tolerance.
pub fn differs(reference: &Output, candidate: &Output) -> bool {
    if is_numeric(reference) && is_numeric(candidate) {
        let (a, b) = (reference.value().as_number(), candidate.value().as_number());
        if a.is_nan() || b.is_nan() {
            return a.is_nan() != b.is_nan();
        }
        let scale = a.abs().max(b.abs()).max(1.0);
        (a - b).abs() > MATERIALITY * scale
    } else {
        reference.value() != candidate.value()
    }
}

//! Explanation results and their text rendering.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::{Feature, Output};
use crate::shap::CounterfactualByproduct;

/// Name of the synthetic entry carrying the baseline.
pub const BACKGROUND: &str = "Background";

/// Attribution of one feature to one output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    feature: Feature,
    score: f64,
    confidence: f64,
}

impl FeatureImportance {
    pub fn new(feature: Feature, score: f64, confidence: f64) -> Self {
        Self {
            feature,
            score,
            confidence,
        }
    }

    pub fn feature(&self) -> &Feature {
        &self.feature
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    /// Half-width of the confidence interval around `score`.
    pub fn confidence(&self) -> f64 {
        self.confidence
    }
}

/// Attributions of every feature to one output, ending with the background entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Saliency {
    output: Output,
    per_feature: Vec<FeatureImportance>,
}

impl Saliency {
    pub fn new(output: Output, per_feature: Vec<FeatureImportance>) -> Self {
        Self {
            output,
            per_feature,
        }
    }

    pub fn output(&self) -> &Output {
        &self.output
    }

    /// Every entry, the trailing background entry included.
    pub fn per_feature_importance(&self) -> &[FeatureImportance] {
        &self.per_feature
    }

    /// Entries of real features, in column order.
    pub fn features(&self) -> &[FeatureImportance] {
        match self.per_feature.split_last() {
            Some((last, rest)) if last.feature.name() == BACKGROUND => rest,
            _ => &self.per_feature,
        }
    }

    /// Attribution scores of real features, in column order.
    pub fn scores(&self) -> Vec<f64> {
        self.features().iter().map(FeatureImportance::score).collect()
    }

    pub fn background(&self) -> Option<&FeatureImportance> {
        self.per_feature
            .last()
            .filter(|entry| entry.feature.name() == BACKGROUND)
    }

    /// Baseline plus every attribution, i.e. the explained prediction in link space.
    pub fn total(&self) -> f64 {
        self.per_feature.iter().map(FeatureImportance::score).sum()
    }
}

/// Per-output saliencies of one explanation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaliencyResults {
    saliencies: Vec<Saliency>,
    source: String,
    available_cfs: Vec<CounterfactualByproduct>,
}

impl SaliencyResults {
    pub fn new(
        saliencies: Vec<Saliency>,
        source: impl Into<String>,
        available_cfs: Vec<CounterfactualByproduct>,
    ) -> Self {
        Self {
            saliencies,
            source: source.into(),
            available_cfs,
        }
    }

    /// Saliencies in model output order.
    pub fn saliencies(&self) -> &[Saliency] {
        &self.saliencies
    }

    pub fn get(&self, output_name: &str) -> Option<&Saliency> {
        self.saliencies
            .iter()
            .find(|s| s.output.name() == output_name)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn available_cfs(&self) -> &[CounterfactualByproduct] {
        &self.available_cfs
    }

    pub fn as_table(&self) -> String {
        let mut out = String::new();
        for saliency in &self.saliencies {
            render_saliency(&mut out, saliency, &self.source);
        }
        out
    }
}

const LABEL_WIDTH: usize = 32;
const RULE_WIDTH: usize = 72;

fn render_saliency(out: &mut String, saliency: &Saliency, source: &str) {
    use std::fmt::Write;

    let title = format!("=== {} {} Values ", saliency.output.name(), source);
    let _ = writeln!(out, "{title:=<RULE_WIDTH$}");
    let _ = writeln!(
        out,
        "{:>LABEL_WIDTH$} : {:>12} | {:>12}",
        "Feature", "SHAP Value", "Confidence"
    );
    let _ = writeln!(out, "{}", "-".repeat(RULE_WIDTH));
    for entry in saliency.features() {
        let mut label = format!("{} = {}", entry.feature.name(), entry.feature.value());
        if label.chars().count() > LABEL_WIDTH {
            label = label.chars().take(LABEL_WIDTH - 3).collect::<String>() + "...";
        }
        let _ = writeln!(
            out,
            "{label:>LABEL_WIDTH$} : {:>12.6} | +/- {:>8.6}",
            entry.score, entry.confidence
        );
    }
    let _ = writeln!(out, "{}", "-".repeat(RULE_WIDTH));
    if let Some(background) = saliency.background() {
        let _ = writeln!(
            out,
            "{BACKGROUND:>LABEL_WIDTH$} : {:>12.6} | +/- {:>8.6}",
            background.score, background.confidence
        );
    }
    let _ = writeln!(
        out,
        "{:>LABEL_WIDTH$} : {:>12.6}",
        "Prediction",
        saliency.total()
    );
    let _ = writeln!(out);
}

impl fmt::Display for SaliencyResults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_table())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SaliencyResults {
        let saliency = Saliency::new(
            Output::numerical("sum", 13.0),
            vec![
                FeatureImportance::new(Feature::numerical("age", 40.0), 2.5, 0.1),
                FeatureImportance::new(Feature::numerical("income", 3.0), -0.5, 0.0),
                FeatureImportance::new(Feature::numerical(BACKGROUND, 11.0), 11.0, 0.0),
            ],
        );
        SaliencyResults::new(vec![saliency], "SHAP", Vec::new())
    }

    #[test]
    fn test_lookup_and_totals() {
        let results = sample();
        let saliency = results.get("sum").unwrap();
        assert_eq!(saliency.scores(), vec![2.5, -0.5]);
        assert_eq!(saliency.background().unwrap().score(), 11.0);
        assert_eq!(saliency.total(), 13.0);
        assert!(results.get("missing").is_none());
    }

    #[test]
    fn test_table_rendering() {
        let table = sample().as_table();
        assert!(table.starts_with("=== sum SHAP Values ==="));
        assert!(table.contains("SHAP Value"));
        assert!(table.contains("age = 40"));
        assert!(table.contains("2.500000"));
        assert!(table.contains(BACKGROUND));
        assert!(table.contains("Prediction"));
        assert!(table.contains("13.000000"));
        assert_eq!(table, sample().to_string());
    }
}

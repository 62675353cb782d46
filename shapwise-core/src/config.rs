//! Configuration types for the shapwise-core crate.
//!
//! [`ShapSettings`] is the serializable part (loadable from TOML / env by the
//! CLI); [`ShapConfig`] pairs it with the background data. Both are immutable
//! value objects: an explainer snapshots its `ShapConfig` at call start.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ShapError;
use crate::model::{PerturbationContext, PredictionInput};

/// Transform applied to model outputs before the regression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Link {
    #[default]
    Identity,
    /// `ln(p / (1 - p))`, for probability-scale outputs.
    Logit,
}

impl Link {
    /// Map a model output into the link space. Out-of-domain inputs yield
    /// non-finite values (`NaN` / `±inf`), never a panic.
    pub fn apply(self, value: f64) -> f64 {
        match self {
            Self::Identity => value,
            Self::Logit => (value / (1.0 - value)).ln(),
        }
    }
}

impl FromStr for Link {
    type Err = ShapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "identity" => Ok(Self::Identity),
            "logit" => Ok(Self::Logit),
            other => Err(ShapError::config(format!("unknown link function '{other}'"))),
        }
    }
}

/// Policy selecting how many players keep a non-zero attribution.
///
/// Settings files write it the way the command line does: a policy name or a
/// feature count, e.g. `regularizer = "bic"` or `regularizer = 5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "RegularizerRepr", into = "RegularizerRepr")]
pub enum Regularizer {
    /// Fit every varying feature.
    None,
    /// Akaike information criterion over the inclusion path.
    Aic,
    /// Bayesian information criterion over the inclusion path.
    Bic,
    /// No regularization when the coalition space is well covered, otherwise
    /// the best of AIC / BIC / half the players by corrected AIC.
    #[default]
    Auto,
    /// Keep exactly this many features (fewer if fewer vary).
    TopK(usize),
}

impl FromStr for Regularizer {
    type Err = ShapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "aic" => Ok(Self::Aic),
            "bic" => Ok(Self::Bic),
            "auto" => Ok(Self::Auto),
            other => other
                .parse::<usize>()
                .map(Self::TopK)
                .map_err(|_| ShapError::config(format!("unknown regularizer '{other}'"))),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RegularizerRepr {
    Count(usize),
    Name(String),
}

impl TryFrom<RegularizerRepr> for Regularizer {
    type Error = ShapError;

    fn try_from(repr: RegularizerRepr) -> Result<Self, Self::Error> {
        match repr {
            RegularizerRepr::Count(k) => Ok(Self::TopK(k)),
            RegularizerRepr::Name(name) => name.parse(),
        }
    }
}

impl From<Regularizer> for RegularizerRepr {
    fn from(regularizer: Regularizer) -> Self {
        match regularizer {
            Regularizer::TopK(k) => Self::Count(k),
            other => Self::Name(other.to_string()),
        }
    }
}

impl fmt::Display for Regularizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Aic => write!(f, "aic"),
            Self::Bic => write!(f, "bic"),
            Self::Auto => write!(f, "auto"),
            Self::TopK(k) => write!(f, "{k}"),
        }
    }
}

/// Serializable explainer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapSettings {
    /// Link function applied to model outputs.
    #[serde(default)]
    pub link: Link,
    /// Coalitions to evaluate; `2·M + 2048` for `M` players when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n_samples: Option<usize>,
    /// Sparsity policy for the regression.
    #[serde(default)]
    pub regularizer: Regularizer,
    /// Two-sided confidence level of the reported widths.
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    /// Number of model invocations the coalitions are split across.
    #[serde(default = "default_batch_count")]
    pub batch_count: usize,
    /// Keep coalition evaluations whose prediction disagrees with the explained one.
    #[serde(default)]
    pub track_counterfactuals: bool,
    /// Seed of the coalition sampler.
    #[serde(default)]
    pub perturbation: PerturbationContext,
    /// Bound on a whole explanation when awaited with a timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ShapSettings {
    fn default() -> Self {
        Self {
            link: Link::default(),
            n_samples: None,
            regularizer: Regularizer::default(),
            confidence: default_confidence(),
            batch_count: default_batch_count(),
            track_counterfactuals: false,
            perturbation: PerturbationContext::default(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_confidence() -> f64 {
    0.95
}

fn default_batch_count() -> usize {
    1
}

fn default_timeout_secs() -> u64 {
    30
}

impl ShapSettings {
    pub fn validate(&self) -> Result<(), ShapError> {
        if !(self.confidence > 0.0 && self.confidence < 1.0) {
            return Err(ShapError::config(format!(
                "confidence must lie in (0, 1), got {}",
                self.confidence
            )));
        }
        if self.batch_count == 0 {
            return Err(ShapError::config("batch count must be at least 1"));
        }
        if self.n_samples == Some(0) {
            return Err(ShapError::config("sample count must be at least 1"));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Settings plus the background data that defines "absent" feature values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapConfig {
    #[serde(flatten)]
    settings: ShapSettings,
    background: Vec<PredictionInput>,
}

impl ShapConfig {
    pub fn new(settings: ShapSettings, background: Vec<PredictionInput>) -> Self {
        Self {
            settings,
            background,
        }
    }

    pub fn builder() -> ShapConfigBuilder {
        ShapConfigBuilder::default()
    }

    /// A builder pre-populated with this configuration.
    pub fn to_builder(&self) -> ShapConfigBuilder {
        ShapConfigBuilder {
            settings: self.settings.clone(),
            background: self.background.clone(),
        }
    }

    pub fn settings(&self) -> &ShapSettings {
        &self.settings
    }

    pub fn background(&self) -> &[PredictionInput] {
        &self.background
    }

    pub fn link(&self) -> Link {
        self.settings.link
    }

    pub fn n_samples(&self) -> Option<usize> {
        self.settings.n_samples
    }

    pub fn regularizer(&self) -> Regularizer {
        self.settings.regularizer
    }

    pub fn confidence(&self) -> f64 {
        self.settings.confidence
    }

    pub fn batch_count(&self) -> usize {
        self.settings.batch_count
    }

    pub fn track_counterfactuals(&self) -> bool {
        self.settings.track_counterfactuals
    }

    pub fn perturbation(&self) -> PerturbationContext {
        self.settings.perturbation
    }

    pub fn validate(&self) -> Result<(), ShapError> {
        self.settings.validate()?;
        if self.background.is_empty() {
            return Err(ShapError::config("background data must not be empty"));
        }
        Ok(())
    }
}

/// Fluent builder for [`ShapConfig`].
#[derive(Debug, Clone, Default)]
pub struct ShapConfigBuilder {
    settings: ShapSettings,
    background: Vec<PredictionInput>,
}

impl ShapConfigBuilder {
    pub fn settings(mut self, settings: ShapSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn background(mut self, background: Vec<PredictionInput>) -> Self {
        self.background = background;
        self
    }

    pub fn link(mut self, link: Link) -> Self {
        self.settings.link = link;
        self
    }

    pub fn n_samples(mut self, n_samples: usize) -> Self {
        self.settings.n_samples = Some(n_samples);
        self
    }

    pub fn regularizer(mut self, regularizer: Regularizer) -> Self {
        self.settings.regularizer = regularizer;
        self
    }

    pub fn confidence(mut self, confidence: f64) -> Self {
        self.settings.confidence = confidence;
        self
    }

    pub fn batch_count(mut self, batch_count: usize) -> Self {
        self.settings.batch_count = batch_count;
        self
    }

    pub fn track_counterfactuals(mut self, track: bool) -> Self {
        self.settings.track_counterfactuals = track;
        self
    }

    pub fn perturbation(mut self, context: PerturbationContext) -> Self {
        self.settings.perturbation = context;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.settings.perturbation.seed = seed;
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.settings.timeout_secs = secs;
        self
    }

    pub fn build(self) -> ShapConfig {
        ShapConfig {
            settings: self.settings,
            background: self.background,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = ShapSettings::default();
        assert_eq!(settings.link, Link::Identity);
        assert_eq!(settings.regularizer, Regularizer::Auto);
        assert_eq!(settings.confidence, 0.95);
        assert_eq!(settings.batch_count, 1);
        assert!(!settings.track_counterfactuals);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_settings_serde_roundtrip() {
        let settings = ShapSettings {
            regularizer: Regularizer::TopK(4),
            n_samples: Some(100),
            ..ShapSettings::default()
        };
        let json = serde_json::to_string(&settings).unwrap();
        let parsed: ShapSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, settings);

        let partial: ShapSettings = serde_json::from_str(r#"{"link": "logit"}"#).unwrap();
        assert_eq!(partial.link, Link::Logit);
        assert_eq!(partial.timeout_secs, 30);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let bad_confidence = ShapSettings {
            confidence: 1.0,
            ..ShapSettings::default()
        };
        assert!(bad_confidence.validate().is_err());

        let no_batches = ShapSettings {
            batch_count: 0,
            ..ShapSettings::default()
        };
        assert!(no_batches.validate().is_err());

        let config = ShapConfig::builder().build();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_regularizer_and_link() {
        assert_eq!("AIC".parse::<Regularizer>().unwrap(), Regularizer::Aic);
        assert_eq!("7".parse::<Regularizer>().unwrap(), Regularizer::TopK(7));
        assert!("lasso".parse::<Regularizer>().is_err());
        assert_eq!("logit".parse::<Link>().unwrap(), Link::Logit);
    }

    #[test]
    fn test_regularizer_accepts_cli_forms_in_files() {
        for (text, expected) in [
            (r#"{"regularizer": 5}"#, Regularizer::TopK(5)),
            (r#"{"regularizer": "5"}"#, Regularizer::TopK(5)),
            (r#"{"regularizer": "BIC"}"#, Regularizer::Bic),
        ] {
            let parsed: ShapSettings = serde_json::from_str(text).unwrap();
            assert_eq!(parsed.regularizer, expected, "{text}");
        }
        assert!(serde_json::from_str::<ShapSettings>(r#"{"regularizer": "lasso"}"#).is_err());

        assert_eq!(serde_json::to_string(&Regularizer::TopK(3)).unwrap(), "3");
        assert_eq!(serde_json::to_string(&Regularizer::Aic).unwrap(), r#""aic""#);
    }

    #[test]
    fn test_logit_link_boundaries() {
        assert_eq!(Link::Logit.apply(0.5), 0.0);
        assert_eq!(Link::Logit.apply(1.0), f64::INFINITY);
        assert_eq!(Link::Logit.apply(0.0), f64::NEG_INFINITY);
        assert!(Link::Logit.apply(-0.2).is_nan());
    }
}

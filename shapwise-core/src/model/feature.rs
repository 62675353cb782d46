//! Typed features, feature domains and composite-feature linearization.

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use super::value::Value;
use crate::error::ShapError;

/// Maximum nesting depth accepted when flattening composite features.
pub const MAX_COMPOSITE_DEPTH: usize = 32;

/// Semantic type of a feature. Selects the per-type perturb/drop behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureType {
    Number,
    Categorical,
    Text,
    Boolean,
    Composite,
    Undefined,
}

impl FeatureType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Number => "number",
            Self::Categorical => "categorical",
            Self::Text => "text",
            Self::Boolean => "boolean",
            Self::Composite => "composite",
            Self::Undefined => "undefined",
        }
    }
}

/// The set of values a feature may legitimately take.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeatureDomain {
    Categorical { categories: Vec<String> },
    Numerical { lower: f64, upper: f64 },
}

impl FeatureDomain {
    pub fn categorical<I, S>(categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Categorical {
            categories: categories.into_iter().map(Into::into).collect(),
        }
    }

    pub fn numerical(lower: f64, upper: f64) -> Self {
        Self::Numerical { lower, upper }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Categorical { categories } => categories.is_empty(),
            Self::Numerical { lower, upper } => lower.is_nan() || upper.is_nan() || lower > upper,
        }
    }

    /// Draw a value uniformly from the domain.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Value {
        match self {
            Self::Categorical { categories } => categories
                .choose(rng)
                .map(|c| Value::Text(c.clone()))
                .unwrap_or(Value::Missing),
            Self::Numerical { lower, upper } => {
                if lower < upper {
                    Value::Number(rng.gen_range(*lower..*upper))
                } else if lower == upper {
                    Value::Number(*lower)
                } else {
                    Value::Missing
                }
            }
        }
    }

    /// Draw a value from the domain that differs from `current`, if any exists.
    pub fn sample_other<R: Rng + ?Sized>(&self, current: &Value, rng: &mut R) -> Option<Value> {
        match self {
            Self::Categorical { categories } => {
                let others: Vec<&String> = categories
                    .iter()
                    .filter(|c| current.as_text() != Some(c.as_str()))
                    .collect();
                others.choose(rng).map(|c| Value::Text((*c).clone()))
            }
            Self::Numerical { .. } => {
                let value = self.sample(rng);
                (value != *current && !value.is_missing()).then_some(value)
            }
        }
    }
}

/// A named, typed input to a prediction function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    name: String,
    #[serde(rename = "type")]
    kind: FeatureType,
    value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    domain: Option<FeatureDomain>,
}

impl Feature {
    pub fn new(name: impl Into<String>, kind: FeatureType, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            kind,
            value: value.into(),
            domain: None,
        }
    }

    pub fn numerical(name: impl Into<String>, value: f64) -> Self {
        Self::new(name, FeatureType::Number, value)
    }

    pub fn categorical(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(name, FeatureType::Categorical, Value::Text(value.into()))
    }

    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(name, FeatureType::Text, Value::Text(value.into()))
    }

    pub fn boolean(name: impl Into<String>, value: bool) -> Self {
        Self::new(name, FeatureType::Boolean, value)
    }

    pub fn composite(name: impl Into<String>, features: Vec<Feature>) -> Self {
        Self::new(name, FeatureType::Composite, Value::Composite(features))
    }

    pub fn undefined(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(name, FeatureType::Undefined, value)
    }

    pub fn with_domain(mut self, domain: FeatureDomain) -> Self {
        self.domain = Some(domain);
        self
    }

    /// Copy of this feature carrying `value` instead of its own.
    pub fn with_value(&self, value: Value) -> Self {
        Self {
            name: self.name.clone(),
            kind: self.kind,
            value,
            domain: self.domain.clone(),
        }
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

    pub fn domain(&self) -> Option<&FeatureDomain> {
        self.domain.as_ref()
    }
}

/// Flatten composite features into a list of leaf features, depth first.
///
/// Composite (and undefined) features whose value is a feature list are
/// replaced by their leaves in order; all other features are kept as is.
pub fn linearize_features(features: &[Feature]) -> Result<Vec<Feature>, ShapError> {
    let mut flat = Vec::with_capacity(features.len());
    let mut stack: Vec<(&Feature, usize)> = features.iter().rev().map(|f| (f, 0)).collect();

    while let Some((feature, depth)) = stack.pop() {
        let children = match feature.kind {
            FeatureType::Composite | FeatureType::Undefined => feature.value.as_features(),
            _ => None,
        };
        match children {
            Some(children) => {
                if depth >= MAX_COMPOSITE_DEPTH {
                    return Err(ShapError::validation(format!(
                        "composite feature '{}' nests deeper than {MAX_COMPOSITE_DEPTH} levels",
                        feature.name
                    )));
                }
                stack.extend(children.iter().rev().map(|c| (c, depth + 1)));
            }
            None => flat.push(feature.clone()),
        }
    }

    Ok(flat)
}

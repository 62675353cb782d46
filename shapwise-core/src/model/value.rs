//! Raw feature and output values.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::feature::Feature;

/// The payload carried by a feature or a model output.
///
/// How a value is interpreted (and perturbed) is decided by the owning
/// feature's [`FeatureType`](super::FeatureType), not by the variant alone:
/// a categorical feature usually carries `Text`, but may carry a `Number` code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Number(f64),
    Boolean(bool),
    Text(String),
    Composite(Vec<Feature>),
    Missing,
}

impl Value {
    /// Numeric view used by the regression. Non-numeric payloads map to `NaN`.
    pub fn as_number(&self) -> f64 {
        match self {
            Self::Number(v) => *v,
            Self::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Self::Text(s) => s.trim().parse().unwrap_or(f64::NAN),
            Self::Composite(_) | Self::Missing => f64::NAN,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_features(&self) -> Option<&[Feature]> {
        match self {
            Self::Composite(features) => Some(features),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(v) => write!(f, "{v}"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Text(s) => write!(f, "{s}"),
            Self::Composite(features) => {
                let names: Vec<&str> = features.iter().map(Feature::name).collect();
                write!(f, "[{}]", names.join(", "))
            }
            Self::Missing => write!(f, "<missing>"),
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Number(f64::from(v))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

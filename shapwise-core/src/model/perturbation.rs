//! Per-type perturbation and drop behaviour.
//!
//! All randomness flows from a [`PerturbationContext`], so the same context
//! reproduces the same perturbations.

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::index;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use super::feature::{Feature, FeatureType};
use super::value::Value;

/// Seed and size of the perturbations applied to an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerturbationContext {
    /// Seed of every random stream derived from this context.
    #[serde(default)]
    pub seed: u64,
    /// Number of features perturbed per input.
    #[serde(default = "default_noise_size")]
    pub noise_size: usize,
}

impl Default for PerturbationContext {
    fn default() -> Self {
        Self {
            seed: 0,
            noise_size: default_noise_size(),
        }
    }
}

fn default_noise_size() -> usize {
    1
}

impl PerturbationContext {
    pub fn new(seed: u64, noise_size: usize) -> Self {
        Self { seed, noise_size }
    }

    /// A fresh random stream positioned at the start of this context's sequence.
    pub fn rng(&self) -> StdRng {
        StdRng::seed_from_u64(self.seed)
    }
}

impl FeatureType {
    /// Draw a replacement for `feature`'s value respecting this type's semantics.
    pub fn perturb<R: Rng + ?Sized>(self, feature: &Feature, rng: &mut R) -> Value {
        let value = feature.value();
        match self {
            Self::Number => {
                if let Some(domain) = feature.domain() {
                    return domain
                        .sample_other(value, rng)
                        .unwrap_or_else(|| value.clone());
                }
                let v = value.as_number();
                if !v.is_finite() {
                    return value.clone();
                }
                // Gaussian jitter proportional to magnitude
                let sigma = if v == 0.0 { 1.0 } else { v.abs() * 0.1 };
                match Normal::new(v, sigma) {
                    Ok(normal) => Value::Number(normal.sample(rng)),
                    Err(_) => value.clone(),
                }
            }
            Self::Boolean => match value {
                Value::Boolean(b) => Value::Boolean(!b),
                other => Value::Boolean(other.as_number() == 0.0),
            },
            Self::Categorical => feature
                .domain()
                .and_then(|domain| domain.sample_other(value, rng))
                .unwrap_or_else(|| self.drop_value(value)),
            Self::Text => {
                let text = value.as_text().unwrap_or_default();
                let words: Vec<&str> = text.split_whitespace().collect();
                if words.len() <= 1 {
                    return Value::Text(String::new());
                }
                let skip = rng.gen_range(0..words.len());
                let kept: Vec<&str> = words
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != skip)
                    .map(|(_, w)| *w)
                    .collect();
                Value::Text(kept.join(" "))
            }
            Self::Composite => match value.as_features() {
                Some(children) if !children.is_empty() => {
                    let target = rng.gen_range(0..children.len());
                    let perturbed = children
                        .iter()
                        .enumerate()
                        .map(|(i, child)| {
                            if i == target {
                                child.with_value(child.kind().perturb(child, rng))
                            } else {
                                child.clone()
                            }
                        })
                        .collect();
                    Value::Composite(perturbed)
                }
                _ => value.clone(),
            },
            Self::Undefined => value.clone(),
        }
    }

    /// The "missing" representation of `value` for this type.
    pub fn drop_value(self, value: &Value) -> Value {
        match self {
            Self::Number => Value::Number(0.0),
            Self::Boolean => Value::Boolean(false),
            Self::Categorical | Self::Text => Value::Text(String::new()),
            Self::Composite => match value.as_features() {
                Some(children) => Value::Composite(
                    children
                        .iter()
                        .map(|c| c.with_value(c.kind().drop_value(c.value())))
                        .collect(),
                ),
                None => Value::Missing,
            },
            Self::Undefined => Value::Missing,
        }
    }
}

/// Perturb a bounded number of features of `features`.
///
/// Between `min(noise_size, n/2)` (at least one) and `max(noise_size, n/2)`
/// features are replaced. Returns the perturbed copy and a mask that is
/// `true` where the original feature was preserved.
pub fn perturb_features(
    features: &[Feature],
    context: &PerturbationContext,
    rng: &mut StdRng,
) -> (Vec<Feature>, Vec<bool>) {
    let mut perturbed = features.to_vec();
    let mut preserved = vec![true; features.len()];
    if features.is_empty() {
        return (perturbed, preserved);
    }

    let half = features.len() / 2;
    let lower = context.noise_size.min(half).max(1);
    let upper = context.noise_size.max(half).min(features.len());
    let count = if upper > lower {
        rng.gen_range(lower..=upper)
    } else {
        lower.min(features.len())
    };

    for i in index::sample(rng, features.len(), count) {
        let feature = &features[i];
        perturbed[i] = feature.with_value(feature.kind().perturb(feature, rng));
        preserved[i] = false;
    }
    (perturbed, preserved)
}

/// Replace the value of every feature named `name` by its dropped form,
/// descending into composite features.
pub fn drop_feature(features: &[Feature], name: &str) -> Vec<Feature> {
    features
        .iter()
        .map(|feature| {
            if feature.name() == name {
                feature.with_value(feature.kind().drop_value(feature.value()))
            } else if let Some(children) = feature.value().as_features() {
                feature.with_value(Value::Composite(drop_feature(children, name)))
            } else {
                feature.clone()
            }
        })
        .collect()
}

//! Feature / value model consumed by the explainer.

pub mod feature;
pub mod perturbation;
pub mod prediction;
pub mod value;

pub use feature::{Feature, FeatureDomain, FeatureType, MAX_COMPOSITE_DEPTH, linearize_features};
pub use perturbation::{PerturbationContext, drop_feature, perturb_features};
pub use prediction::{
    FnPredictionProvider, Output, Prediction, PredictionInput, PredictionOutput,
    PredictionProvider,
};
pub use value::Value;

//! # shapwise-core: Kernel SHAP feature attribution
//!
//! Explains a single prediction of any black-box model by estimating Shapley
//! values over the model's input features, relative to a background dataset.
//!
//! ## Pipeline
//!
//! 1. **Validate** the explained input against the background (synchronous).
//! 2. **Sample** coalitions of varying features, exhaustively when the game is small.
//! 3. **Evaluate** each coalition against every background row, in concurrent batches.
//! 4. **Regress** each output under the efficiency constraint, with optional
//!    subset selection, and estimate confidence widths.
//! 5. **Assemble** per-output saliencies ending with the baseline entry.
//!
//! ```no_run
//! use std::sync::Arc;
//! use shapwise_core::{FnPredictionProvider, KernelShapExplainer, Output, Prediction,
//!     PredictionInput, PredictionOutput, ShapConfig};
//!
//! # async fn demo() -> Result<(), shapwise_core::ShapError> {
//! let model = Arc::new(FnPredictionProvider::new(|input: &PredictionInput| {
//!     let sum = input.features().iter().map(|f| f.value().as_number()).sum::<f64>();
//!     PredictionOutput::new(vec![Output::numerical("sum", sum)])
//! }));
//! let config = ShapConfig::builder()
//!     .background(vec![PredictionInput::from_numbers(&[0.0, 0.0, 0.0])])
//!     .build();
//! let input = PredictionInput::from_numbers(&[1.0, 2.0, 3.0]);
//! let prediction = Prediction::new(input, PredictionOutput::new(vec![Output::numerical("sum", 6.0)]));
//! let results = KernelShapExplainer::new(config).explain(&prediction, model)?.await?;
//! println!("{results}");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod model;
pub mod saliency;
pub mod shap;

// Re-exports
pub use config::{Link, Regularizer, ShapConfig, ShapConfigBuilder, ShapSettings};
pub use error::ShapError;
pub use model::{
    Feature, FeatureDomain, FeatureType, FnPredictionProvider, Output, PerturbationContext,
    Prediction, PredictionInput, PredictionOutput, PredictionProvider, Value,
};
pub use saliency::{FeatureImportance, Saliency, SaliencyResults};
pub use shap::{CounterfactualByproduct, KernelShapExplainer};

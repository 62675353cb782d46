//! Kernel SHAP: coalition sampling, batched evaluation, constrained
//! regression and confidence estimation.

pub mod coalition;
pub mod confidence;
pub mod counterfactual;
pub mod evaluator;
pub mod explainer;
pub mod kernel;
pub mod linalg;
pub mod sampler;
pub mod solver;
pub mod stats;

pub use coalition::{Coalition, SampledCoalition};
pub use counterfactual::{CounterfactualByproduct, CounterfactualTracker};
pub use explainer::{ExplanationFuture, KernelShapExplainer, Stage, varying_features};
pub use kernel::kernel_weight;
pub use sampler::{CoalitionPlan, CoalitionSampler, MAX_SAMPLES};
pub use solver::{Anchors, OutputSolution};
pub use stats::SufficientStats;

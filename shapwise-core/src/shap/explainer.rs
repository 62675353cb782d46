//! Kernel SHAP explainer.
//!
//! An explanation runs through `VALIDATING → SAMPLING → EVALUATING →
//! REGRESSING → ASSEMBLING → DONE`. Validation happens synchronously when the
//! explanation is requested; every later stage runs inside the returned future,
//! so model-dependent failures (arity mismatch, provider errors, interruption)
//! surface when the future is awaited.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

use futures::future::BoxFuture;
use tracing::{debug, info, warn};

use super::counterfactual::CounterfactualTracker;
use super::evaluator::{EvaluationJob, baseline, evaluate};
use super::sampler::CoalitionSampler;
use super::solver::{Anchors, solve_output};
use crate::config::ShapConfig;
use crate::error::ShapError;
use crate::model::{
    Feature, Prediction, PredictionInput, PredictionOutput, PredictionProvider,
    linearize_features,
};
use crate::saliency::{BACKGROUND, FeatureImportance, Saliency, SaliencyResults};

/// Source label attached to results.
pub const SOURCE: &str = "SHAP";

/// Pipeline stage of one explanation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validating,
    Sampling,
    Evaluating,
    Regressing,
    Assembling,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Validating => "validating",
            Self::Sampling => "sampling",
            Self::Evaluating => "evaluating",
            Self::Regressing => "regressing",
            Self::Assembling => "assembling",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Future resolving to the explanation of one prediction.
pub type ExplanationFuture = BoxFuture<'static, Result<SaliencyResults, ShapError>>;

/// A validated request, bound to the configuration captured at call start.
struct PreparedExplanation {
    config: Arc<ShapConfig>,
    instance: PredictionInput,
    background: Vec<PredictionInput>,
    output: PredictionOutput,
}

/// Kernel SHAP explainer over a swappable configuration.
///
/// Each call snapshots the current configuration; replacing it with
/// [`set_config`](Self::set_config) never affects explanations already started.
pub struct KernelShapExplainer {
    config: RwLock<Arc<ShapConfig>>,
}

impl KernelShapExplainer {
    pub fn new(config: ShapConfig) -> Self {
        Self {
            config: RwLock::new(Arc::new(config)),
        }
    }

    /// The configuration the next call will use.
    pub fn config(&self) -> Arc<ShapConfig> {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_config(&self, config: ShapConfig) {
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(config);
    }

    /// Validate the request, then return the future computing its explanation.
    ///
    /// Shape and configuration problems are reported here, before the model
    /// is ever called.
    pub fn explain(
        &self,
        prediction: &Prediction,
        model: Arc<dyn PredictionProvider>,
    ) -> Result<ExplanationFuture, ShapError> {
        let prepared = self.prepare(prediction)?;
        Ok(Box::pin(run(prepared, model)))
    }

    /// Explain and await the result, bounded by the configured timeout.
    pub async fn explain_with_timeout(
        &self,
        prediction: &Prediction,
        model: Arc<dyn PredictionProvider>,
    ) -> Result<SaliencyResults, ShapError> {
        let prepared = self.prepare(prediction)?;
        let limit = prepared.config.settings().timeout();
        match tokio::time::timeout(limit, run(prepared, model)).await {
            Ok(result) => result,
            Err(_) => Err(ShapError::Timeout(format!(
                "explanation did not finish within {}s",
                limit.as_secs()
            ))),
        }
    }

    fn prepare(&self, prediction: &Prediction) -> Result<PreparedExplanation, ShapError> {
        let config = self.config();
        debug!(stage = %Stage::Validating, "validating explanation request");
        config.validate()?;

        let instance = PredictionInput::new(linearize_features(prediction.input().features())?);
        let background = config
            .background()
            .iter()
            .map(|row| linearize_features(row.features()).map(PredictionInput::new))
            .collect::<Result<Vec<_>, _>>()?;

        for (i, row) in background.iter().enumerate() {
            if row.len() != instance.len() {
                return Err(ShapError::validation(format!(
                    "background row {i} has {} features but the explained input has {}",
                    row.len(),
                    instance.len()
                )));
            }
            let mismatch = row
                .features()
                .iter()
                .zip(instance.features())
                .find(|(b, x)| b.kind() != x.kind());
            if let Some((b, x)) = mismatch {
                return Err(ShapError::validation(format!(
                    "background row {i} feature '{}' is {} but the explained input has {}",
                    b.name(),
                    b.kind().as_str(),
                    x.kind().as_str()
                )));
            }
        }

        if prediction.output().is_empty() {
            return Err(ShapError::validation("the explained prediction has no outputs"));
        }

        Ok(PreparedExplanation {
            config,
            instance,
            background,
            output: prediction.output().clone(),
        })
    }
}

/// Columns whose value differs from the explained one in some background row.
pub fn varying_features(instance: &PredictionInput, background: &[PredictionInput]) -> Vec<usize> {
    (0..instance.len())
        .filter(|&j| {
            let value = instance.features()[j].value();
            background
                .iter()
                .any(|row| row.feature(j).map(Feature::value) != Some(value))
        })
        .collect()
}

fn enter(stage: &mut Stage, next: Stage) {
    debug!(from = %stage, to = %next, "explanation stage");
    *stage = next;
}

async fn run(
    prepared: PreparedExplanation,
    model: Arc<dyn PredictionProvider>,
) -> Result<SaliencyResults, ShapError> {
    let started = Instant::now();
    let mut stage = Stage::Validating;
    let result = pipeline(&mut stage, prepared, model).await;
    match &result {
        Ok(results) => info!(
            outputs = results.saliencies().len(),
            counterfactuals = results.available_cfs().len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "explanation complete"
        ),
        Err(e) => {
            warn!(stage = %stage, error = %e, "explanation failed");
            enter(&mut stage, Stage::Failed);
        }
    }
    result
}

async fn pipeline(
    stage: &mut Stage,
    prepared: PreparedExplanation,
    model: Arc<dyn PredictionProvider>,
) -> Result<SaliencyResults, ShapError> {
    let PreparedExplanation {
        config,
        instance,
        background,
        output,
    } = prepared;
    let link = config.link();
    let arity = output.len();

    enter(stage, Stage::Sampling);
    let players = varying_features(&instance, &background);
    let n_samples = config
        .n_samples()
        .unwrap_or_else(|| CoalitionSampler::default_samples(players.len()));
    let sampler = CoalitionSampler::new(players.len(), n_samples);
    let mut rng = config.perturbation().rng();
    let plan = tokio::task::spawn_blocking(move || sampler.plan(&mut rng)).await?;
    let coverage = plan.coverage;
    info!(
        features = instance.len(),
        players = players.len(),
        coalitions = plan.len(),
        background_rows = background.len(),
        exhaustive = plan.exhaustive,
        "explaining prediction"
    );

    enter(stage, Stage::Evaluating);
    let fnull = baseline(model.as_ref(), &background, arity, link).await?;
    let fx: Vec<f64> = output
        .to_numbers()
        .into_iter()
        .map(|v| link.apply(v))
        .collect();
    let tracker = if config.track_counterfactuals() {
        CounterfactualTracker::new(&output)
    } else {
        None
    };
    let job = EvaluationJob {
        instance: instance.clone(),
        background,
        players: players.clone(),
        coalitions: plan.coalitions,
        link,
        output_arity: arity,
        tracker,
    };
    let evaluation = evaluate(job, model, config.batch_count()).await?;

    enter(stage, Stage::Regressing);
    let anchors: Vec<Anchors> = fnull
        .iter()
        .zip(&fx)
        .map(|(&fnull, &fx)| Anchors { fnull, fx })
        .collect();
    let regularizer = config.regularizer();
    let level = config.confidence();
    let stats = evaluation.stats;
    let solutions = tokio::task::spawn_blocking(move || {
        anchors
            .iter()
            .enumerate()
            .map(|(o, anchors)| solve_output(&stats, o, *anchors, regularizer, coverage, level))
            .collect::<Vec<_>>()
    })
    .await?;

    enter(stage, Stage::Assembling);
    let mut player_of = vec![None; instance.len()];
    for (player, &column) in players.iter().enumerate() {
        player_of[column] = Some(player);
    }
    let saliencies = solutions
        .iter()
        .zip(output.outputs())
        .zip(&fnull)
        .map(|((solution, out), &base)| {
            let mut entries: Vec<FeatureImportance> = instance
                .features()
                .iter()
                .zip(&player_of)
                .map(|(feature, player)| match player {
                    Some(p) => FeatureImportance::new(
                        feature.clone(),
                        solution.attributions[*p],
                        solution.widths[*p],
                    ),
                    None => FeatureImportance::new(feature.clone(), 0.0, 0.0),
                })
                .collect();
            entries.push(FeatureImportance::new(
                Feature::numerical(BACKGROUND, base),
                base,
                0.0,
            ));
            Saliency::new(out.clone(), entries)
        })
        .collect();

    enter(stage, Stage::Done);
    Ok(SaliencyResults::new(
        saliencies,
        SOURCE,
        evaluation.counterfactuals,
    ))
}

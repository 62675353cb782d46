//! Batched model evaluation of coalitions.
//!
//! Every coalition is expanded against each background row: present players
//! keep the explained value, absent players take the background row's value.
//! The coalition's value is the link of the mean model output over those rows.
//! Coalitions are split into contiguous batches, each sent to the model as one
//! call on its own task. Finished batches wait in a reorder buffer so rows are
//! folded into the statistics in coalition order.

use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::debug;

use super::coalition::{Coalition, SampledCoalition};
use super::counterfactual::{CounterfactualByproduct, CounterfactualTracker};
use super::stats::SufficientStats;
use crate::config::Link;
use crate::error::ShapError;
use crate::model::{PredictionInput, PredictionOutput, PredictionProvider};

/// Everything a batch needs, shared read-only across tasks.
#[derive(Debug)]
pub struct EvaluationJob {
    pub instance: PredictionInput,
    pub background: Vec<PredictionInput>,
    /// Feature column of each player.
    pub players: Vec<usize>,
    pub coalitions: Vec<SampledCoalition>,
    pub link: Link,
    pub output_arity: usize,
    pub tracker: Option<CounterfactualTracker>,
}

/// Accumulated statistics plus any counterfactuals met on the way.
#[derive(Debug)]
pub struct Evaluation {
    pub stats: SufficientStats,
    pub counterfactuals: Vec<CounterfactualByproduct>,
}

#[derive(Debug)]
struct BatchOutcome {
    index: usize,
    values: Vec<Vec<f64>>,
    counterfactuals: Vec<CounterfactualByproduct>,
}

/// Check a model response against the inputs it was given.
pub fn check_outputs(
    outputs: &[PredictionOutput],
    inputs: usize,
    arity: usize,
) -> Result<(), ShapError> {
    if outputs.len() != inputs {
        return Err(ShapError::PredictionCount {
            expected: inputs,
            actual: outputs.len(),
        });
    }
    if let Some(bad) = outputs.iter().find(|o| o.len() != arity) {
        return Err(ShapError::OutputArity {
            expected: arity,
            actual: bad.len(),
        });
    }
    Ok(())
}

/// Link of the per-output mean over `outputs`.
pub fn linked_mean(outputs: &[PredictionOutput], arity: usize, link: Link) -> Vec<f64> {
    let count = outputs.len() as f64;
    (0..arity)
        .map(|o| {
            let sum: f64 = outputs
                .iter()
                .map(|out| out.outputs()[o].value().as_number())
                .sum();
            link.apply(sum / count)
        })
        .collect()
}

/// Link-space baseline: the model's mean output over the background.
pub async fn baseline(
    model: &dyn PredictionProvider,
    background: &[PredictionInput],
    arity: usize,
    link: Link,
) -> Result<Vec<f64>, ShapError> {
    let outputs = model.predict(background.to_vec()).await?;
    check_outputs(&outputs, background.len(), arity)?;
    Ok(linked_mean(&outputs, arity, link))
}

/// The input seen by the model for `coalition` against one background row.
pub fn masked_input(
    instance: &PredictionInput,
    background_row: &PredictionInput,
    players: &[usize],
    coalition: &Coalition,
) -> PredictionInput {
    let mut features = instance.features().to_vec();
    for (player, &column) in players.iter().enumerate() {
        if !coalition.contains(player) {
            if let Some(absent) = background_row.feature(column) {
                features[column] = features[column].with_value(absent.value().clone());
            }
        }
    }
    PredictionInput::new(features)
}

/// Contiguous ranges splitting `n` coalitions into at most `batch_count` batches.
pub fn batch_ranges(n: usize, batch_count: usize) -> Vec<Range<usize>> {
    if n == 0 {
        return Vec::new();
    }
    let count = batch_count.clamp(1, n);
    let (base, extra) = (n / count, n % count);
    let mut start = 0;
    (0..count)
        .map(|i| {
            let len = base + usize::from(i < extra);
            let range = start..start + len;
            start += len;
            range
        })
        .collect()
}

async fn run_batch(
    job: Arc<EvaluationJob>,
    model: Arc<dyn PredictionProvider>,
    index: usize,
    range: Range<usize>,
) -> Result<BatchOutcome, ShapError> {
    let rows = job.background.len();
    let mut inputs = Vec::with_capacity(range.len() * rows);
    for sampled in &job.coalitions[range.clone()] {
        for row in &job.background {
            inputs.push(masked_input(
                &job.instance,
                row,
                &job.players,
                &sampled.coalition,
            ));
        }
    }
    debug!(batch = index, coalitions = range.len(), inputs = inputs.len(), "evaluating batch");

    let kept_inputs = job.tracker.as_ref().map(|_| inputs.clone());
    let expected = inputs.len();
    let outputs = model.predict(inputs).await?;
    check_outputs(&outputs, expected, job.output_arity)?;

    let values = outputs
        .chunks(rows)
        .map(|chunk| linked_mean(chunk, job.output_arity, job.link))
        .collect();

    let mut counterfactuals = Vec::new();
    if let (Some(tracker), Some(kept_inputs)) = (job.tracker.as_ref(), kept_inputs) {
        for (input, output) in kept_inputs.into_iter().zip(outputs) {
            if tracker.is_counterfactual(&output) {
                counterfactuals.push(CounterfactualByproduct { input, output });
            }
        }
    }

    Ok(BatchOutcome {
        index,
        values,
        counterfactuals,
    })
}

/// Evaluate every coalition of `job` on `model` across `batch_count` concurrent calls.
pub async fn evaluate(
    job: EvaluationJob,
    model: Arc<dyn PredictionProvider>,
    batch_count: usize,
) -> Result<Evaluation, ShapError> {
    let job = Arc::new(job);
    let ranges = batch_ranges(job.coalitions.len(), batch_count);
    let mut stats = SufficientStats::new(job.players.len(), job.output_arity);
    let mut counterfactuals = Vec::new();

    let mut tasks = JoinSet::new();
    for (index, range) in ranges.iter().cloned().enumerate() {
        tasks.spawn(run_batch(job.clone(), model.clone(), index, range));
    }

    let mut pending: BTreeMap<usize, BatchOutcome> = BTreeMap::new();
    let mut next = 0;
    while let Some(joined) = tasks.join_next().await {
        let outcome = joined??;
        pending.insert(outcome.index, outcome);
        while let Some(outcome) = pending.remove(&next) {
            let sampled = &job.coalitions[ranges[next].clone()];
            for (coalition, values) in sampled.iter().zip(&outcome.values) {
                stats.add_row(&coalition.coalition, coalition.weight, values);
            }
            counterfactuals.extend(outcome.counterfactuals);
            next += 1;
        }
    }

    debug!(
        rows = stats.rows(),
        batches = ranges.len(),
        counterfactuals = counterfactuals.len(),
        "evaluation complete"
    );
    Ok(Evaluation {
        stats,
        counterfactuals,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FnPredictionProvider, Output};

    fn sum_model() -> Arc<dyn PredictionProvider> {
        Arc::new(FnPredictionProvider::new(|input: &PredictionInput| {
            let sum: f64 = input.features().iter().map(|f| f.value().as_number()).sum();
            PredictionOutput::new(vec![Output::numerical("sum", sum)])
        }))
    }

    #[test]
    fn test_batch_ranges() {
        assert_eq!(batch_ranges(10, 3), vec![0..4, 4..7, 7..10]);
        assert_eq!(batch_ranges(2, 20), vec![0..1, 1..2]);
        assert_eq!(batch_ranges(5, 1), vec![0..5]);
        assert!(batch_ranges(0, 4).is_empty());
    }

    #[test]
    fn test_masked_input_takes_absent_values_from_background() {
        let instance = PredictionInput::from_numbers(&[1.0, 2.0, 3.0]);
        let row = PredictionInput::from_numbers(&[10.0, 20.0, 30.0]);
        // columns 0 and 2 are players; column 1 never varies
        let masked = masked_input(&instance, &row, &[0, 2], &Coalition::from_indices(2, &[1]));
        let values: Vec<f64> = masked.features().iter().map(|f| f.value().as_number()).collect();
        assert_eq!(values, vec![10.0, 2.0, 3.0]);
        assert_eq!(masked.features()[0].name(), "f0");
    }

    #[test]
    fn test_check_outputs() {
        let outputs = vec![PredictionOutput::new(vec![Output::numerical("a", 1.0)])];
        assert!(check_outputs(&outputs, 1, 1).is_ok());
        assert!(matches!(
            check_outputs(&outputs, 1, 2),
            Err(ShapError::OutputArity { expected: 2, actual: 1 })
        ));
        assert!(matches!(
            check_outputs(&outputs, 3, 1),
            Err(ShapError::PredictionCount { .. })
        ));
    }

    #[tokio::test]
    async fn test_batching_does_not_change_statistics() {
        let instance = PredictionInput::from_numbers(&[1.0, 2.0, 3.0]);
        let background = vec![
            PredictionInput::from_numbers(&[0.0, 0.0, 0.0]),
            PredictionInput::from_numbers(&[2.0, 1.0, 5.0]),
        ];
        let coalitions: Vec<SampledCoalition> = (1..7u32)
            .map(|bits| {
                let present: Vec<usize> = (0..3).filter(|i| bits & (1 << i) != 0).collect();
                SampledCoalition::new(Coalition::from_indices(3, &present), f64::from(bits))
            })
            .collect();
        let job = |tracker| EvaluationJob {
            instance: instance.clone(),
            background: background.clone(),
            players: vec![0, 1, 2],
            coalitions: coalitions.clone(),
            link: Link::Identity,
            output_arity: 1,
            tracker,
        };

        let single = evaluate(job(None), sum_model(), 1).await.unwrap();
        let many = evaluate(job(None), sum_model(), 4).await.unwrap();
        assert_eq!(single.stats, many.stats);
        assert_eq!(single.stats.rows(), 6);
        assert!(single.counterfactuals.is_empty());

        let explained = PredictionOutput::new(vec![Output::numerical("sum", 6.0)]);
        let tracked = evaluate(job(CounterfactualTracker::new(&explained)), sum_model(), 3)
            .await
            .unwrap();
        assert_eq!(tracked.stats, single.stats);
        assert!(!tracked.counterfactuals.is_empty());
    }

    #[tokio::test]
    async fn test_baseline_rejects_wrong_arity() {
        let background = vec![PredictionInput::from_numbers(&[1.0, 2.0])];
        let err = baseline(sum_model().as_ref(), &background, 2, Link::Identity)
            .await
            .unwrap_err();
        assert!(matches!(err, ShapError::OutputArity { expected: 2, actual: 1 }));

        let mean = baseline(sum_model().as_ref(), &background, 1, Link::Identity)
            .await
            .unwrap();
        assert_eq!(mean, vec![3.0]);
    }
}

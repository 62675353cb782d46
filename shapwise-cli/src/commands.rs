//! CLI subcommand handlers.

use std::path::Path;
use std::sync::Arc;

use shapwise_core::{KernelShapExplainer, Link, Regularizer, ShapConfig, ShapSettings};

use crate::job::ExplanationJob;
use crate::{Commands, SettingsArgs};

/// Handle a CLI subcommand.
pub async fn handle_command(command: Commands, settings: ShapSettings) -> anyhow::Result<()> {
    match command {
        Commands::Explain {
            job,
            overrides,
            json,
        } => {
            let settings = apply_overrides(settings, &overrides)?;
            handle_explain(&job, settings, json).await
        }
        Commands::Config { overrides } => {
            let settings = apply_overrides(settings, &overrides)?;
            let toml_str = toml::to_string_pretty(&settings)?;
            println!("{}", toml_str);
            Ok(())
        }
    }
}

fn apply_overrides(mut settings: ShapSettings, args: &SettingsArgs) -> anyhow::Result<ShapSettings> {
    if let Some(link) = &args.link {
        settings.link = link.parse::<Link>()?;
    }
    if let Some(samples) = args.samples {
        settings.n_samples = Some(samples);
    }
    if let Some(regularizer) = &args.regularizer {
        settings.regularizer = regularizer.parse::<Regularizer>()?;
    }
    if let Some(confidence) = args.confidence {
        settings.confidence = confidence;
    }
    if let Some(batches) = args.batches {
        settings.batch_count = batches;
    }
    if let Some(seed) = args.seed {
        settings.perturbation.seed = seed;
    }
    if args.counterfactuals {
        settings.track_counterfactuals = true;
    }
    if let Some(timeout) = args.timeout {
        settings.timeout_secs = timeout;
    }
    settings.validate()?;
    Ok(settings)
}

async fn handle_explain(path: &Path, settings: ShapSettings, json: bool) -> anyhow::Result<()> {
    let job = ExplanationJob::load(path)?;
    tracing::info!(
        job = %path.display(),
        features = job.instance.len(),
        background_rows = job.background.len(),
        "loaded explanation job"
    );

    let explainer = KernelShapExplainer::new(ShapConfig::new(settings, job.background()));
    let results = explainer
        .explain_with_timeout(&job.prediction(), Arc::new(job.model()))
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        print!("{}", results);
        if !results.available_cfs().is_empty() {
            println!("{} counterfactual inputs found", results.available_cfs().len());
        }
    }
    Ok(())
}

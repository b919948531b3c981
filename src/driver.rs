use anyhow::{Context, Result};

use crate::bart::BartModel;
use crate::config::ScoringConfig;
use crate::dataset::Dataset;
use crate::model::MaskedSpanModel;
use crate::output::write_posteriors;
use crate::score::score_example;

const PROGRESS_EVERY: usize = 100;

/// Scores every example in order. The first failure aborts the whole batch.
pub fn score_dataset<M: MaskedSpanModel + ?Sized>(
    model: &M,
    dataset: &Dataset,
) -> Result<Vec<Vec<f64>>> {
    let total = dataset.len();
    let mut posteriors = Vec::with_capacity(total);

    for (idx, example) in dataset.examples().iter().enumerate() {
        let result = score_example(model, example)
            .with_context(|| format!("Failed to score example {idx}"))?;
        if idx == 0 {
            println!("- first output: {:?}", result);
        }
        posteriors.push(result);

        if (idx + 1) % PROGRESS_EVERY == 0 || idx + 1 == total {
            tracing::info!("Scored {}/{} examples", idx + 1, total);
        }
    }
    Ok(posteriors)
}

/// Loads the inputs, then the model, scores everything and writes the
/// results. Nothing is written unless every example scored.
pub fn run(config: &ScoringConfig) -> Result<()> {
    let dataset = Dataset::load(&config.source_path, &config.target_path, &config.ent_path)
        .context("Failed to load input data")?;
    tracing::info!(
        "Loaded {} samples ({} entities)",
        dataset.len(),
        dataset.entity_count()
    );

    let model = BartModel::load(&config.model_options()).context("Failed to load BART model")?;

    let posteriors = score_dataset(&model, &dataset)?;

    write_posteriors(&config.output_path, config.format, &posteriors).with_context(|| {
        format!(
            "Failed to write posteriors to '{}'",
            config.output_path.display()
        )
    })?;
    Ok(())
}

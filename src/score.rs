use crate::dataset::Example;
use crate::entities::Entity;
use crate::error::Result;
use crate::mask::MaskedHypothesis;
use crate::model::MaskedSpanModel;

/// Posterior given to an example with nothing to score.
pub const NO_ENTITY_POSTERIOR: f64 = 1.0;

pub fn score_entity<M: MaskedSpanModel + ?Sized>(
    model: &M,
    source: &str,
    target: &str,
    entity: &Entity,
) -> Result<f64> {
    let hypothesis = MaskedHypothesis::build(target, source, entity)?;
    let posterior = model.masked_span_probability(
        &hypothesis.prefixed_target,
        &hypothesis.masked_input,
        hypothesis.span,
        &hypothesis.entity_text,
    )?;
    tracing::debug!(
        "{:?} [{}, {}) -> {:.6}",
        hypothesis.entity_text,
        entity.start,
        entity.end,
        posterior
    );
    Ok(posterior)
}

/// One posterior per entity, in entity order, or `[1.0]` when there are none.
pub fn score_example<M: MaskedSpanModel + ?Sized>(model: &M, example: &Example) -> Result<Vec<f64>> {
    if example.entities.is_empty() {
        return Ok(vec![NO_ENTITY_POSTERIOR]);
    }

    let mut posteriors = Vec::with_capacity(example.entities.len());
    for entity in &example.entities {
        posteriors.push(score_entity(model, &example.source, &example.target, entity)?);
    }
    Ok(posteriors)
}

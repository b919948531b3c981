use crate::entities::Entity;
use crate::error::{PosteriorError, Result};
use crate::utils::{char_len, char_slice};

/// Stands in for the hidden entity in the masked target.
pub const MASK_TOKEN: &str = "###";
/// Start marker prepended to both masked and unmasked targets.
pub const BOS_PREFIX: &str = "<s> ";
/// Separates the masked target from the source in the encoder input.
pub const SOURCE_SEPARATOR: &str = " <\\s> ";
/// Character length of `BOS_PREFIX`; every span is shifted by it.
pub const SPAN_SHIFT: usize = 4;

/// Everything the model needs to score one entity of one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskedHypothesis {
    /// `<s> ` + masked target + ` <\s> ` + source.
    pub masked_input: String,
    /// `<s> ` + unmasked target.
    pub prefixed_target: String,
    /// Entity span in `prefixed_target`, character offsets.
    pub span: (usize, usize),
    pub entity_text: String,
}

impl MaskedHypothesis {
    pub fn build(target: &str, source: &str, entity: &Entity) -> Result<Self> {
        let (start, end) = (entity.start, entity.end);
        let entity_text = char_slice(target, start, end).ok_or_else(|| {
            PosteriorError::InvalidSpan {
                start,
                end,
                reason: format!("target has only {} characters", char_len(target)),
            }
        })?;

        // Only checks that the slice occurs somewhere in the target, not that
        // it sits at [start, end)
        if entity_text.is_empty() || !target.contains(entity_text) {
            return Err(PosteriorError::EntityNotInTarget {
                entity: entity_text.to_string(),
                target: target.to_string(),
            });
        }

        // char_slice succeeded above, so both prefixes exist
        let before = char_slice(target, 0, start).unwrap_or_default();
        let after = char_slice(target, end, char_len(target)).unwrap_or_default();

        let mut masked_input = String::with_capacity(
            BOS_PREFIX.len() + target.len() + SOURCE_SEPARATOR.len() + source.len(),
        );
        masked_input.push_str(BOS_PREFIX);
        masked_input.push_str(before);
        masked_input.push_str(MASK_TOKEN);
        masked_input.push_str(after);
        masked_input.push_str(SOURCE_SEPARATOR);
        masked_input.push_str(source);

        Ok(Self {
            masked_input,
            prefixed_target: format!("{BOS_PREFIX}{target}"),
            span: (start + SPAN_SHIFT, end + SPAN_SHIFT),
            entity_text: entity_text.to_string(),
        })
    }
}

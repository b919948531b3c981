use crate::error::{PosteriorError, Result};
use crate::utils::char_slice;

/// Picks the tokens covering the character span `[start, end)` of `text`.
///
/// `offsets` are per-token character offsets into `text`. A token is taken
/// when it overlaps the span; zero-width tokens never are. The last token
/// taken must end exactly where the span ends, and the text those tokens
/// cover must contain `entity`.
pub fn span_token_indices(
    text: &str,
    offsets: &[(usize, usize)],
    span: (usize, usize),
    entity: &str,
) -> Result<Vec<usize>> {
    let (start, end) = span;
    let misaligned = || PosteriorError::SpanAlignment {
        start,
        end,
        text: text.to_string(),
    };

    let indices: Vec<usize> = offsets
        .iter()
        .enumerate()
        .filter(|(_, &(tok_start, tok_end))| tok_end > tok_start)
        .filter(|(_, &(tok_start, tok_end))| tok_end > start && tok_start < end)
        .map(|(idx, _)| idx)
        .collect();

    let (first, last) = match (indices.first(), indices.last()) {
        (Some(&first), Some(&last)) => (first, last),
        _ => return Err(misaligned()),
    };
    if offsets[last].1 != end {
        return Err(misaligned());
    }

    // The first token may begin before the span (e.g. a leading space merged
    // into the word piece), so check containment rather than equality
    let covered = char_slice(text, offsets[first].0, offsets[last].1).ok_or_else(misaligned)?;
    if !covered.contains(entity) {
        return Err(PosteriorError::EntityNotInTarget {
            entity: entity.to_string(),
            target: covered.to_string(),
        });
    }
    Ok(indices)
}

/// Joint probability of the selected tokens.
pub fn span_probability(token_probs: &[f64], indices: &[usize]) -> Result<f64> {
    let mut prob = 1.0;
    for &idx in indices {
        let p = token_probs.get(idx).ok_or_else(|| {
            PosteriorError::Inference(format!(
                "no probability for token {idx} ({} scored)",
                token_probs.len()
            ))
        })?;
        prob *= p;
    }
    Ok(prob)
}

use crate::error::Result;

/// A pretrained conditional masked language model, used as a black box.
///
/// Implementations own tokenization, the forward pass and normalization. The
/// handle is read-only: scoring takes `&self` and is passed explicitly to
/// whoever needs it.
pub trait MaskedSpanModel {
    /// Probability that the tokens at `span` (character offsets into
    /// `target`) spell `entity`, given `masked_input` as the conditioning
    /// sequence and the rest of `target` as the decoded prefix.
    fn masked_span_probability(
        &self,
        target: &str,
        masked_input: &str,
        span: (usize, usize),
        entity: &str,
    ) -> Result<f64>;
}

use std::path::{Path, PathBuf};

use tch::{no_grad_guard, CModule, Device, IValue, Kind, NoGradGuard, Tensor};
use tokenizers::{Encoding, Tokenizer};

use crate::error::{PosteriorError, Result};
use crate::model::MaskedSpanModel;
use crate::span::{span_probability, span_token_indices};

pub const DEFAULT_MAX_SOURCE_POSITIONS: usize = 1024;

/// Where to find the exported model and how to place it.
#[derive(Debug, Clone)]
pub struct ModelOptions {
    /// TorchScript export of a BART conditional-generation model.
    pub checkpoint: PathBuf,
    /// `tokenizer.json` matching the checkpoint's vocabulary.
    pub tokenizer: PathBuf,
    pub device: Device,
    pub fp16: bool,
    pub max_source_positions: usize,
}

#[derive(Debug, Clone, Copy)]
struct SpecialTokens {
    bos: i64,
    eos: i64,
}

/// A BART model scored with teacher forcing: the encoder sees the masked
/// hypothesis plus source, the decoder is fed the unmasked target, and each
/// target token's probability is read off the output distribution.
pub struct BartModel {
    model: CModule,
    tokenizer: Tokenizer,
    device: Device,
    special: SpecialTokens,
    max_source_positions: usize,
    _guard: NoGradGuard,
}

impl BartModel {
    pub fn load(options: &ModelOptions) -> Result<Self> {
        if options.max_source_positions < 2 {
            return Err(PosteriorError::ModelLoad(format!(
                "max_source_positions must leave room for <s> and </s>, got {}",
                options.max_source_positions
            )));
        }
        let tokenizer = load_tokenizer(&options.tokenizer)?;
        let special = SpecialTokens {
            bos: special_token_id(&tokenizer, "<s>")?,
            eos: special_token_id(&tokenizer, "</s>")?,
        };

        if !options.checkpoint.is_file() {
            return Err(PosteriorError::ModelLoad(format!(
                "checkpoint '{}' does not exist",
                options.checkpoint.display()
            )));
        }
        let mut model = CModule::load_on_device(&options.checkpoint, options.device).map_err(|e| {
            PosteriorError::ModelLoad(format!(
                "cannot load TorchScript module '{}': {e}",
                options.checkpoint.display()
            ))
        })?;
        model.set_eval();

        // Half precision is the CUDA default; CPU kernels stay in f32
        let kind = if options.fp16 && options.device.is_cuda() {
            model.to(options.device, Kind::Half, false);
            Kind::Half
        } else {
            Kind::Float
        };

        tracing::info!(
            "Model loaded from {} on {:?} ({:?})",
            options.checkpoint.display(),
            options.device,
            kind
        );

        Ok(Self {
            model,
            tokenizer,
            device: options.device,
            special,
            max_source_positions: options.max_source_positions,
            _guard: no_grad_guard(),
        })
    }

    fn to_input(&self, ids: &[i64]) -> Result<Tensor> {
        Ok(Tensor::f_from_slice(ids)?.unsqueeze(0).to_device(self.device))
    }

    /// Probability of every target token given the conditioning input.
    /// `target_ids` must already end with `</s>`.
    pub fn target_token_probabilities(
        &self,
        masked_input: &str,
        target_ids: &[i64],
    ) -> Result<Vec<f64>> {
        let source_ids = encode_source(
            &self.tokenizer,
            self.special,
            masked_input,
            self.max_source_positions,
        )?;
        let decoder_ids = shift_tokens_right(target_ids, self.special.eos);

        let input_ids = self.to_input(&source_ids)?;
        let attention_mask = input_ids.ones_like();
        let decoder_input_ids = self.to_input(&decoder_ids)?;

        let output = self
            .model
            .forward_is(&[
                IValue::from(input_ids),
                IValue::from(attention_mask),
                IValue::from(decoder_input_ids),
            ])
            .map_err(|e| PosteriorError::Inference(format!("forward pass failed: {e}")))?;

        let logits = logits_from_output(output)?;
        let targets = self.to_input(target_ids)?;
        target_probabilities(&logits, &targets)
    }
}

impl MaskedSpanModel for BartModel {
    fn masked_span_probability(
        &self,
        target: &str,
        masked_input: &str,
        span: (usize, usize),
        entity: &str,
    ) -> Result<f64> {
        let (target_ids, encoded_target) = encode_target(&self.tokenizer, self.special, target)?;

        let indices = span_token_indices(target, encoded_target.get_offsets(), span, entity)?;
        let probs = self.target_token_probabilities(masked_input, &target_ids)?;
        span_probability(&probs, &indices)
    }
}

fn load_tokenizer(path: &Path) -> Result<Tokenizer> {
    if !path.is_file() {
        return Err(PosteriorError::TokenizerNotFound(path.display().to_string()));
    }
    Tokenizer::from_file(path).map_err(|e| {
        PosteriorError::ModelLoad(format!("cannot load tokenizer '{}': {e}", path.display()))
    })
}

fn special_token_id(tokenizer: &Tokenizer, token: &str) -> Result<i64> {
    tokenizer
        .token_to_id(token)
        .map(i64::from)
        .ok_or_else(|| PosteriorError::ModelLoad(format!("tokenizer has no {token} token")))
}

fn encode(tokenizer: &Tokenizer, text: &str) -> Result<Encoding> {
    // Special tokens are placed by hand so the layout does not depend on
    // the post-processor configured in tokenizer.json
    tokenizer
        .encode_char_offsets(text, false)
        .map_err(|e| PosteriorError::Tokenization(e.to_string()))
}

/// Encoder ids for the masked input, wrapped in a single `<s>` ... `</s>`.
fn encode_source(
    tokenizer: &Tokenizer,
    special: SpecialTokens,
    masked_input: &str,
    max_len: usize,
) -> Result<Vec<i64>> {
    let encoded = encode(tokenizer, masked_input)?;
    Ok(build_source_ids(encoded.get_ids(), special.bos, special.eos, max_len))
}

/// Target ids (the leading `<s>` text already is the start token) followed
/// by `</s>`, plus the encoding whose offsets index the target text.
fn encode_target(
    tokenizer: &Tokenizer,
    special: SpecialTokens,
    target: &str,
) -> Result<(Vec<i64>, Encoding)> {
    let encoded = encode(tokenizer, target)?;
    let mut ids: Vec<i64> = encoded.get_ids().iter().map(|&id| id as i64).collect();
    ids.push(special.eos);
    Ok((ids, encoded))
}

/// `<s>` + body + `</s>`, with the body cut so the whole fits in `max_len`.
/// A body that already opens with `<s>` (the masked input starts with the
/// marker text) keeps that one instead of getting a second.
fn build_source_ids(body: &[u32], bos: i64, eos: i64, max_len: usize) -> Vec<i64> {
    let body = match body.first() {
        Some(&first) if i64::from(first) == bos => &body[1..],
        _ => body,
    };
    let keep = body.len().min(max_len.saturating_sub(2));
    let mut ids = Vec::with_capacity(keep + 2);
    ids.push(bos);
    ids.extend(body[..keep].iter().map(|&id| id as i64));
    ids.push(eos);
    ids
}

/// Decoder input for teacher forcing: the target moved one step right, with
/// `start` in front and the final token dropped.
fn shift_tokens_right(target_ids: &[i64], start: i64) -> Vec<i64> {
    let mut shifted = Vec::with_capacity(target_ids.len());
    shifted.push(start);
    if let Some((_, head)) = target_ids.split_last() {
        shifted.extend_from_slice(head);
    }
    shifted
}

/// Traced BART modules return either the logits or a tuple led by them.
fn logits_from_output(output: IValue) -> Result<Tensor> {
    match output {
        IValue::Tensor(logits) => Ok(logits),
        IValue::Tuple(values) | IValue::GenericList(values) => match values.into_iter().next() {
            Some(IValue::Tensor(logits)) => Ok(logits),
            _ => Err(PosteriorError::Inference(
                "expected logits tensor as first output".into(),
            )),
        },
        IValue::TensorList(tensors) => tensors.into_iter().next().ok_or_else(|| {
            PosteriorError::Inference("model returned an empty tensor list".into())
        }),
        _ => Err(PosteriorError::Inference(
            "model output is not a tensor".into(),
        )),
    }
}

/// Softmax over the vocabulary, read at the target ids.
///
/// `logits` is `[1, seq_len, vocab]` and `targets` is `[1, seq_len]`. The
/// result has one probability per target position.
fn target_probabilities(logits: &Tensor, targets: &Tensor) -> Result<Vec<f64>> {
    let logits_size = logits.size();
    let targets_size = targets.size();
    if logits_size.len() != 3 || logits_size[..2] != targets_size[..] {
        return Err(PosteriorError::Inference(format!(
            "logits shape {logits_size:?} does not match targets shape {targets_size:?}"
        )));
    }

    // Half precision logits lose too much in the softmax, go through f32
    let log_probs = logits.to_kind(Kind::Float).f_log_softmax(-1, Kind::Float)?;
    let picked = log_probs
        .f_gather(-1, &targets.unsqueeze(-1), false)?
        .squeeze_dim(-1)
        .squeeze_dim(0)
        .exp()
        .to_kind(Kind::Double)
        .to_device(Device::Cpu);

    Ok(Vec::<f64>::try_from(&picked)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close_enough(a: f64, b: f64, eps: f64) -> bool {
        (a - b).abs() < eps
    }

    #[test]
    fn test_shift_tokens_right() {
        assert_eq!(shift_tokens_right(&[0, 10, 11, 2], 2), vec![2, 0, 10, 11]);
        assert_eq!(shift_tokens_right(&[2], 2), vec![2]);
        assert_eq!(shift_tokens_right(&[], 2), vec![2]);
    }

    #[test]
    fn test_build_source_ids_wraps_body() {
        assert_eq!(build_source_ids(&[5, 6, 7], 0, 2, 1024), vec![0, 5, 6, 7, 2]);
    }

    #[test]
    fn test_build_source_ids_truncates_keeping_eos() {
        let body: Vec<u32> = (10..20).collect();
        let ids = build_source_ids(&body, 0, 2, 6);
        assert_eq!(ids, vec![0, 10, 11, 12, 13, 2]);
    }

    #[test]
    fn test_build_source_ids_keeps_single_leading_bos() {
        assert_eq!(build_source_ids(&[0, 5, 6], 0, 2, 1024), vec![0, 5, 6, 2]);
        // A <s> later in the body is ordinary content
        assert_eq!(build_source_ids(&[5, 0, 6], 0, 2, 1024), vec![0, 5, 0, 6, 2]);
    }

    // WordLevel tokenizer with BART's special token layout
    fn word_level_tokenizer() -> Tokenizer {
        let special = |id: u32, content: &str| {
            format!(
                r#"{{"id": {id}, "content": "{content}", "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true}}"#
            )
        };
        let json = format!(
            r####"{{
                "version": "1.0",
                "truncation": null,
                "padding": null,
                "added_tokens": [{}, {}],
                "normalizer": null,
                "pre_tokenizer": {{"type": "WhitespaceSplit"}},
                "post_processor": null,
                "decoder": null,
                "model": {{
                    "type": "WordLevel",
                    "vocab": {{"<s>": 0, "<unk>": 1, "</s>": 2, "a": 3, "###": 4, "slept": 5,
                               "<\\s>": 6, "the": 7, "cat": 8, "sat": 9}},
                    "unk_token": "<unk>"
                }}
            }}"####,
            special(0, "<s>"),
            special(2, "</s>")
        );
        json.parse::<Tokenizer>().unwrap()
    }

    const SPECIAL: SpecialTokens = SpecialTokens { bos: 0, eos: 2 };

    #[test]
    fn test_encoder_input_has_one_bos() {
        let tokenizer = word_level_tokenizer();
        let ids = encode_source(&tokenizer, SPECIAL, "<s> a ### slept <\\s> the cat sat", 1024).unwrap();

        assert_eq!(ids, vec![0, 3, 4, 5, 6, 7, 8, 9, 2]);
        assert_eq!(ids.iter().filter(|&&id| id == SPECIAL.bos).count(), 1);
    }

    #[test]
    fn test_target_has_one_bos_and_aligns_span() {
        let tokenizer = word_level_tokenizer();
        let (ids, encoded) = encode_target(&tokenizer, SPECIAL, "<s> a cat slept").unwrap();

        assert_eq!(ids, vec![0, 3, 8, 5, 2]);
        assert_eq!(ids.iter().filter(|&&id| id == SPECIAL.bos).count(), 1);

        let indices =
            span_token_indices("<s> a cat slept", encoded.get_offsets(), (6, 9), "cat").unwrap();
        assert_eq!(indices, vec![2]);
    }

    #[test]
    fn test_uniform_logits_give_uniform_probabilities() {
        let logits = Tensor::zeros([1, 3, 4], (Kind::Float, Device::Cpu));
        let targets = Tensor::from_slice(&[0i64, 1, 3]).unsqueeze(0);

        let probs = target_probabilities(&logits, &targets).unwrap();
        assert_eq!(probs.len(), 3);
        for p in probs {
            assert!(close_enough(p, 0.25, 1e-6), "Expected 0.25, got {}", p);
        }
    }

    #[test]
    fn test_probabilities_follow_softmax() {
        // softmax([0, ln 3]) = [0.25, 0.75]
        let logits = Tensor::from_slice(&[0f32, 3f32.ln(), 3f32.ln(), 0f32]).reshape([1, 2, 2]);
        let targets = Tensor::from_slice(&[1i64, 1]).unsqueeze(0);

        let probs = target_probabilities(&logits, &targets).unwrap();
        assert!(close_enough(probs[0], 0.75, 1e-6), "Expected 0.75, got {}", probs[0]);
        assert!(close_enough(probs[1], 0.25, 1e-6), "Expected 0.25, got {}", probs[1]);
    }

    #[test]
    fn test_half_precision_logits() {
        let logits = Tensor::zeros([1, 2, 8], (Kind::Half, Device::Cpu));
        let targets = Tensor::from_slice(&[3i64, 7]).unsqueeze(0);

        let probs = target_probabilities(&logits, &targets).unwrap();
        assert!(probs.iter().all(|p| close_enough(*p, 0.125, 1e-4)));
    }

    #[test]
    fn test_mismatched_shapes_are_rejected() {
        let logits = Tensor::zeros([1, 3, 4], (Kind::Float, Device::Cpu));
        let targets = Tensor::from_slice(&[0i64, 1]).unsqueeze(0);
        assert!(target_probabilities(&logits, &targets).is_err());
    }

    #[test]
    fn test_logits_from_tuple_output() {
        let logits = Tensor::zeros([1, 2, 3], (Kind::Float, Device::Cpu));
        let output = IValue::Tuple(vec![IValue::Tensor(logits), IValue::Int(7)]);
        let extracted = logits_from_output(output).unwrap();
        assert_eq!(extracted.size(), vec![1, 2, 3]);

        assert!(logits_from_output(IValue::Int(3)).is_err());
        assert!(logits_from_output(IValue::Tuple(vec![])).is_err());
    }

    #[test]
    fn test_load_missing_tokenizer() {
        let dir = tempfile::tempdir().unwrap();
        let options = ModelOptions {
            checkpoint: dir.path().join("checkpoint_best.pt"),
            tokenizer: dir.path().join("tokenizer.json"),
            device: Device::Cpu,
            fp16: false,
            max_source_positions: DEFAULT_MAX_SOURCE_POSITIONS,
        };
        match BartModel::load(&options) {
            Err(PosteriorError::TokenizerNotFound(path)) => assert!(path.ends_with("tokenizer.json")),
            Err(other) => panic!("Expected TokenizerNotFound, got {other}"),
            Ok(_) => panic!("Expected load to fail"),
        }
    }
}

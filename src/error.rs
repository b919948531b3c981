use thiserror::Error;

#[derive(Error, Debug)]
pub enum PosteriorError {
    // Input data
    #[error(
        "Input length mismatch: {sources} sources, {targets} targets, {entities} entity records"
    )]
    LengthMismatch {
        sources: usize,
        targets: usize,
        entities: usize,
    },

    #[error("Entity document error: {0}")]
    EntityDocument(String),

    #[error("Invalid entity span [{start}, {end}): {reason}")]
    InvalidSpan {
        start: usize,
        end: usize,
        reason: String,
    },

    #[error("Entity {entity:?} not found in target {target:?}")]
    EntityNotInTarget { entity: String, target: String },

    // Model loading
    #[error("Model load failed: {0}")]
    ModelLoad(String),

    #[error("Tokenizer not found: {0}")]
    TokenizerNotFound(String),

    // Inference
    #[error("Tokenization failed: {0}")]
    Tokenization(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Span [{start}, {end}) does not align with token boundaries of {text:?}")]
    SpanAlignment {
        start: usize,
        end: usize,
        text: String,
    },

    // Results
    #[error("Serialization failed: {0}")]
    Serialize(String),

    // Pass-through from dependencies
    #[error(transparent)]
    Torch(#[from] tch::TchError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PosteriorError>;

impl From<pyo3::PyErr> for PosteriorError {
    fn from(value: pyo3::PyErr) -> Self {
        PosteriorError::Serialize(value.to_string())
    }
}

//! Entity posterior scoring for generated summaries.
//!
//! Each entity of a summary is masked in turn, and a pretrained BART model
//! is asked how probable the original entity tokens are given the masked
//! summary and its source document.

pub mod bart;
pub mod config;
pub mod dataset;
pub mod driver;
pub mod entities;
pub mod error;
pub mod mask;
pub mod model;
pub mod output;
pub mod score;
pub mod span;
pub mod utils;

pub use bart::{BartModel, ModelOptions};
pub use config::ScoringConfig;
pub use dataset::{Dataset, Example};
pub use entities::Entity;
pub use error::{PosteriorError, Result};
pub use mask::MaskedHypothesis;
pub use model::MaskedSpanModel;
pub use output::OutputFormat;

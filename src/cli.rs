use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use entity_posterior::bart::DEFAULT_MAX_SOURCE_POSITIONS;
use entity_posterior::config::{ScoringConfig, DEFAULT_CHECKPOINT_FILE};
use entity_posterior::output::{OutputFormat, DEFAULT_OUTPUT};

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatArg {
    /// Python pickle, loadable with `pickle.load`
    Pickle,
    /// JSON array of arrays
    Json,
}

/// Scores the entities of generated summaries with a BART model's posterior
/// probability of each masked entity span.
#[derive(Parser, Debug)]
#[command(name = "entity-posterior", version)]
pub struct Args {
    /// Source documents, one per line
    #[arg(long = "source_path")]
    pub source_path: PathBuf,

    /// Generated summaries, one per line, aligned with the sources
    #[arg(long = "target_path")]
    pub target_path: PathBuf,

    /// JSON document with the extracted entities of every summary
    #[arg(long = "ent_path")]
    pub ent_path: PathBuf,

    /// Directory holding the exported BART model
    #[arg(long = "bart_path")]
    pub bart_path: PathBuf,

    /// TorchScript file inside --bart_path
    #[arg(long = "checkpoint_file", default_value = DEFAULT_CHECKPOINT_FILE)]
    pub checkpoint_file: String,

    /// Directory containing tokenizer.json, or the tokenizer file itself
    #[arg(long = "data_name_or_path")]
    pub data_name_or_path: PathBuf,

    /// Where to write the posteriors
    #[arg(long, default_value = DEFAULT_OUTPUT)]
    pub output: PathBuf,

    #[arg(long, value_enum, default_value_t = FormatArg::Pickle)]
    pub format: FormatArg,

    /// Longest encoder input, in tokens, including <s> and </s>
    #[arg(long = "max_source_positions", default_value_t = DEFAULT_MAX_SOURCE_POSITIONS)]
    pub max_source_positions: usize,

    /// Run on CPU even when CUDA is available
    #[arg(long)]
    pub cpu: bool,

    /// Keep the model in f32 on CUDA instead of the default half precision
    #[arg(long)]
    pub fp32: bool,
}

impl From<FormatArg> for OutputFormat {
    fn from(format: FormatArg) -> Self {
        match format {
            FormatArg::Pickle => OutputFormat::Pickle,
            FormatArg::Json => OutputFormat::Json,
        }
    }
}

impl From<Args> for ScoringConfig {
    fn from(a: Args) -> Self {
        ScoringConfig {
            source_path: a.source_path,
            target_path: a.target_path,
            ent_path: a.ent_path,
            bart_path: a.bart_path,
            checkpoint_file: a.checkpoint_file,
            data_name_or_path: a.data_name_or_path,
            output_path: a.output,
            format: a.format.into(),
            max_source_positions: a.max_source_positions,
            force_cpu: a.cpu,
            fp16: !a.fp32,
        }
    }
}

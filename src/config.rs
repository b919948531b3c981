use std::path::PathBuf;

use tch::Device;

use crate::bart::{ModelOptions, DEFAULT_MAX_SOURCE_POSITIONS};
use crate::output::{OutputFormat, DEFAULT_OUTPUT};

pub const DEFAULT_CHECKPOINT_FILE: &str = "checkpoint_best.pt";
pub const TOKENIZER_FILE: &str = "tokenizer.json";

/// Everything one scoring run needs. Built from the command line, but free of
/// any CLI types.
#[derive(Debug, Clone)]
pub struct ScoringConfig {
    pub source_path: PathBuf,
    pub target_path: PathBuf,
    pub ent_path: PathBuf,
    pub bart_path: PathBuf,
    pub checkpoint_file: String,
    pub data_name_or_path: PathBuf,
    pub output_path: PathBuf,
    pub format: OutputFormat,
    pub max_source_positions: usize,
    pub force_cpu: bool,
    /// Half precision on CUDA. Ignored on CPU.
    pub fp16: bool,
}

impl ScoringConfig {
    pub fn new(
        source_path: impl Into<PathBuf>,
        target_path: impl Into<PathBuf>,
        ent_path: impl Into<PathBuf>,
        bart_path: impl Into<PathBuf>,
        data_name_or_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source_path: source_path.into(),
            target_path: target_path.into(),
            ent_path: ent_path.into(),
            bart_path: bart_path.into(),
            checkpoint_file: DEFAULT_CHECKPOINT_FILE.to_string(),
            data_name_or_path: data_name_or_path.into(),
            output_path: PathBuf::from(DEFAULT_OUTPUT),
            format: OutputFormat::default(),
            max_source_positions: DEFAULT_MAX_SOURCE_POSITIONS,
            force_cpu: false,
            fp16: true,
        }
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.bart_path.join(&self.checkpoint_file)
    }

    /// `data_name_or_path` may name the tokenizer file itself or the
    /// directory holding it.
    pub fn tokenizer_path(&self) -> PathBuf {
        if self.data_name_or_path.is_dir() {
            self.data_name_or_path.join(TOKENIZER_FILE)
        } else {
            self.data_name_or_path.clone()
        }
    }

    pub fn device(&self) -> Device {
        if self.force_cpu {
            Device::Cpu
        } else {
            Device::cuda_if_available()
        }
    }

    pub fn model_options(&self) -> ModelOptions {
        ModelOptions {
            checkpoint: self.checkpoint_path(),
            tokenizer: self.tokenizer_path(),
            device: self.device(),
            fp16: self.fp16,
            max_source_positions: self.max_source_positions,
        }
    }
}

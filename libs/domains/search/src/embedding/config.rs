use core_config::{ConfigError, FromEnv, env_or_default, env_parse};
use std::path::{Path, PathBuf};

/// Artifact file name inside the model directory.
pub(crate) const MODEL_FILE: &str = "model.onnx";

/// Tokenizer files expected next to the model.
pub(crate) const TOKENIZER_FILE: &str = "tokenizer.json";
pub(crate) const CONFIG_FILE: &str = "config.json";
pub(crate) const SPECIAL_TOKENS_MAP_FILE: &str = "special_tokens_map.json";
pub(crate) const TOKENIZER_CONFIG_FILE: &str = "tokenizer_config.json";

/// Embedding model configuration
#[derive(Clone, Debug, PartialEq)]
pub struct EmbeddingConfig {
    /// Informational: the model the artifacts were exported from.
    pub model_name: String,
    /// Directory holding `model.onnx` and the tokenizer files.
    pub model_dir: PathBuf,
    pub dimension: usize,
    pub max_sequence_length: usize,
}

impl EmbeddingConfig {
    pub fn new(model_dir: impl Into<PathBuf>) -> Self {
        Self {
            model_dir: model_dir.into(),
            ..Self::default()
        }
    }

    pub fn model_path(&self) -> PathBuf {
        self.model_dir.join(MODEL_FILE)
    }

    pub fn artifact_path(&self, file: &str) -> PathBuf {
        self.model_dir.join(file)
    }

    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_name: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            model_dir: PathBuf::from("models"),
            dimension: 384,
            max_sequence_length: 128,
        }
    }
}

impl FromEnv for EmbeddingConfig {
    /// - MODEL_NAME (default: sentence-transformers/all-MiniLM-L6-v2)
    /// - MODEL_CACHE_DIR (default: models)
    /// - EMBEDDING_DIMENSION (default: 384)
    /// - MAX_SEQUENCE_LENGTH (default: 128)
    fn from_env() -> Result<Self, ConfigError> {
        let dimension: usize = env_parse("EMBEDDING_DIMENSION", "384")?;
        if dimension == 0 {
            return Err(ConfigError::ParseError {
                key: "EMBEDDING_DIMENSION".to_string(),
                details: "must be greater than zero".to_string(),
            });
        }

        let max_sequence_length: usize = env_parse("MAX_SEQUENCE_LENGTH", "128")?;
        if max_sequence_length == 0 {
            return Err(ConfigError::ParseError {
                key: "MAX_SEQUENCE_LENGTH".to_string(),
                details: "must be greater than zero".to_string(),
            });
        }

        Ok(Self {
            model_name: env_or_default("MODEL_NAME", "sentence-transformers/all-MiniLM-L6-v2"),
            model_dir: PathBuf::from(env_or_default("MODEL_CACHE_DIR", "models")),
            dimension,
            max_sequence_length,
        })
    }
}

//! ONNX-backed embedding provider.
//!
//! Loads a sentence-transformer exported to ONNX from a local directory:
//!
//! ```text
//! <MODEL_CACHE_DIR>/
//!   model.onnx
//!   tokenizer.json
//!   config.json
//!   special_tokens_map.json
//!   tokenizer_config.json
//! ```
//!
//! Nothing is downloaded: a missing artifact is a startup error.

use async_trait::async_trait;
use fastembed::{
    InitOptionsUserDefined, Pooling, TextEmbedding, TokenizerFiles, UserDefinedEmbeddingModel,
};
use std::io::ErrorKind;
use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock};
use tracing::{debug, info, instrument};

use super::config::{
    CONFIG_FILE, EmbeddingConfig, SPECIAL_TOKENS_MAP_FILE, TOKENIZER_CONFIG_FILE, TOKENIZER_FILE,
};
use super::provider::EmbeddingProvider;
use crate::error::{SearchError, SearchResult};
use crate::models::Embedding;

type Session = Arc<Mutex<TextEmbedding>>;

/// Embedding provider running a local ONNX model through fastembed.
///
/// Created uninitialized; [`initialize`](Self::initialize) loads the model
/// once. The inference session needs exclusive access, so it sits behind a
/// mutex and every call runs on the blocking thread pool: concurrent
/// `embed` calls are serialized without stalling the async runtime.
pub struct OnnxEmbeddingProvider {
    config: EmbeddingConfig,
    session: OnceLock<Session>,
}

impl OnnxEmbeddingProvider {
    pub fn new(config: EmbeddingConfig) -> Self {
        Self {
            config,
            session: OnceLock::new(),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.session.get().is_some()
    }

    /// Load the model and tokenizer from the configured directory.
    ///
    /// Fails with [`SearchError::ModelNotFound`] when an artifact is absent
    /// and [`SearchError::ModelLoad`] when it cannot be loaded or produces
    /// embeddings of the wrong dimension. A second call is a no-op.
    #[instrument(skip(self), fields(model_dir = %self.config.model_dir.display()))]
    pub fn initialize(&self) -> SearchResult<()> {
        if self.is_initialized() {
            return Ok(());
        }

        info!(model = %self.config.model_name, "Loading embedding model");

        let onnx_file = read_artifact(&self.config.model_path())?;
        let tokenizer_files = TokenizerFiles {
            tokenizer_file: read_artifact(&self.config.artifact_path(TOKENIZER_FILE))?,
            config_file: read_artifact(&self.config.artifact_path(CONFIG_FILE))?,
            special_tokens_map_file: read_artifact(
                &self.config.artifact_path(SPECIAL_TOKENS_MAP_FILE),
            )?,
            tokenizer_config_file: read_artifact(
                &self.config.artifact_path(TOKENIZER_CONFIG_FILE),
            )?,
        };

        let model =
            UserDefinedEmbeddingModel::new(onnx_file, tokenizer_files).with_pooling(Pooling::Mean);
        // The tokenizer truncates to this many tokens.
        let options =
            InitOptionsUserDefined::new().with_max_length(self.config.max_sequence_length);

        let mut session = TextEmbedding::try_new_from_user_defined(model, options)
            .map_err(|e| SearchError::ModelLoad(e.to_string()))?;

        let probe = session
            .embed(vec!["dimension probe"], None)
            .map_err(|e| SearchError::ModelLoad(e.to_string()))?;
        let produced = probe.first().map(Vec::len).unwrap_or_default();
        if produced != self.config.dimension {
            return Err(SearchError::ModelLoad(format!(
                "model produces {}-dimensional embeddings, configured for {}",
                produced, self.config.dimension
            )));
        }

        let _ = self.session.set(Arc::new(Mutex::new(session)));
        info!(
            dimension = self.config.dimension,
            max_sequence_length = self.config.max_sequence_length,
            "Embedding model loaded"
        );
        Ok(())
    }

    fn session(&self) -> SearchResult<Session> {
        self.session
            .get()
            .cloned()
            .ok_or(SearchError::NotInitialized)
    }

    async fn run(&self, texts: Vec<String>) -> SearchResult<Vec<Vec<f32>>> {
        let session = self.session()?;
        let count = texts.len();

        let raw = tokio::task::spawn_blocking(move || {
            let mut model = session
                .lock()
                .map_err(|e| SearchError::Inference(format!("model lock poisoned: {e}")))?;
            model
                .embed(texts, None)
                .map_err(|e| SearchError::Inference(e.to_string()))
        })
        .await
        .map_err(|e| SearchError::Inference(format!("inference task failed: {e}")))??;

        if raw.len() != count {
            return Err(SearchError::Inference(format!(
                "model returned {} embeddings for {} inputs",
                raw.len(),
                count
            )));
        }
        debug!(count, "Computed embeddings");
        Ok(raw)
    }
}

#[async_trait]
impl EmbeddingProvider for OnnxEmbeddingProvider {
    fn dimension(&self) -> usize {
        self.config.dimension
    }

    fn max_sequence_length(&self) -> usize {
        self.config.max_sequence_length
    }

    async fn embed(&self, text: &str) -> SearchResult<Embedding> {
        ensure_text(text)?;
        let raw = self.run(vec![text.to_owned()]).await?;
        let vector = raw
            .into_iter()
            .next()
            .ok_or_else(|| SearchError::Inference("model returned no embedding".to_string()))?;
        Embedding::normalize(vector, self.config.dimension)
    }

    async fn embed_batch(&self, texts: &[String]) -> SearchResult<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        texts.iter().try_for_each(|t| ensure_text(t))?;

        self.run(texts.to_vec())
            .await?
            .into_iter()
            .map(|v| Embedding::normalize(v, self.config.dimension))
            .collect()
    }
}

pub(crate) fn ensure_text(text: &str) -> SearchResult<()> {
    if text.trim().is_empty() {
        return Err(SearchError::Validation("text must not be empty".to_string()));
    }
    Ok(())
}

fn read_artifact(path: &Path) -> SearchResult<Vec<u8>> {
    std::fs::read(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => SearchError::ModelNotFound(path.to_path_buf()),
        _ => SearchError::ModelLoad(format!("{}: {}", path.display(), e)),
    })
}

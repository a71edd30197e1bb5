use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::embedding::EmbeddingProvider;
use crate::error::{SearchError, SearchResult};
use crate::models::{BatchOutcome, DEFAULT_THRESHOLD, DEFAULT_TOP_K, Document, Embedding, Match};
use crate::store::VectorStore;

/// Default bound on a single embedding or store call.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Ingest and search on top of an embedding provider and a vector store.
///
/// Holds no state besides its two collaborators: a failed ingest leaves
/// nothing behind.
pub struct SearchService<S: VectorStore> {
    store: S,
    embedder: Arc<dyn EmbeddingProvider>,
    request_timeout: Duration,
}

impl<S: VectorStore> SearchService<S> {
    pub fn new(store: S, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            store,
            embedder,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Bound each embedding and store call by `timeout`.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Embed `text` and store it under `key`, replacing any previous
    /// vector and metadata for that key.
    #[instrument(skip(self, text, metadata))]
    pub async fn ingest(&self, key: &str, text: &str, metadata: Value) -> SearchResult<()> {
        validate_key(key)?;
        validate_text("text", text)?;

        let vector = self.embed(text).await?;
        self.bounded("store write", self.store.upsert(key, &vector, &metadata))
            .await?;

        info!("Indexed document");
        Ok(())
    }

    /// Nearest stored records to `query`.
    ///
    /// `top_k` defaults to 5 and `threshold` (exclusive cosine-distance
    /// cutoff) to 0.6. A `top_k` of zero or less returns nothing.
    #[instrument(skip(self, query))]
    pub async fn search(
        &self,
        query: &str,
        top_k: Option<i64>,
        threshold: Option<f64>,
    ) -> SearchResult<Vec<Match>> {
        validate_text("query", query)?;
        let top_k = top_k.unwrap_or(DEFAULT_TOP_K);
        let threshold = threshold.unwrap_or(DEFAULT_THRESHOLD);

        if top_k <= 0 {
            debug!("Non-positive top_k, returning no matches");
            return Ok(Vec::new());
        }

        let vector = self.embed(query).await?;
        let matches = self
            .bounded("store query", self.store.query(&vector, top_k, threshold))
            .await?;

        debug!(hits = matches.len(), "Search complete");
        Ok(matches)
    }

    /// Index many documents, recording failures per key instead of stopping
    /// at the first one.
    ///
    /// The batch is embedded in one call; if that call fails, each document
    /// is embedded on its own so one bad input does not sink the rest.
    #[instrument(skip(self, documents), fields(documents = documents.len()))]
    pub async fn ingest_batch(&self, documents: Vec<Document>) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();

        let (valid, invalid): (Vec<_>, Vec<_>) = documents
            .into_iter()
            .map(|doc| {
                let check = validate_key(&doc.key).and_then(|_| validate_text("text", &doc.text));
                (doc, check)
            })
            .partition(|(_, check)| check.is_ok());

        for (doc, check) in invalid {
            if let Err(e) = check {
                warn!(key = %doc.key, error = %e, "Skipping invalid document");
                outcome.failed.push((doc.key, e));
            }
        }

        if valid.is_empty() {
            return outcome;
        }

        let valid: Vec<Document> = valid.into_iter().map(|(doc, _)| doc).collect();
        let texts: Vec<String> = valid.iter().map(|d| d.text.clone()).collect();

        let embeddings: Vec<SearchResult<Embedding>> =
            match self.bounded("embedding", self.embedder.embed_batch(&texts)).await {
                Ok(batch) => batch.into_iter().map(Ok).collect(),
                Err(e) => {
                    warn!(error = %e, "Batch embedding failed, embedding documents one by one");
                    let mut single = Vec::with_capacity(texts.len());
                    for text in &texts {
                        single.push(self.embed(text).await);
                    }
                    single
                }
            };

        for (doc, embedding) in valid.into_iter().zip(embeddings) {
            let result = match embedding {
                Ok(vector) => {
                    self.bounded(
                        "store write",
                        self.store.upsert(&doc.key, &vector, &doc.metadata),
                    )
                    .await
                }
                Err(e) => Err(e),
            };

            match result {
                Ok(()) => outcome.indexed.push(doc.key),
                Err(e) => {
                    warn!(key = %doc.key, error = %e, "Failed to index document");
                    outcome.failed.push((doc.key, e));
                }
            }
        }

        info!(
            indexed = outcome.indexed.len(),
            failed = outcome.failed.len(),
            "Batch indexed"
        );
        outcome
    }

    /// Readiness of the backing store.
    pub async fn health_check(&self) -> SearchResult<()> {
        self.bounded("health check", self.store.health_check()).await
    }

    async fn embed(&self, text: &str) -> SearchResult<Embedding> {
        self.bounded("embedding", self.embedder.embed(text)).await
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = SearchResult<T>>,
    ) -> SearchResult<T> {
        tokio::time::timeout(self.request_timeout, call)
            .await
            .map_err(|_| SearchError::Timeout {
                operation,
                after: self.request_timeout,
            })?
    }
}

fn validate_key(key: &str) -> SearchResult<()> {
    if key.trim().is_empty() {
        return Err(SearchError::Validation("key must not be empty".to_string()));
    }
    Ok(())
}

fn validate_text(field: &str, text: &str) -> SearchResult<()> {
    if text.trim().is_empty() {
        return Err(SearchError::Validation(format!("{field} must not be empty")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{HashingEmbeddingProvider, MockEmbeddingProvider};
    use crate::store::{InMemoryVectorStore, MockVectorStore};
    use async_trait::async_trait;
    use serde_json::json;

    fn unit(raw: &[f32]) -> Embedding {
        Embedding::normalize(raw.to_vec(), raw.len()).unwrap()
    }

    fn hashing_service() -> SearchService<InMemoryVectorStore> {
        SearchService::new(
            InMemoryVectorStore::new(384),
            Arc::new(HashingEmbeddingProvider::new(384, 128)),
        )
    }

    #[tokio::test]
    async fn test_ingest_embeds_then_upserts() {
        let mut embedder = MockEmbeddingProvider::new();
        embedder
            .expect_embed()
            .withf(|text| text.contains("the quick brown fox"))
            .times(1)
            .returning(|_| Ok(unit(&[1.0, 0.0])));

        let mut store = MockVectorStore::new();
        store
            .expect_upsert()
            .withf(|key, vector, metadata| {
                key.contains("doc1")
                    && vector.as_slice() == [1.0, 0.0]
                    && metadata["source"] == "example"
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let service = SearchService::new(store, Arc::new(embedder));
        service
            .ingest("doc1", "the quick brown fox", json!({"source": "example"}))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_ingest_embedding_failure_never_writes() {
        let mut embedder = MockEmbeddingProvider::new();
        embedder
            .expect_embed()
            .returning(|_| Err(SearchError::Inference("session crashed".into())));

        let mut store = MockVectorStore::new();
        store.expect_upsert().times(0);

        let service = SearchService::new(store, Arc::new(embedder));
        let err = service.ingest("doc1", "text", json!({})).await.unwrap_err();
        assert!(matches!(err, SearchError::Inference(_)));
    }

    #[tokio::test]
    async fn test_ingest_rejects_empty_key_and_text() {
        let mut embedder = MockEmbeddingProvider::new();
        embedder.expect_embed().times(0);
        let mut store = MockVectorStore::new();
        store.expect_upsert().times(0);

        let service = SearchService::new(store, Arc::new(embedder));
        assert!(matches!(
            service.ingest("", "text", json!({})).await,
            Err(SearchError::Validation(_))
        ));
        assert!(matches!(
            service.ingest("doc1", "  ", json!({})).await,
            Err(SearchError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_search_applies_defaults() {
        let mut embedder = MockEmbeddingProvider::new();
        embedder.expect_embed().returning(|_| Ok(unit(&[0.0, 1.0])));

        let mut store = MockVectorStore::new();
        store
            .expect_query()
            .withf(|_, top_k, threshold| *top_k == 5 && *threshold == 0.6)
            .times(1)
            .returning(|_, _, _| {
                Ok(vec![Match {
                    key: "doc1".into(),
                    similarity: 0.9,
                    metadata: json!({}),
                }])
            });

        let service = SearchService::new(store, Arc::new(embedder));
        let hits = service.search("quick fox", None, None).await.unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn test_search_passes_explicit_parameters() {
        let mut embedder = MockEmbeddingProvider::new();
        embedder.expect_embed().returning(|_| Ok(unit(&[0.0, 1.0])));

        let mut store = MockVectorStore::new();
        store
            .expect_query()
            .withf(|_, top_k, threshold| *top_k == 2 && *threshold == 0.3)
            .times(1)
            .returning(|_, _, _| Ok(vec![]));

        let service = SearchService::new(store, Arc::new(embedder));
        assert!(service.search("q", Some(2), Some(0.3)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_non_positive_top_k_touches_nothing() {
        let mut embedder = MockEmbeddingProvider::new();
        embedder.expect_embed().times(0);
        let mut store = MockVectorStore::new();
        store.expect_query().times(0);

        let service = SearchService::new(store, Arc::new(embedder));
        assert!(service.search("q", Some(0), None).await.unwrap().is_empty());
        assert!(service.search("q", Some(-4), None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_is_surfaced() {
        let mut embedder = MockEmbeddingProvider::new();
        embedder.expect_embed().returning(|_| Ok(unit(&[0.0, 1.0])));
        let mut store = MockVectorStore::new();
        store
            .expect_query()
            .returning(|_, _, _| Err(SearchError::ConnectionLost("refused".into())));

        let service = SearchService::new(store, Arc::new(embedder));
        let err = service.search("q", None, None).await.unwrap_err();
        assert!(matches!(err, SearchError::ConnectionLost(_)));
    }

    struct SlowEmbedder;

    #[async_trait]
    impl EmbeddingProvider for SlowEmbedder {
        fn dimension(&self) -> usize {
            2
        }

        fn max_sequence_length(&self) -> usize {
            8
        }

        async fn embed(&self, _text: &str) -> SearchResult<Embedding> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Embedding::normalize(vec![1.0, 0.0], 2)
        }
    }

    #[tokio::test]
    async fn test_slow_embedding_times_out() {
        let service = SearchService::new(InMemoryVectorStore::new(2), Arc::new(SlowEmbedder))
            .with_request_timeout(Duration::from_millis(20));

        let err = service.ingest("doc1", "text", json!({})).await.unwrap_err();
        assert!(matches!(
            err,
            SearchError::Timeout {
                operation: "embedding",
                ..
            }
        ));
        assert!(service.store().is_empty().await);
    }

    #[tokio::test]
    async fn test_reingest_keeps_single_record_with_latest_payload() {
        let service = hashing_service();
        service
            .ingest("doc1", "first version", json!({"v": 1}))
            .await
            .unwrap();
        let created = service.store().get("doc1").await.unwrap().unwrap().created_at;

        service
            .ingest("doc1", "second version entirely", json!({"v": 2}))
            .await
            .unwrap();

        let record = service.store().get("doc1").await.unwrap().unwrap();
        assert_eq!(service.store().len().await, 1);
        assert_eq!(record.metadata, json!({"v": 2}));
        assert_eq!(record.created_at, created);
        assert!((record.vector.norm() - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_end_to_end_quick_fox() {
        let service = hashing_service();
        service
            .ingest("doc1", "the quick brown fox", json!({"source": "example"}))
            .await
            .unwrap();
        service
            .ingest("doc2", "relational database indexes", json!({}))
            .await
            .unwrap();

        let hits = service.search("quick fox", Some(5), Some(0.6)).await.unwrap();
        assert_eq!(hits[0].key, "doc1");
        assert_eq!(hits[0].metadata, json!({"source": "example"}));

        let embedder = HashingEmbeddingProvider::new(384, 128);
        let doc = embedder.embed("the quick brown fox").await.unwrap();
        let query = embedder.embed("quick fox").await.unwrap();
        let expected = 1.0 - doc.cosine_distance(&query);
        assert!((hits[0].similarity - expected).abs() < 1e-6);

        assert!(hits.windows(2).all(|w| w[0].similarity >= w[1].similarity));
    }

    #[tokio::test]
    async fn test_batch_isolates_failures() {
        let mut embedder = MockEmbeddingProvider::new();
        embedder
            .expect_embed_batch()
            .times(1)
            .returning(|_| Err(SearchError::Inference("batch too large".into())));
        embedder.expect_embed().returning(|text| {
            if text.contains("poison") {
                Err(SearchError::Inference("cannot embed".into()))
            } else {
                Ok(unit(&[1.0, 0.0]))
            }
        });

        let store = InMemoryVectorStore::new(2);
        let service = SearchService::new(store, Arc::new(embedder));

        let docs = vec![
            Document {
                key: "doc_0".into(),
                text: "fine".into(),
                metadata: json!({}),
            },
            Document {
                key: "doc_1".into(),
                text: "poison".into(),
                metadata: json!({}),
            },
            Document {
                key: "doc_2".into(),
                text: " ".into(),
                metadata: json!({}),
            },
        ];

        let outcome = service.ingest_batch(docs).await;
        assert_eq!(outcome.indexed, ["doc_0"]);
        let failed: Vec<_> = outcome.failed.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(failed, ["doc_2", "doc_1"]);
        assert_eq!(service.store().len().await, 1);
    }

    #[tokio::test]
    async fn test_batch_with_hashing_provider_indexes_everything() {
        let service = hashing_service();
        let docs = (0..3)
            .map(|i| Document {
                key: format!("doc_{i}"),
                text: format!("line number {i}"),
                metadata: json!({"source": "cli_index"}),
            })
            .collect();

        let outcome = service.ingest_batch(docs).await;
        assert_eq!(outcome.indexed.len(), 3);
        assert!(outcome.failed.is_empty());
    }
}

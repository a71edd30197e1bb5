use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::VectorStore;
use crate::error::{SearchError, SearchResult};
use crate::models::{Embedding, Match, Record};

/// In-memory implementation of VectorStore (for development/testing)
///
/// Brute-force cosine search over every record. Equal distances keep
/// insertion order.
#[derive(Clone)]
pub struct InMemoryVectorStore {
    dimension: usize,
    records: Arc<RwLock<Vec<Record>>>,
}

impl InMemoryVectorStore {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            records: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    fn check_dimension(&self, vector: &Embedding) -> SearchResult<()> {
        if vector.dimension() != self.dimension {
            return Err(SearchError::Validation(format!(
                "vector has {} dimensions, store expects {}",
                vector.dimension(),
                self.dimension
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert(&self, key: &str, vector: &Embedding, metadata: &Value) -> SearchResult<()> {
        self.check_dimension(vector)?;
        let mut records = self.records.write().await;

        match records.iter_mut().find(|r| r.key == key) {
            Some(existing) => {
                existing.vector = vector.clone();
                existing.metadata = metadata.clone();
            }
            None => records.push(Record {
                key: key.to_string(),
                vector: vector.clone(),
                metadata: metadata.clone(),
                created_at: Utc::now(),
            }),
        }

        tracing::debug!(key, "Upserted vector");
        Ok(())
    }

    async fn query(
        &self,
        vector: &Embedding,
        top_k: i64,
        threshold: f64,
    ) -> SearchResult<Vec<Match>> {
        self.check_dimension(vector)?;
        if !threshold.is_finite() {
            return Err(SearchError::Validation(format!(
                "threshold must be a finite number, got {threshold}"
            )));
        }
        if top_k <= 0 {
            return Ok(Vec::new());
        }

        let records = self.records.read().await;
        let mut hits: Vec<(f64, &Record)> = records
            .iter()
            .map(|r| (vector.cosine_distance(&r.vector), r))
            .filter(|(distance, _)| *distance < threshold)
            .collect();

        // sort_by is stable: ties keep insertion order
        hits.sort_by(|a, b| a.0.total_cmp(&b.0));

        Ok(hits
            .into_iter()
            .take(usize::try_from(top_k).unwrap_or(usize::MAX))
            .map(|(distance, r)| Match {
                key: r.key.clone(),
                similarity: 1.0 - distance,
                metadata: r.metadata.clone(),
            })
            .collect())
    }

    async fn get(&self, key: &str) -> SearchResult<Option<Record>> {
        let records = self.records.read().await;
        Ok(records.iter().find(|r| r.key == key).cloned())
    }

    async fn health_check(&self) -> SearchResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn unit(raw: &[f32]) -> Embedding {
        Embedding::normalize(raw.to_vec(), raw.len()).unwrap()
    }

    #[tokio::test]
    async fn test_upsert_replaces_and_keeps_created_at() {
        let store = InMemoryVectorStore::new(2);
        store
            .upsert("doc1", &unit(&[1.0, 0.0]), &json!({"v": 1}))
            .await
            .unwrap();
        let first = store.get("doc1").await.unwrap().unwrap();

        store
            .upsert("doc1", &unit(&[0.0, 1.0]), &json!({"v": 2}))
            .await
            .unwrap();
        let second = store.get("doc1").await.unwrap().unwrap();

        assert_eq!(store.len().await, 1);
        assert_eq!(second.metadata, json!({"v": 2}));
        assert_eq!(second.vector, unit(&[0.0, 1.0]));
        assert_eq!(second.created_at, first.created_at);
    }

    #[tokio::test]
    async fn test_query_orders_by_similarity_and_applies_threshold() {
        let store = InMemoryVectorStore::new(2);
        store.upsert("far", &unit(&[-1.0, 0.2]), &json!({})).await.unwrap();
        store.upsert("near", &unit(&[1.0, 0.1]), &json!({})).await.unwrap();
        store.upsert("mid", &unit(&[1.0, 1.0]), &json!({})).await.unwrap();

        let hits = store.query(&unit(&[1.0, 0.0]), 10, 0.6).await.unwrap();
        let keys: Vec<_> = hits.iter().map(|m| m.key.as_str()).collect();
        assert_eq!(keys, ["near", "mid"]);
        assert!(hits[0].similarity >= hits[1].similarity);
        assert!(hits.iter().all(|m| 1.0 - m.similarity < 0.6));
    }

    #[tokio::test]
    async fn test_query_top_k_limits_and_non_positive_is_empty() {
        let store = InMemoryVectorStore::new(2);
        for i in 0..5 {
            store
                .upsert(&format!("k{i}"), &unit(&[1.0, i as f32 * 0.1]), &json!({}))
                .await
                .unwrap();
        }
        let q = unit(&[1.0, 0.0]);

        assert_eq!(store.query(&q, 2, 2.0).await.unwrap().len(), 2);
        assert!(store.query(&q, 0, 2.0).await.unwrap().is_empty());
        assert!(store.query(&q, -3, 2.0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_threshold_excluding_everything_is_empty() {
        let store = InMemoryVectorStore::new(2);
        store.upsert("a", &unit(&[0.0, 1.0]), &json!({})).await.unwrap();

        assert!(store.query(&unit(&[1.0, 0.0]), 5, 0.0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_negative_similarity_is_not_clamped() {
        let store = InMemoryVectorStore::new(2);
        store.upsert("opposite", &unit(&[-1.0, 0.0]), &json!({})).await.unwrap();

        let hits = store.query(&unit(&[1.0, 0.0]), 5, 2.5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!((hits[0].similarity + 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_ties_keep_insertion_order() {
        let store = InMemoryVectorStore::new(2);
        for key in ["b", "a", "c"] {
            store.upsert(key, &unit(&[0.0, 1.0]), &json!({})).await.unwrap();
        }

        let hits = store.query(&unit(&[0.0, 1.0]), 5, 0.5).await.unwrap();
        let keys: Vec<_> = hits.iter().map(|m| m.key.as_str()).collect();
        assert_eq!(keys, ["b", "a", "c"]);
    }

    #[tokio::test]
    async fn test_rejects_wrong_dimension_and_nan_threshold() {
        let store = InMemoryVectorStore::new(3);
        let two_d = unit(&[1.0, 0.0]);
        assert!(matches!(
            store.upsert("k", &two_d, &json!({})).await,
            Err(SearchError::Validation(_))
        ));

        let three_d = unit(&[1.0, 0.0, 0.0]);
        assert!(matches!(
            store.query(&three_d, 5, f64::NAN).await,
            Err(SearchError::Validation(_))
        ));
    }
}

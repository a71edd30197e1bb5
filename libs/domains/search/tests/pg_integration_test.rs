//! PostgreSQL + pgvector integration tests
//!
//! These start a pgvector container through testcontainers and therefore
//! need a running Docker daemon:
//!
//! ```sh
//! cargo test -p domain_search --test pg_integration_test -- --ignored
//! ```

use database::postgres::PostgresConfig;
use domain_search::*;
use serde_json::json;
use std::sync::Arc;
use test_utils::{TestDataBuilder, TestDatabase};

const DIMENSION: usize = 384;

async fn store(db: &TestDatabase) -> PgVectorStore {
    PgVectorStore::connect(&PostgresConfig::new(db.url()), DIMENSION)
        .await
        .expect("store should open against a fresh pgvector database")
}

fn embedder() -> Arc<HashingEmbeddingProvider> {
    Arc::new(HashingEmbeddingProvider::new(DIMENSION, 128))
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_connect_creates_schema_and_is_idempotent() {
    let db = TestDatabase::new().await;

    let first = store(&db).await;
    assert!(db.has_vector_extension().await);
    first.close().await;

    // Second open runs the same DDL against existing objects.
    let second = store(&db).await;
    second.health_check().await.unwrap();
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_existing_table_with_other_dimension_is_fatal() {
    let db = TestDatabase::new().await;
    store(&db).await.close().await;

    let err = PgVectorStore::connect(&PostgresConfig::new(db.url()), 768)
        .await
        .err()
        .expect("a vector(384) table must not be accepted for 768 dimensions");
    assert!(matches!(err, SearchError::Connect(_)));
    assert!(err.is_fatal());
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_upsert_replaces_and_keeps_created_at() {
    let db = TestDatabase::new().await;
    let builder = TestDataBuilder::from_test_name("test_upsert_replaces_and_keeps_created_at");
    let key = builder.key("doc", "main");
    let embedder = embedder();
    let store = store(&db).await;

    let v1 = embedder.embed("first version").await.unwrap();
    store.upsert(&key, &v1, &json!({"v": 1})).await.unwrap();
    let created = store.get(&key).await.unwrap().unwrap().created_at;

    let v2 = embedder.embed("second version").await.unwrap();
    store.upsert(&key, &v2, &json!({"v": 2})).await.unwrap();

    let record = store.get(&key).await.unwrap().unwrap();
    assert_eq!(record.metadata, json!({"v": 2}));
    assert_eq!(record.created_at, created);
    assert!(record.vector.cosine_distance(&v2) < 1e-5);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_search_ranks_and_filters() {
    let db = TestDatabase::new().await;
    let service = SearchService::new(store(&db).await, embedder());

    service
        .ingest("doc1", "the quick brown fox", json!({"source": "example"}))
        .await
        .unwrap();
    service
        .ingest("doc2", "vector databases store embeddings", json!({}))
        .await
        .unwrap();

    let hits = service.search("quick fox", Some(5), Some(0.6)).await.unwrap();
    assert_eq!(hits[0].key, "doc1");
    assert_eq!(hits[0].metadata, json!({"source": "example"}));
    assert!(hits.iter().all(|m| m.similarity > 0.4));

    let none = service.search("quick fox", Some(5), Some(0.0)).await.unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_batch_ingest_indexes_every_document() {
    let db = TestDatabase::new().await;
    let builder = TestDataBuilder::from_test_name("test_batch_ingest_indexes_every_document");
    let service = SearchService::new(store(&db).await, embedder());

    let documents = builder
        .sentences(40)
        .into_iter()
        .enumerate()
        .map(|(i, text)| Document {
            key: format!("doc_{i}"),
            metadata: json!({"source": "cli_index", "text_content": text}),
            text,
        })
        .collect();

    let outcome = service.ingest_batch(documents).await;
    assert_eq!(outcome.indexed.len(), 40);
    assert!(outcome.failed.is_empty());

    let hits = service.search("item 7", Some(40), Some(2.0)).await.unwrap();
    assert_eq!(hits.len(), 40);
}

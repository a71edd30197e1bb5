use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::error::{SearchError, SearchResult};

/// Default number of matches returned by a search.
pub const DEFAULT_TOP_K: i64 = 5;

/// Default cosine-distance cutoff for a search.
pub const DEFAULT_THRESHOLD: f64 = 0.6;

/// Confirmation body of a successful `/add`.
pub const ADD_SUCCESS_MESSAGE: &str = "Vector added successfully";

/// A unit-length embedding.
///
/// Only constructed through [`Embedding::normalize`], so every value of this
/// type has exactly the requested dimension, finite components and
/// Euclidean norm 1.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding(Vec<f32>);

impl Embedding {
    /// Scale `raw` to unit length after checking it has `dimension`
    /// finite, not-all-zero components.
    pub fn normalize(raw: Vec<f32>, dimension: usize) -> SearchResult<Self> {
        if raw.len() != dimension {
            return Err(SearchError::Inference(format!(
                "expected {} dimensions, got {}",
                dimension,
                raw.len()
            )));
        }
        if raw.iter().any(|v| !v.is_finite()) {
            return Err(SearchError::Inference(
                "embedding contains non-finite values".to_string(),
            ));
        }

        let norm = raw.iter().map(|v| f64::from(*v).powi(2)).sum::<f64>().sqrt();
        if norm == 0.0 {
            return Err(SearchError::Inference(
                "embedding has zero magnitude".to_string(),
            ));
        }

        Ok(Self(raw.into_iter().map(|v| (f64::from(v) / norm) as f32).collect()))
    }

    pub fn dimension(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn norm(&self) -> f64 {
        self.0.iter().map(|v| f64::from(*v).powi(2)).sum::<f64>().sqrt()
    }

    /// Cosine distance in `[0, 2]`, matching pgvector's `<=>` operator.
    pub fn cosine_distance(&self, other: &Embedding) -> f64 {
        let dot: f64 = self
            .0
            .iter()
            .zip(&other.0)
            .map(|(a, b)| f64::from(*a) * f64::from(*b))
            .sum();
        1.0 - dot / (self.norm() * other.norm())
    }

    /// pgvector text representation, e.g. `[0.1,0.2,0.3]`.
    pub fn to_pgvector(&self) -> String {
        let parts: Vec<String> = self.0.iter().map(|v| v.to_string()).collect();
        format!("[{}]", parts.join(","))
    }

    /// Parse pgvector's text output back into an embedding.
    pub fn from_pgvector(text: &str, dimension: usize) -> SearchResult<Self> {
        let inner = text
            .trim()
            .strip_prefix('[')
            .and_then(|s| s.strip_suffix(']'))
            .ok_or_else(|| SearchError::Read(format!("not a vector literal: {text}")))?;

        let values = inner
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(|s| {
                s.trim()
                    .parse::<f32>()
                    .map_err(|e| SearchError::Read(format!("bad vector component '{s}': {e}")))
            })
            .collect::<SearchResult<Vec<f32>>>()?;

        Self::normalize(values, dimension).map_err(|e| SearchError::Read(e.to_string()))
    }
}

/// One stored record.
#[derive(Debug, Clone)]
pub struct Record {
    pub key: String,
    pub vector: Embedding,
    pub metadata: Value,
    /// Set on first insert, never changed by later upserts.
    pub created_at: DateTime<Utc>,
}

/// One search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Match {
    pub key: String,
    /// `1 - cosine distance`; negative when the distance exceeds 1.
    pub similarity: f64,
    #[schema(value_type = Object)]
    pub metadata: Value,
}

/// A text to index under `key`.
#[derive(Debug, Clone)]
pub struct Document {
    pub key: String,
    pub text: String,
    pub metadata: Value,
}

/// Result of a batch ingest: keys that were stored and keys that failed.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub indexed: Vec<String>,
    pub failed: Vec<(String, SearchError)>,
}

/// Body of `POST /api/add`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AddRequest {
    pub key: String,
    pub text: String,
    /// Stored verbatim. Absent or `null` is stored as `{}`.
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<Value>,
}

/// Body of `POST /api/search`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SearchRequest {
    pub query: String,
    /// Maximum number of matches (default 5). Zero or negative yields `[]`.
    #[serde(default)]
    pub top_k: Option<i64>,
    /// Cosine-distance cutoff, exclusive (default 0.6).
    #[serde(default)]
    pub threshold: Option<f64>,
}

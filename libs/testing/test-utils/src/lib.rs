//! Shared test utilities for domain testing
//!
//! - `TestDatabase`: PostgreSQL + pgvector container with automatic cleanup (feature: "postgres")
//! - `TestDataBuilder`: Deterministic keys and texts derived from the test name
//!
//! # Usage
//!
//! ```rust,no_run
//! use test_utils::{TestDatabase, TestDataBuilder};
//!
//! #[tokio::test]
//! async fn my_postgres_test() {
//!     let db = TestDatabase::new().await;
//!     let builder = TestDataBuilder::from_test_name("my_test");
//!
//!     let key = builder.key("doc", "main");
//!     let url = db.url();
//! }
//! ```

#[cfg(feature = "postgres")]
mod postgres;

#[cfg(feature = "postgres")]
pub use postgres::TestDatabase;

/// Builder for test data with deterministic randomization
///
/// Tests sharing one database stay apart by deriving their keys from the
/// test name.
pub struct TestDataBuilder {
    seed: u64,
}

impl TestDataBuilder {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Create from test name (generates seed from test name hash)
    ///
    /// ```
    /// use test_utils::TestDataBuilder;
    ///
    /// let builder = TestDataBuilder::from_test_name("test_upsert_replaces");
    /// ```
    pub fn from_test_name(name: &str) -> Self {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        Self::new(hasher.finish())
    }

    /// A record key unique to this builder
    ///
    /// ```
    /// use test_utils::TestDataBuilder;
    ///
    /// let builder = TestDataBuilder::new(7);
    /// assert_eq!(builder.key("doc", "main"), "test-doc-7-main");
    /// ```
    pub fn key(&self, prefix: &str, suffix: &str) -> String {
        format!("test-{}-{}-{}", prefix, self.seed, suffix)
    }

    /// `count` distinct sentences, stable for a given seed
    pub fn sentences(&self, count: usize) -> Vec<String> {
        const SUBJECTS: [&str; 4] = ["the fox", "a database", "the river", "an engine"];
        const VERBS: [&str; 4] = ["jumps over", "indexes", "flows past", "powers"];

        (0..count)
            .map(|i| {
                let mixed = self.seed.wrapping_add(i as u64);
                format!(
                    "{} {} item {}",
                    SUBJECTS[(mixed % 4) as usize],
                    VERBS[((mixed / 4) % 4) as usize],
                    i
                )
            })
            .collect()
    }
}

mod config;
mod hashing;
mod onnx;
mod provider;

pub use config::EmbeddingConfig;
pub use hashing::HashingEmbeddingProvider;
pub use onnx::OnnxEmbeddingProvider;
pub use provider::EmbeddingProvider;

#[cfg(test)]
pub use provider::MockEmbeddingProvider;

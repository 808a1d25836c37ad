use crate::{SearchCandidate, SearchError};
use async_trait::async_trait;

pub trait VectorIndex: Send + Sync {
    fn search(&self, query_vector: &[f32], top_k: usize) -> Result<Vec<SearchCandidate>, SearchError>;
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, SearchError>;
}

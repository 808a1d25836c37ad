use crate::embeddings::Embedder;
use crate::traits::VectorIndex;
use crate::{Chunk, SearchCandidate, SearchError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

pub const INDEX_FILE_NAME: &str = "index.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexEntry {
    vector: Vec<f32>,
    chunk: Chunk,
}

/// Exhaustive cosine-similarity index over every chunk, persisted as a single
/// JSON document inside the index directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlatIndex {
    embedder: String,
    dimensions: usize,
    built_at: DateTime<Utc>,
    entries: Vec<IndexEntry>,
}

impl FlatIndex {
    pub fn from_embeddings(
        embedder: impl Into<String>,
        chunks: Vec<Chunk>,
        embeddings: Vec<Vec<f32>>,
    ) -> Result<Self, SearchError> {
        if chunks.len() != embeddings.len() {
            return Err(SearchError::Request(format!(
                "embedding count {} doesn't match chunk count {}",
                embeddings.len(),
                chunks.len()
            )));
        }

        let dimensions = embeddings.first().map_or(0, Vec::len);
        let entries = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, vector)| {
                if vector.len() != dimensions {
                    return Err(SearchError::Request(format!(
                        "embedding dimension {} != {}",
                        vector.len(),
                        dimensions
                    )));
                }
                Ok(IndexEntry { vector, chunk })
            })
            .collect::<Result<Vec<_>, SearchError>>()?;

        Ok(Self {
            embedder: embedder.into(),
            dimensions,
            built_at: Utc::now(),
            entries,
        })
    }

    pub async fn build(
        chunks: Vec<Chunk>,
        embedder: &dyn Embedder,
        batch_size: usize,
    ) -> Result<Self, SearchError> {
        let mut embeddings = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(batch_size.max(1)) {
            let texts = batch.iter().map(|chunk| chunk.text.clone()).collect::<Vec<_>>();
            embeddings.extend(embedder.embed_batch(&texts).await?);
        }

        Self::from_embeddings(embedder.name(), chunks, embeddings)
    }

    /// Writes the index to `dir`, replacing any previous one.
    pub async fn save(&self, dir: &Path) -> Result<PathBuf, SearchError> {
        tokio::fs::create_dir_all(dir).await?;
        let target = dir.join(INDEX_FILE_NAME);
        let staging = dir.join(format!("{INDEX_FILE_NAME}.tmp"));

        let encoded = serde_json::to_vec(self)?;
        tokio::fs::write(&staging, encoded).await?;
        tokio::fs::rename(&staging, &target).await?;

        info!(
            path = %target.display(),
            chunks = self.entries.len(),
            dimensions = self.dimensions,
            "vector index written"
        );
        Ok(target)
    }

    pub async fn load(dir: &Path) -> Result<Self, SearchError> {
        let path = dir.join(INDEX_FILE_NAME);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Err(SearchError::NoIndex(dir.display().to_string()))
            }
            Err(error) => return Err(error.into()),
        };

        let index: Self = serde_json::from_slice(&bytes)?;
        info!(
            path = %path.display(),
            chunks = index.entries.len(),
            embedder = %index.embedder,
            "vector index loaded"
        );
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn embedder(&self) -> &str {
        &self.embedder
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }
}

impl VectorIndex for FlatIndex {
    fn search(&self, query_vector: &[f32], top_k: usize) -> Result<Vec<SearchCandidate>, SearchError> {
        if top_k == 0 || self.entries.is_empty() {
            return Ok(Vec::new());
        }

        if query_vector.len() != self.dimensions {
            return Err(SearchError::Request(format!(
                "query vector dim {} is not {}",
                query_vector.len(),
                self.dimensions
            )));
        }

        let mut scored: Vec<(usize, f64)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(position, entry)| (position, cosine_similarity(query_vector, &entry.vector)))
            .collect();

        // Stable sort keeps insertion order among equal scores.
        scored.sort_by(|left, right| right.1.total_cmp(&left.1));

        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(position, score)| {
                let chunk = &self.entries[position].chunk;
                SearchCandidate {
                    chunk_id: chunk.chunk_id.clone(),
                    source: chunk.source.clone(),
                    page: chunk.page,
                    score,
                    text: chunk.text.clone(),
                }
            })
            .collect())
    }
}

pub fn cosine_similarity(left: &[f32], right: &[f32]) -> f64 {
    let mut dot = 0f64;
    let mut left_norm = 0f64;
    let mut right_norm = 0f64;

    for (a, b) in left.iter().zip(right) {
        let (a, b) = (f64::from(*a), f64::from(*b));
        dot += a * b;
        left_norm += a * a;
        right_norm += b * b;
    }

    if left_norm == 0.0 || right_norm == 0.0 {
        return 0.0;
    }
    dot / (left_norm.sqrt() * right_norm.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::DocumentSource;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn chunk(index: u64, text: &str) -> Chunk {
        Chunk {
            chunk_id: format!("chunk-{index}"),
            document_id: "doc-1".to_string(),
            source: DocumentSource::Text(PathBuf::from("data/text_files/prezzi.txt")),
            page: None,
            chunk_index: index,
            text: text.to_string(),
        }
    }

    #[test]
    fn results_are_ordered_by_descending_similarity() -> Result<(), Box<dyn std::error::Error>> {
        let index = FlatIndex::from_embeddings(
            "test",
            vec![chunk(0, "a"), chunk(1, "b"), chunk(2, "c")],
            vec![vec![1.0, 0.0], vec![0.6, 0.8], vec![0.0, 1.0]],
        )?;

        let hits = index.search(&[0.0, 1.0], 3)?;
        let ids: Vec<&str> = hits.iter().map(|hit| hit.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["chunk-2", "chunk-1", "chunk-0"]);
        assert!(hits[0].score > hits[1].score);
        Ok(())
    }

    #[test]
    fn ties_keep_insertion_order() -> Result<(), Box<dyn std::error::Error>> {
        let index = FlatIndex::from_embeddings(
            "test",
            vec![chunk(0, "a"), chunk(1, "b"), chunk(2, "c")],
            vec![vec![1.0, 0.0], vec![1.0, 0.0], vec![1.0, 0.0]],
        )?;

        let hits = index.search(&[1.0, 0.0], 2)?;
        assert_eq!(hits[0].chunk_id, "chunk-0");
        assert_eq!(hits[1].chunk_id, "chunk-1");
        Ok(())
    }

    #[test]
    fn dimension_mismatch_is_an_error() -> Result<(), Box<dyn std::error::Error>> {
        let index = FlatIndex::from_embeddings("test", vec![chunk(0, "a")], vec![vec![1.0, 0.0]])?;
        assert!(index.search(&[1.0, 0.0, 0.0], 1).is_err());
        assert!(FlatIndex::from_embeddings(
            "test",
            vec![chunk(0, "a"), chunk(1, "b")],
            vec![vec![1.0, 0.0], vec![1.0]],
        )
        .is_err());
        Ok(())
    }

    #[tokio::test]
    async fn missing_index_reports_no_index() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let result = FlatIndex::load(dir.path()).await;
        assert!(matches!(result, Err(SearchError::NoIndex(_))));
        Ok(())
    }

    #[tokio::test]
    async fn build_save_load_round_trip_finds_verbatim_chunk() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let embedder = CharacterNgramEmbedder::default();
        let chunks = vec![
            chunk(0, "Our showroom is open Monday to Saturday."),
            chunk(1, "Model X costs 500 euros."),
            chunk(2, "Delivery is free within Crotone."),
        ];

        let built = FlatIndex::build(chunks, &embedder, 2).await?;
        built.save(dir.path()).await?;
        let loaded = FlatIndex::load(dir.path()).await?;

        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded.embedder(), embedder.name());

        let query = embedder.embed("Model X costs 500 euros.").await?;
        let hits = loaded.search(&query, 2)?;
        assert_eq!(hits[0].text, "Model X costs 500 euros.");
        Ok(())
    }

    #[tokio::test]
    async fn rebuild_overwrites_previous_index() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let embedder = CharacterNgramEmbedder::default();

        FlatIndex::build(vec![chunk(0, "old"), chunk(1, "older")], &embedder, 8)
            .await?
            .save(dir.path())
            .await?;
        FlatIndex::build(vec![chunk(0, "new")], &embedder, 8)
            .await?
            .save(dir.path())
            .await?;

        let loaded = FlatIndex::load(dir.path()).await?;
        assert_eq!(loaded.len(), 1);
        assert!(!dir.path().join("index.json.tmp").exists());
        Ok(())
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "kind", content = "location", rename_all = "snake_case")]
pub enum DocumentSource {
    Pdf(PathBuf),
    Text(PathBuf),
    Web(String),
}

impl DocumentSource {
    pub fn locator(&self) -> String {
        match self {
            Self::Pdf(path) | Self::Text(path) => path.to_string_lossy().to_string(),
            Self::Web(url) => url.clone(),
        }
    }
}

impl fmt::Display for DocumentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pdf(path) => write!(f, "pdf:{}", path.display()),
            Self::Text(path) => write!(f, "text:{}", path.display()),
            Self::Web(url) => write!(f, "web:{url}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub document_id: String,
    pub source: DocumentSource,
    pub page: Option<u32>,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub chunk_id: String,
    pub document_id: String,
    pub source: DocumentSource,
    pub page: Option<u32>,
    pub chunk_index: u64,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchCandidate {
    pub chunk_id: String,
    pub source: DocumentSource,
    pub page: Option<u32>,
    pub score: f64,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatTurn {
    pub question: String,
    pub answer: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Product,
    General,
}

#[derive(Debug, Clone)]
pub struct IngestionOptions {
    pub chunk_max_chars: usize,
    pub chunk_overlap_chars: usize,
    pub embed_batch_size: usize,
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            chunk_max_chars: 1_000,
            chunk_overlap_chars: 200,
            embed_batch_size: 32,
        }
    }
}

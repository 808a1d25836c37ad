pub mod catalog;
pub mod chunking;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod frontdesk;
pub mod llm;
pub mod loader;
pub mod models;
pub mod orchestrator;
pub mod prompt;
pub mod session;
pub mod settings;
pub mod stores;
pub mod traits;

pub use catalog::{build_sources, CatalogEntry, SourceCatalog};
pub use chunking::{chunk_documents, split_text, ChunkingConfig};
pub use embeddings::{
    CharacterNgramEmbedder, Embedder, OllamaEmbedder, DEFAULT_EMBEDDING_DIMENSIONS,
    DEFAULT_OLLAMA_EMBEDDING_MODEL,
};
pub use error::{ChatError, IngestError, SearchError};
pub use extractor::{extract_page_texts, PageText, PdfExtractor};
pub use frontdesk::{CannedKind, Language};
pub use llm::{GenerationOptions, OllamaClient, StreamAssembler, DEFAULT_CHAT_MODEL, DEFAULT_OLLAMA_URL};
pub use loader::{DocumentLoader, LoadReport, SkippedSource};
pub use models::{
    ChatTurn, Chunk, Document, DocumentSource, IngestionOptions, QueryKind, SearchCandidate,
};
pub use orchestrator::{ChatPipeline, ChatReply, IndexSummary};
pub use session::SessionStore;
pub use settings::{CompanyProfile, DataPaths, RetrievalSettings};
pub use stores::FlatIndex;
pub use traits::{LanguageModel, VectorIndex};

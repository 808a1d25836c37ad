use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("{path} is not valid utf-8 text")]
    Encoding { path: String },

    #[error("fetching {url} failed: {details}")]
    Fetch { url: String, details: String },

    #[error("regex error: {0}")]
    RegexError(#[from] regex::Error),

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("source catalog is corrupt: {0}")]
    Catalog(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("search request failed: {0}")]
    Request(String),

    #[error("no index found at {0}")]
    NoIndex(String),

    #[error("index was built with embedder {index} but queries use {active}; rebuild the index")]
    EmbedderMismatch { index: String, active: String },
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("{0}")]
    Validation(&'static str),

    #[error("no index has been built yet")]
    NoIndex,

    #[error("retrieval failed: {0}")]
    Retrieval(#[source] SearchError),

    #[error("language model failed: {0}")]
    Llm(#[source] SearchError),
}

impl From<SearchError> for ChatError {
    fn from(value: SearchError) -> Self {
        match value {
            SearchError::NoIndex(_) => ChatError::NoIndex,
            other => ChatError::Retrieval(other),
        }
    }
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;

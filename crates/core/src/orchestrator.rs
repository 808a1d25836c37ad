use crate::embeddings::Embedder;
use crate::frontdesk::{
    canned_reply, classify_canned, detect_language, format_response, validate_input, CannedKind,
    Language,
};
use crate::prompt::{build_bare_prompt, build_prompt, classify_query, join_context};
use crate::session::SessionStore;
use crate::settings::{CompanyProfile, RetrievalSettings};
use crate::stores::FlatIndex;
use crate::traits::{LanguageModel, VectorIndex};
use crate::{ChatError, QueryKind, SearchCandidate, SearchError};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub enum ChatReply {
    Canned {
        text: String,
        kind: CannedKind,
        language: Language,
    },
    Answer {
        text: String,
        kind: QueryKind,
        language: Language,
        sources: Vec<SearchCandidate>,
        llm_elapsed: Duration,
    },
}

impl ChatReply {
    pub fn text(&self) -> &str {
        match self {
            Self::Canned { text, .. } | Self::Answer { text, .. } => text,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexSummary {
    pub chunks: usize,
    pub embedder: String,
    pub dimensions: usize,
    pub built_at: DateTime<Utc>,
}

pub struct ChatPipeline {
    embedder: Arc<dyn Embedder>,
    llm: Arc<dyn LanguageModel>,
    index: RwLock<Option<Arc<FlatIndex>>>,
    sessions: SessionStore,
    company: CompanyProfile,
    settings: RetrievalSettings,
}

impl ChatPipeline {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        llm: Arc<dyn LanguageModel>,
        company: CompanyProfile,
        settings: RetrievalSettings,
    ) -> Self {
        Self {
            embedder,
            llm,
            index: RwLock::new(None),
            sessions: SessionStore::new(settings.max_turns_per_session, settings.max_sessions),
            company,
            settings,
        }
    }

    pub fn with_index(self, index: FlatIndex) -> Result<Self, SearchError> {
        self.check_embedder(&index)?;
        Ok(Self {
            index: RwLock::new(Some(Arc::new(index))),
            ..self
        })
    }

    /// Vectors from another embedder are not comparable with query vectors,
    /// even when the dimensions happen to agree.
    fn check_embedder(&self, index: &FlatIndex) -> Result<(), SearchError> {
        let active = self.embedder.name();
        if index.embedder() != active {
            return Err(SearchError::EmbedderMismatch {
                index: index.embedder().to_string(),
                active,
            });
        }
        Ok(())
    }

    pub async fn install_index(&self, index: FlatIndex) -> Result<(), SearchError> {
        self.check_embedder(&index)?;
        *self.index.write().await = Some(Arc::new(index));
        Ok(())
    }

    /// Swaps in the index persisted under `dir`; the current one stays in
    /// place when loading fails.
    pub async fn reload(&self, dir: &Path) -> Result<usize, SearchError> {
        let index = FlatIndex::load(dir).await?;
        let chunks = index.len();
        self.install_index(index).await?;
        Ok(chunks)
    }

    pub async fn index_summary(&self) -> Option<IndexSummary> {
        self.index.read().await.as_ref().map(|index| IndexSummary {
            chunks: index.len(),
            embedder: index.embedder().to_string(),
            dimensions: index.dimensions(),
            built_at: index.built_at(),
        })
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub async fn handle(&self, session_id: &str, message: &str) -> Result<ChatReply, ChatError> {
        let question = validate_input(message).map_err(ChatError::Validation)?;

        let language = detect_language(question);
        debug!(session = session_id, %language, "detected language");

        if let Some(kind) = classify_canned(question) {
            debug!(session = session_id, ?kind, "answering with canned reply");
            return Ok(ChatReply::Canned {
                text: canned_reply(kind, &language, &self.company),
                kind,
                language,
            });
        }

        let sources = self.retrieve(question).await?;
        let kind = classify_query(question);
        let history = self
            .sessions
            .history(session_id, self.settings.history_turns_in_prompt);
        let prompt = build_prompt(&self.company, kind, &join_context(&sources), &history, question);

        let started = Instant::now();
        let raw = self.llm.generate(&prompt).await.map_err(ChatError::Llm)?;
        let llm_elapsed = started.elapsed();

        let text = format_response(&raw);
        self.sessions.record(session_id, question, &text);

        info!(
            session = session_id,
            ?kind,
            sources = sources.len(),
            llm_ms = llm_elapsed.as_millis() as u64,
            "answered question"
        );

        Ok(ChatReply::Answer {
            text,
            kind,
            language,
            sources,
            llm_elapsed,
        })
    }

    pub async fn retrieve(&self, question: &str) -> Result<Vec<SearchCandidate>, ChatError> {
        let index = self.index.read().await.clone().ok_or(ChatError::NoIndex)?;

        let query_vector = self
            .embedder
            .embed(question)
            .await
            .map_err(ChatError::Retrieval)?;
        let hits = index
            .search(&query_vector, self.settings.top_k)
            .map_err(ChatError::Retrieval)?;

        debug!(hits = hits.len(), "retrieved context");
        Ok(hits)
    }

    /// Retrieval plus generation without the canned front end or session
    /// history.
    pub async fn ask(&self, question: &str) -> Result<(String, Vec<SearchCandidate>), ChatError> {
        let sources = self.retrieve(question).await?;
        let prompt = build_prompt(
            &self.company,
            classify_query(question),
            &join_context(&sources),
            &[],
            question,
        );
        let answer = self.llm.generate(&prompt).await.map_err(ChatError::Llm)?;
        Ok((answer, sources))
    }

    pub async fn ask_without_retrieval(&self, question: &str) -> Result<String, ChatError> {
        self.llm
            .generate(&build_bare_prompt(question))
            .await
            .map_err(ChatError::Llm)
    }
}

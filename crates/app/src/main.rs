mod server;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use showroom_rag_core::loader::{source_for_path, validate_web_url};
use showroom_rag_core::{
    build_sources, chunk_documents, CharacterNgramEmbedder, ChatPipeline, CompanyProfile,
    DataPaths, DocumentLoader, DocumentSource, Embedder, FlatIndex, GenerationOptions,
    IngestionOptions, OllamaClient, OllamaEmbedder, RetrievalSettings, SearchError,
    SourceCatalog, DEFAULT_CHAT_MODEL, DEFAULT_OLLAMA_EMBEDDING_MODEL, DEFAULT_OLLAMA_URL,
};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "showroom-rag", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Folder holding the source catalog, dropped-in files and the vector store
    #[arg(long, env = "SHOWROOM_DATA_DIR", default_value = "data")]
    data_dir: PathBuf,

    /// Ollama base URL
    #[arg(long, env = "OLLAMA_URL", default_value = DEFAULT_OLLAMA_URL)]
    ollama_url: String,

    /// Chat model served by Ollama
    #[arg(long, env = "OLLAMA_MODEL", default_value = DEFAULT_CHAT_MODEL)]
    model: String,

    /// Embedding backend used for indexing and queries
    #[arg(long, value_enum, default_value_t = EmbedderKind::Ollama)]
    embedder: EmbedderKind,

    /// Embedding model served by Ollama
    #[arg(long, env = "EMBEDDING_MODEL", default_value = DEFAULT_OLLAMA_EMBEDDING_MODEL)]
    embedding_model: String,

    /// Number of chunks handed to the model as context
    #[arg(long, default_value_t = 5)]
    top_k: usize,

    /// Sampling temperature
    #[arg(long, default_value_t = 0.05)]
    temperature: f32,

    /// Maximum tokens generated per answer
    #[arg(long, default_value_t = 200)]
    num_predict: u32,

    /// Seconds to wait for the language model before giving up
    #[arg(long, default_value_t = 120)]
    llm_timeout_secs: u64,
}

#[derive(Clone, Copy, ValueEnum)]
enum EmbedderKind {
    /// Sentence embeddings from the Ollama server.
    Ollama,
    /// Offline character n-gram hashing.
    Ngram,
}

#[derive(Subcommand)]
enum Command {
    /// Add a PDF document to the knowledge base.
    AddPdf {
        path: PathBuf,
    },
    /// Add a UTF-8 text document to the knowledge base.
    AddText {
        path: PathBuf,
    },
    /// Add the content of a web page to the knowledge base.
    AddUrl {
        url: String,
    },
    /// Remove a previously added source (path or URL).
    Remove {
        source: String,
    },
    /// List every source the next build will read.
    Sources,
    /// Rebuild the vector index from all sources.
    Build {
        /// Maximum characters per chunk.
        #[arg(long, default_value_t = 1_000)]
        chunk_size: usize,
        /// Characters shared by consecutive chunks.
        #[arg(long, default_value_t = 200)]
        chunk_overlap: usize,
    },
    /// Ask a test question against the current index.
    Query {
        question: String,
        /// Send the question to the model without retrieved context.
        #[arg(long, default_value_t = false)]
        no_retrieval: bool,
    },
    /// Serve the chat HTTP endpoint.
    Serve {
        #[arg(long, env = "SHOWROOM_HOST", default_value = "127.0.0.1")]
        host: String,
        #[arg(long, env = "SHOWROOM_PORT", default_value_t = 5000)]
        port: u16,
        /// Folder with the chat widget page and script.
        #[arg(long, env = "SHOWROOM_STATIC_DIR", default_value = "static")]
        static_dir: PathBuf,
    },
}

impl Cli {
    fn embedder(&self) -> Result<Arc<dyn Embedder>, SearchError> {
        Ok(match self.embedder {
            EmbedderKind::Ollama => Arc::new(OllamaEmbedder::new(
                &self.ollama_url,
                self.embedding_model.clone(),
            )?),
            EmbedderKind::Ngram => Arc::new(CharacterNgramEmbedder::default()),
        })
    }

    fn pipeline(&self) -> Result<ChatPipeline, SearchError> {
        let options = GenerationOptions {
            temperature: self.temperature,
            num_predict: self.num_predict,
            ..GenerationOptions::default()
        };
        let llm = OllamaClient::new(
            &self.ollama_url,
            self.model.clone(),
            options,
            Duration::from_secs(self.llm_timeout_secs),
        )?;
        let embedder = self.embedder()?;
        info!(model = llm.model(), embedder = %embedder.name(), "model clients ready");

        Ok(ChatPipeline::new(
            embedder,
            Arc::new(llm),
            CompanyProfile::default(),
            RetrievalSettings {
                top_k: self.top_k,
                ..RetrievalSettings::default()
            },
        ))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    let paths = DataPaths::new(&cli.data_dir);
    paths
        .ensure()
        .with_context(|| format!("creating data folders under {}", cli.data_dir.display()))?;

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        data_dir = %cli.data_dir.display(),
        "showroom-rag boot"
    );

    match &cli.command {
        Command::AddPdf { path } => add_file(&paths, path, true).await?,
        Command::AddText { path } => add_file(&paths, path, false).await?,
        Command::AddUrl { url } => {
            let parsed = validate_web_url(url)?;
            add_source(&paths, DocumentSource::Web(parsed.to_string())).await?;
        }
        Command::Remove { source } => {
            let mut catalog = SourceCatalog::load(&paths.catalog())?;
            let removed = catalog
                .entries()
                .iter()
                .find(|entry| entry.source.locator() == *source)
                .map(|entry| entry.source.clone());
            match removed {
                Some(found) => {
                    catalog.remove(&found);
                    catalog.save(&paths.catalog())?;
                    println!("Removed {found}. Run `build` to refresh the index.");
                }
                None => println!("No source matches {source}"),
            }
        }
        Command::Sources => {
            let catalog = SourceCatalog::load(&paths.catalog())?;
            let sources = build_sources(&catalog, &paths);
            if sources.is_empty() {
                println!("No sources added yet");
            }
            for source in sources {
                println!("{source}");
            }
        }
        Command::Build {
            chunk_size,
            chunk_overlap,
        } => {
            let options = IngestionOptions {
                chunk_max_chars: *chunk_size,
                chunk_overlap_chars: *chunk_overlap,
                ..IngestionOptions::default()
            };
            let embedder = cli.embedder()?;
            build_index(&paths, &options, embedder.as_ref()).await?;
        }
        Command::Query {
            question,
            no_retrieval,
        } => {
            let pipeline = cli.pipeline()?;

            if *no_retrieval {
                let answer = pipeline.ask_without_retrieval(question).await?;
                println!("{answer}");
            } else {
                pipeline.reload(&paths.vector_store()).await?;
                let (answer, sources) = pipeline.ask(question).await?;

                for hit in sources {
                    println!("[{}] score={:.4} chunk={}", hit.source, hit.score, hit.chunk_id);
                }
                println!("\n{answer}");
            }
        }
        Command::Serve {
            host,
            port,
            static_dir,
        } => {
            let pipeline = cli.pipeline()?;

            match pipeline.reload(&paths.vector_store()).await {
                Ok(chunks) => info!(chunks, "vector index ready"),
                Err(SearchError::NoIndex(dir)) => {
                    warn!(dir = %dir, "no vector index yet; questions will fail until `build` runs")
                }
                Err(error) => return Err(error.into()),
            }

            let addr: SocketAddr = format!("{host}:{port}")
                .parse()
                .with_context(|| format!("invalid listen address {host}:{port}"))?;
            let state = server::AppState {
                pipeline: Arc::new(pipeline),
                index_dir: paths.vector_store(),
                static_dir: static_dir.clone(),
            };
            server::serve(state, addr).await?;
        }
    }

    Ok(())
}

async fn add_file(paths: &DataPaths, path: &Path, is_pdf: bool) -> anyhow::Result<()> {
    let path = std::fs::canonicalize(path)
        .with_context(|| format!("cannot read {}", path.display()))?;

    if source_for_path(path.clone()).is_none() {
        warn!(path = %path.display(), "unrecognised extension, adding as requested");
    }

    let source = if is_pdf {
        DocumentSource::Pdf(path)
    } else {
        DocumentSource::Text(path)
    };
    add_source(paths, source).await
}

async fn add_source(paths: &DataPaths, source: DocumentSource) -> anyhow::Result<()> {
    let documents = DocumentLoader::new()?
        .load(&source)
        .await
        .with_context(|| format!("could not add {source}"))?;

    let mut catalog = SourceCatalog::load(&paths.catalog())?;
    if catalog.add(source.clone()) {
        catalog.save(&paths.catalog())?;
        println!(
            "Added {source} ({} document(s)). Run `build` to refresh the index.",
            documents.len()
        );
    } else {
        println!("{source} was already added");
    }
    Ok(())
}

async fn build_index(
    paths: &DataPaths,
    options: &IngestionOptions,
    embedder: &dyn Embedder,
) -> anyhow::Result<()> {
    let catalog = SourceCatalog::load(&paths.catalog())?;
    let sources = build_sources(&catalog, paths);
    if sources.is_empty() {
        anyhow::bail!("no documents to process; add a source first");
    }

    let report = DocumentLoader::new()?.load_best_effort(&sources).await;
    if !report.skipped_sources.is_empty() {
        warn!(skipped = report.skipped_sources.len(), "some sources were skipped");
        for skipped in &report.skipped_sources {
            warn!(source = %skipped.source, reason = %skipped.reason, "skipped source");
        }
    }
    if report.documents.is_empty() {
        anyhow::bail!("no readable documents; every source was skipped");
    }

    let chunks = chunk_documents(&report.documents, options)?;
    info!(
        documents = report.documents.len(),
        chunk_count = chunks.len(),
        "embedding chunks"
    );

    let chunk_count = chunks.len();
    let index = FlatIndex::build(chunks, embedder, options.embed_batch_size).await?;
    let written = index.save(&paths.vector_store()).await?;

    println!(
        "{} chunks indexed into {} at {}",
        chunk_count,
        written.display(),
        Utc::now().to_rfc3339()
    );
    Ok(())
}

use crate::traits::LanguageModel;
use crate::SearchError;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_CHAT_MODEL: &str = "gemma3:1b";

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub num_predict: u32,
    pub top_k: u32,
    pub top_p: f32,
    pub repeat_penalty: f32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.05,
            num_predict: 200,
            top_k: 3,
            top_p: 0.7,
            repeat_penalty: 1.2,
        }
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    options: &'a GenerationOptions,
}

#[derive(Debug, Deserialize)]
struct GenerateFragment {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Reassembles a newline-delimited JSON stream whose lines may be split
/// across arbitrary transport chunks.
#[derive(Debug, Default)]
pub struct StreamAssembler {
    pending: Vec<u8>,
    answer: String,
    fragments: usize,
}

impl StreamAssembler {
    pub fn push(&mut self, bytes: &[u8]) -> Result<(), SearchError> {
        self.pending.extend_from_slice(bytes);

        while let Some(newline) = self.pending.iter().position(|byte| *byte == b'\n') {
            let line = self.pending.drain(..=newline).collect::<Vec<_>>();
            self.accept_line(&line[..line.len() - 1])?;
        }
        Ok(())
    }

    pub fn finish(mut self) -> Result<String, SearchError> {
        let rest = std::mem::take(&mut self.pending);
        self.accept_line(&rest)?;
        debug!(fragments = self.fragments, "llm stream complete");
        Ok(self.answer)
    }

    fn accept_line(&mut self, line: &[u8]) -> Result<(), SearchError> {
        if line.iter().all(u8::is_ascii_whitespace) {
            return Ok(());
        }

        let fragment: GenerateFragment = serde_json::from_slice(line)?;
        if let Some(error) = fragment.error {
            return Err(SearchError::BackendResponse {
                backend: "ollama".to_string(),
                details: error,
            });
        }
        if let Some(text) = fragment.response {
            self.answer.push_str(&text);
            self.fragments += 1;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: Client,
    endpoint: Url,
    model: String,
    options: GenerationOptions,
}

impl OllamaClient {
    pub fn new(
        base_url: &str,
        model: impl Into<String>,
        options: GenerationOptions,
        timeout: Duration,
    ) -> Result<Self, SearchError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: Url::parse(base_url)?.join("/api/generate")?,
            model: model.into(),
            options,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl LanguageModel for OllamaClient {
    async fn generate(&self, prompt: &str) -> Result<String, SearchError> {
        info!(model = %self.model, prompt_chars = prompt.chars().count(), "querying language model");

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&GenerateRequest {
                model: &self.model,
                prompt,
                options: &self.options,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: "ollama".to_string(),
                details: response.status().to_string(),
            });
        }

        let mut assembler = StreamAssembler::default();
        let mut stream = response.bytes_stream();
        while let Some(bytes) = stream.next().await {
            assembler.push(&bytes?)?;
        }
        assembler.finish()
    }
}

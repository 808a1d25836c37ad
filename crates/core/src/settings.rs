use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompanyProfile {
    pub name: String,
    pub location: String,
    pub email: String,
    pub phone: String,
    pub assistant_name: String,
}

impl Default for CompanyProfile {
    fn default() -> Self {
        Self {
            name: "Schipani".to_string(),
            location: "Crotone, Italy".to_string(),
            email: "info@infissiearredamentikroton.it".to_string(),
            phone: "+39 0962 19 71 707".to_string(),
            assistant_name: "Benedetta".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrievalSettings {
    pub top_k: usize,
    pub history_turns_in_prompt: usize,
    pub max_turns_per_session: usize,
    pub max_sessions: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: 5,
            history_turns_in_prompt: 3,
            max_turns_per_session: 20,
            max_sessions: 1_024,
        }
    }
}

/// On-disk layout under the data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPaths {
    pub root: PathBuf,
}

impl DataPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn vector_store(&self) -> PathBuf {
        self.root.join("vector_store")
    }

    pub fn pdfs(&self) -> PathBuf {
        self.root.join("pdfs")
    }

    pub fn text_files(&self) -> PathBuf {
        self.root.join("text_files")
    }

    pub fn catalog(&self) -> PathBuf {
        self.root.join("sources.json")
    }

    pub fn ensure(&self) -> std::io::Result<()> {
        for dir in [self.vector_store(), self.pdfs(), self.text_files()] {
            std::fs::create_dir_all(&dir)?;
        }
        Ok(())
    }
}

impl Default for DataPaths {
    fn default() -> Self {
        Self::new("data")
    }
}

use crate::loader::discover_source_files;
use crate::settings::DataPaths;
use crate::{DocumentSource, IngestError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogEntry {
    pub source: DocumentSource,
    pub added_at: DateTime<Utc>,
}

/// The accumulated set of sources every index build re-reads.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceCatalog {
    entries: Vec<CatalogEntry>,
}

impl SourceCatalog {
    pub fn load(path: &Path) -> Result<Self, IngestError> {
        match std::fs::read(path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(error) => Err(error.into()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), IngestError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }

    /// Returns `false` when the source was already present.
    pub fn add(&mut self, source: DocumentSource) -> bool {
        if self.entries.iter().any(|entry| entry.source == source) {
            return false;
        }
        self.entries.push(CatalogEntry {
            source,
            added_at: Utc::now(),
        });
        true
    }

    pub fn remove(&mut self, source: &DocumentSource) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| &entry.source != source);
        self.entries.len() != before
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Catalog sources followed by any file dropped into the data folders,
/// without duplicates.
pub fn build_sources(catalog: &SourceCatalog, paths: &DataPaths) -> Vec<DocumentSource> {
    let mut seen = HashSet::new();
    let discovered = [paths.pdfs(), paths.text_files()]
        .into_iter()
        .filter(|dir| dir.is_dir())
        .flat_map(|dir| discover_source_files(&dir));

    catalog
        .entries
        .iter()
        .map(|entry| entry.source.clone())
        .chain(discovered)
        .filter(|source| seen.insert(source.clone()))
        .collect()
}

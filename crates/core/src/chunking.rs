use crate::error::IngestError;
use crate::models::{Chunk, Document, IngestionOptions};
use sha2::{Digest, Sha256};
use std::collections::VecDeque;

const SEPARATORS: [&str; 5] = ["\n\n", "\n", ". ", " ", ""];

#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    pub max_chars: usize,
    pub overlap_chars: usize,
}

impl From<IngestionOptions> for ChunkingConfig {
    fn from(value: IngestionOptions) -> Self {
        Self {
            max_chars: value.chunk_max_chars,
            overlap_chars: value.chunk_overlap_chars,
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self::from(IngestionOptions::default())
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.max_chars == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "max_chars must be positive".to_string(),
            ));
        }
        if self.overlap_chars >= self.max_chars {
            return Err(IngestError::InvalidChunkConfig(format!(
                "overlap {} must be smaller than max size {}",
                self.overlap_chars, self.max_chars
            )));
        }
        Ok(())
    }
}

/// Splits `text` into windows of at most `max_chars` characters, cutting at
/// the coarsest separator that yields small enough pieces. Consecutive windows
/// share up to `overlap_chars` characters of whole pieces.
pub fn split_text(text: &str, config: ChunkingConfig) -> Vec<String> {
    let mut windows = Vec::new();
    split_recursive(text, &SEPARATORS, config, &mut windows);

    windows
        .into_iter()
        .map(|window| window.trim().to_string())
        .filter(|window| !window.is_empty())
        .collect()
}

fn split_recursive(text: &str, separators: &[&str], config: ChunkingConfig, out: &mut Vec<String>) {
    let position = separators
        .iter()
        .position(|separator| separator.is_empty() || text.contains(separator))
        .unwrap_or(separators.len().saturating_sub(1));
    let separator = separators.get(position).copied().unwrap_or("");
    let finer = separators.get(position + 1..).unwrap_or(&[]);

    let pieces: Vec<&str> = if separator.is_empty() {
        text.char_indices()
            .map(|(start, ch)| &text[start..start + ch.len_utf8()])
            .collect()
    } else {
        text.split_inclusive(separator).collect()
    };

    let mut fitting = Vec::new();
    for piece in pieces {
        if piece.chars().count() <= config.max_chars {
            fitting.push(piece);
            continue;
        }

        if !fitting.is_empty() {
            out.extend(merge_pieces(&fitting, config));
            fitting.clear();
        }
        split_recursive(piece, finer, config, out);
    }

    if !fitting.is_empty() {
        out.extend(merge_pieces(&fitting, config));
    }
}

fn merge_pieces(pieces: &[&str], config: ChunkingConfig) -> Vec<String> {
    let mut merged = Vec::new();
    let mut window: VecDeque<(&str, usize)> = VecDeque::new();
    let mut total = 0usize;

    for piece in pieces {
        let len = piece.chars().count();

        if total + len > config.max_chars && !window.is_empty() {
            merged.push(window.iter().map(|(text, _)| *text).collect::<String>());

            while total > config.overlap_chars || (total > 0 && total + len > config.max_chars) {
                match window.pop_front() {
                    Some((_, popped)) => total -= popped,
                    None => break,
                }
            }
        }

        window.push_back((piece, len));
        total += len;
    }

    if !window.is_empty() {
        merged.push(window.iter().map(|(text, _)| *text).collect::<String>());
    }

    merged
}

pub fn chunk_documents(
    documents: &[Document],
    options: &IngestionOptions,
) -> Result<Vec<Chunk>, IngestError> {
    let config = ChunkingConfig::from(options.clone());
    config.validate()?;

    let mut chunks = Vec::new();
    let mut cursor = 0u64;

    for document in documents {
        for text in split_text(&document.text, config) {
            chunks.push(Chunk {
                chunk_id: make_chunk_id(&document.document_id, document.page, cursor, &text),
                document_id: document.document_id.clone(),
                source: document.source.clone(),
                page: document.page,
                chunk_index: cursor,
                text,
            });
            cursor = cursor.saturating_add(1);
        }
    }

    Ok(chunks)
}

fn make_chunk_id(document_id: &str, page: Option<u32>, index: u64, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(document_id.as_bytes());
    hasher.update(page.unwrap_or(0).to_le_bytes());
    hasher.update(index.to_le_bytes());
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DocumentSource;
    use std::path::PathBuf;

    fn config(max_chars: usize, overlap_chars: usize) -> ChunkingConfig {
        ChunkingConfig {
            max_chars,
            overlap_chars,
        }
    }

    fn numbered_words(count: usize) -> String {
        (0..count)
            .map(|index| format!("w{index}"))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        let chunks = split_text("Model X costs 500 euros.", config(100, 20));
        assert_eq!(chunks, vec!["Model X costs 500 euros.".to_string()]);
    }

    #[test]
    fn paragraph_breaks_are_preferred() {
        let text = "Alpha paragraph about doors.\n\nBeta paragraph about windows.";
        let chunks = split_text(text, config(50, 0));
        assert_eq!(
            chunks,
            vec![
                "Alpha paragraph about doors.".to_string(),
                "Beta paragraph about windows.".to_string(),
            ]
        );
    }

    #[test]
    fn no_chunk_exceeds_max_chars() {
        let text = format!(
            "{}\n\n{}\n{}",
            numbered_words(300),
            "è".repeat(450),
            numbered_words(80)
        );
        for chunk in split_text(&text, config(120, 30)) {
            assert!(chunk.chars().count() <= 120, "chunk too long: {chunk}");
        }
    }

    #[test]
    fn consecutive_chunks_overlap() {
        let chunks = split_text(&numbered_words(200), config(100, 30));
        assert!(chunks.len() > 2);

        for pair in chunks.windows(2) {
            let first_word = pair[1].split_whitespace().next().unwrap_or_default();
            assert!(
                pair[0].split_whitespace().any(|word| word == first_word),
                "{first_word} should repeat from the previous chunk"
            );
        }
    }

    #[test]
    fn unbroken_text_falls_back_to_hard_cuts() {
        let chunks = split_text(&"x".repeat(250), config(100, 20));
        let lengths: Vec<usize> = chunks.iter().map(|chunk| chunk.chars().count()).collect();
        assert_eq!(lengths, vec![100, 100, 90]);
    }

    #[test]
    fn chunking_is_deterministic() {
        let text = format!("{}\n\n{}", numbered_words(250), numbered_words(90));
        let first = split_text(&text, config(200, 50));
        let second = split_text(&text, config(200, 50));
        assert_eq!(first, second);
    }

    #[test]
    fn invalid_configs_are_rejected() {
        assert!(config(0, 0).validate().is_err());
        assert!(config(100, 100).validate().is_err());
        assert!(config(100, 99).validate().is_ok());
    }

    #[test]
    fn documents_chunk_in_order_with_inherited_metadata() -> Result<(), Box<dyn std::error::Error>> {
        let source = DocumentSource::Pdf(PathBuf::from("data/pdfs/catalogo.pdf"));
        let documents = vec![
            Document {
                document_id: "doc-1".to_string(),
                source: source.clone(),
                page: Some(1),
                text: numbered_words(60),
            },
            Document {
                document_id: "doc-1".to_string(),
                source: source.clone(),
                page: Some(2),
                text: "Porta Aria, finitura noce.".to_string(),
            },
        ];

        let options = IngestionOptions {
            chunk_max_chars: 100,
            chunk_overlap_chars: 20,
            ..IngestionOptions::default()
        };
        let chunks = chunk_documents(&documents, &options)?;

        assert!(chunks.len() >= 3);
        for (position, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index, position as u64);
            assert_eq!(chunk.source, source);
        }
        let last = chunks.last().ok_or("no chunks")?;
        assert_eq!(last.page, Some(2));
        assert_eq!(last.text, "Porta Aria, finitura noce.");
        Ok(())
    }
}

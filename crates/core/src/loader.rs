use crate::extractor::extract_page_texts;
use crate::{Document, DocumentSource, IngestError};
use regex::Regex;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;
use walkdir::WalkDir;

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

const CONTENT_SELECTORS: [&str; 4] = ["main", "article", "#content", "body"];

const SKIPPED_ELEMENTS: [&str; 9] = [
    "script", "style", "noscript", "nav", "header", "footer", "svg", "form", "template",
];

const BLOCK_ELEMENTS: [&str; 16] = [
    "p", "div", "section", "li", "ul", "ol", "tr", "table", "br", "h1", "h2", "h3", "h4", "h5",
    "h6", "blockquote",
];

pub struct SkippedSource {
    pub source: DocumentSource,
    pub reason: String,
}

pub struct LoadReport {
    pub documents: Vec<Document>,
    pub skipped_sources: Vec<SkippedSource>,
}

#[derive(Clone)]
pub struct DocumentLoader {
    client: Client,
}

impl DocumentLoader {
    pub fn new() -> Result<Self, IngestError> {
        let client = Client::builder().timeout(FETCH_TIMEOUT).build()?;
        Ok(Self { client })
    }

    pub async fn load(&self, source: &DocumentSource) -> Result<Vec<Document>, IngestError> {
        let documents = match source {
            DocumentSource::Pdf(path) => {
                let path = path.clone();
                tokio::task::spawn_blocking(move || load_pdf(&path))
                    .await
                    .map_err(|error| IngestError::InvalidArgument(error.to_string()))??
            }
            DocumentSource::Text(path) => load_text(path).await?,
            DocumentSource::Web(url) => self.load_web(url).await?,
        };

        info!(source = %source, documents = documents.len(), "loaded source");
        Ok(documents)
    }

    pub async fn load_best_effort(&self, sources: &[DocumentSource]) -> LoadReport {
        let mut documents = Vec::new();
        let mut skipped_sources = Vec::new();

        for source in sources {
            match self.load(source).await {
                Ok(loaded) => documents.extend(loaded),
                Err(error) => {
                    warn!(source = %source, %error, "skipping unreadable source");
                    skipped_sources.push(SkippedSource {
                        source: source.clone(),
                        reason: error.to_string(),
                    });
                }
            }
        }

        LoadReport {
            documents,
            skipped_sources,
        }
    }

    pub async fn load_web(&self, url: &str) -> Result<Vec<Document>, IngestError> {
        let parsed = validate_web_url(url)?;
        let source = DocumentSource::Web(parsed.to_string());

        let response = self.client.get(parsed).send().await?;
        if !response.status().is_success() {
            return Err(IngestError::Fetch {
                url: url.to_string(),
                details: response.status().to_string(),
            });
        }

        let is_html = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map_or(true, |value| value.contains("html"));
        let body = response.text().await?;

        let raw = if is_html {
            extract_visible_text(&body)
        } else {
            body
        };
        let text = normalize_text(&raw)?;
        debug!(url, chars = text.chars().count(), "extracted page text");

        if text.is_empty() {
            return Err(IngestError::Fetch {
                url: url.to_string(),
                details: "page has no readable text".to_string(),
            });
        }

        Ok(vec![Document {
            document_id: document_id(&source),
            source,
            page: None,
            text,
        }])
    }
}

pub fn load_pdf(path: &Path) -> Result<Vec<Document>, IngestError> {
    let source = DocumentSource::Pdf(path.to_path_buf());
    let id = document_id(&source);

    extract_page_texts(path)?
        .into_iter()
        .map(|page| {
            Ok(Document {
                document_id: id.clone(),
                source: source.clone(),
                page: Some(page.number),
                text: normalize_text(&page.text)?,
            })
        })
        .collect()
}

pub async fn load_text(path: &Path) -> Result<Vec<Document>, IngestError> {
    let bytes = tokio::fs::read(path).await?;
    let raw = String::from_utf8(bytes).map_err(|_| IngestError::Encoding {
        path: path.display().to_string(),
    })?;

    let text = normalize_text(&raw)?;
    if text.is_empty() {
        return Err(IngestError::InvalidArgument(format!(
            "text file is empty: {}",
            path.display()
        )));
    }

    let source = DocumentSource::Text(path.to_path_buf());
    Ok(vec![Document {
        document_id: document_id(&source),
        source,
        page: None,
        text,
    }])
}

pub fn validate_web_url(url: &str) -> Result<Url, IngestError> {
    let parsed = Url::parse(url.trim())?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(IngestError::InvalidArgument(format!(
            "only http(s) urls can be ingested: {url}"
        )));
    }
    if parsed.host_str().is_none() {
        return Err(IngestError::InvalidArgument(format!("url has no host: {url}")));
    }
    Ok(parsed)
}

pub fn discover_source_files(folder: &Path) -> Vec<DocumentSource> {
    let mut files: Vec<PathBuf> = WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.path().to_path_buf())
        .collect();
    files.sort_unstable();

    files.into_iter().filter_map(source_for_path).collect()
}

pub fn source_for_path(path: PathBuf) -> Option<DocumentSource> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())?;

    match extension.as_str() {
        "pdf" => Some(DocumentSource::Pdf(path)),
        "txt" | "md" => Some(DocumentSource::Text(path)),
        _ => None,
    }
}

pub fn document_id(source: &DocumentSource) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Trims every line, collapses inline whitespace and keeps at most one blank
/// line between paragraphs so the chunker can still find paragraph breaks.
pub fn normalize_text(text: &str) -> Result<String, IngestError> {
    let inline_space = Regex::new(r"[ \t\u{a0}]+")?;
    let blank_lines = Regex::new(r"\n{3,}")?;

    let lines = text
        .replace("\r\n", "\n")
        .lines()
        .map(|line| inline_space.replace_all(line.trim(), " ").into_owned())
        .collect::<Vec<_>>()
        .join("\n");

    Ok(blank_lines.replace_all(lines.trim(), "\n\n").into_owned())
}

pub fn extract_visible_text(html: &str) -> String {
    let document = Html::parse_document(html);

    let root = CONTENT_SELECTORS
        .iter()
        .filter_map(|selector| Selector::parse(selector).ok())
        .find_map(|selector| document.select(&selector).next());

    let mut out = String::new();
    if let Some(root) = root {
        collect_text(root, &mut out);
    }
    out
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    let name = element.value().name();
    if SKIPPED_ELEMENTS.contains(&name) {
        return;
    }

    let is_block = BLOCK_ELEMENTS.contains(&name);
    if is_block {
        out.push_str("\n\n");
    }

    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
        } else if let Some(child_element) = ElementRef::wrap(child) {
            collect_text(child_element, out);
        }
    }

    if is_block {
        out.push_str("\n\n");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::tempdir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn normalization_keeps_paragraph_breaks() -> Result<(), Box<dyn std::error::Error>> {
        let input = "  Porte   interne \t blindate \n\n\n\n Finiture:  noce\r\n";
        let normalized = normalize_text(input)?;
        assert_eq!(normalized, "Porte interne blindate\n\nFiniture: noce");
        Ok(())
    }

    #[test]
    fn discovery_is_recursive_and_filters_extensions() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let nested = dir.path().join("nested");
        fs::create_dir(&nested)?;

        File::create(dir.path().join("a.pdf"))?.write_all(b"%PDF-1.4\n%fake")?;
        File::create(nested.join("b.TXT"))?.write_all(b"hello")?;
        File::create(nested.join("c.png"))?.write_all(b"png")?;

        let sources = discover_source_files(dir.path());
        assert_eq!(sources.len(), 2);
        assert!(matches!(sources[0], DocumentSource::Pdf(_)));
        assert!(matches!(sources[1], DocumentSource::Text(_)));
        Ok(())
    }

    #[tokio::test]
    async fn text_file_loads_as_single_document() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("about.txt");
        fs::write(&path, "Schipani\n\nModel X costs 500 euros.")?;

        let documents = load_text(&path).await?;
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].text, "Schipani\n\nModel X costs 500 euros.");
        assert_eq!(documents[0].page, None);
        assert_eq!(documents[0].document_id, document_id(&documents[0].source));
        Ok(())
    }

    #[tokio::test]
    async fn invalid_utf8_is_an_encoding_error() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("latin1.txt");
        fs::write(&path, [0x50, 0x6f, 0x72, 0x74, 0xe8])?;

        assert!(matches!(load_text(&path).await, Err(IngestError::Encoding { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn missing_text_file_is_io_error() {
        let result = load_text(Path::new("/nonexistent/listino.txt")).await;
        assert!(matches!(result, Err(IngestError::Io(_))));
    }

    #[test]
    fn web_urls_must_be_http() {
        assert!(validate_web_url("https://www.example.com/porte").is_ok());
        assert!(validate_web_url("ftp://example.com").is_err());
        assert!(validate_web_url("not a url").is_err());
    }

    #[test]
    fn visible_text_skips_scripts_and_navigation() {
        let html = r#"
            <html><head><title>Porte</title><style>p { color: red }</style></head>
            <body>
              <nav>Home | Contatti</nav>
              <main>
                <h1>Porte interne</h1>
                <p>Modello Aria, finitura rovere.</p>
                <script>trackVisitor()</script>
              </main>
              <footer>Copyright</footer>
            </body></html>
        "#;

        let text = extract_visible_text(html);
        assert!(text.contains("Porte interne"));
        assert!(text.contains("Modello Aria, finitura rovere."));
        assert!(!text.contains("trackVisitor"));
        assert!(!text.contains("Contatti"));
        assert!(!text.contains("Copyright"));
    }

    #[tokio::test]
    async fn web_page_is_fetched_and_cleaned() -> Result<(), Box<dyn std::error::Error>> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/chi-siamo"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                "<html><body><main><p>Showroom a Crotone.</p></main></body></html>",
                "text/html; charset=utf-8",
            ))
            .mount(&server)
            .await;

        let loader = DocumentLoader::new()?;
        let documents = loader
            .load(&DocumentSource::Web(format!("{}/chi-siamo", server.uri())))
            .await?;

        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].text, "Showroom a Crotone.");
        Ok(())
    }

    #[tokio::test]
    async fn unreachable_page_status_is_a_fetch_error() -> Result<(), Box<dyn std::error::Error>> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let loader = DocumentLoader::new()?;
        let result = loader.load_web(&format!("{}/missing", server.uri())).await;
        assert!(matches!(result, Err(IngestError::Fetch { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn best_effort_reports_skipped_sources() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let good = dir.path().join("about.txt");
        fs::write(&good, "Orari: lun-sab 9-13")?;
        let broken = dir.path().join("broken.pdf");
        fs::write(&broken, b"%PDF-1.4\n%broken")?;

        let loader = DocumentLoader::new()?;
        let report = loader
            .load_best_effort(&[DocumentSource::Text(good), DocumentSource::Pdf(broken)])
            .await;

        assert_eq!(report.documents.len(), 1);
        assert_eq!(report.skipped_sources.len(), 1);
        assert!(matches!(
            report.skipped_sources[0].source,
            DocumentSource::Pdf(_)
        ));
        Ok(())
    }
}

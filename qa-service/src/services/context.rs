//! Context loader.
//!
//! The grounding text lives in a plain-text cache file. When the file is
//! missing, the source page is scraped once: every `<p>` element, in document
//! order, joined with newlines. There is no freshness policy; the file stays
//! until someone deletes it (or runs `qa-scrape`).

use crate::config::ContextConfig;
use crate::services::metrics;
use reqwest::Client;
use scraper::{Html, Selector};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

/// Returned instead of the context when the page cannot be scraped.
pub const CONTEXT_FALLBACK: &str = "Conteúdo oficial do site não pôde ser carregado no momento.";

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct ContextLoader {
    source_url: String,
    cache_path: PathBuf,
    client: Client,
}

impl ContextLoader {
    pub fn new(config: &ContextConfig) -> Result<Self, ContextError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .build()
            .map_err(|e| ContextError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            source_url: config.source_url.clone(),
            cache_path: config.cache_path.clone(),
            client,
        })
    }

    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    /// Return the cached context, scraping and caching it first if needed.
    ///
    /// Never fails. Scrape failures yield [`CONTEXT_FALLBACK`] and leave no
    /// cache file behind, so the next call tries again.
    pub async fn load(&self) -> String {
        match tokio::fs::read_to_string(&self.cache_path).await {
            Ok(text) => {
                metrics::record_context_load("cache");
                return text;
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                tracing::error!(
                    path = %self.cache_path.display(),
                    error = %e,
                    "Context cache exists but cannot be read"
                );
                metrics::record_context_load("fallback");
                return CONTEXT_FALLBACK.to_string();
            }
        }

        tracing::info!(url = %self.source_url, "Context cache missing, scraping source page");

        let result = match self.scrape().await {
            Ok(text) => self.persist_new(&text).await.map(|_| text),
            Err(e) => Err(e),
        };

        match result {
            Ok(text) => {
                metrics::record_context_load("scrape");
                text
            }
            Err(e) => {
                tracing::error!(url = %self.source_url, error = %e, "Failed to scrape context");
                metrics::record_context_load("fallback");
                CONTEXT_FALLBACK.to_string()
            }
        }
    }

    /// Fetch the source page and extract its paragraph text. A page with no
    /// paragraphs yields an empty string, which is cached like any other.
    pub async fn scrape(&self) -> Result<String, ContextError> {
        Ok(self.scrape_paragraphs().await?.join("\n"))
    }

    /// Fetch the source page and return its paragraphs in document order.
    pub async fn scrape_paragraphs(&self) -> Result<Vec<String>, ContextError> {
        let response = self
            .client
            .get(&self.source_url)
            .send()
            .await
            .map_err(|e| ContextError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ContextError::Network(format!("HTTP {}", response.status())));
        }

        let html = response
            .text()
            .await
            .map_err(|e| ContextError::Network(e.to_string()))?;

        let paragraphs = extract_paragraphs(&html)?;
        tracing::debug!(paragraphs = paragraphs.len(), "Extracted paragraphs");
        Ok(paragraphs)
    }

    /// Replace the cache file unconditionally.
    pub async fn overwrite_cache(&self, text: &str) -> Result<(), ContextError> {
        tokio::fs::write(&self.cache_path, text).await?;
        Ok(())
    }

    /// Create the cache file. An existing file is left untouched: a
    /// concurrent first request already wrote the same scrape.
    async fn persist_new(&self, text: &str) -> Result<(), ContextError> {
        let mut file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.cache_path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                tracing::debug!(
                    path = %self.cache_path.display(),
                    "Context cache created concurrently"
                );
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let written = async {
            file.write_all(text.as_bytes()).await?;
            file.flush().await
        }
        .await;

        if let Err(e) = written {
            drop(file);
            let _ = tokio::fs::remove_file(&self.cache_path).await;
            return Err(e.into());
        }

        tracing::info!(
            path = %self.cache_path.display(),
            bytes = text.len(),
            "Context cache written"
        );
        Ok(())
    }
}

/// Text of every `<p>` in document order. Each text node is trimmed and
/// empty nodes are dropped before concatenation, so markup inside a
/// paragraph does not add whitespace.
pub fn extract_paragraphs(html: &str) -> Result<Vec<String>, ContextError> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("p").map_err(|e| ContextError::Parse(e.to_string()))?;

    Ok(document
        .select(&selector)
        .map(|p| {
            p.text()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .collect::<String>()
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PAGE: &str = r#"<!doctype html>
        <html><head><title>t</title></head>
        <body>
            <h1>Not a paragraph</h1>
            <p>  Primeiro parágrafo.  </p>
            <div><p>Olá <b>mundo</b>!</p></div>
            <p></p>
            <p>Último</p>
        </body></html>"#;

    fn loader(dir: &TempDir, source_url: &str) -> ContextLoader {
        ContextLoader::new(&ContextConfig {
            source_url: source_url.to_string(),
            cache_path: dir.path().join("dados.txt"),
            fetch_timeout_secs: 2,
        })
        .unwrap()
    }

    async fn page_server(expected_hits: u64) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
            .expect(expected_hits)
            .mount(&server)
            .await;
        server
    }

    #[test]
    fn extracts_paragraphs_in_document_order() {
        let paragraphs = extract_paragraphs(PAGE).unwrap();
        assert_eq!(
            paragraphs,
            vec!["Primeiro parágrafo.", "Olámundo!", "", "Último"]
        );
    }

    #[test]
    fn page_without_paragraphs_extracts_nothing() {
        assert!(extract_paragraphs("<html><body><div>x</div></body></html>")
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn cached_file_is_returned_verbatim_without_network() {
        let dir = TempDir::new().unwrap();
        let server = page_server(0).await;
        let loader = loader(&dir, &server.uri());
        tokio::fs::write(loader.cache_path(), "  cached\n\ntext ")
            .await
            .unwrap();

        assert_eq!(loader.load().await, "  cached\n\ntext ");
    }

    #[tokio::test]
    async fn missing_cache_is_scraped_once_and_persisted() {
        let dir = TempDir::new().unwrap();
        let server = page_server(1).await;
        let loader = loader(&dir, &server.uri());

        let first = loader.load().await;
        assert_eq!(first, "Primeiro parágrafo.\nOlámundo!\n\nÚltimo");

        let on_disk = tokio::fs::read_to_string(loader.cache_path()).await.unwrap();
        assert_eq!(on_disk, first);

        let second = loader.load().await;
        assert_eq!(second, first);
    }

    #[tokio::test]
    async fn unreachable_source_returns_fallback_without_cache() {
        let dir = TempDir::new().unwrap();
        let loader = loader(&dir, "http://127.0.0.1:9/");

        assert_eq!(loader.load().await, CONTEXT_FALLBACK);
        assert!(!loader.cache_path().exists());
    }

    #[tokio::test]
    async fn error_status_returns_fallback_and_retries_next_time() {
        let dir = TempDir::new().unwrap();
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(2)
            .mount(&server)
            .await;
        let loader = loader(&dir, &server.uri());

        assert_eq!(loader.load().await, CONTEXT_FALLBACK);
        assert_eq!(loader.load().await, CONTEXT_FALLBACK);
        assert!(!loader.cache_path().exists());
    }

    #[tokio::test]
    async fn page_without_paragraphs_caches_empty_context() {
        let dir = TempDir::new().unwrap();
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<html><body><div>js app</div></body></html>"),
            )
            .expect(1)
            .mount(&server)
            .await;
        let loader = loader(&dir, &server.uri());

        assert_eq!(loader.load().await, "");
        let on_disk = tokio::fs::read_to_string(loader.cache_path()).await.unwrap();
        assert_eq!(on_disk, "");

        // The empty cache counts as loaded; the page is not fetched again.
        assert_eq!(loader.load().await, "");
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unwritable_cache_returns_fallback() {
        let dir = TempDir::new().unwrap();
        let server = page_server(1).await;
        let loader = ContextLoader::new(&ContextConfig {
            source_url: server.uri(),
            cache_path: dir.path().join("missing-dir").join("dados.txt"),
            fetch_timeout_secs: 2,
        })
        .unwrap();

        assert_eq!(loader.load().await, CONTEXT_FALLBACK);
        assert!(!loader.cache_path().exists());
    }

    #[tokio::test]
    async fn scraped_paragraph_count_ignores_embedded_newlines() {
        let dir = TempDir::new().unwrap();
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "<html><body><p>linha um\nlinha dois</p><p>fim</p></body></html>",
            ))
            .mount(&server)
            .await;
        let loader = loader(&dir, &server.uri());

        let paragraphs = loader.scrape_paragraphs().await.unwrap();

        assert_eq!(paragraphs.len(), 2);
        assert!(loader.scrape().await.unwrap().split('\n').count() > paragraphs.len());
    }

    #[tokio::test]
    async fn overwrite_cache_replaces_existing_file() {
        let dir = TempDir::new().unwrap();
        let server = page_server(1).await;
        let loader = loader(&dir, &server.uri());
        tokio::fs::write(loader.cache_path(), "stale").await.unwrap();

        let fresh = loader.scrape().await.unwrap();
        loader.overwrite_cache(&fresh).await.unwrap();

        assert_eq!(loader.load().await, fresh);
    }
}

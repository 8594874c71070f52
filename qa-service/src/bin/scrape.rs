//! One-shot scrape: fetch the source page and (over)write the context cache.
//!
//! Needs only the `CONTEXT_*` settings; no model key or database.

use qa_service::config::ContextConfig;
use qa_service::services::ContextLoader;
use service_core::observability::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    init_tracing("qa-scrape", &log_level, None);

    let config = ContextConfig::load()?;
    let loader = ContextLoader::new(&config)?;
    let paragraphs = loader.scrape_paragraphs().await?;
    loader.overwrite_cache(&paragraphs.join("\n")).await?;

    tracing::info!(
        url = %config.source_url,
        path = %loader.cache_path().display(),
        paragraphs = paragraphs.len(),
        "Context cache refreshed"
    );

    Ok(())
}

//! Common test utilities for qa-service integration tests.
//!
//! Every app gets its own cache directory and its own wiremock servers for
//! the source page and the generative-language API, so tests do not share
//! state unless they share a database.

#![allow(dead_code)]

use qa_service::config::{
    ContextConfig, DatabaseConfig, GoogleConfig, QaConfig, SecurityConfig, ServiceMode,
};
use qa_service::services::QuestionLog;
use qa_service::startup::Application;
use reqwest::{Client, Response};
use secrecy::Secret;
use serde_json::json;
use service_core::config::Config as CommonConfig;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::sync::Once;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TEST_API_KEY: &str = "test-api-key";
pub const TEST_MODEL: &str = "gemini-2.0-flash";
pub const GENERATE_PATH: &str = "/models/gemini-2.0-flash:generateContent";
pub const ALLOWED_ORIGIN: &str = "http://localhost:3000";

pub const SITE_HTML: &str = r#"<html><body>
    <p>O programa Jovem Programador oferece cursos gratuitos.</p>
    <nav>menu</nav>
    <p>As inscrições abrem em <strong>março</strong>.</p>
</body></html>"#;

pub const SITE_TEXT: &str =
    "O programa Jovem Programador oferece cursos gratuitos.\nAs inscrições abrem emmarço.";

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,qa_service=debug,sqlx=warn")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub cache_dir: TempDir,
    pub cache_path: PathBuf,
    pub gemini: MockServer,
    pub site: MockServer,
    pub question_log: Option<QuestionLog>,
    pub client: Client,
}

impl TestApp {
    /// Spawn a minimal-mode app (no database).
    pub async fn spawn() -> Self {
        Self::spawn_with(ServiceMode::Minimal, None).await
    }

    /// Spawn a logging-mode app against `TEST_DATABASE_URL`, with an empty
    /// question log.
    pub async fn spawn_logging() -> Self {
        Self::spawn_logging_with_pool(2).await
    }

    /// Logging-mode app whose pool holds at most `max_connections`.
    pub async fn spawn_logging_with_pool(max_connections: u32) -> Self {
        let database_url = std::env::var("TEST_DATABASE_URL")
            .expect("TEST_DATABASE_URL must be set to run question log tests");

        let app = Self::spawn_with(
            ServiceMode::Logging,
            Some((database_url, max_connections)),
        )
        .await;

        let log = app.question_log.as_ref().expect("logging mode has a store");
        sqlx::query("TRUNCATE question_logs RESTART IDENTITY")
            .execute(log.pool())
            .await
            .expect("Failed to reset question_logs");

        app
    }

    async fn spawn_with(mode: ServiceMode, database: Option<(String, u32)>) -> Self {
        init_tracing();

        let gemini = MockServer::start().await;
        let site = MockServer::start().await;
        let cache_dir = TempDir::new().expect("Failed to create cache dir");
        let cache_path = cache_dir.path().join("dados.txt");

        let config = QaConfig {
            common: CommonConfig {
                host: IpAddr::V4(Ipv4Addr::LOCALHOST),
                port: 0,
            },
            service_name: "qa-service-test".to_string(),
            log_level: "debug".to_string(),
            otlp_endpoint: None,
            mode,
            google: GoogleConfig {
                api_key: Secret::new(TEST_API_KEY.to_string()),
                model: TEST_MODEL.to_string(),
                api_base: gemini.uri(),
            },
            context: ContextConfig {
                source_url: format!("{}/", site.uri()),
                cache_path: cache_path.clone(),
                fetch_timeout_secs: 2,
            },
            database: database.map(|(url, max_connections)| DatabaseConfig {
                url: Secret::new(url),
                max_connections,
            }),
            security: SecurityConfig {
                allowed_origins: vec![
                    ALLOWED_ORIGIN.to_string(),
                    "http://127.0.0.1:5500".to_string(),
                ],
            },
        };

        let app = Application::build(config)
            .await
            .expect("Failed to build application");

        let port = app.port();
        let question_log = app.state().question_log.clone();

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        let address = format!("http://127.0.0.1:{}", port);
        let client = Client::new();

        // Wait for server to be ready by polling health endpoint
        for _ in 0..50 {
            if client
                .get(format!("{}/health", address))
                .send()
                .await
                .is_ok()
            {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(20)).await;
        }

        TestApp {
            address,
            port,
            cache_dir,
            cache_path,
            gemini,
            site,
            question_log,
            client,
        }
    }

    /// Serve `SITE_HTML`, expecting exactly `hits` fetches.
    pub async fn mount_site(&self, hits: u64) {
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(SITE_HTML))
            .expect(hits)
            .mount(&self.site)
            .await;
    }

    pub async fn mount_answer(&self, text: &str) {
        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{ "content": { "parts": [{ "text": text }] } }]
            })))
            .mount(&self.gemini)
            .await;
    }

    /// Like `mount_answer`, but the fake API waits `delay` before replying.
    pub async fn mount_slow_answer(&self, text: &str, delay: std::time::Duration) {
        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({
                        "candidates": [{ "content": { "parts": [{ "text": text }] } }]
                    }))
                    .set_delay(delay),
            )
            .mount(&self.gemini)
            .await;
    }

    pub async fn mount_upstream_status(&self, status: u16) {
        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.gemini)
            .await;
    }

    /// Prompts the fake generative-language API has received, in order.
    pub async fn received_prompts(&self) -> Vec<String> {
        self.gemini
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .map(|req| {
                let body: serde_json::Value =
                    serde_json::from_slice(&req.body).expect("Upstream body is not JSON");
                body["contents"][0]["parts"][0]["text"]
                    .as_str()
                    .expect("Upstream body has no prompt")
                    .to_string()
            })
            .collect()
    }

    pub async fn ask(&self, question: &str) -> Response {
        self.client
            .post(format!("{}/ask", self.address))
            .json(&json!({ "question": question }))
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// POST /ask and return the answer text, asserting a 200.
    pub async fn ask_answer(&self, question: &str) -> String {
        let response = self.ask(question).await;
        assert_eq!(response.status().as_u16(), 200);
        let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        body["answer"]
            .as_str()
            .expect("answer must be a string")
            .to_string()
    }

    pub async fn get_logs(&self) -> Response {
        self.client
            .get(format!("{}/logs", self.address))
            .send()
            .await
            .expect("Failed to execute request")
    }
}

//! Question log store backed by PostgreSQL.
//!
//! Reads and writes go through a [`DbSession`], one pooled connection held
//! for the lifetime of a request and returned to the pool when dropped.

use crate::models::LogEntry;
use crate::services::metrics;
use service_core::error::AppError;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Postgres;
use std::time::{Duration, Instant};
use tracing::{info, instrument};

/// How many entries `GET /logs` returns. Not caller-controlled.
pub const RECENT_QUESTIONS_LIMIT: i64 = 10;

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct QuestionLog {
    pool: PgPool,
}

impl QuestionLog {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "qa-service"))]
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, AppError> {
        info!(max_connections = max_connections, "Connecting to PostgreSQL");

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    /// Acquire a connection scoped to the caller.
    pub async fn session(&self) -> Result<DbSession, AppError> {
        let conn = self.pool.acquire().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to acquire connection: {}", e))
        })?;
        Ok(DbSession { conn })
    }
}

/// A pooled connection owned by one request.
pub struct DbSession {
    conn: PoolConnection<Postgres>,
}

impl DbSession {
    /// Insert one question. Each statement commits on its own.
    #[instrument(skip(self, question), fields(question_len = question.chars().count()))]
    pub async fn record(&mut self, question: &str) -> Result<LogEntry, AppError> {
        let started = Instant::now();

        let entry = sqlx::query_as::<_, LogEntry>(
            r#"
            INSERT INTO question_logs (question)
            VALUES ($1)
            RETURNING id, question
            "#,
        )
        .bind(question)
        .fetch_one(&mut *self.conn)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to record question: {}", e)))?;

        metrics::record_db_operation("record", started.elapsed().as_secs_f64());
        info!(log_id = entry.id, "Question recorded");

        Ok(entry)
    }

    /// The newest entries first, at most [`RECENT_QUESTIONS_LIMIT`].
    #[instrument(skip(self))]
    pub async fn recent_questions(&mut self) -> Result<Vec<LogEntry>, AppError> {
        let started = Instant::now();

        let entries = sqlx::query_as::<_, LogEntry>(
            r#"
            SELECT id, question
            FROM question_logs
            ORDER BY id DESC
            LIMIT $1
            "#,
        )
        .bind(RECENT_QUESTIONS_LIMIT)
        .fetch_all(&mut *self.conn)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list recent questions: {}", e))
        })?;

        metrics::record_db_operation("recent_questions", started.elapsed().as_secs_f64());

        Ok(entries)
    }
}

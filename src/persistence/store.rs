//! SQLite-based run history

use crate::persistence::{default_history_path, ExecutionStatus, HistoryBackend, RunSummary};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;
use uuid::Uuid;

const SCHEMA: [&str; 3] = [
    r#"
    CREATE TABLE IF NOT EXISTS runs (
        id TEXT PRIMARY KEY,
        pipeline_name TEXT NOT NULL,
        status TEXT NOT NULL,
        started_at TEXT NOT NULL,
        completed_at TEXT,
        step_count INTEGER NOT NULL DEFAULT 0,
        error_count INTEGER NOT NULL DEFAULT 0
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_runs_pipeline_name ON runs(pipeline_name)",
    "CREATE INDEX IF NOT EXISTS idx_runs_started_at ON runs(started_at)",
];

/// SQLite run history
pub struct SqliteHistory {
    pool: SqlitePool,
}

impl SqliteHistory {
    /// Open (creating if needed) the database at `path`
    pub async fn new(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options)
            .await
            .with_context(|| format!("Failed to open history database {}", path.display()))?;

        debug!("Opened run history at {}", path.display());
        Self::from_pool(pool).await
    }

    /// Open the database at [`default_history_path`]
    pub async fn with_default_path() -> Result<Self> {
        Self::new(&default_history_path()).await
    }

    /// Private in-memory database; a single connection keeps every query on it
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .context("Failed to open in-memory database")?;
        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        let history = Self { pool };
        history.init().await?;
        Ok(history)
    }

    async fn init(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .context("Failed to initialize history schema")?;
        }
        Ok(())
    }

    fn summary_from_row(row: &SqliteRow) -> Result<RunSummary> {
        let status: String = row.try_get("status")?;
        Ok(RunSummary {
            execution_id: Uuid::parse_str(&row.try_get::<String, _>("id")?)?,
            pipeline_name: row.try_get("pipeline_name")?,
            status: ExecutionStatus::from_str(&status).map_err(|e| anyhow!(e))?,
            started_at: row.try_get::<DateTime<Utc>, _>("started_at")?,
            completed_at: row.try_get::<Option<DateTime<Utc>>, _>("completed_at")?,
            step_count: row.try_get::<i64, _>("step_count")? as usize,
            error_count: row.try_get::<i64, _>("error_count")? as usize,
        })
    }
}

#[async_trait::async_trait]
impl HistoryBackend for SqliteHistory {
    async fn save_run(&self, run: &RunSummary) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO runs
            (id, pipeline_name, status, started_at, completed_at, step_count, error_count)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(run.execution_id.to_string())
        .bind(&run.pipeline_name)
        .bind(run.status.to_string())
        .bind(run.started_at)
        .bind(run.completed_at)
        .bind(run.step_count as i64)
        .bind(run.error_count as i64)
        .execute(&self.pool)
        .await
        .context("Failed to save run")?;

        Ok(())
    }

    async fn load_run(&self, execution_id: Uuid) -> Result<Option<RunSummary>> {
        let row = sqlx::query(
            r#"
            SELECT id, pipeline_name, status, started_at, completed_at, step_count, error_count
            FROM runs
            WHERE id = ?1
            "#,
        )
        .bind(execution_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to load run")?;

        row.as_ref().map(Self::summary_from_row).transpose()
    }

    async fn list_runs(&self, pipeline_name: Option<&str>, limit: usize) -> Result<Vec<RunSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT id, pipeline_name, status, started_at, completed_at, step_count, error_count
            FROM runs
            WHERE ?1 IS NULL OR pipeline_name = ?1
            ORDER BY started_at DESC
            LIMIT ?2
            "#,
        )
        .bind(pipeline_name)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list runs")?;

        rows.iter().map(Self::summary_from_row).collect()
    }

    async fn list_pipelines(&self) -> Result<Vec<String>> {
        let rows = sqlx::query(
            r#"
            SELECT DISTINCT pipeline_name
            FROM runs
            ORDER BY pipeline_name ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list pipelines")?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("pipeline_name").map_err(anyhow::Error::from))
            .collect()
    }
}

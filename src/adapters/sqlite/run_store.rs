//! SQLite implementation of the RunStore.
//!
//! Each run is one row holding the full JSON document plus a few summary
//! columns for listing. Saves overwrite the row, so resume-then-save is
//! idempotent.

use async_trait::async_trait;
use sqlx::SqlitePool;

use super::{parse_datetime, parse_uuid};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{OptimizationRun, RunStatus, RunSummary};
use crate::domain::ports::{validate_prefix, RunStore};

#[derive(Clone)]
pub struct SqliteRunStore {
    pool: SqlitePool,
}

impl SqliteRunStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// SQLite row mapping for run listings.
#[derive(sqlx::FromRow)]
struct RunSummaryRow {
    id: String,
    model: String,
    status: String,
    generation_count: i64,
    best_score: Option<f64>,
    updated_at: String,
}

impl TryFrom<RunSummaryRow> for RunSummary {
    type Error = DomainError;

    fn try_from(row: RunSummaryRow) -> Result<Self, Self::Error> {
        Ok(RunSummary {
            id: parse_uuid(&row.id)?,
            updated_at: parse_datetime(&row.updated_at)?,
            generation_count: usize::try_from(row.generation_count).unwrap_or_default(),
            best_score: row.best_score,
            model: row.model,
            status: status_from_str(&row.status)?,
        })
    }
}

fn status_from_str(s: &str) -> DomainResult<RunStatus> {
    match s {
        "running" => Ok(RunStatus::Running),
        "completed" => Ok(RunStatus::Completed),
        "failed" => Ok(RunStatus::Failed),
        other => Err(DomainError::Persistence(format!("unknown run status '{other}'"))),
    }
}

fn decode(document: &str) -> DomainResult<OptimizationRun> {
    serde_json::from_str(document)
        .map_err(|e| DomainError::Persistence(format!("corrupt run document: {e}")))
}

#[async_trait]
impl RunStore for SqliteRunStore {
    async fn save(&self, run: &OptimizationRun) -> DomainResult<()> {
        let document = serde_json::to_string(run)?;

        sqlx::query(
            "INSERT INTO optimization_runs
                (id, model, status, termination, generation_count, best_score, total_cost,
                 document, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                model = excluded.model,
                status = excluded.status,
                termination = excluded.termination,
                generation_count = excluded.generation_count,
                best_score = excluded.best_score,
                total_cost = excluded.total_cost,
                document = excluded.document,
                updated_at = excluded.updated_at",
        )
        .bind(run.id.to_string())
        .bind(&run.config.model)
        .bind(run.status.as_str())
        .bind(run.termination.map(|t| t.as_str()))
        .bind(i64::try_from(run.generations.len()).unwrap_or(i64::MAX))
        .bind(run.best_score())
        .bind(run.total_cost)
        .bind(&document)
        .bind(run.created_at.to_rfc3339())
        .bind(run.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn load(&self, id: &str) -> DomainResult<OptimizationRun> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT document FROM optimization_runs WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some((document,)) => decode(&document),
            None => Err(DomainError::RunNotFound(id.to_string())),
        }
    }

    async fn load_by_prefix(&self, prefix: &str) -> DomainResult<OptimizationRun> {
        validate_prefix(prefix)?;

        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT id FROM optimization_runs WHERE id LIKE ? ORDER BY id LIMIT 11")
                .bind(format!("{}%", prefix.to_lowercase()))
                .fetch_all(&self.pool)
                .await?;

        match rows.as_slice() {
            [] => Err(DomainError::RunNotFound(prefix.to_string())),
            [(id,)] => self.load(id).await,
            many => Err(DomainError::AmbiguousRunId {
                prefix: prefix.to_string(),
                matches: many.iter().take(10).map(|(id,)| id.clone()).collect(),
            }),
        }
    }

    async fn list(&self) -> DomainResult<Vec<RunSummary>> {
        let rows: Vec<RunSummaryRow> = sqlx::query_as(
            "SELECT id, model, status, generation_count, best_score, updated_at
             FROM optimization_runs
             ORDER BY updated_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(RunSummary::try_from).collect()
    }
}

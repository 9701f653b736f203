// SQLite QueueStore Implementation

use crate::ChangeBus;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, info};
use tutorq_core::domain::{EntryStatus, NewEntry, QueueEntry};
use tutorq_core::error::{AppError, Result};
use tutorq_core::port::{ChangeKind, IdProvider, QueueStore, TimeProvider};

// Helper to convert sqlx::Error to AppError with structured information
fn map_sqlx_error(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) => match db_err.code() {
            // SQLite error codes: https://www.sqlite.org/rescode.html
            Some(code) => match code.as_ref() {
                "2067" | "1555" => {
                    AppError::Store(format!("Unique constraint violation: {}", db_err.message()))
                }
                "275" => AppError::Store(format!("Check constraint failed: {}", db_err.message())),
                "5" => AppError::Store(format!(
                    "Database locked (SQLITE_BUSY): {}",
                    db_err.message()
                )),
                other => AppError::Store(format!(
                    "Database error [{}]: {}",
                    other,
                    db_err.message()
                )),
            },
            None => AppError::Store(format!("Database error: {}", db_err.message())),
        },
        sqlx::Error::RowNotFound => AppError::Store("Row not found".to_string()),
        sqlx::Error::ColumnNotFound(col) => AppError::Store(format!("Column not found: {}", col)),
        // Connection, pool, protocol errors
        _ => AppError::Store(err.to_string()),
    }
}

/// Fixed-width UTC so that text order equals time order
fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[derive(sqlx::FromRow)]
struct QueueRow {
    id: String,
    created_at: String,
    student_name: String,
    topic_area: Option<String>,
    status: String,
}

impl QueueRow {
    fn into_entry(self) -> Result<QueueEntry> {
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|e| {
                AppError::Store(format!("Bad created_at for {}: {}", self.id, e))
            })?
            .with_timezone(&Utc);

        Ok(QueueEntry {
            status: self.status.parse()?,
            id: self.id,
            created_at,
            student_name: self.student_name,
            topic_area: self.topic_area,
        })
    }
}

const SELECT_COLUMNS: &str = "SELECT id, created_at, student_name, topic_area, status FROM queue_requests";

pub struct SqliteQueueStore {
    pool: SqlitePool,
    bus: ChangeBus,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
}

impl SqliteQueueStore {
    pub fn new(
        pool: SqlitePool,
        bus: ChangeBus,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            pool,
            bus,
            id_provider,
            time_provider,
        }
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<QueueEntry>> {
        let row = sqlx::query_as::<_, QueueRow>(&format!("{} WHERE id = ?", SELECT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(QueueRow::into_entry).transpose()
    }
}

#[async_trait]
impl QueueStore for SqliteQueueStore {
    async fn fetch_all(&self) -> Result<Vec<QueueEntry>> {
        let rows = sqlx::query_as::<_, QueueRow>(&format!(
            "{} ORDER BY created_at ASC, rowid ASC",
            SELECT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(QueueRow::into_entry).collect()
    }

    async fn insert(&self, student_name: &str, topic_area: Option<&str>) -> Result<QueueEntry> {
        let entry = NewEntry::parse(student_name, topic_area)?
            .into_entry(self.id_provider.generate_id(), self.time_provider.now());

        sqlx::query(
            r#"
            INSERT INTO queue_requests (id, created_at, student_name, topic_area, status)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.id)
        .bind(format_timestamp(entry.created_at))
        .bind(&entry.student_name)
        .bind(&entry.topic_area)
        .bind(entry.status.as_str())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        info!(entry_id = %entry.id, "Queue request stored");
        self.bus.publish(ChangeKind::Insert, Some(&entry), None);
        Ok(entry)
    }

    async fn update_status(&self, id: &str, status: EntryStatus) -> Result<()> {
        let mut entry = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("queue request {}", id)))?;

        if entry.status == status {
            debug!(entry_id = %id, status = %status, "Status unchanged");
            return Ok(());
        }
        entry.transition_to(status)?;

        sqlx::query("UPDATE queue_requests SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        info!(entry_id = %id, status = %status, "Queue request status updated");
        self.bus.publish(ChangeKind::Update, Some(&entry), Some(id));
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM queue_requests WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            debug!(entry_id = %id, "Delete of unknown queue request");
            return Ok(());
        }

        info!(entry_id = %id, "Queue request deleted");
        self.bus.publish(ChangeKind::Delete, None, Some(id));
        Ok(())
    }
}

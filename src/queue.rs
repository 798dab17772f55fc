//! The work queue of folder crawl tasks and the downstream event queue.

use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::warn;

use crate::error::CrawlError;
use crate::types::{ChangeEvent, CrawlTask};

/// A task handed to one worker. The row stays claimed until acked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub receipt: i64,
    pub task: CrawlTask,
}

#[async_trait]
pub trait WorkQueue: Send + Sync {
    async fn push(&self, task: &CrawlTask) -> Result<(), CrawlError>;

    /// Claim the oldest unclaimed task, `None` when the queue is drained.
    async fn pop(&self) -> Result<Option<Delivery>, CrawlError>;

    /// Remove a finished task.
    async fn ack(&self, receipt: i64) -> Result<(), CrawlError>;

    /// Drop every task, claimed or not. Returns how many were removed.
    async fn purge(&self) -> Result<u64, CrawlError>;

    async fn len(&self) -> Result<i64, CrawlError>;

    /// Release claims left behind by a stopped process.
    async fn requeue_claimed(&self) -> Result<u64, CrawlError>;
}

#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, event: &ChangeEvent) -> Result<(), CrawlError>;
}

#[derive(Clone)]
pub struct SqliteWorkQueue {
    pool: SqlitePool,
}

impl SqliteWorkQueue {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WorkQueue for SqliteWorkQueue {
    async fn push(&self, task: &CrawlTask) -> Result<(), CrawlError> {
        sqlx::query("INSERT INTO crawl_queue (payload) VALUES (?)")
            .bind(task.to_message()?)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn pop(&self) -> Result<Option<Delivery>, CrawlError> {
        loop {
            let row: Option<(i64, String)> = sqlx::query_as(
                r#"UPDATE crawl_queue
                   SET claimed_at = strftime('%Y-%m-%dT%H:%M:%SZ','now')
                   WHERE id = (SELECT id FROM crawl_queue WHERE claimed_at IS NULL ORDER BY id LIMIT 1)
                   RETURNING id, payload"#,
            )
            .fetch_optional(&self.pool)
            .await?;

            let Some((receipt, payload)) = row else {
                return Ok(None);
            };
            match CrawlTask::from_message(&payload) {
                Ok(task) => return Ok(Some(Delivery { receipt, task })),
                Err(e) => {
                    warn!(receipt, payload = %payload, "Dropping malformed work message: {}", e);
                    self.ack(receipt).await?;
                }
            }
        }
    }

    async fn ack(&self, receipt: i64) -> Result<(), CrawlError> {
        sqlx::query("DELETE FROM crawl_queue WHERE id = ?")
            .bind(receipt)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn purge(&self) -> Result<u64, CrawlError> {
        let res = sqlx::query("DELETE FROM crawl_queue").execute(&self.pool).await?;
        Ok(res.rows_affected())
    }

    async fn len(&self) -> Result<i64, CrawlError> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM crawl_queue")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    async fn requeue_claimed(&self) -> Result<u64, CrawlError> {
        let res = sqlx::query("UPDATE crawl_queue SET claimed_at = NULL WHERE claimed_at IS NOT NULL")
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected())
    }
}

/// Writes change events to the `change_events` outbox table.
#[derive(Clone)]
pub struct SqliteEventSink {
    pool: SqlitePool,
}

impl SqliteEventSink {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventSink for SqliteEventSink {
    async fn publish(&self, event: &ChangeEvent) -> Result<(), CrawlError> {
        sqlx::query("INSERT INTO change_events (doc_id, action, payload) VALUES (?, ?, ?)")
            .bind(&event.id)
            .bind(event.action.as_str())
            .bind(serde_json::to_string(event)?)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::SqlitePool;

    use crate::db::init_db;
    use crate::path::CrawlPath;
    use crate::queue::{EventSink, SqliteEventSink, SqliteWorkQueue, WorkQueue};
    use crate::types::{Action, ChangeEvent, CrawlTask, UNKNOWN_DEPTH};

    async fn setup_pool() -> SqlitePool {
        // one connection, so every query sees the same in-memory database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        init_db(&pool).await.unwrap();
        pool
    }

    fn task(raw: &str, level: u32) -> CrawlTask {
        CrawlTask::new(CrawlPath::parse(raw).unwrap(), level)
    }

    #[tokio::test]
    async fn test_fifo_claim_and_ack() {
        let queue = SqliteWorkQueue::new(setup_pool().await);
        queue.push(&task("/a", 0)).await.unwrap();
        queue.push(&task("smb://fs01/docs/b", UNKNOWN_DEPTH)).await.unwrap();
        assert_eq!(queue.len().await.unwrap(), 2);

        let first = queue.pop().await.unwrap().unwrap();
        assert_eq!(first.task, task("/a", 0));
        let second = queue.pop().await.unwrap().unwrap();
        assert_eq!(second.task, task("smb://fs01/docs/b", UNKNOWN_DEPTH));
        assert!(queue.pop().await.unwrap().is_none());

        // claimed rows still count until acked
        assert_eq!(queue.len().await.unwrap(), 2);
        queue.ack(first.receipt).await.unwrap();
        queue.ack(second.receipt).await.unwrap();
        assert_eq!(queue.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_requeue_claimed_after_restart() {
        let queue = SqliteWorkQueue::new(setup_pool().await);
        queue.push(&task("/a", 0)).await.unwrap();
        let claimed = queue.pop().await.unwrap().unwrap();
        assert!(queue.pop().await.unwrap().is_none());

        assert_eq!(queue.requeue_claimed().await.unwrap(), 1);
        let again = queue.pop().await.unwrap().unwrap();
        assert_eq!(again.receipt, claimed.receipt);
        assert_eq!(again.task, claimed.task);
    }

    #[tokio::test]
    async fn test_purge_drops_claimed_and_pending() {
        let queue = SqliteWorkQueue::new(setup_pool().await);
        for i in 0..3 {
            queue.push(&task(&format!("/d{}", i), 1)).await.unwrap();
        }
        queue.pop().await.unwrap().unwrap();

        assert_eq!(queue.purge().await.unwrap(), 3);
        assert_eq!(queue.len().await.unwrap(), 0);
        assert!(queue.pop().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_wire_format() {
        let pool = setup_pool().await;
        let queue = SqliteWorkQueue::new(pool.clone());
        queue.push(&task("smb://fs01/docs/a", 3)).await.unwrap();

        let payload: String = sqlx::query_scalar("SELECT payload FROM crawl_queue")
            .fetch_one(&pool)
            .await
            .unwrap();
        let v: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(v["id"], "smb://fs01/docs/a/");
        assert_eq!(v["level"], 3);
    }

    #[tokio::test]
    async fn test_malformed_messages_are_dropped() {
        let pool = setup_pool().await;
        sqlx::query("INSERT INTO crawl_queue (payload) VALUES ('not json')")
            .execute(&pool)
            .await
            .unwrap();
        let queue = SqliteWorkQueue::new(pool);
        queue.push(&task("/ok", 0)).await.unwrap();

        let delivery = queue.pop().await.unwrap().unwrap();
        assert_eq!(delivery.task, task("/ok", 0));
        assert_eq!(queue.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_event_sink_writes_outbox() {
        let pool = setup_pool().await;
        let sink = SqliteEventSink::new(pool.clone());
        let path = CrawlPath::parse("/srv/report.pdf").unwrap();
        sink.publish(&ChangeEvent::upsert(Action::Insert, &path, 1_000, 42, "crawler:test", vec![]))
            .await
            .unwrap();
        sink.publish(&ChangeEvent::delete(&path, "crawler:test")).await.unwrap();

        let rows: Vec<(String, String, String)> =
            sqlx::query_as("SELECT doc_id, action, payload FROM change_events ORDER BY id")
                .fetch_all(&pool)
                .await
                .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].0, "file:///srv/report.pdf");
        assert_eq!(rows[0].1, "insert");
        assert_eq!(rows[1].1, "delete");

        let event: ChangeEvent = serde_json::from_str(&rows[0].2).unwrap();
        assert_eq!(event.mime_type, "application/pdf");
        assert_eq!(event.size, Some(42));
        let raw: serde_json::Value = serde_json::from_str(&rows[0].2).unwrap();
        assert_eq!(raw["sourceTag"], "crawler:test");
    }
}

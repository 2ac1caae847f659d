use anyhow::Result;
use rusqlite::{params, Row};

use crate::db::models::{CaptureAttempt, CaptureKind};
use crate::db::Database;

fn row_to_attempt(row: &Row) -> Result<CaptureAttempt> {
    let kind: String = row.get("kind")?;

    Ok(CaptureAttempt {
        id: row.get("id")?,
        timestamp: row.get("timestamp")?,
        kind: CaptureKind::from_str(&kind)?,
        image_base64: row.get("image_base64")?,
        result: row.get("result")?,
        error: row.get("error")?,
        metadata: row.get("metadata")?,
    })
}

impl Database {
    /// Append one capture attempt and return the id the store assigned to it.
    pub async fn insert_attempt(
        &self,
        timestamp: i64,
        kind: CaptureKind,
        image_base64: String,
        result: Option<String>,
        error: Option<String>,
        metadata: Option<String>,
    ) -> Result<i64> {
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO capture_history
                     (timestamp, kind, image_base64, result, error, metadata)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    timestamp,
                    kind.as_str(),
                    image_base64,
                    result,
                    error,
                    metadata,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    /// Most recent attempts first.
    pub async fn recent_attempts(&self, limit: i64) -> Result<Vec<CaptureAttempt>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, timestamp, kind, image_base64, result, error, metadata
                 FROM capture_history
                 ORDER BY timestamp DESC, id DESC
                 LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![limit], |row| {
                Ok(row_to_attempt(row))
            })?;

            let mut attempts = Vec::new();
            for row in rows {
                attempts.push(row??);
            }
            Ok(attempts)
        })
        .await
    }

    pub async fn delete_attempt(&self, id: i64) -> Result<()> {
        self.execute(move |conn| {
            conn.execute("DELETE FROM capture_history WHERE id = ?1", params![id])?;
            Ok(())
        })
        .await
    }

    pub async fn delete_attempts_older_than(&self, cutoff_millis: i64) -> Result<usize> {
        self.execute(move |conn| {
            let deleted = conn.execute(
                "DELETE FROM capture_history WHERE timestamp < ?1",
                params![cutoff_millis],
            )?;
            Ok(deleted)
        })
        .await
    }

    pub async fn clear_attempts(&self) -> Result<()> {
        self.execute(|conn| {
            conn.execute("DELETE FROM capture_history", [])?;
            Ok(())
        })
        .await
    }

    /// Prune attempts older than `keep_days` days.
    pub async fn cleanup_old_attempts(&self, keep_days: i64) -> Result<usize> {
        let cutoff = chrono::Utc::now().timestamp_millis() - keep_days * 24 * 60 * 60 * 1000;
        self.delete_attempts_older_than(cutoff).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_temp_db() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::new(dir.path().join("snapsolve.db")).expect("open db");
        (dir, db)
    }

    async fn insert_at(db: &Database, ts: i64, error: Option<&str>) -> i64 {
        db.insert_attempt(
            ts,
            CaptureKind::CodeChallenge,
            "aW1n".to_string(),
            error.is_none().then(|| "{\"code\":\"x\"}".to_string()),
            error.map(str::to_string),
            None,
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn recent_attempts_returns_newest_first() {
        let (_dir, db) = open_temp_db();
        insert_at(&db, 1_000, None).await;
        insert_at(&db, 3_000, None).await;
        insert_at(&db, 2_000, None).await;

        let attempts = db.recent_attempts(10).await.unwrap();
        let timestamps: Vec<i64> = attempts.iter().map(|a| a.timestamp).collect();
        assert_eq!(timestamps, vec![3_000, 2_000, 1_000]);
    }

    #[tokio::test]
    async fn failed_attempts_keep_error_and_no_result() {
        let (_dir, db) = open_temp_db();
        let id = insert_at(&db, 1_000, Some("backend exploded")).await;

        let attempts = db.recent_attempts(1).await.unwrap();
        assert_eq!(attempts[0].id, id);
        assert_eq!(attempts[0].result, None);
        assert_eq!(attempts[0].error.as_deref(), Some("backend exploded"));
    }

    #[tokio::test]
    async fn delete_older_than_prunes_by_cutoff() {
        let (_dir, db) = open_temp_db();
        insert_at(&db, 1_000, None).await;
        insert_at(&db, 2_000, None).await;
        insert_at(&db, 3_000, None).await;

        let deleted = db.delete_attempts_older_than(2_500).await.unwrap();
        assert_eq!(deleted, 2);

        let remaining = db.recent_attempts(10).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].timestamp, 3_000);
    }

    #[tokio::test]
    async fn clear_removes_everything() {
        let (_dir, db) = open_temp_db();
        insert_at(&db, 1_000, None).await;
        insert_at(&db, 2_000, None).await;

        db.clear_attempts().await.unwrap();
        assert!(db.recent_attempts(10).await.unwrap().is_empty());
    }
}

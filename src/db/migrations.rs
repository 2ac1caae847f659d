use anyhow::{Context, Result};
use rusqlite::Connection;

const MIGRATIONS: &[&str] = &[
    // v1: settings key/value map + append-only capture history
    "CREATE TABLE IF NOT EXISTS settings (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS capture_history (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp INTEGER NOT NULL,
        kind TEXT NOT NULL,
        image_base64 TEXT NOT NULL,
        result TEXT,
        error TEXT,
        metadata TEXT
    );
    CREATE INDEX IF NOT EXISTS idx_capture_history_timestamp
        ON capture_history(timestamp);",
];

pub fn run_migrations(conn: &mut Connection) -> Result<()> {
    let current: i64 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .context("failed to read user_version")?;

    for (idx, migration) in MIGRATIONS.iter().enumerate() {
        let version = (idx + 1) as i64;
        if version <= current {
            continue;
        }

        let tx = conn
            .transaction()
            .context("failed to open migration transaction")?;
        tx.execute_batch(migration)
            .with_context(|| format!("migration {version} failed"))?;
        tx.pragma_update(None, "user_version", version)
            .with_context(|| format!("failed to bump user_version to {version}"))?;
        tx.commit()
            .with_context(|| format!("failed to commit migration {version}"))?;
    }

    Ok(())
}

use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS messages (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            name        TEXT NOT NULL,
            content     TEXT NOT NULL,
            is_admin    INTEGER NOT NULL DEFAULT 0,
            reply_to_id INTEGER REFERENCES messages(id) ON DELETE CASCADE,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_messages_top_level
            ON messages(created_at) WHERE reply_to_id IS NULL;

        CREATE INDEX IF NOT EXISTS idx_messages_reply_to
            ON messages(reply_to_id);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}

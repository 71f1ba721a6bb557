use crate::Database;
use crate::models::MessageRow;
use anyhow::{Result, anyhow};
use rusqlite::{Connection, OptionalExtension, Row};

const MESSAGE_COLUMNS: &str = "id, name, content, is_admin, reply_to_id, created_at";

impl Database {
    /// Insert a message and return the stored row. The id comes from
    /// `AUTOINCREMENT`, so it is strictly greater than every id ever
    /// assigned before, including deleted ones.
    pub fn create(
        &self,
        name: &str,
        content: &str,
        is_admin: bool,
        reply_to_id: Option<i64>,
    ) -> Result<MessageRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (name, content, is_admin, reply_to_id) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![name, content, is_admin, reply_to_id],
            )?;
            let id = conn.last_insert_rowid();
            query_message(conn, id)?.ok_or_else(|| anyhow!("inserted message #{} vanished", id))
        })
    }

    pub fn find(&self, id: i64) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| query_message(conn, id))
    }

    /// One backward page of top-level messages, newest first. With a
    /// cursor, only rows with `id` strictly below it are returned, so
    /// chained cursors paginate with no gaps or overlap.
    pub fn top_level_page(&self, cursor: Option<i64>, limit: u32) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE reply_to_id IS NULL AND (?1 IS NULL OR id < ?1)
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?2"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params![cursor, limit], row_to_message)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// All replies to the given top-level ids, oldest first. `datetime('now')`
    /// has one-second resolution, so id breaks creation-time ties.
    pub fn replies_for(&self, parent_ids: &[i64]) -> Result<Vec<MessageRow>> {
        if parent_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> =
                (1..=parent_ids.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE reply_to_id IN ({})
                 ORDER BY created_at ASC, id ASC",
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let params: Vec<&dyn rusqlite::types::ToSql> = parent_ids
                .iter()
                .map(|id| id as &dyn rusqlite::types::ToSql)
                .collect();

            let rows = stmt
                .query_map(params.as_slice(), row_to_message)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Delete a message. Returns false when no such id exists. Replies to
    /// a deleted top-level message go with it via the FK cascade.
    pub fn delete(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let affected = conn.execute("DELETE FROM messages WHERE id = ?1", [id])?;
            Ok(affected > 0)
        })
    }

    pub fn count(&self) -> Result<i64> {
        self.with_conn(|conn| {
            let n = conn.query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?;
            Ok(n)
        })
    }
}

fn query_message(conn: &Connection, id: i64) -> Result<Option<MessageRow>> {
    let sql = format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1");
    let mut stmt = conn.prepare(&sql)?;
    let row = stmt.query_row([id], row_to_message).optional()?;
    Ok(row)
}

fn row_to_message(row: &Row) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        name: row.get(1)?,
        content: row.get(2)?,
        is_admin: row.get(3)?,
        reply_to_id: row.get(4)?,
        created_at: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn ids_strictly_increase_and_are_never_reused() {
        let db = store();
        let a = db.create("A", "first", false, None).unwrap();
        let b = db.create("B", "second", false, None).unwrap();
        assert!(b.id > a.id);

        // Free the highest id, then insert again: the new id must still climb.
        assert!(db.delete(b.id).unwrap());
        let c = db.create("C", "third", false, None).unwrap();
        assert!(c.id > b.id);
    }

    #[test]
    fn page_is_descending_and_cursor_bounds_it() {
        let db = store();
        let ids: Vec<i64> = (0..5)
            .map(|i| db.create("G", &format!("msg {}", i), false, None).unwrap().id)
            .collect();

        let page = db.top_level_page(None, 2).unwrap();
        assert_eq!(
            page.iter().map(|r| r.id).collect::<Vec<_>>(),
            vec![ids[4], ids[3]]
        );

        let older = db.top_level_page(Some(ids[3]), 10).unwrap();
        assert_eq!(
            older.iter().map(|r| r.id).collect::<Vec<_>>(),
            vec![ids[2], ids[1], ids[0]]
        );
        assert!(older.iter().all(|r| r.id < ids[3]));
    }

    #[test]
    fn replies_are_excluded_from_pages_and_fetched_ascending() {
        let db = store();
        let top = db.create("G", "top", false, None).unwrap();
        let r1 = db.create("G", "reply 1", false, Some(top.id)).unwrap();
        let r2 = db.create("Admin", "reply 2", true, Some(top.id)).unwrap();

        let page = db.top_level_page(None, 10).unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, top.id);

        let replies = db.replies_for(&[top.id]).unwrap();
        assert_eq!(
            replies.iter().map(|r| r.id).collect::<Vec<_>>(),
            vec![r1.id, r2.id]
        );
        assert!(replies[1].is_admin);
    }

    #[test]
    fn delete_cascades_to_replies() {
        let db = store();
        let top = db.create("G", "top", false, None).unwrap();
        let reply = db.create("G", "reply", false, Some(top.id)).unwrap();

        assert!(db.delete(top.id).unwrap());
        assert!(db.find(reply.id).unwrap().is_none());
        assert_eq!(db.count().unwrap(), 0);
    }

    #[test]
    fn delete_missing_id_reports_not_found() {
        let db = store();
        assert!(!db.delete(999).unwrap());
    }

    #[test]
    fn count_tracks_all_messages_including_replies() {
        let db = store();
        let top = db.create("G", "top", false, None).unwrap();
        db.create("G", "reply", false, Some(top.id)).unwrap();
        assert_eq!(db.count().unwrap(), 2);
    }
}

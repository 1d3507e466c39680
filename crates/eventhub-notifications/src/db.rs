use rusqlite::Connection;

use crate::error::Result;

/// Initialise the notifications table and its listing index.
///
/// Safe to call on every startup: uses `IF NOT EXISTS` throughout.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS notifications (
            id          TEXT PRIMARY KEY NOT NULL,
            user_id     TEXT NOT NULL,
            message     TEXT NOT NULL,
            kind        TEXT NOT NULL DEFAULT 'info',
            is_read     INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_notifications_user
            ON notifications(user_id, created_at DESC);",
    )?;
    Ok(())
}

use std::sync::{Mutex, MutexGuard};

use chrono::SecondsFormat;
use eventhub_core::types::UserId;
use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::error::{NotificationError, Result};
use crate::types::{Notification, NotificationKind};

const SELECT_COLUMNS: &str = "SELECT id, user_id, message, kind, is_read, created_at FROM notifications";

/// Thread-safe store for persisted notifications.
///
/// Wraps a single SQLite connection in a `Mutex`. Every method is a short
/// synchronous statement; nothing here touches the network.
pub struct NotificationStore {
    db: Mutex<Connection>,
}

impl NotificationStore {
    /// Wrap an already-open (and `init_db`-initialised) connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            db: Mutex::new(conn),
        }
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // A panic mid-statement leaves SQLite itself consistent.
        self.db.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Persist a new unread notification and return the stored record.
    #[instrument(skip(self, message), fields(recipient = %recipient, kind = %kind))]
    pub fn create(
        &self,
        recipient: &UserId,
        message: &str,
        kind: &NotificationKind,
    ) -> Result<Notification> {
        if recipient.is_blank() {
            return Err(NotificationError::InvalidRecipient(recipient.to_string()));
        }
        if message.trim().is_empty() {
            return Err(NotificationError::EmptyMessage);
        }

        let notification = Notification {
            id: Uuid::now_v7().to_string(),
            recipient: recipient.clone(),
            message: message.to_string(),
            kind: kind.clone(),
            read: false,
            created_at: chrono::Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
        };

        self.conn().execute(
            "INSERT INTO notifications (id, user_id, message, kind, is_read, created_at)
             VALUES (?1, ?2, ?3, ?4, 0, ?5)",
            rusqlite::params![
                notification.id,
                notification.recipient.as_str(),
                notification.message,
                notification.kind.as_str(),
                notification.created_at,
            ],
        )?;
        debug!(id = %notification.id, "notification stored");
        Ok(notification)
    }

    /// Newest-first notifications for a recipient, at most `limit` rows.
    ///
    /// Rows created within the same microsecond fall back to insertion order.
    #[instrument(skip(self), fields(recipient = %recipient, limit))]
    pub fn list_for(&self, recipient: &UserId, limit: usize) -> Result<Vec<Notification>> {
        let db = self.conn();
        let mut stmt = db.prepare(&format!(
            "{SELECT_COLUMNS}
             WHERE user_id = ?1
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?2"
        ))?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt.query_map(rusqlite::params![recipient.as_str(), limit], row_to_notification)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Fetch one notification by id, `None` if it does not exist.
    #[instrument(skip(self))]
    pub fn get(&self, id: &str) -> Result<Option<Notification>> {
        let db = self.conn();
        let found = db
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                rusqlite::params![id],
                row_to_notification,
            )
            .optional()?;
        Ok(found)
    }

    /// Mark one notification read.
    ///
    /// Returns `false` when the id is unknown. Marking an already-read
    /// notification is a no-op that still returns `true`.
    #[instrument(skip(self))]
    pub fn mark_read(&self, id: &str) -> Result<bool> {
        // SQLite counts every row matched by WHERE, even if the value was
        // already 1, so `changed` is an existence check.
        let changed = self.conn().execute(
            "UPDATE notifications SET is_read = 1 WHERE id = ?1",
            rusqlite::params![id],
        )?;
        Ok(changed > 0)
    }

    /// Mark every unread notification of a recipient read.
    /// Returns how many rows flipped.
    #[instrument(skip(self), fields(recipient = %recipient))]
    pub fn mark_all_read(&self, recipient: &UserId) -> Result<usize> {
        let changed = self.conn().execute(
            "UPDATE notifications SET is_read = 1 WHERE user_id = ?1 AND is_read = 0",
            rusqlite::params![recipient.as_str()],
        )?;
        debug!(changed, "marked notifications read");
        Ok(changed)
    }
}

fn row_to_notification(row: &rusqlite::Row<'_>) -> rusqlite::Result<Notification> {
    Ok(Notification {
        id: row.get(0)?,
        recipient: UserId(row.get(1)?),
        message: row.get(2)?,
        kind: NotificationKind::new(row.get::<_, String>(3)?),
        read: row.get::<_, i64>(4)? != 0,
        created_at: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;

    fn store() -> NotificationStore {
        let conn = Connection::open_in_memory().expect("in-memory db");
        init_db(&conn).expect("schema");
        NotificationStore::new(conn)
    }

    #[test]
    fn create_assigns_id_and_defaults() {
        let store = store();
        let n = store
            .create(&UserId::from("u1"), "hello", &NotificationKind::default())
            .unwrap();
        assert!(!n.id.is_empty());
        assert_eq!(n.recipient.as_str(), "u1");
        assert_eq!(n.kind.as_str(), "info");
        assert!(!n.read);
        assert_eq!(store.get(&n.id).unwrap(), Some(n));
    }

    #[test]
    fn create_rejects_blank_recipient_and_message() {
        let store = store();
        assert!(matches!(
            store.create(&UserId::from(" "), "hi", &NotificationKind::info()),
            Err(NotificationError::InvalidRecipient(_))
        ));
        assert!(matches!(
            store.create(&UserId::from("u1"), "   ", &NotificationKind::info()),
            Err(NotificationError::EmptyMessage)
        ));
    }

    #[test]
    fn list_for_is_newest_first_and_scoped_to_recipient() {
        let store = store();
        let u1 = UserId::from("u1");
        for msg in ["first", "second", "third"] {
            store.create(&u1, msg, &NotificationKind::info()).unwrap();
        }
        store
            .create(&UserId::from("u2"), "other", &NotificationKind::info())
            .unwrap();

        let listed = store.list_for(&u1, 50).unwrap();
        let messages: Vec<_> = listed.iter().map(|n| n.message.as_str()).collect();
        assert_eq!(messages, ["third", "second", "first"]);
    }

    #[test]
    fn list_for_truncates_to_limit() {
        let store = store();
        let u1 = UserId::from("u1");
        for i in 0..5 {
            store.create(&u1, &format!("m{i}"), &NotificationKind::info()).unwrap();
        }
        let listed = store.list_for(&u1, 2).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].message, "m4");
    }

    #[test]
    fn list_for_unknown_recipient_is_empty() {
        assert!(store().list_for(&UserId::from("ghost"), 50).unwrap().is_empty());
    }

    #[test]
    fn mark_read_is_idempotent() {
        let store = store();
        let n = store
            .create(&UserId::from("u1"), "hello", &NotificationKind::info())
            .unwrap();

        assert!(store.mark_read(&n.id).unwrap());
        assert!(store.get(&n.id).unwrap().unwrap().read);
        assert!(store.mark_read(&n.id).unwrap());
        assert!(store.get(&n.id).unwrap().unwrap().read);
    }

    #[test]
    fn mark_read_unknown_id_reports_not_found() {
        assert!(!store().mark_read("missing").unwrap());
    }

    #[test]
    fn mark_all_read_only_touches_unread_of_recipient() {
        let store = store();
        let u1 = UserId::from("u1");
        let a = store.create(&u1, "a", &NotificationKind::info()).unwrap();
        store.create(&u1, "b", &NotificationKind::info()).unwrap();
        store.create(&u1, "c", &NotificationKind::info()).unwrap();
        let other = store
            .create(&UserId::from("u2"), "x", &NotificationKind::info())
            .unwrap();
        store.mark_read(&a.id).unwrap();

        assert_eq!(store.mark_all_read(&u1).unwrap(), 2);
        assert!(store.list_for(&u1, 50).unwrap().iter().all(|n| n.read));
        assert!(!store.get(&other.id).unwrap().unwrap().read);

        assert_eq!(store.mark_all_read(&u1).unwrap(), 0);
    }
}

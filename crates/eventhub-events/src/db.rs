use rusqlite::{Connection, Result};

/// Initialise all tables for the events subsystem. Safe to call on every
/// startup: CREATE IF NOT EXISTS means it's idempotent.
pub fn init_db(conn: &Connection) -> Result<()> {
    create_events_table(conn)?;
    create_registrations_table(conn)?;
    create_teams_tables(conn)?;
    Ok(())
}

fn create_events_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS events (
            id                TEXT PRIMARY KEY NOT NULL,
            title             TEXT NOT NULL,
            description       TEXT NOT NULL DEFAULT '',
            date              TEXT,
            location          TEXT,
            category          TEXT,
            status            TEXT,
            organizer         TEXT NOT NULL,
            max_participants  INTEGER,  -- NULL means unlimited
            created_at        TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_events_organizer
            ON events (organizer);",
    )
}

fn create_registrations_table(conn: &Connection) -> Result<()> {
    // UNIQUE(user_id, event_id) backs the duplicate-registration check.
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS registrations (
            id             TEXT PRIMARY KEY NOT NULL,
            user_id        TEXT NOT NULL,
            event_id       TEXT NOT NULL REFERENCES events(id),
            status         TEXT NOT NULL DEFAULT 'confirmed',
            registered_at  TEXT NOT NULL,
            UNIQUE(user_id, event_id)
        );
        CREATE INDEX IF NOT EXISTS idx_registrations_event
            ON registrations (event_id);",
    )
}

fn create_teams_tables(conn: &Connection) -> Result<()> {
    // UNIQUE(event_id, user_id) on members: one team per user per event.
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS teams (
            id          TEXT PRIMARY KEY NOT NULL,
            event_id    TEXT NOT NULL REFERENCES events(id),
            team_name   TEXT NOT NULL,
            leader      TEXT NOT NULL,
            max_size    INTEGER NOT NULL DEFAULT 4,
            created_at  TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS team_members (
            team_id    TEXT NOT NULL REFERENCES teams(id),
            event_id   TEXT NOT NULL,
            user_id    TEXT NOT NULL,
            joined_at  TEXT NOT NULL,
            PRIMARY KEY (team_id, user_id),
            UNIQUE (event_id, user_id)
        );",
    )
}

use std::sync::{Mutex, MutexGuard};

use eventhub_core::types::UserId;
use rusqlite::{Connection, OptionalExtension};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::{EventError, Result};
use crate::types::{Event, EventFilter, EventUpdate, NewEvent, Registration, Team, DEFAULT_TEAM_SIZE};

const EVENT_COLUMNS: &str = "SELECT id, title, description, date, location, category, status,
        organizer, max_participants, created_at FROM events";

const REGISTRATION_COLUMNS: &str =
    "SELECT id, user_id, event_id, status, registered_at FROM registrations";

/// Events, registrations and teams behind one SQLite connection.
///
/// Multi-step checks (capacity, duplicates, team membership) run inside a
/// transaction while the mutex is held, so two concurrent registrations
/// cannot both squeeze into the last seat.
pub struct EventStore {
    db: Mutex<Connection>,
}

impl EventStore {
    pub fn new(conn: Connection) -> Self {
        Self {
            db: Mutex::new(conn),
        }
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.db.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ── Events ───────────────────────────────────────────────────────────────

    #[instrument(skip(self, new), fields(organizer = %organizer))]
    pub fn create_event(&self, organizer: &UserId, new: NewEvent) -> Result<Event> {
        if new.title.trim().is_empty() {
            return Err(EventError::InvalidInput("title is required".to_string()));
        }
        let event = Event {
            id: Uuid::now_v7().to_string(),
            title: new.title,
            description: new.description,
            date: new.date,
            location: new.location,
            category: new.category,
            status: new.status,
            organizer: organizer.clone(),
            max_participants: new.max_participants,
            created_at: now(),
        };
        self.conn().execute(
            "INSERT INTO events
             (id, title, description, date, location, category, status, organizer,
              max_participants, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            rusqlite::params![
                event.id,
                event.title,
                event.description,
                event.date,
                event.location,
                event.category,
                event.status,
                event.organizer.as_str(),
                event.max_participants,
                event.created_at,
            ],
        )?;
        info!(event_id = %event.id, "event created");
        Ok(event)
    }

    pub fn get_event(&self, id: &str) -> Result<Option<Event>> {
        load_event(&self.conn(), id)
    }

    /// Events matching `filter`, most recently created first. Empty filter
    /// values are ignored.
    pub fn list_events(&self, filter: &EventFilter) -> Result<Vec<Event>> {
        let category = non_blank(filter.category.as_deref());
        let status = non_blank(filter.status.as_deref());
        // LIKE is case-insensitive for ASCII; escape its wildcards so the
        // search term matches literally.
        let search = non_blank(filter.search.as_deref()).map(|term| {
            let escaped = term
                .replace('\\', "\\\\")
                .replace('%', "\\%")
                .replace('_', "\\_");
            format!("%{escaped}%")
        });

        let db = self.conn();
        let mut stmt = db.prepare(&format!(
            "{EVENT_COLUMNS}
             WHERE (?1 IS NULL OR category = ?1)
               AND (?2 IS NULL OR status = ?2)
               AND (?3 IS NULL OR title LIKE ?3 ESCAPE '\\')
             ORDER BY created_at DESC, rowid DESC"
        ))?;
        let rows = stmt.query_map(rusqlite::params![category, status, search], row_to_event)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Events owned by `organizer`, most recently created first.
    pub fn organizer_events(&self, organizer: &UserId) -> Result<Vec<Event>> {
        let db = self.conn();
        let mut stmt = db.prepare(&format!(
            "{EVENT_COLUMNS} WHERE organizer = ?1 ORDER BY created_at DESC, rowid DESC"
        ))?;
        let rows = stmt.query_map(rusqlite::params![organizer.as_str()], row_to_event)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Apply `update` to an event owned by `organizer` and return the result.
    #[instrument(skip(self, update), fields(organizer = %organizer))]
    pub fn update_event(&self, id: &str, organizer: &UserId, update: EventUpdate) -> Result<Event> {
        let mut db = self.conn();
        let tx = db.transaction()?;

        let mut event = owned_event(&tx, id, organizer)?;
        if let Some(title) = update.title {
            if title.trim().is_empty() {
                return Err(EventError::InvalidInput("title is required".to_string()));
            }
            event.title = title;
        }
        if let Some(description) = update.description {
            event.description = description;
        }
        if update.date.is_some() {
            event.date = update.date;
        }
        if update.location.is_some() {
            event.location = update.location;
        }
        if update.category.is_some() {
            event.category = update.category;
        }
        if update.status.is_some() {
            event.status = update.status;
        }
        if update.max_participants.is_some() {
            event.max_participants = update.max_participants;
        }

        tx.execute(
            "UPDATE events
             SET title = ?2, description = ?3, date = ?4, location = ?5, category = ?6,
                 status = ?7, max_participants = ?8
             WHERE id = ?1",
            rusqlite::params![
                event.id,
                event.title,
                event.description,
                event.date,
                event.location,
                event.category,
                event.status,
                event.max_participants,
            ],
        )?;
        tx.commit()?;
        info!(event_id = %event.id, "event updated");
        Ok(event)
    }

    /// Delete an event owned by `organizer` together with its
    /// registrations and teams.
    #[instrument(skip(self), fields(organizer = %organizer))]
    pub fn delete_event(&self, id: &str, organizer: &UserId) -> Result<()> {
        let mut db = self.conn();
        let tx = db.transaction()?;

        owned_event(&tx, id, organizer)?;
        tx.execute("DELETE FROM team_members WHERE event_id = ?1", rusqlite::params![id])?;
        tx.execute("DELETE FROM teams WHERE event_id = ?1", rusqlite::params![id])?;
        tx.execute("DELETE FROM registrations WHERE event_id = ?1", rusqlite::params![id])?;
        tx.execute("DELETE FROM events WHERE id = ?1", rusqlite::params![id])?;
        tx.commit()?;
        info!(event_id = id, "event deleted");
        Ok(())
    }

    // ── Registrations ────────────────────────────────────────────────────────

    /// Register `user` for an event, enforcing existence, uniqueness and
    /// capacity.
    #[instrument(skip(self), fields(user = %user))]
    pub fn register(&self, user: &UserId, event_id: &str) -> Result<Registration> {
        let mut db = self.conn();
        let tx = db.transaction()?;

        let event = load_event(&tx, event_id)?
            .ok_or_else(|| EventError::EventNotFound(event_id.to_string()))?;

        if is_registered_in(&tx, user, event_id)? {
            return Err(EventError::AlreadyRegistered);
        }

        if let Some(max) = event.max_participants {
            let count: u32 = tx.query_row(
                "SELECT COUNT(*) FROM registrations WHERE event_id = ?1",
                rusqlite::params![event_id],
                |row| row.get(0),
            )?;
            if count >= max {
                return Err(EventError::EventFull);
            }
        }

        let registration = Registration {
            id: Uuid::now_v7().to_string(),
            user: user.clone(),
            event: event_id.to_string(),
            status: "confirmed".to_string(),
            registered_at: now(),
        };
        tx.execute(
            "INSERT INTO registrations (id, user_id, event_id, status, registered_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                registration.id,
                registration.user.as_str(),
                registration.event,
                registration.status,
                registration.registered_at,
            ],
        )?;
        tx.commit()?;
        info!(event_id, registration_id = %registration.id, "user registered");
        Ok(registration)
    }

    pub fn is_registered(&self, user: &UserId, event_id: &str) -> Result<bool> {
        is_registered_in(&self.conn(), user, event_id)
    }

    /// User ids registered for an event, in registration order.
    pub fn registrants(&self, event_id: &str) -> Result<Vec<UserId>> {
        let db = self.conn();
        let mut stmt = db.prepare(
            "SELECT user_id FROM registrations
             WHERE event_id = ?1
             ORDER BY registered_at ASC, rowid ASC",
        )?;
        let rows = stmt.query_map(rusqlite::params![event_id], |row| {
            row.get::<_, String>(0).map(UserId)
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Every registration held by `user`, oldest first.
    pub fn registrations_for(&self, user: &UserId) -> Result<Vec<Registration>> {
        let db = self.conn();
        let mut stmt = db.prepare(&format!(
            "{REGISTRATION_COLUMNS} WHERE user_id = ?1 ORDER BY registered_at ASC, rowid ASC"
        ))?;
        let rows = stmt.query_map(rusqlite::params![user.as_str()], row_to_registration)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Delete a registration owned by `user`.
    #[instrument(skip(self), fields(user = %user))]
    pub fn cancel_registration(&self, registration_id: &str, user: &UserId) -> Result<()> {
        let db = self.conn();
        let owner: Option<String> = db
            .query_row(
                "SELECT user_id FROM registrations WHERE id = ?1",
                rusqlite::params![registration_id],
                |row| row.get(0),
            )
            .optional()?;
        match owner {
            None => Err(EventError::RegistrationNotFound(registration_id.to_string())),
            Some(owner) if owner != user.as_str() => Err(EventError::PermissionDenied(
                "registration belongs to another user".to_string(),
            )),
            Some(_) => {
                db.execute(
                    "DELETE FROM registrations WHERE id = ?1",
                    rusqlite::params![registration_id],
                )?;
                Ok(())
            }
        }
    }

    // ── Teams ────────────────────────────────────────────────────────────────

    /// Create a team led by `user`. The leader must be registered for the
    /// event and not already in another team for it.
    #[instrument(skip(self), fields(user = %user))]
    pub fn create_team(
        &self,
        user: &UserId,
        event_id: &str,
        team_name: &str,
        max_size: Option<u32>,
    ) -> Result<Team> {
        if team_name.trim().is_empty() {
            return Err(EventError::InvalidInput("team_name is required".to_string()));
        }
        let mut db = self.conn();
        let tx = db.transaction()?;

        if in_team_for_event(&tx, user, event_id)? {
            return Err(EventError::AlreadyInTeam);
        }
        if !is_registered_in(&tx, user, event_id)? {
            return Err(EventError::NotRegistered);
        }

        let id = Uuid::now_v7().to_string();
        let created_at = now();
        let max_size = max_size.filter(|n| *n > 0).unwrap_or(DEFAULT_TEAM_SIZE);
        tx.execute(
            "INSERT INTO teams (id, event_id, team_name, leader, max_size, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![id, event_id, team_name, user.as_str(), max_size, created_at],
        )?;
        insert_member(&tx, &id, event_id, user)?;
        let team = load_team(&tx, &id)?.ok_or_else(|| EventError::TeamNotFound(id.clone()))?;
        tx.commit()?;
        info!(team_id = %team.id, "team created");
        Ok(team)
    }

    pub fn get_team(&self, id: &str) -> Result<Option<Team>> {
        load_team(&self.conn(), id)
    }

    /// All teams formed for an event, oldest first.
    pub fn teams_for_event(&self, event_id: &str) -> Result<Vec<Team>> {
        let db = self.conn();
        let ids = {
            let mut stmt = db.prepare(
                "SELECT id FROM teams WHERE event_id = ?1 ORDER BY created_at ASC, rowid ASC",
            )?;
            let rows = stmt.query_map(rusqlite::params![event_id], |row| row.get::<_, String>(0))?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        };
        let mut teams = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(team) = load_team(&db, &id)? {
                teams.push(team);
            }
        }
        Ok(teams)
    }

    /// The team `user` belongs to for an event, if any.
    pub fn team_for_user(&self, user: &UserId, event_id: &str) -> Result<Option<Team>> {
        let db = self.conn();
        let team_id: Option<String> = db
            .query_row(
                "SELECT team_id FROM team_members WHERE user_id = ?1 AND event_id = ?2",
                rusqlite::params![user.as_str(), event_id],
                |row| row.get(0),
            )
            .optional()?;
        match team_id {
            Some(id) => load_team(&db, &id),
            None => Ok(None),
        }
    }

    /// Add `user` to a team and return the updated team.
    #[instrument(skip(self), fields(user = %user))]
    pub fn join_team(&self, team_id: &str, user: &UserId) -> Result<Team> {
        let mut db = self.conn();
        let tx = db.transaction()?;

        let team = load_team(&tx, team_id)?
            .ok_or_else(|| EventError::TeamNotFound(team_id.to_string()))?;

        if !is_registered_in(&tx, user, &team.event)? {
            return Err(EventError::NotRegistered);
        }
        if in_team_for_event(&tx, user, &team.event)? {
            return Err(EventError::AlreadyInTeam);
        }
        if team.is_full() {
            return Err(EventError::TeamFull);
        }

        insert_member(&tx, team_id, &team.event, user)?;
        let updated = load_team(&tx, team_id)?
            .ok_or_else(|| EventError::TeamNotFound(team_id.to_string()))?;
        tx.commit()?;
        info!(team_id, members = updated.members.len(), "team joined");
        Ok(updated)
    }

    /// Remove `user` from a team and return the team as it is afterwards.
    /// The leader cannot leave.
    #[instrument(skip(self), fields(user = %user))]
    pub fn leave_team(&self, team_id: &str, user: &UserId) -> Result<Team> {
        let mut db = self.conn();
        let tx = db.transaction()?;

        let team = load_team(&tx, team_id)?
            .ok_or_else(|| EventError::TeamNotFound(team_id.to_string()))?;
        if !team.has_member(user) {
            return Err(EventError::NotInTeam);
        }
        if &team.leader == user {
            return Err(EventError::LeaderCannotLeave);
        }

        tx.execute(
            "DELETE FROM team_members WHERE team_id = ?1 AND user_id = ?2",
            rusqlite::params![team_id, user.as_str()],
        )?;
        let updated = load_team(&tx, team_id)?
            .ok_or_else(|| EventError::TeamNotFound(team_id.to_string()))?;
        tx.commit()?;
        info!(team_id, members = updated.members.len(), "team left");
        Ok(updated)
    }
}

// ── Row helpers ──────────────────────────────────────────────────────────────

fn now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

fn row_to_event(row: &rusqlite::Row<'_>) -> rusqlite::Result<Event> {
    Ok(Event {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        date: row.get(3)?,
        location: row.get(4)?,
        category: row.get(5)?,
        status: row.get(6)?,
        organizer: UserId(row.get(7)?),
        max_participants: row.get(8)?,
        created_at: row.get(9)?,
    })
}

fn row_to_registration(row: &rusqlite::Row<'_>) -> rusqlite::Result<Registration> {
    Ok(Registration {
        id: row.get(0)?,
        user: UserId(row.get(1)?),
        event: row.get(2)?,
        status: row.get(3)?,
        registered_at: row.get(4)?,
    })
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Load an event and check `organizer` owns it.
fn owned_event(conn: &Connection, id: &str, organizer: &UserId) -> Result<Event> {
    let event = load_event(conn, id)?.ok_or_else(|| EventError::EventNotFound(id.to_string()))?;
    if !event.is_owned_by(organizer) {
        return Err(EventError::PermissionDenied(
            "event belongs to another organizer".to_string(),
        ));
    }
    Ok(event)
}

fn load_event(conn: &Connection, id: &str) -> Result<Option<Event>> {
    let event = conn
        .query_row(
            &format!("{EVENT_COLUMNS} WHERE id = ?1"),
            rusqlite::params![id],
            row_to_event,
        )
        .optional()?;
    Ok(event)
}

fn load_team(conn: &Connection, id: &str) -> Result<Option<Team>> {
    let team = conn
        .query_row(
            "SELECT id, event_id, team_name, leader, max_size, created_at
             FROM teams WHERE id = ?1",
            rusqlite::params![id],
            |row| {
                Ok(Team {
                    id: row.get(0)?,
                    event: row.get(1)?,
                    team_name: row.get(2)?,
                    leader: UserId(row.get(3)?),
                    members: Vec::new(),
                    max_size: row.get(4)?,
                    created_at: row.get(5)?,
                })
            },
        )
        .optional()?;

    let Some(mut team) = team else {
        return Ok(None);
    };
    let mut stmt = conn.prepare(
        "SELECT user_id FROM team_members
         WHERE team_id = ?1
         ORDER BY joined_at ASC, rowid ASC",
    )?;
    let members = stmt.query_map(rusqlite::params![id], |row| {
        row.get::<_, String>(0).map(UserId)
    })?;
    team.members = members.collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(Some(team))
}

fn insert_member(conn: &Connection, team_id: &str, event_id: &str, user: &UserId) -> Result<()> {
    conn.execute(
        "INSERT INTO team_members (team_id, event_id, user_id, joined_at)
         VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![team_id, event_id, user.as_str(), now()],
    )?;
    Ok(())
}

fn is_registered_in(conn: &Connection, user: &UserId, event_id: &str) -> Result<bool> {
    let exists = conn
        .query_row(
            "SELECT 1 FROM registrations WHERE user_id = ?1 AND event_id = ?2",
            rusqlite::params![user.as_str(), event_id],
            |_| Ok(()),
        )
        .optional()?
        .is_some();
    Ok(exists)
}

fn in_team_for_event(conn: &Connection, user: &UserId, event_id: &str) -> Result<bool> {
    let exists = conn
        .query_row(
            "SELECT 1 FROM team_members WHERE user_id = ?1 AND event_id = ?2",
            rusqlite::params![user.as_str(), event_id],
            |_| Ok(()),
        )
        .optional()?
        .is_some();
    Ok(exists)
}

//! Charter store (SQLite): leads and the on-call agent roster.
//!
//! - Leads are write-once rows; each one snapshots the agent who was on call at
//!   insert time, so later roster edits never rewrite history.
//! - At most one agent is on call: the clear-others + set-one handoff runs inside
//!   a single transaction.

use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use rusqlite::{params, Connection, ErrorCode, OpenFlags, OptionalExtension};

use asapjet_core::{Agent, AgentInput, AgentUpdate, Lead, LeadInput, Urgency};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("An agent with this email already exists")]
    DuplicateEmail,
    #[error("Agent not found")]
    AgentNotFound,
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

#[derive(Clone)]
pub struct CharterDb {
    db_path: PathBuf,
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl CharterDb {
    pub fn new(db_path: PathBuf) -> Result<Self, rusqlite::Error> {
        let this = Self { db_path };
        this.init()?;
        Ok(this)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn open(&self) -> Result<Connection, rusqlite::Error> {
        Connection::open_with_flags(
            &self.db_path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )
    }

    fn init(&self) -> Result<(), rusqlite::Error> {
        if let Some(parent) = self.db_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let conn = self.open()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS leads (
                id TEXT PRIMARY KEY,
                from_airport_or_city TEXT NOT NULL,
                to_airport_or_city TEXT NOT NULL,
                date_time TEXT NOT NULL,
                pax INTEGER NOT NULL,
                name TEXT NOT NULL,
                phone TEXT NOT NULL,
                email TEXT NOT NULL,
                urgency TEXT NOT NULL,
                notes TEXT NULL,
                timestamp TEXT NOT NULL,
                assigned_agent_id TEXT NULL,
                assigned_agent_name TEXT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_leads_timestamp ON leads(timestamp);

            CREATE TABLE IF NOT EXISTS agents (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                phone TEXT NOT NULL,
                on_call INTEGER NOT NULL DEFAULT 0,
                active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    // ── Leads ──────────────────────────────────────────────────────────────

    /// Persist a validated lead: stamps id + submission time and snapshots the
    /// current on-call agent into the row. Returns the record as stored.
    pub fn save_lead(&self, input: LeadInput) -> Result<Lead, StoreError> {
        let conn = self.open()?;
        let assigned = Self::on_call_row(&conn)?.map(|a| (a.id, a.name));
        let lead = Lead::from_input(
            input,
            uuid::Uuid::new_v4().to_string(),
            now_rfc3339(),
            assigned,
        );
        conn.execute(
            r#"
            INSERT INTO leads (
                id, from_airport_or_city, to_airport_or_city, date_time, pax,
                name, phone, email, urgency, notes, timestamp,
                assigned_agent_id, assigned_agent_name
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
            params![
                lead.id,
                lead.from_airport_or_city,
                lead.to_airport_or_city,
                lead.date_time,
                lead.pax,
                lead.name,
                lead.phone,
                lead.email,
                lead.urgency.as_str(),
                lead.notes,
                lead.timestamp,
                lead.assigned_agent_id,
                lead.assigned_agent_name,
            ],
        )?;
        Ok(lead)
    }

    /// All leads, newest-submitted first. A read failure degrades to an empty
    /// list so the admin dashboard always renders.
    pub fn all_leads(&self) -> Vec<Lead> {
        match self.try_all_leads() {
            Ok(leads) => leads,
            Err(e) => {
                tracing::error!(target: "asapjet::store", "Failed to read leads: {}", e);
                Vec::new()
            }
        }
    }

    fn try_all_leads(&self) -> Result<Vec<Lead>, rusqlite::Error> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, from_airport_or_city, to_airport_or_city, date_time, pax,
                   name, phone, email, urgency, notes, timestamp,
                   assigned_agent_id, assigned_agent_name
            FROM leads ORDER BY timestamp DESC, rowid DESC
            "#,
        )?;
        let rows = stmt
            .query_map([], |r| {
                let urgency: String = r.get(8)?;
                Ok(Lead {
                    id: r.get(0)?,
                    from_airport_or_city: r.get(1)?,
                    to_airport_or_city: r.get(2)?,
                    date_time: r.get(3)?,
                    pax: r.get(4)?,
                    name: r.get(5)?,
                    phone: r.get(6)?,
                    email: r.get(7)?,
                    urgency: Urgency::parse(&urgency).unwrap_or_default(),
                    notes: r.get(9)?,
                    timestamp: r.get(10)?,
                    assigned_agent_id: r.get(11)?,
                    assigned_agent_name: r.get(12)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ── Agents ─────────────────────────────────────────────────────────────

    pub fn list_agents(&self) -> Result<Vec<Agent>, StoreError> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {AGENT_COLUMNS} FROM agents ORDER BY created_at DESC, rowid DESC"
        ))?;
        let rows = stmt
            .query_map([], agent_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn get_agent(&self, id: &str) -> Result<Option<Agent>, StoreError> {
        let conn = self.open()?;
        let row = conn
            .query_row(
                &format!("SELECT {AGENT_COLUMNS} FROM agents WHERE id = ?1"),
                params![id],
                agent_from_row,
            )
            .optional()?;
        Ok(row)
    }

    /// The single active on-call agent, if any.
    pub fn on_call_agent(&self) -> Result<Option<Agent>, StoreError> {
        let conn = self.open()?;
        Ok(Self::on_call_row(&conn)?)
    }

    fn on_call_row(conn: &Connection) -> Result<Option<Agent>, rusqlite::Error> {
        conn.query_row(
            &format!("SELECT {AGENT_COLUMNS} FROM agents WHERE on_call = 1 AND active = 1 LIMIT 1"),
            [],
            agent_from_row,
        )
        .optional()
    }

    pub fn create_agent(&self, input: AgentInput) -> Result<Agent, StoreError> {
        let mut conn = self.open()?;
        let ts = now_rfc3339();
        let agent = Agent {
            id: uuid::Uuid::new_v4().to_string(),
            name: input.name.trim().to_string(),
            email: input.email.trim().to_string(),
            phone: input.phone.trim().to_string(),
            on_call: input.on_call,
            active: input.active,
            created_at: ts.clone(),
            updated_at: ts,
        };

        let tx = conn.transaction()?;
        if agent.on_call {
            tx.execute(
                "UPDATE agents SET on_call = 0, updated_at = ?1 WHERE on_call = 1",
                params![agent.updated_at],
            )?;
        }
        let inserted = tx.execute(
            r#"
            INSERT INTO agents (id, name, email, phone, on_call, active, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                agent.id,
                agent.name,
                agent.email,
                agent.phone,
                agent.on_call as i64,
                agent.active as i64,
                agent.created_at,
                agent.updated_at,
            ],
        );
        match inserted {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => return Err(StoreError::DuplicateEmail),
            Err(e) => return Err(e.into()),
        }
        tx.commit()?;
        Ok(agent)
    }

    /// Merge-patch the given fields. Setting `on_call = true` clears the flag
    /// from every other agent in the same transaction.
    pub fn update_agent(&self, id: &str, patch: AgentUpdate) -> Result<Agent, StoreError> {
        let mut conn = self.open()?;
        let ts = now_rfc3339();

        let tx = conn.transaction()?;
        if patch.on_call == Some(true) {
            tx.execute(
                "UPDATE agents SET on_call = 0, updated_at = ?1 WHERE on_call = 1 AND id != ?2",
                params![ts, id],
            )?;
        }
        let updated = tx.execute(
            r#"
            UPDATE agents SET
                name = COALESCE(?1, name),
                email = COALESCE(?2, email),
                phone = COALESCE(?3, phone),
                on_call = COALESCE(?4, on_call),
                active = COALESCE(?5, active),
                updated_at = ?6
            WHERE id = ?7
            "#,
            params![
                patch.name.as_deref().map(str::trim),
                patch.email.as_deref().map(str::trim),
                patch.phone.as_deref().map(str::trim),
                patch.on_call.map(|b| b as i64),
                patch.active.map(|b| b as i64),
                ts,
                id,
            ],
        );
        match updated {
            Ok(0) => return Err(StoreError::AgentNotFound),
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => return Err(StoreError::DuplicateEmail),
            Err(e) => return Err(e.into()),
        }
        tx.commit()?;

        self.get_agent(id)?.ok_or(StoreError::AgentNotFound)
    }

    /// Remove the agent unconditionally. Leads keep their denormalized snapshot;
    /// deleting a missing id is a no-op success, as in the admin UI contract.
    pub fn delete_agent(&self, id: &str) -> Result<(), StoreError> {
        let conn = self.open()?;
        conn.execute("DELETE FROM agents WHERE id = ?1", params![id])?;
        Ok(())
    }
}

const AGENT_COLUMNS: &str = "id, name, email, phone, on_call, active, created_at, updated_at";

fn agent_from_row(r: &rusqlite::Row<'_>) -> Result<Agent, rusqlite::Error> {
    Ok(Agent {
        id: r.get(0)?,
        name: r.get(1)?,
        email: r.get(2)?,
        phone: r.get(3)?,
        on_call: r.get::<_, i64>(4)? != 0,
        active: r.get::<_, i64>(5)? != 0,
        created_at: r.get(6)?,
        updated_at: r.get(7)?,
    })
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> (tempfile::TempDir, CharterDb) {
        let dir = tempfile::tempdir().unwrap();
        let db = CharterDb::new(dir.path().join("charter.db")).unwrap();
        (dir, db)
    }

    fn agent_input(email: &str, on_call: bool) -> AgentInput {
        AgentInput {
            name: "Ava Ops".to_string(),
            email: email.to_string(),
            phone: "+15550001111".to_string(),
            on_call,
            active: true,
        }
    }

    fn lead_input() -> LeadInput {
        LeadInput {
            from_airport_or_city: "LAX".to_string(),
            to_airport_or_city: "JFK".to_string(),
            date_time: "2025-06-01T10:00".to_string(),
            pax: 2,
            name: "Jane Doe".to_string(),
            phone: "5551234567".to_string(),
            email: "jane@example.com".to_string(),
            urgency: Urgency::Urgent,
            notes: Some("window seats".to_string()),
        }
    }

    #[test]
    fn save_lead_generates_unique_ids_and_ordered_timestamps() {
        let (_dir, db) = test_db();
        let a = db.save_lead(lead_input()).unwrap();
        let b = db.save_lead(lead_input()).unwrap();
        let c = db.save_lead(lead_input()).unwrap();
        assert_ne!(a.id, b.id);
        assert_ne!(b.id, c.id);
        assert!(a.timestamp <= b.timestamp);
        assert!(b.timestamp <= c.timestamp);

        // Newest-submitted first.
        let all = db.all_leads();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].id, c.id);
        assert_eq!(all[2].id, a.id);
    }

    #[test]
    fn save_lead_snapshots_on_call_agent() {
        let (_dir, db) = test_db();
        let agent = db.create_agent(agent_input("ava@asapjet.test", true)).unwrap();
        let lead = db.save_lead(lead_input()).unwrap();
        assert_eq!(lead.assigned_agent_id.as_deref(), Some(agent.id.as_str()));
        assert_eq!(lead.assigned_agent_name.as_deref(), Some("Ava Ops"));
    }

    #[test]
    fn save_lead_without_roster_has_no_assignment() {
        let (_dir, db) = test_db();
        let lead = db.save_lead(lead_input()).unwrap();
        assert!(lead.assigned_agent_id.is_none());
        assert!(lead.assigned_agent_name.is_none());
    }

    #[test]
    fn on_call_handoff_leaves_exactly_one_agent_on_call() {
        let (_dir, db) = test_db();
        let a = db.create_agent(agent_input("a@asapjet.test", true)).unwrap();
        let b = db.create_agent(agent_input("b@asapjet.test", false)).unwrap();

        let patch = AgentUpdate {
            on_call: Some(true),
            ..Default::default()
        };
        db.update_agent(&b.id, patch).unwrap();

        let agents = db.list_agents().unwrap();
        let on_call: Vec<_> = agents.iter().filter(|a| a.on_call).collect();
        assert_eq!(on_call.len(), 1);
        assert_eq!(on_call[0].id, b.id);
        assert!(!db.get_agent(&a.id).unwrap().unwrap().on_call);
    }

    #[test]
    fn create_with_on_call_clears_previous_holder() {
        let (_dir, db) = test_db();
        let a = db.create_agent(agent_input("a@asapjet.test", true)).unwrap();
        let b = db.create_agent(agent_input("b@asapjet.test", true)).unwrap();
        assert!(!db.get_agent(&a.id).unwrap().unwrap().on_call);
        assert_eq!(db.on_call_agent().unwrap().unwrap().id, b.id);
    }

    #[test]
    fn inactive_agent_is_never_on_call_for_assignment() {
        let (_dir, db) = test_db();
        let a = db.create_agent(agent_input("a@asapjet.test", true)).unwrap();
        db.update_agent(
            &a.id,
            AgentUpdate {
                active: Some(false),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(db.on_call_agent().unwrap().is_none());
        let lead = db.save_lead(lead_input()).unwrap();
        assert!(lead.assigned_agent_id.is_none());
    }

    #[test]
    fn duplicate_email_is_rejected() {
        let (_dir, db) = test_db();
        db.create_agent(agent_input("dup@asapjet.test", false)).unwrap();
        let err = db.create_agent(agent_input("dup@asapjet.test", false)).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail));
    }

    #[test]
    fn update_unknown_agent_is_not_found() {
        let (_dir, db) = test_db();
        let err = db
            .update_agent("no-such-id", AgentUpdate::default())
            .unwrap_err();
        assert!(matches!(err, StoreError::AgentNotFound));
    }

    #[test]
    fn deleting_referenced_agent_keeps_lead_snapshot() {
        let (_dir, db) = test_db();
        let agent = db.create_agent(agent_input("ava@asapjet.test", true)).unwrap();
        let lead = db.save_lead(lead_input()).unwrap();

        db.delete_agent(&agent.id).unwrap();
        assert!(db.get_agent(&agent.id).unwrap().is_none());

        let all = db.all_leads();
        assert_eq!(all[0].id, lead.id);
        assert_eq!(all[0].assigned_agent_id.as_deref(), Some(agent.id.as_str()));
        assert_eq!(all[0].assigned_agent_name.as_deref(), Some("Ava Ops"));
    }

    #[test]
    fn delete_missing_agent_is_a_no_op() {
        let (_dir, db) = test_db();
        db.delete_agent("no-such-id").unwrap();
    }

    #[test]
    fn merge_patch_only_touches_provided_fields() {
        let (_dir, db) = test_db();
        let a = db.create_agent(agent_input("a@asapjet.test", false)).unwrap();
        let updated = db
            .update_agent(
                &a.id,
                AgentUpdate {
                    phone: Some("+15559998888".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.phone, "+15559998888");
        assert_eq!(updated.name, a.name);
        assert_eq!(updated.email, a.email);
        assert!(!updated.on_call);
    }

    #[test]
    fn lead_urgency_round_trips_through_storage() {
        let (_dir, db) = test_db();
        let mut input = lead_input();
        input.urgency = Urgency::Critical;
        db.save_lead(input).unwrap();
        assert_eq!(db.all_leads()[0].urgency, Urgency::Critical);
    }
}

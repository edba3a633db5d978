//! SQLite-backed ticket store implementation.

use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction};

use super::interval::{format_interval, parse_interval};
use super::types::{Modification, Observation, ParseEnumError, PriorityLevel, Ticket};
use super::store::TicketMutation;
use super::{TicketError, TicketFilter, TicketStore};

const TICKET_COLUMNS: &str = "id, title, description, category, subcategory, urgency, severity, \
     status, opened_by, assignee, contact, merchant, external_id, tax_id, platform, \
     opened_at, started_at, finished_at, total_duration, execution_duration, revision";

/// SQLite-backed ticket store.
pub struct SqliteTicketStore {
    conn: Mutex<Connection>,
}

impl SqliteTicketStore {
    /// Create a new SQLite ticket store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, TicketError> {
        let conn = Connection::open(path)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite ticket store (useful for testing).
    pub fn in_memory() -> Result<Self, TicketError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), TicketError> {
        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS tickets (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                category TEXT NOT NULL,
                subcategory TEXT,
                urgency INTEGER NOT NULL,
                severity INTEGER NOT NULL,
                status TEXT NOT NULL,
                opened_by TEXT NOT NULL,
                assignee TEXT,
                contact TEXT,
                merchant TEXT,
                external_id TEXT,
                tax_id TEXT,
                platform TEXT,
                opened_at TEXT NOT NULL,
                started_at TEXT,
                finished_at TEXT,
                total_duration TEXT,
                execution_duration TEXT,
                revision INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_tickets_status ON tickets(status);
            CREATE INDEX IF NOT EXISTS idx_tickets_category ON tickets(category);
            CREATE INDEX IF NOT EXISTS idx_tickets_assignee ON tickets(assignee);
            CREATE INDEX IF NOT EXISTS idx_tickets_opened_by ON tickets(opened_by);
            CREATE INDEX IF NOT EXISTS idx_tickets_opened_at ON tickets(opened_at);

            CREATE TABLE IF NOT EXISTS observations (
                id TEXT PRIMARY KEY,
                ticket_id TEXT NOT NULL REFERENCES tickets(id) ON DELETE CASCADE,
                author TEXT NOT NULL,
                text TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_observations_ticket ON observations(ticket_id);

            CREATE TABLE IF NOT EXISTS modifications (
                id TEXT PRIMARY KEY,
                ticket_id TEXT NOT NULL REFERENCES tickets(id) ON DELETE CASCADE,
                user_id TEXT NOT NULL,
                field TEXT NOT NULL,
                old_value TEXT NOT NULL,
                new_value TEXT NOT NULL,
                modified_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_modifications_ticket ON modifications(ticket_id);
            "#,
        )?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, TicketError> {
        self.conn
            .lock()
            .map_err(|_| TicketError::Database("connection lock poisoned".to_string()))
    }

    fn build_where_clause(filter: &TicketFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions: Vec<String> = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if !filter.statuses.is_empty() {
            conditions.push(format!("status IN ({})", placeholders(filter.statuses.len())));
            for status in &filter.statuses {
                params.push(Box::new(status.as_str()));
            }
        }

        if !filter.categories.is_empty() {
            conditions.push(format!(
                "category IN ({})",
                placeholders(filter.categories.len())
            ));
            for category in &filter.categories {
                params.push(Box::new(category.as_str()));
            }
        }

        if let Some(ref assignee) = filter.assignee {
            conditions.push("assignee = ?".to_string());
            params.push(Box::new(assignee.clone()));
        }

        if let Some(ref opened_by) = filter.opened_by {
            conditions.push("opened_by = ?".to_string());
            params.push(Box::new(opened_by.clone()));
        }

        if let Some(from) = filter.opened_from {
            conditions.push("opened_at >= ?".to_string());
            params.push(Box::new(encode_time(from)));
        }

        if let Some(to) = filter.opened_to {
            conditions.push("opened_at <= ?".to_string());
            params.push(Box::new(encode_time(to)));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }

    fn insert_history(tx: &Transaction<'_>, ticket: &Ticket) -> Result<(), TicketError> {
        let mut obs_stmt = tx.prepare_cached(
            "INSERT OR IGNORE INTO observations (id, ticket_id, author, text, created_at) VALUES (?, ?, ?, ?, ?)",
        )?;
        for obs in &ticket.observations {
            obs_stmt.execute(params![
                obs.id,
                ticket.id,
                obs.author,
                obs.text,
                encode_time(obs.created_at),
            ])?;
        }

        let mut mod_stmt = tx.prepare_cached(
            "INSERT OR IGNORE INTO modifications (id, ticket_id, user_id, field, old_value, new_value, modified_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )?;
        for m in &ticket.modifications {
            mod_stmt.execute(params![
                m.id,
                ticket.id,
                m.user_id,
                m.field,
                m.old_value,
                m.new_value,
                encode_time(m.modified_at),
            ])?;
        }
        Ok(())
    }

    fn load_history(conn: &Connection, ticket: &mut Ticket) -> Result<(), TicketError> {
        let mut stmt = conn.prepare_cached(
            "SELECT id, author, text, created_at FROM observations WHERE ticket_id = ? ORDER BY rowid",
        )?;
        let rows = stmt.query_map(params![ticket.id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;
        for row in rows {
            let (id, author, text, created_at) = row?;
            ticket.observations.push(Observation {
                id,
                ticket_id: ticket.id.clone(),
                author,
                text,
                created_at: decode_time("observations.created_at", &created_at)?,
            });
        }

        let mut stmt = conn.prepare_cached(
            "SELECT id, user_id, field, old_value, new_value, modified_at FROM modifications WHERE ticket_id = ? ORDER BY rowid",
        )?;
        let rows = stmt.query_map(params![ticket.id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;
        for row in rows {
            let (id, user_id, field, old_value, new_value, modified_at) = row?;
            ticket.modifications.push(Modification {
                id,
                ticket_id: ticket.id.clone(),
                user_id,
                field,
                old_value,
                new_value,
                modified_at: decode_time("modifications.modified_at", &modified_at)?,
            });
        }
        Ok(())
    }

    fn load(conn: &Connection, id: &str) -> Result<Ticket, TicketError> {
        let row = conn
            .query_row(
                &format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE id = ?"),
                params![id],
                TicketRow::from_row,
            )
            .optional()?
            .ok_or_else(|| TicketError::NotFound(id.to_string()))?;

        let mut ticket = row.into_ticket()?;
        Self::load_history(conn, &mut ticket)?;
        Ok(ticket)
    }

    /// Writes `ticket` over the stored row if the row is still at
    /// `ticket.revision`. The caller bumps the in-memory revision after commit.
    fn save(tx: &Transaction<'_>, ticket: &Ticket) -> Result<(), TicketError> {
        let changed = tx.execute(
            "UPDATE tickets SET title = ?, description = ?, category = ?, subcategory = ?, \
             urgency = ?, severity = ?, status = ?, assignee = ?, contact = ?, merchant = ?, \
             external_id = ?, tax_id = ?, platform = ?, started_at = ?, finished_at = ?, \
             total_duration = ?, execution_duration = ?, revision = revision + 1 \
             WHERE id = ? AND revision = ?",
            params![
                ticket.title,
                ticket.description,
                ticket.category.as_str(),
                ticket.subcategory.map(|s| s.as_str()),
                i64::from(ticket.urgency.get()),
                i64::from(ticket.severity.get()),
                ticket.status.as_str(),
                ticket.assignee,
                ticket.contact,
                ticket.merchant,
                ticket.external_id,
                ticket.tax_id,
                ticket.platform,
                ticket.started_at.map(encode_time),
                ticket.finished_at.map(encode_time),
                ticket.total_duration.map(format_interval),
                ticket.execution_duration.map(format_interval),
                ticket.id,
                ticket.revision,
            ],
        )?;

        if changed == 0 {
            let exists = tx
                .query_row("SELECT 1 FROM tickets WHERE id = ?", params![ticket.id], |_| {
                    Ok(())
                })
                .optional()?
                .is_some();
            return Err(if exists {
                TicketError::Conflict(ticket.id.clone())
            } else {
                TicketError::NotFound(ticket.id.clone())
            });
        }

        Self::insert_history(tx, ticket)
    }
}

impl TicketStore for SqliteTicketStore {
    fn create(&self, ticket: &Ticket) -> Result<(), TicketError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        tx.execute(
            &format!(
                "INSERT INTO tickets ({TICKET_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
            ),
            params![
                ticket.id,
                ticket.title,
                ticket.description,
                ticket.category.as_str(),
                ticket.subcategory.map(|s| s.as_str()),
                i64::from(ticket.urgency.get()),
                i64::from(ticket.severity.get()),
                ticket.status.as_str(),
                ticket.opened_by,
                ticket.assignee,
                ticket.contact,
                ticket.merchant,
                ticket.external_id,
                ticket.tax_id,
                ticket.platform,
                encode_time(ticket.opened_at),
                ticket.started_at.map(encode_time),
                ticket.finished_at.map(encode_time),
                ticket.total_duration.map(format_interval),
                ticket.execution_duration.map(format_interval),
                ticket.revision,
            ],
        )?;
        Self::insert_history(&tx, ticket)?;

        tx.commit()?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Ticket, TicketError> {
        let conn = self.lock()?;
        Self::load(&conn, id)
    }

    fn list(&self, filter: &TicketFilter) -> Result<Vec<Ticket>, TicketError> {
        let conn = self.lock()?;

        let (where_clause, mut params) = Self::build_where_clause(filter);
        let mut sql = format!(
            "SELECT {TICKET_COLUMNS} FROM tickets {where_clause} ORDER BY opened_at DESC, rowid DESC"
        );
        if filter.limit.is_some() || filter.offset > 0 {
            // SQLite reads a negative LIMIT as unbounded.
            let limit = filter.limit.map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX));
            sql.push_str(" LIMIT ? OFFSET ?");
            params.push(Box::new(limit));
            params.push(Box::new(i64::try_from(filter.offset).unwrap_or(i64::MAX)));
        }
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(param_refs.as_slice(), TicketRow::from_row)?;

        let mut tickets = Vec::new();
        for row in rows {
            let mut ticket = row?.into_ticket()?;
            Self::load_history(&conn, &mut ticket)?;
            tickets.push(ticket);
        }

        Ok(tickets)
    }

    fn count(&self, filter: &TicketFilter) -> Result<i64, TicketError> {
        let conn = self.lock()?;

        let (where_clause, params) = Self::build_where_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM tickets {where_clause}");
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let count: i64 = conn.query_row(&sql, param_refs.as_slice(), |row| row.get(0))?;
        Ok(count)
    }

    fn update(&self, ticket: &mut Ticket) -> Result<(), TicketError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        Self::save(&tx, ticket)?;
        tx.commit()?;
        ticket.revision += 1;
        Ok(())
    }

    fn modify(&self, id: &str, mutate: TicketMutation<'_>) -> Result<Ticket, TicketError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let mut ticket = Self::load(&tx, id)?;
        mutate(&mut ticket)?;
        Self::save(&tx, &ticket)?;

        tx.commit()?;
        ticket.revision += 1;
        Ok(ticket)
    }

    fn delete(&self, id: &str) -> Result<(), TicketError> {
        let conn = self.lock()?;

        let deleted = conn.execute("DELETE FROM tickets WHERE id = ?", params![id])?;
        if deleted == 0 {
            return Err(TicketError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

/// Raw `tickets` row, decoded into a [`Ticket`] outside the rusqlite callback
/// so decode failures keep their own error variant.
struct TicketRow {
    id: String,
    title: String,
    description: String,
    category: String,
    subcategory: Option<String>,
    urgency: i64,
    severity: i64,
    status: String,
    opened_by: String,
    assignee: Option<String>,
    contact: Option<String>,
    merchant: Option<String>,
    external_id: Option<String>,
    tax_id: Option<String>,
    platform: Option<String>,
    opened_at: String,
    started_at: Option<String>,
    finished_at: Option<String>,
    total_duration: Option<String>,
    execution_duration: Option<String>,
    revision: i64,
}

impl TicketRow {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            category: row.get(3)?,
            subcategory: row.get(4)?,
            urgency: row.get(5)?,
            severity: row.get(6)?,
            status: row.get(7)?,
            opened_by: row.get(8)?,
            assignee: row.get(9)?,
            contact: row.get(10)?,
            merchant: row.get(11)?,
            external_id: row.get(12)?,
            tax_id: row.get(13)?,
            platform: row.get(14)?,
            opened_at: row.get(15)?,
            started_at: row.get(16)?,
            finished_at: row.get(17)?,
            total_duration: row.get(18)?,
            execution_duration: row.get(19)?,
            revision: row.get(20)?,
        })
    }

    fn into_ticket(self) -> Result<Ticket, TicketError> {
        Ok(Ticket {
            category: decode_enum(&self.category)?,
            subcategory: self.subcategory.as_deref().map(decode_enum).transpose()?,
            urgency: decode_level("urgency", self.urgency)?,
            severity: decode_level("severity", self.severity)?,
            status: decode_enum(&self.status)?,
            opened_at: decode_time("opened_at", &self.opened_at)?,
            started_at: decode_optional_time("started_at", self.started_at)?,
            finished_at: decode_optional_time("finished_at", self.finished_at)?,
            total_duration: decode_duration(self.total_duration)?,
            execution_duration: decode_duration(self.execution_duration)?,
            id: self.id,
            title: self.title,
            description: self.description,
            opened_by: self.opened_by,
            assignee: self.assignee,
            contact: self.contact,
            merchant: self.merchant,
            external_id: self.external_id,
            tax_id: self.tax_id,
            platform: self.platform,
            observations: Vec::new(),
            modifications: Vec::new(),
            revision: self.revision,
        })
    }
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// Fixed-width RFC 3339 so stored timestamps sort lexicographically.
fn encode_time(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn decode_time(column: &str, text: &str) -> Result<DateTime<Utc>, TicketError> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| TicketError::Decode(format!("{column} '{text}': {e}")))
}

fn decode_optional_time(
    column: &str,
    text: Option<String>,
) -> Result<Option<DateTime<Utc>>, TicketError> {
    text.map(|t| decode_time(column, &t)).transpose()
}

fn decode_duration(text: Option<String>) -> Result<Option<TimeDelta>, TicketError> {
    text.map(|t| parse_interval(&t).map_err(|e| TicketError::Decode(e.to_string())))
        .transpose()
}

fn decode_enum<T: FromStr<Err = ParseEnumError>>(text: &str) -> Result<T, TicketError> {
    text.parse()
        .map_err(|e: ParseEnumError| TicketError::Decode(e.to_string()))
}

fn decode_level(column: &str, value: i64) -> Result<PriorityLevel, TicketError> {
    PriorityLevel::try_from(value).map_err(|e| TicketError::Decode(format!("{column}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ticket::types::{AdditionalInfo, Category, NewTicket, Subcategory, TicketStatus};
    use chrono::TimeZone;

    fn create_test_store() -> SqliteTicketStore {
        SqliteTicketStore::in_memory().unwrap()
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, hour, 0, 0).unwrap()
    }

    fn create_test_ticket(opened_at: DateTime<Utc>) -> Ticket {
        Ticket::create_at(
            NewTicket {
                title: "Card declined".to_string(),
                description: "Customer card declined at checkout".to_string(),
                category: Some(Category::Commercial),
                subcategory: Some(Subcategory::Bug),
                opened_by: "user-1".to_string(),
                urgency: Some(3),
                severity: None,
            },
            opened_at,
        )
        .unwrap()
    }

    fn table_count(store: &SqliteTicketStore, table: &str) -> i64 {
        let conn = store.conn.lock().unwrap();
        conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_create_and_get_ticket() {
        let store = create_test_store();
        let mut ticket = create_test_ticket(at(8));
        ticket
            .set_additional_info(AdditionalInfo::from_raw("ACME", "NX-9", "123.456", "ios", "ops@acme"))
            .unwrap();
        ticket.add_observation_at("first note", "user-1", at(8)).unwrap();

        store.create(&ticket).unwrap();
        let fetched = store.get(ticket.id()).unwrap();

        assert_eq!(fetched, ticket);
    }

    #[test]
    fn test_get_missing_ticket() {
        let store = create_test_store();
        let result = store.get("nonexistent");
        assert!(matches!(result, Err(TicketError::NotFound(id)) if id == "nonexistent"));
    }

    #[test]
    fn test_update_appends_history_in_order() {
        let store = create_test_store();
        let mut ticket = create_test_ticket(at(8));
        store.create(&ticket).unwrap();

        ticket.set_title_at("Card declined twice", "user-2", at(9)).unwrap();
        ticket.start_work_at("agent", at(10)).unwrap();
        ticket.add_observation_at("looking into it", "agent", at(10)).unwrap();
        store.update(&mut ticket).unwrap();

        ticket.finish_at("agent", at(12)).unwrap();
        ticket.add_observation_at("done", "agent", at(12)).unwrap();
        store.update(&mut ticket).unwrap();

        let fetched = store.get(ticket.id()).unwrap();
        assert_eq!(fetched, ticket);
        assert_eq!(fetched.status(), TicketStatus::Finished);
        assert_eq!(fetched.total_duration(), Some(TimeDelta::hours(4)));
        assert_eq!(fetched.execution_duration(), Some(TimeDelta::hours(2)));
        let fields: Vec<&str> = fetched.modifications().iter().map(|m| m.field()).collect();
        assert_eq!(fields, vec!["titulo", "status", "status"]);
        assert_eq!(table_count(&store, "modifications"), 3);
        assert_eq!(table_count(&store, "observations"), 2);
    }

    #[test]
    fn test_update_missing_ticket() {
        let store = create_test_store();
        let mut ticket = create_test_ticket(at(8));
        let result = store.update(&mut ticket);
        assert!(matches!(result, Err(TicketError::NotFound(_))));
    }

    #[test]
    fn test_update_bumps_revision() {
        let store = create_test_store();
        let mut ticket = create_test_ticket(at(8));
        store.create(&ticket).unwrap();
        assert_eq!(ticket.revision(), 0);

        ticket.set_urgency_at(4, "u", at(9)).unwrap();
        store.update(&mut ticket).unwrap();
        assert_eq!(ticket.revision(), 1);
        assert_eq!(store.get(ticket.id()).unwrap().revision(), 1);
    }

    #[test]
    fn test_update_stale_copy_conflicts() {
        let store = create_test_store();
        let ticket = create_test_ticket(at(8));
        store.create(&ticket).unwrap();

        let mut first = store.get(ticket.id()).unwrap();
        let mut second = store.get(ticket.id()).unwrap();

        first.start_work_at("agent", at(9)).unwrap();
        store.update(&mut first).unwrap();

        second.cancel_at("other", at(10)).unwrap();
        let result = store.update(&mut second);
        assert!(matches!(result, Err(TicketError::Conflict(id)) if id == ticket.id()));

        let stored = store.get(ticket.id()).unwrap();
        assert_eq!(stored, first);
        assert_eq!(table_count(&store, "modifications"), 1);
    }

    #[test]
    fn test_modify_saves_changes() {
        let store = create_test_store();
        let ticket = create_test_ticket(at(8));
        store.create(&ticket).unwrap();

        let saved = store
            .modify(ticket.id(), &mut |t: &mut Ticket| {
                t.start_work_at("agent", at(9))?;
                t.add_observation_at("on it", "agent", at(9))?;
                Ok(())
            })
            .unwrap();

        assert_eq!(saved.status(), TicketStatus::InProgress);
        assert_eq!(saved.revision(), 1);
        assert_eq!(store.get(ticket.id()).unwrap(), saved);
    }

    #[test]
    fn test_modify_error_rolls_back() {
        let store = create_test_store();
        let ticket = create_test_ticket(at(8));
        store.create(&ticket).unwrap();

        let result = store.modify(ticket.id(), &mut |t: &mut Ticket| {
            t.set_title_at("Renamed", "u", at(9))?;
            t.finish_at("u", at(9))?;
            Ok(())
        });

        assert!(matches!(result, Err(TicketError::Lifecycle(_))));
        assert_eq!(store.get(ticket.id()).unwrap(), ticket);
        assert_eq!(table_count(&store, "modifications"), 0);
    }

    #[test]
    fn test_modify_missing_ticket() {
        let store = create_test_store();
        let mut called = false;
        let result = store.modify("nope", &mut |_: &mut Ticket| {
            called = true;
            Ok(())
        });
        assert!(matches!(result, Err(TicketError::NotFound(_))));
        assert!(!called);
    }

    #[test]
    fn test_delete_cascades_history() {
        let store = create_test_store();
        let mut ticket = create_test_ticket(at(8));
        ticket.set_urgency_at(5, "u", at(8)).unwrap();
        ticket.add_observation_at("note", "u", at(8)).unwrap();
        store.create(&ticket).unwrap();
        assert_eq!(table_count(&store, "modifications"), 1);

        store.delete(ticket.id()).unwrap();

        assert!(matches!(store.get(ticket.id()), Err(TicketError::NotFound(_))));
        assert_eq!(table_count(&store, "observations"), 0);
        assert_eq!(table_count(&store, "modifications"), 0);
    }

    #[test]
    fn test_delete_missing_ticket() {
        let store = create_test_store();
        assert!(matches!(store.delete("nope"), Err(TicketError::NotFound(_))));
    }

    #[test]
    fn test_list_newest_first() {
        let store = create_test_store();
        let older = create_test_ticket(at(6));
        let newer = create_test_ticket(at(9));
        store.create(&older).unwrap();
        store.create(&newer).unwrap();

        let ids: Vec<String> = store
            .list(&TicketFilter::new())
            .unwrap()
            .iter()
            .map(|t| t.id().to_string())
            .collect();
        assert_eq!(ids, vec![newer.id().to_string(), older.id().to_string()]);
    }

    #[test]
    fn test_list_limit_and_offset() {
        let store = create_test_store();
        let tickets: Vec<Ticket> = (6..11).map(|h| create_test_ticket(at(h))).collect();
        for t in &tickets {
            store.create(t).unwrap();
        }

        let ids = |filter: TicketFilter| -> Vec<String> {
            store
                .list(&filter)
                .unwrap()
                .iter()
                .map(|t| t.id().to_string())
                .collect()
        };

        let page = ids(TicketFilter::new().with_limit(2).with_offset(1));
        assert_eq!(page, vec![tickets[3].id().to_string(), tickets[2].id().to_string()]);

        let tail = ids(TicketFilter::new().with_offset(3));
        assert_eq!(tail, vec![tickets[1].id().to_string(), tickets[0].id().to_string()]);

        assert!(ids(TicketFilter::new().with_limit(2).with_offset(10)).is_empty());

        let filter = TicketFilter::new().with_limit(1).with_offset(4);
        assert_eq!(store.count(&filter).unwrap(), 5);
    }

    #[test]
    fn test_list_and_count_with_filters() {
        let store = create_test_store();

        let open = create_test_ticket(at(6));
        let mut working = create_test_ticket(at(7));
        working.start_work_at("agent-a", at(7)).unwrap();
        let mut cancelled = create_test_ticket(at(8));
        cancelled.set_category_at(Category::It, "u", at(8)).unwrap();
        cancelled.cancel_at("u", at(8)).unwrap();
        for t in [&open, &working, &cancelled] {
            store.create(t).unwrap();
        }

        let filter = TicketFilter::new()
            .with_status(TicketStatus::Open)
            .with_status(TicketStatus::InProgress);
        assert_eq!(store.list(&filter).unwrap().len(), 2);
        assert_eq!(store.count(&filter).unwrap(), 2);

        let filter = TicketFilter::new().with_category(Category::It);
        let listed = store.list(&filter).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id(), cancelled.id());

        let filter = TicketFilter::new().with_assignee("agent-a");
        assert_eq!(store.count(&filter).unwrap(), 1);

        let filter = TicketFilter::new().with_opened_by("someone-else");
        assert_eq!(store.count(&filter).unwrap(), 0);

        let filter = TicketFilter::new().opened_between(Some(at(7)), Some(at(8)));
        assert_eq!(store.count(&filter).unwrap(), 2);

        let filter = TicketFilter::new().opened_between(None, Some(at(6)));
        assert_eq!(store.count(&filter).unwrap(), 1);

        assert_eq!(store.count(&TicketFilter::new()).unwrap(), 3);
    }

    #[test]
    fn test_corrupt_row_surfaces_decode_error() {
        let store = create_test_store();
        let ticket = create_test_ticket(at(8));
        store.create(&ticket).unwrap();
        {
            let conn = store.conn.lock().unwrap();
            conn.execute("UPDATE tickets SET status = 'reaberto'", []).unwrap();
        }

        assert!(matches!(store.get(ticket.id()), Err(TicketError::Decode(_))));
        assert!(matches!(store.list(&TicketFilter::new()), Err(TicketError::Decode(_))));
    }

    #[test]
    fn test_out_of_range_level_in_row_is_decode_error() {
        let store = create_test_store();
        let ticket = create_test_ticket(at(8));
        store.create(&ticket).unwrap();
        {
            let conn = store.conn.lock().unwrap();
            conn.execute("UPDATE tickets SET urgency = 9", []).unwrap();
        }

        assert!(matches!(store.get(ticket.id()), Err(TicketError::Decode(_))));
    }

    #[test]
    fn test_create_duplicate_id_fails() {
        let store = create_test_store();
        let ticket = create_test_ticket(at(8));
        store.create(&ticket).unwrap();
        assert!(matches!(store.create(&ticket), Err(TicketError::Database(_))));
    }

    #[test]
    fn test_file_backed_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tickets.db");
        let ticket = create_test_ticket(at(8));

        {
            let store = SqliteTicketStore::new(&path).unwrap();
            store.create(&ticket).unwrap();
        }

        let store = SqliteTicketStore::new(&path).unwrap();
        assert_eq!(store.get(ticket.id()).unwrap(), ticket);
    }
}

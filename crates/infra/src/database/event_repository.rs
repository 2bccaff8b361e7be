//! SQLite implementation of the event repository port.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use hearth_core::EventRepository;
use hearth_domain::{
    CalendarEvent, EventChangeSet, EventContent, EventKey, EventTiming, Result, SourceId,
};
use rusqlite::{params, Row, Transaction};
use tokio::task;
use tracing::{debug, instrument};

use super::manager::DbManager;
use super::{bool_to_int, from_micros, map_join_error, map_sql_error, to_micros};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// SQLite-backed implementation of [`EventRepository`].
pub struct SqliteEventRepository {
    db: Arc<DbManager>,
}

impl SqliteEventRepository {
    /// Repository over the shared connection pool.
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl EventRepository for SqliteEventRepository {
    async fn events_for_source(&self, source_id: SourceId) -> Result<Vec<CalendarEvent>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> Result<Vec<CalendarEvent>> {
            let conn = db.get_connection()?;
            let mut stmt = conn
                .prepare(
                    "SELECT source_id, uid, recurrence_id, title, all_day, start_value, end_value,
                            location, content_hash, first_seen_at, updated_at
                     FROM calendar_events
                     WHERE source_id = ?1
                     ORDER BY uid ASC, recurrence_id ASC",
                )
                .map_err(map_sql_error)?;
            let rows = stmt
                .query_map(params![source_id.to_string()], map_event_row)
                .map_err(map_sql_error)?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    #[instrument(skip(self, changes), fields(
        created = changes.to_create.len(),
        updated = changes.to_update.len(),
        deleted = changes.to_delete.len(),
    ))]
    async fn apply_changes(&self, source_id: SourceId, changes: &EventChangeSet) -> Result<()> {
        if changes.is_empty() {
            return Ok(());
        }

        let db = Arc::clone(&self.db);
        let changes = changes.clone();

        task::spawn_blocking(move || -> Result<()> {
            let mut conn = db.get_connection()?;
            let tx = conn.transaction().map_err(map_sql_error)?;
            let source_text = source_id.to_string();

            for key in &changes.to_delete {
                tx.execute(
                    "DELETE FROM calendar_events
                     WHERE source_id = ?1 AND uid = ?2 AND recurrence_id = ?3",
                    params![source_text, key.uid, recurrence_column(key)],
                )
                .map_err(map_sql_error)?;
            }

            for event in &changes.to_create {
                insert_event(&tx, &source_text, event)?;
            }

            for event in &changes.to_update {
                update_event(&tx, &source_text, event)?;
            }

            tx.commit().map_err(map_sql_error)?;
            debug!(source_id = %source_id, "event changes committed");
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }
}

// =============================================================================
// Row mapping
// =============================================================================

fn recurrence_column(key: &EventKey) -> &str {
    key.recurrence_id.as_deref().unwrap_or("")
}

fn timing_columns(timing: &EventTiming) -> (bool, String, String) {
    match timing {
        EventTiming::Timed { start, end } => (
            false,
            start.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            end.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        ),
        EventTiming::AllDay { start, end } => (
            true,
            start.format(DATE_FORMAT).to_string(),
            end.format(DATE_FORMAT).to_string(),
        ),
    }
}

fn insert_event(tx: &Transaction<'_>, source_id: &str, event: &CalendarEvent) -> Result<()> {
    let (all_day, start_value, end_value) = timing_columns(&event.content.timing);
    tx.execute(
        "INSERT INTO calendar_events (
            source_id, uid, recurrence_id, title, all_day, start_value, end_value, location,
            content_hash, first_seen_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            source_id,
            event.key.uid,
            recurrence_column(&event.key),
            event.content.title,
            bool_to_int(all_day),
            start_value,
            end_value,
            event.content.location,
            event.content_hash,
            to_micros(event.first_seen_at),
            to_micros(event.updated_at),
        ],
    )
    .map_err(map_sql_error)?;
    Ok(())
}

fn update_event(tx: &Transaction<'_>, source_id: &str, event: &CalendarEvent) -> Result<()> {
    let (all_day, start_value, end_value) = timing_columns(&event.content.timing);
    tx.execute(
        "UPDATE calendar_events
         SET title = ?4, all_day = ?5, start_value = ?6, end_value = ?7, location = ?8,
             content_hash = ?9, updated_at = ?10
         WHERE source_id = ?1 AND uid = ?2 AND recurrence_id = ?3",
        params![
            source_id,
            event.key.uid,
            recurrence_column(&event.key),
            event.content.title,
            bool_to_int(all_day),
            start_value,
            end_value,
            event.content.location,
            event.content_hash,
            to_micros(event.updated_at),
        ],
    )
    .map_err(map_sql_error)?;
    Ok(())
}

fn map_event_row(row: &Row<'_>) -> rusqlite::Result<CalendarEvent> {
    let source_text: String = row.get(0)?;
    let source_id: SourceId =
        source_text.parse().map_err(|err| conversion_error(0, format!("{err}")))?;
    let recurrence: String = row.get(2)?;
    let all_day = row.get::<_, i64>(4)? != 0;
    let start_value: String = row.get(5)?;
    let end_value: String = row.get(6)?;

    let timing = if all_day {
        EventTiming::AllDay { start: parse_date(5, &start_value)?, end: parse_date(6, &end_value)? }
    } else {
        EventTiming::Timed {
            start: parse_instant(5, &start_value)?,
            end: parse_instant(6, &end_value)?,
        }
    };

    Ok(CalendarEvent {
        source_id,
        key: EventKey::new(
            row.get::<_, String>(1)?,
            if recurrence.is_empty() { None } else { Some(recurrence) },
        ),
        content: EventContent { title: row.get(3)?, timing, location: row.get(7)? },
        content_hash: row.get(8)?,
        first_seen_at: from_micros(row.get(9)?)?,
        updated_at: from_micros(row.get(10)?)?,
    })
}

fn parse_date(column: usize, value: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|err| conversion_error(column, format!("invalid date {value}: {err}")))
}

fn parse_instant(column: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| conversion_error(column, format!("invalid timestamp {value}: {err}")))
}

fn conversion_error(column: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, message.into())
}

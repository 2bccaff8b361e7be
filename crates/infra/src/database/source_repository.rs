//! SQLite implementation of the source repository port.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hearth_core::{CredentialUpdate, OutcomeUpdate, SourceRepository};
use hearth_domain::{
    CalendarSource, FeedCredential, FeedValidators, HearthError, ProviderKind, RegisteredSource,
    Result, SourceId,
};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tokio::task;
use tracing::instrument;

use super::manager::DbManager;
use super::{bool_to_int, from_micros, map_join_error, map_sql_error, to_micros};

const SELECT_SOURCE: &str = "SELECT s.id, s.owner_id, s.child_id, s.provider, s.display_name,
        s.active, s.last_synced_at, s.created_at,
        c.encrypted_url, c.url_hash, c.masked_url, c.oauth_account, c.etag,
        c.last_modified, c.refresh_interval_minutes, c.next_run_at, c.consecutive_failures
     FROM calendar_sources s
     JOIN feed_credentials c ON c.source_id = s.id";

/// SQLite-backed implementation of [`SourceRepository`].
pub struct SqliteSourceRepository {
    db: Arc<DbManager>,
}

impl SqliteSourceRepository {
    /// Repository over the shared connection pool.
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SourceRepository for SqliteSourceRepository {
    #[instrument(skip(self, source), fields(source_id = %source.id()))]
    async fn insert_source(&self, source: &RegisteredSource) -> Result<()> {
        let db = Arc::clone(&self.db);
        let source = source.clone();

        task::spawn_blocking(move || -> Result<()> {
            let mut conn = db.get_connection()?;
            let tx = conn.transaction().map_err(map_sql_error)?;
            insert_registered_source(&tx, &source)?;
            tx.commit().map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn find_active_by_hash(
        &self,
        child_id: &str,
        url_hash: &str,
    ) -> Result<Option<RegisteredSource>> {
        let db = Arc::clone(&self.db);
        let child_id = child_id.to_string();
        let url_hash = url_hash.to_string();

        task::spawn_blocking(move || -> Result<Option<RegisteredSource>> {
            let conn = db.get_connection()?;
            conn.query_row(
                &format!("{SELECT_SOURCE} WHERE c.child_id = ?1 AND c.url_hash = ?2 AND c.active = 1"),
                params![child_id, url_hash],
                map_registered_source_row,
            )
            .optional()
            .map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn get_source(&self, id: SourceId) -> Result<Option<RegisteredSource>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> Result<Option<RegisteredSource>> {
            let conn = db.get_connection()?;
            conn.query_row(
                &format!("{SELECT_SOURCE} WHERE s.id = ?1"),
                params![id.to_string()],
                map_registered_source_row,
            )
            .optional()
            .map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn list_sources_for_owner(&self, owner_id: &str) -> Result<Vec<RegisteredSource>> {
        let db = Arc::clone(&self.db);
        let owner_id = owner_id.to_string();

        task::spawn_blocking(move || -> Result<Vec<RegisteredSource>> {
            let conn = db.get_connection()?;
            let mut stmt = conn
                .prepare(&format!(
                    "{SELECT_SOURCE} WHERE s.owner_id = ?1 ORDER BY s.created_at ASC, s.id ASC"
                ))
                .map_err(map_sql_error)?;
            let rows = stmt
                .query_map(params![owner_id], map_registered_source_row)
                .map_err(map_sql_error)?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    #[instrument(skip(self))]
    async fn due_sources(&self, now: DateTime<Utc>) -> Result<Vec<RegisteredSource>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> Result<Vec<RegisteredSource>> {
            let conn = db.get_connection()?;
            let mut stmt = conn
                .prepare(&format!(
                    "{SELECT_SOURCE} WHERE c.active = 1 AND c.next_run_at <= ?1
                     ORDER BY c.next_run_at ASC, s.id ASC"
                ))
                .map_err(map_sql_error)?;
            let rows = stmt
                .query_map(params![to_micros(now)], map_registered_source_row)
                .map_err(map_sql_error)?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    #[instrument(skip(self))]
    async fn set_active(&self, id: SourceId, active: bool) -> Result<()> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> Result<()> {
            let mut conn = db.get_connection()?;
            let tx = conn.transaction().map_err(map_sql_error)?;
            let changed = tx
                .execute(
                    "UPDATE calendar_sources SET active = ?2 WHERE id = ?1",
                    params![id.to_string(), bool_to_int(active)],
                )
                .map_err(map_sql_error)?;
            if changed == 0 {
                return Err(HearthError::NotFound(format!("source {id}")));
            }
            tx.execute(
                "UPDATE feed_credentials SET active = ?2 WHERE source_id = ?1",
                params![id.to_string(), bool_to_int(active)],
            )
            .map_err(map_sql_error)?;
            tx.commit().map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    #[instrument(skip(self, update))]
    async fn update_credential(&self, id: SourceId, update: &CredentialUpdate) -> Result<()> {
        let db = Arc::clone(&self.db);
        let update = update.clone();

        task::spawn_blocking(move || -> Result<()> {
            let conn = db.get_connection()?;
            let changed = conn
                .execute(
                    "UPDATE feed_credentials
                     SET encrypted_url = ?2, url_hash = ?3, masked_url = ?4, oauth_account = ?5,
                         etag = NULL, last_modified = NULL, consecutive_failures = 0,
                         next_run_at = ?6
                     WHERE source_id = ?1",
                    params![
                        id.to_string(),
                        update.encrypted_url,
                        update.url_hash,
                        update.masked_url,
                        update.oauth_account,
                        to_micros(update.next_run_at),
                    ],
                )
                .map_err(map_sql_error)?;
            if changed == 0 {
                return Err(HearthError::NotFound(format!("source {id}")));
            }
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    #[instrument(skip(self, update))]
    async fn record_outcome(&self, id: SourceId, update: &OutcomeUpdate) -> Result<()> {
        let db = Arc::clone(&self.db);
        let update = update.clone();

        task::spawn_blocking(move || -> Result<()> {
            let mut conn = db.get_connection()?;
            let tx = conn.transaction().map_err(map_sql_error)?;
            let id_text = id.to_string();

            let changed = tx
                .execute(
                    "UPDATE calendar_sources
                     SET last_synced_at = ?2,
                         active = CASE WHEN ?3 = 1 THEN 0 ELSE active END
                     WHERE id = ?1",
                    params![
                        id_text,
                        to_micros(update.last_synced_at),
                        bool_to_int(update.deactivate)
                    ],
                )
                .map_err(map_sql_error)?;
            if changed == 0 {
                return Err(HearthError::NotFound(format!("source {id}")));
            }

            tx.execute(
                "UPDATE feed_credentials
                 SET next_run_at = ?2,
                     consecutive_failures = ?3,
                     active = CASE WHEN ?4 = 1 THEN 0 ELSE active END
                 WHERE source_id = ?1",
                params![
                    id_text,
                    to_micros(update.next_run_at),
                    i64::from(update.consecutive_failures),
                    bool_to_int(update.deactivate),
                ],
            )
            .map_err(map_sql_error)?;

            if let Some(validators) = &update.validators {
                tx.execute(
                    "UPDATE feed_credentials SET etag = ?2, last_modified = ?3 WHERE source_id = ?1",
                    params![id_text, validators.etag, validators.last_modified],
                )
                .map_err(map_sql_error)?;
            }

            tx.commit().map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn insert_registered_source(conn: &Connection, source: &RegisteredSource) -> Result<()> {
    let s = &source.source;
    let c = &source.credential;
    let id = s.id.to_string();

    conn.execute(
        "INSERT INTO calendar_sources (
            id, owner_id, child_id, provider, display_name, active, last_synced_at, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            id,
            s.owner_id,
            s.child_id,
            s.provider.as_str(),
            s.display_name,
            bool_to_int(s.active),
            s.last_synced_at.map(to_micros),
            to_micros(s.created_at),
        ],
    )
    .map_err(map_sql_error)?;

    conn.execute(
        "INSERT INTO feed_credentials (
            source_id, child_id, active, encrypted_url, url_hash, masked_url, oauth_account,
            etag, last_modified, refresh_interval_minutes, next_run_at, consecutive_failures
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            id,
            s.child_id,
            bool_to_int(s.active),
            c.encrypted_url,
            c.url_hash,
            c.masked_url,
            c.oauth_account,
            c.validators.etag,
            c.validators.last_modified,
            i64::from(c.refresh_interval_minutes),
            to_micros(c.next_run_at),
            i64::from(c.consecutive_failures),
        ],
    )
    .map_err(map_sql_error)?;

    Ok(())
}

fn map_registered_source_row(row: &Row<'_>) -> rusqlite::Result<RegisteredSource> {
    let id_text: String = row.get(0)?;
    let id: SourceId = id_text.parse().map_err(|err: HearthError| conversion_error(0, &err))?;
    let provider_text: String = row.get(3)?;
    let provider: ProviderKind =
        provider_text.parse().map_err(|err: HearthError| conversion_error(3, &err))?;

    let source = CalendarSource {
        id,
        owner_id: row.get(1)?,
        child_id: row.get(2)?,
        provider,
        display_name: row.get(4)?,
        active: row.get::<_, i64>(5)? != 0,
        last_synced_at: row.get::<_, Option<i64>>(6)?.map(from_micros).transpose()?,
        created_at: from_micros(row.get(7)?)?,
    };

    let credential = FeedCredential {
        source_id: id,
        encrypted_url: row.get(8)?,
        url_hash: row.get(9)?,
        masked_url: row.get(10)?,
        oauth_account: row.get(11)?,
        validators: FeedValidators { etag: row.get(12)?, last_modified: row.get(13)? },
        refresh_interval_minutes: row.get(14)?,
        next_run_at: from_micros(row.get(15)?)?,
        consecutive_failures: row.get(16)?,
    };

    Ok(RegisteredSource { source, credential })
}

fn conversion_error(column: usize, err: &HearthError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        column,
        rusqlite::types::Type::Text,
        err.to_string().into(),
    )
}

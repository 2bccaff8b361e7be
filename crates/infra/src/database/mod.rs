//! SQLite persistence for calendar sources and their events

pub mod event_repository;
pub mod manager;
pub mod source_repository;

pub use event_repository::*;
pub use manager::*;
pub use source_repository::*;

use chrono::{DateTime, Utc};
use hearth_domain::HearthError;
use tokio::task;

use crate::errors::InfraError;

pub(crate) fn map_sql_error(err: rusqlite::Error) -> HearthError {
    HearthError::from(InfraError::from(err))
}

pub(crate) fn map_join_error(err: task::JoinError) -> HearthError {
    HearthError::from(InfraError::from(err))
}

/// Timestamps are stored as microseconds since the Unix epoch.
pub(crate) fn to_micros(value: DateTime<Utc>) -> i64 {
    value.timestamp_micros()
}

pub(crate) fn from_micros(value: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_micros(value).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Integer,
            format!("timestamp out of range: {value}").into(),
        )
    })
}

fn bool_to_int(value: bool) -> i64 {
    i64::from(value)
}

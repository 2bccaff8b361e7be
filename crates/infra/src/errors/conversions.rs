//! Conversions from external infrastructure errors into domain errors.

use hearth_domain::HearthError;
use reqwest::Error as HttpError;
use rusqlite::Error as SqlError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub HearthError);

impl From<InfraError> for HearthError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<HearthError> for InfraError {
    fn from(value: HearthError) -> Self {
        InfraError(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoHearthError {
    fn into_hearth(self) -> HearthError;
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → HearthError */
/* -------------------------------------------------------------------------- */

/// Name of the partial unique index guarding active (child, url hash) pairs.
const ACTIVE_FEED_INDEX: &str = "idx_feed_credentials_active_hash";

impl IntoHearthError for SqlError {
    fn into_hearth(self) -> HearthError {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        match self {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match (err.code, err.extended_code) {
                    (ErrorCode::DatabaseBusy, _) => {
                        HearthError::Database("database is busy".into())
                    }
                    (ErrorCode::DatabaseLocked, _) => {
                        HearthError::Database("database is locked".into())
                    }
                    (ErrorCode::ConstraintViolation, 2067)
                        if message.contains("feed_credentials.url_hash")
                            || message.contains(ACTIVE_FEED_INDEX) =>
                    {
                        HearthError::DuplicateSource(
                            "feed is already connected to this child".into(),
                        )
                    }
                    (ErrorCode::ConstraintViolation, 2067) => {
                        HearthError::Database("unique constraint violation".into())
                    }
                    (ErrorCode::ConstraintViolation, 787) => {
                        HearthError::Database("foreign key constraint violation".into())
                    }
                    _ => HearthError::Database(format!(
                        "sqlite failure {:?} (code {}): {}",
                        err.code, err.extended_code, message
                    )),
                }
            }
            RE::QueryReturnedNoRows => HearthError::NotFound("no rows returned by query".into()),
            RE::FromSqlConversionFailure(_, _, cause) => {
                HearthError::Database(format!("failed to convert sqlite value: {cause}"))
            }
            RE::InvalidColumnType(_, _, ty) => {
                HearthError::Database(format!("invalid column type: {ty}"))
            }
            RE::Utf8Error(_) => HearthError::Database("invalid UTF-8 returned from sqlite".into()),
            RE::InvalidPath(path) => HearthError::Database(format!(
                "invalid database path: {}",
                path.to_string_lossy()
            )),
            other => HearthError::Database(other.to_string()),
        }
    }
}

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        InfraError(value.into_hearth())
    }
}

/* -------------------------------------------------------------------------- */
/* r2d2::Error → HearthError */
/* -------------------------------------------------------------------------- */

impl From<r2d2::Error> for InfraError {
    fn from(value: r2d2::Error) -> Self {
        InfraError(HearthError::Database(format!("connection pool error: {value}")))
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → HearthError */
/* -------------------------------------------------------------------------- */

impl IntoHearthError for HttpError {
    fn into_hearth(self) -> HearthError {
        if self.is_timeout() {
            return HearthError::Transport("feed request timed out".into());
        }

        if self.is_connect() {
            return HearthError::Transport("could not connect to feed host".into());
        }

        if let Some(status) = self.status() {
            let code = status.as_u16();
            let message =
                format!("HTTP {} {}", code, status.canonical_reason().unwrap_or("unknown status"));

            return match code {
                401 | 403 | 404 | 410 => HearthError::UpstreamRejected(message),
                _ => HearthError::Transport(message),
            };
        }

        if self.is_decode() || self.is_body() {
            return HearthError::Transport(format!("failed to read feed body: {self}"));
        }

        // Strip the URL: it may carry the feed token.
        HearthError::Transport(self.without_url().to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_hearth())
    }
}

/* -------------------------------------------------------------------------- */
/* tokio::task::JoinError → HearthError */
/* -------------------------------------------------------------------------- */

impl From<tokio::task::JoinError> for InfraError {
    fn from(err: tokio::task::JoinError) -> Self {
        if err.is_cancelled() {
            InfraError(HearthError::Internal("database task cancelled".into()))
        } else {
            InfraError(HearthError::Internal(format!("database task panic: {err}")))
        }
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */

#[cfg(test)]
mod tests {
    use reqwest::{Client, StatusCode};
    use rusqlite::ffi::{Error as FfiError, ErrorCode};
    use rusqlite::Error as SqlError;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[test]
    fn sqlite_busy_maps_to_database_error() {
        let err = SqlError::SqliteFailure(
            FfiError { code: ErrorCode::DatabaseBusy, extended_code: 5 },
            Some("database is locked".into()),
        );

        let mapped: HearthError = InfraError::from(err).into();
        match mapped {
            HearthError::Database(msg) => {
                assert!(msg.contains("busy") || msg.contains("locked"));
            }
            other => panic!("expected database error, got {:?}", other),
        }
    }

    #[test]
    fn active_hash_unique_violation_maps_to_duplicate() {
        let err = SqlError::SqliteFailure(
            FfiError { code: ErrorCode::ConstraintViolation, extended_code: 2067 },
            Some(
                "UNIQUE constraint failed: feed_credentials.child_id, feed_credentials.url_hash"
                    .into(),
            ),
        );

        let mapped: HearthError = InfraError::from(err).into();
        assert!(matches!(mapped, HearthError::DuplicateSource(_)));
    }

    #[test]
    fn no_rows_maps_to_not_found() {
        let mapped: HearthError = InfraError::from(SqlError::QueryReturnedNoRows).into();
        assert!(matches!(mapped, HearthError::NotFound(_)));
    }

    #[tokio::test]
    async fn http_status_410_maps_to_upstream_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(StatusCode::GONE))
            .mount(&server)
            .await;

        let client = Client::builder().no_proxy().build().unwrap();
        let error =
            client.get(server.uri()).send().await.unwrap().error_for_status().unwrap_err();

        let mapped: HearthError = InfraError::from(error).into();
        match mapped {
            HearthError::UpstreamRejected(msg) => assert!(msg.contains("410")),
            other => panic!("expected upstream rejection, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn http_status_503_maps_to_transport() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(StatusCode::SERVICE_UNAVAILABLE))
            .mount(&server)
            .await;

        let client = Client::builder().no_proxy().build().unwrap();
        let error =
            client.get(server.uri()).send().await.unwrap().error_for_status().unwrap_err();

        let mapped: HearthError = InfraError::from(error).into();
        assert!(matches!(mapped, HearthError::Transport(_)));
    }
}

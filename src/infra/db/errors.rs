use sqlx::error::ErrorKind;

use crate::application::repos::RepoError;

/// SQLSTATE raised when `statement_timeout` cancels a query.
const QUERY_CANCELED: &str = "57014";
/// SQLSTATE for a malformed literal, e.g. a bad UUID.
const INVALID_TEXT_REPRESENTATION: &str = "22P02";

/// Translate a driver error into the repository vocabulary.
pub fn map_sqlx_error(err: sqlx::Error) -> RepoError {
    let db = match err {
        sqlx::Error::RowNotFound => return RepoError::NotFound,
        sqlx::Error::PoolTimedOut => return RepoError::Timeout,
        sqlx::Error::Database(db) => db,
        other => return RepoError::from_persistence(other),
    };

    match db.code().as_deref() {
        Some(QUERY_CANCELED) => return RepoError::Timeout,
        Some(INVALID_TEXT_REPRESENTATION) => {
            return RepoError::InvalidInput {
                message: db.message().to_string(),
            };
        }
        _ => {}
    }

    match db.kind() {
        ErrorKind::UniqueViolation => RepoError::Duplicate {
            constraint: db.constraint().unwrap_or("unknown").to_string(),
        },
        // Pages still pointing at a template, or a link to a missing group.
        ErrorKind::ForeignKeyViolation => RepoError::InvalidInput {
            message: db.message().to_string(),
        },
        ErrorKind::NotNullViolation | ErrorKind::CheckViolation => RepoError::Integrity {
            message: db.message().to_string(),
        },
        _ => RepoError::from_persistence(db.message()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_rows_and_pool_exhaustion_have_dedicated_variants() {
        assert!(matches!(
            map_sqlx_error(sqlx::Error::RowNotFound),
            RepoError::NotFound
        ));
        assert!(matches!(
            map_sqlx_error(sqlx::Error::PoolTimedOut),
            RepoError::Timeout
        ));
        assert!(matches!(
            map_sqlx_error(sqlx::Error::PoolClosed),
            RepoError::Persistence(_)
        ));
    }
}

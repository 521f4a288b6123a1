use leadforge_db::DatabaseError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProspectingError {
    #[error("invalid search criteria: {0}")]
    InvalidCriteria(String),

    #[error("Job {0} not found")]
    JobNotFound(i64),

    #[error("{0}")]
    JobConflict(String),

    #[error("Database error: {0}")]
    Database(DatabaseError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<DatabaseError> for ProspectingError {
    fn from(e: DatabaseError) -> Self {
        match e {
            DatabaseError::Conflict(message) => Self::JobConflict(message),
            other => Self::Database(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, ProspectingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_is_lifted_out_of_database_errors() {
        let e: ProspectingError = DatabaseError::Conflict("Job 3 is already completed".into()).into();
        assert!(matches!(e, ProspectingError::JobConflict(_)));
        assert_eq!(e.to_string(), "Job 3 is already completed");

        let e: ProspectingError = DatabaseError::NotFound.into();
        assert!(matches!(e, ProspectingError::Database(_)));
    }
}

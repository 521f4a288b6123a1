use leadforge_db::DatabaseError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Bad {field} address '{address}': {reason}")]
    InvalidAddress {
        field: &'static str,
        address: String,
        reason: String,
    },

    #[error("Failed to build message: {0}")]
    Build(String),

    #[error("SMTP connection failed: {0}")]
    Connection(String),

    #[error("SMTP send failed: {0}")]
    Send(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

pub type Result<T> = std::result::Result<T, MailError>;

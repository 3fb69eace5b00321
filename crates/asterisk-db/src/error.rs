//! Asterisk database errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AsteriskError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

pub type AsteriskResult<T> = Result<T, AsteriskError>;

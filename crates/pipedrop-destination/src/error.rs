use thiserror::Error;

/// Errors raised by destination clients.
#[derive(Debug, Error)]
pub enum DestinationError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid identifier: {0:?}")]
    InvalidIdentifier(String),
    #[error("destination rejected credentials: {0}")]
    Auth(String),
    #[error("destination unavailable: {0}")]
    Unavailable(String),
}

impl DestinationError {
    /// Terminal errors do not go away when the operation is repeated.
    pub fn is_terminal(&self) -> bool {
        match self {
            Self::Db(sqlx::Error::Database(db)) => {
                // invalid authorization, invalid password, insufficient privilege
                matches!(db.code().as_deref(), Some("28000" | "28P01" | "42501"))
            }
            Self::Db(sqlx::Error::Configuration(_)) => true,
            Self::Db(_) | Self::Unavailable(_) => false,
            Self::Json(_) | Self::InvalidIdentifier(_) | Self::Auth(_) => true,
        }
    }
}

/// Result type for destination operations.
pub type DestinationResult<T> = std::result::Result<T, DestinationError>;

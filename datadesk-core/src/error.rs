//! Error types for the datadesk core library.
//!
//! Uses `thiserror` for a single public error enum whose variants follow the
//! request-level taxonomy: not-found, malformed input, conflict, and
//! storage/IO failures.

/// Convenience alias used throughout the core crate.
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

/// Top-level error type for the datadesk core library.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("{entity} already exists: {key}")]
    AlreadyExists { entity: &'static str, key: String },

    #[error("Invalid {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Invalid {entity} status transition: {from} -> {to}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CoreError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn already_exists(entity: &'static str, key: impl Into<String>) -> Self {
        Self::AlreadyExists {
            entity,
            key: key.into(),
        }
    }

    pub fn invalid_input(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// HTTP-equivalent status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::InvalidInput { .. } | Self::Serialization(_) => 400,
            Self::AlreadyExists { .. } | Self::InvalidTransition { .. } => 409,
            Self::Config { .. } | Self::Storage(_) | Self::Io(_) => 500,
        }
    }
}

/// Translate a UNIQUE constraint failure into [`CoreError::AlreadyExists`].
///
/// Any other SQLite error passes through unchanged.
pub(crate) fn map_unique(err: rusqlite::Error, entity: &'static str, key: &str) -> CoreError {
    match &err {
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
        {
            CoreError::already_exists(entity, key)
        }
        _ => CoreError::Storage(err),
    }
}

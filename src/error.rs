use crate::db::StoreError;
use crate::i18n::LanguageError;
use crate::schema::ConfigurationError;
use thiserror::Error;

/// Any error raised by this crate.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Language(#[from] LanguageError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Error {
    /// Whether a uniqueness constraint rejected a write.
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Error::Store(e) if e.is_unique_violation())
    }
}

impl From<sqlx::Error> for Error {
    fn from(e: sqlx::Error) -> Self {
        Error::Store(StoreError::Database(e))
    }
}

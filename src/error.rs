use thiserror::Error;

/// Fatal errors: the whole batch fails with zero records processed.
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("input text is empty")]
    EmptyInput,

    #[error("reference catalog unavailable: {0}")]
    CatalogUnavailable(String),

    #[error("invalid catalog row {row}: {message}")]
    InvalidCatalogRow { row: usize, message: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

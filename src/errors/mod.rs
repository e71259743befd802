use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShelfError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    // Registry errors
    #[error("Cannot normalize URL: {0}")]
    Normalization(String),

    #[error("{field} is {len} characters, limit is {max}")]
    LengthLimitExceeded {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("Feed not found: {0}")]
    FeedNotFound(String),

    #[error("Feed address change rejected: {0}")]
    AddressChangeRejected(String),

    // Account errors
    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Subscription not found: {0}")]
    SubscriptionNotFound(String),

    // Import errors
    #[error("Import document could not be parsed: {0}")]
    ImportDocumentParse(String),

    #[error("Remote API error: {0}")]
    RemoteApi(String),

    // Network errors
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    // Storage errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // User input errors
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl ShelfError {
    /// Item-level failures that an import skips over instead of aborting.
    pub fn is_item_level(&self) -> bool {
        matches!(
            self,
            ShelfError::Normalization(_) | ShelfError::LengthLimitExceeded { .. }
        )
    }
}

pub type ShelfResult<T> = Result<T, ShelfError>;

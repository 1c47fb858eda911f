use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScreenerError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Missing required column '{column}' (available: {available})")]
    MissingColumn { column: String, available: String },

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ScreenerError {
    /// Fatal errors abort the whole run; everything else is isolated to
    /// the call (or the stage) that produced it.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ScreenerError::Auth(_) | ScreenerError::MissingColumn { .. })
    }
}

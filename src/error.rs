use thiserror::Error;

/// Failures surfaced by the results engine.
///
/// `Clone` so a single failed shared computation can be handed to every
/// caller that was waiting on it.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ResultsError {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("store unavailable: {0}")]
    TransientStore(String),

    #[error("tally invariant violated: {0}")]
    ComputationInvariant(String),
}

impl ResultsError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        ResultsError::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Only store hiccups are worth retrying; the engine itself never retries.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ResultsError::TransientStore(_))
    }
}

/// Lookups that can miss go through `fetch_optional` and build their own
/// `NotFound` with the entity and id, so anything reaching here is a store failure.
impl From<sqlx::Error> for ResultsError {
    fn from(e: sqlx::Error) -> Self {
        ResultsError::TransientStore(e.to_string())
    }
}

impl From<serde_json::Error> for ResultsError {
    fn from(e: serde_json::Error) -> Self {
        ResultsError::Validation(format!("malformed ballot payload: {}", e))
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },
}

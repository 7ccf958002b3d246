use thiserror::Error;

#[derive(Error, Debug)]
pub enum RiskError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid amount in '{field}': {value}")]
    InvalidAmount { field: &'static str, value: String },

    #[error("Schema mismatch on '{field}': {reason}")]
    SchemaMismatch { field: String, reason: String },

    #[error("Customer loader does not fetch required field '{field}'")]
    MissingManifestField { field: &'static str },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type RiskResult<T> = Result<T, RiskError>;

//! Error types for vidgate.

/// Top-level error type for the gateway.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Invalid signing key file: {0}")]
    InvalidKeyFile(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Errors from building a payment proof for a 402 challenge.
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("Invalid payment challenge: {0}")]
    InvalidChallenge(String),

    #[error("Payment signing failed: {0}")]
    Signing(String),
}

/// Errors from a single dispatched provider call.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// No signer and no bearer credential — surfaced before any network call.
    #[error("No usable credential: payment signer and bearer token are both absent")]
    AuthFailed,

    /// Non-success provider response, passed through with its original body.
    #[error("Provider returned {status}: {body}")]
    Provider { status: u16, body: String },

    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),
}

/// Malformed caller input — rejected before any network call.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Prompt is required")]
    MissingPrompt,

    #[error("Prompt must be 3-1000 characters")]
    PromptLength,

    #[error("Model must be: {0}")]
    UnknownModel(String),

    #[error("Seconds must be: 4, 8, 12")]
    InvalidDuration,

    #[error("Size must be: {0}")]
    InvalidSize(String),

    #[error("reference image must be a base64 string or data URL")]
    InvalidReferenceImage,
}

/// Result type alias for the gateway.
pub type Result<T> = std::result::Result<T, Error>;

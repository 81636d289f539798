use thiserror::Error;

/// Errors that can occur while configuring or running a pairing
#[derive(Debug, Error)]
pub enum PairingError {
    #[error("unsupported distance method '{0}': only gower and urf are supported for distance based donor-receiver pairing")]
    UnsupportedMethod(String),

    #[error("attribute set '{0}' is not defined under attrs")]
    MissingAttributeSet(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("missing column '{column}' for unit {unit}")]
    MissingColumn { unit: String, column: String },

    #[error("invalid value in column '{column}' for unit {unit}: {value}")]
    InvalidValue {
        unit: String,
        column: String,
        value: String,
    },

    #[error("unit id '{0}' appears more than once")]
    DuplicateUnit(String),

    #[error("no spatial distance between receiver {receiver} and donor {donor}")]
    MissingSpatialDistance { receiver: String, donor: String },

    #[error("degenerate distance computation: {0}")]
    Degenerate(String),
}

pub type Result<T> = std::result::Result<T, PairingError>;

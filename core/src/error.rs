use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("config_error: {0}")]
    Config(String),

    #[error("input_missing: {0}")]
    InputMissing(String),

    #[error("integrity_error: {0}")]
    Integrity(String),

    #[error("transport_error: {0}")]
    Transport(String),

    #[error("gate_fail: {0}")]
    GateFail(String),

    #[error("authenticity_violation: {0}")]
    Authenticity(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("pdf error: {0}")]
    Pdf(String),
}

impl CoreError {
    /// Process exit code for CLI wrappers: 0 PASS, 1 gate fail, 2 input/config, 3 authenticity.
    pub fn exit_code(&self) -> i32 {
        match self {
            CoreError::Authenticity(_) => 3,
            CoreError::Config(_) | CoreError::InputMissing(_) | CoreError::InvalidInput(_) => 2,
            _ => 1,
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

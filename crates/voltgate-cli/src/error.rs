use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] voltgate_core::ValidationError),

    #[error(transparent)]
    Gateway(#[from] voltgate_core::GatewayError),

    #[error("config error: {0}")]
    Config(#[from] voltgate_core::ConfigError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) => 2,
            Self::Gateway(_) => 3,
            Self::Serialization(_) => 4,
            Self::Config(_) => 5,
            Self::Io(_) => 10,
        }
    }
}

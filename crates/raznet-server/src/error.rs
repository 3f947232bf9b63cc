use std::path::PathBuf;
use thiserror::Error;

pub const ENV_PREFIX: &str = "RAZNET";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {env_var}")]
    MissingEnvVar { env_var: String },

    #[error("Configuration error: {0}")]
    Other(#[from] config::ConfigError),
}

/// Why an attachment path sent by a client was refused
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Attachment not found: {0}")]
    NotFound(PathBuf),

    #[error("Attachment is outside the upload directory: {0}")]
    OutsideUploads(PathBuf),
}

/// Map a settings key such as `provider.tool_model` to the variable that sets it
pub fn to_env_var(field: &str) -> String {
    format!("{}_{}", ENV_PREFIX, field.replace('.', "__").to_uppercase())
}
